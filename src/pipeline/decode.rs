//! Body decoders (bytes -> JSON Value)
//!
//! Each decoder handles one *format* and knows nothing about where the body came
//! from; a cached body and a live body decode identically.

use crate::pipeline::{Decoder, PipelineError};
use serde_json::{Map, Value};

/// Whole-body JSON.
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn name(&self) -> &'static str {
        "json"
    }

    fn decode(&self, body: &[u8]) -> Result<Value, PipelineError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(PipelineError::malformed("json", "empty body"));
        }
        serde_json::from_slice(body).map_err(|e| PipelineError::malformed("json", e))
    }
}

/// Newline-delimited JSON; every non-blank line is one value.
///
/// Yields an array in line order. Errors carry the 1-based line number.
pub struct NdjsonDecoder;

impl Decoder for NdjsonDecoder {
    fn name(&self) -> &'static str {
        "ndjson"
    }

    fn decode(&self, body: &[u8]) -> Result<Value, PipelineError> {
        let text = std::str::from_utf8(body).map_err(|e| PipelineError::malformed("ndjson", e))?;
        let mut items = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value = serde_json::from_str(line).map_err(|e| {
                PipelineError::malformed("ndjson", format!("line {}: {}", idx + 1, e))
            })?;
            items.push(value);
        }
        Ok(Value::Array(items))
    }
}

/// UTF-8 text as a JSON string.
pub struct TextDecoder;

impl Decoder for TextDecoder {
    fn name(&self) -> &'static str {
        "text"
    }

    fn decode(&self, body: &[u8]) -> Result<Value, PipelineError> {
        std::str::from_utf8(body)
            .map(|s| Value::String(s.to_string()))
            .map_err(|e| PipelineError::malformed("text", e))
    }
}

/// Markdown with optional YAML front matter.
///
/// Produces `{"meta": {...}, "content": "..."}`. A document without a `---`
/// fence gets empty `meta`; an opened fence that never closes is malformed.
pub struct FrontMatterDecoder;

const FENCE: &str = "---";

impl FrontMatterDecoder {
    fn split(text: &str) -> Result<(Option<&str>, &str), PipelineError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut lines = text.split_inclusive('\n');
        match lines.next() {
            Some(first) if first.trim_end() == FENCE => {}
            _ => return Ok((None, text)),
        }

        let start = text.find('\n').map(|i| i + 1).unwrap_or(text.len());
        let mut offset = start;
        for line in lines {
            if line.trim_end() == FENCE {
                let meta = &text[start..offset];
                let content = &text[offset + line.len()..];
                return Ok((Some(meta), content));
            }
            offset += line.len();
        }
        Err(PipelineError::malformed(
            "markdown",
            "front matter is not terminated by `---`",
        ))
    }
}

impl Decoder for FrontMatterDecoder {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn decode(&self, body: &[u8]) -> Result<Value, PipelineError> {
        let text =
            std::str::from_utf8(body).map_err(|e| PipelineError::malformed("markdown", e))?;
        let (raw_meta, content) = Self::split(text)?;

        let meta = match raw_meta {
            Some(raw) if !raw.trim().is_empty() => serde_yaml::from_str::<Value>(raw)
                .map_err(|e| PipelineError::malformed("markdown", e))?,
            _ => Value::Object(Map::new()),
        };
        if !meta.is_object() {
            return Err(PipelineError::malformed(
                "markdown",
                "front matter must be a mapping",
            ));
        }

        let mut out = Map::new();
        out.insert("meta".into(), meta);
        out.insert(
            "content".into(),
            Value::String(content.trim_start_matches(['\r', '\n']).to_string()),
        );
        Ok(Value::Object(out))
    }
}
