//! 解码流水线：根据显式参数、默认配置、Content-Type 或扩展名选择解码器。
//!
//! # Decode Pipeline
//!
//! Turns a completed response body into a [`serde_json::Value`]. The decoders
//! themselves are deliberately small format adapters; the interesting part is
//! resolution, which follows a fixed order:
//!
//! ```text
//! explicit decoder → client default → Content-Type header → URI extension → error
//! ```
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Decoder`] | Trait for body decoders |
//! | [`DecoderRegistry`] | Named decoders plus content-type / extension maps |
//! | [`decode`] | Built-in decoders (JSON, NDJSON, text, Markdown front matter) |

pub mod decode;

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Decoder trait for response bodies
pub trait Decoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Decode a complete body into a JSON value
    fn decode(&self, body: &[u8]) -> Result<Value, PipelineError>;
}

/// Pipeline error types
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Malformed {format} body: {reason}")]
    Malformed { format: &'static str, reason: String },

    #[error("Unknown decoder: {0}")]
    UnknownDecoder(String),

    #[error("No decoder could be resolved for {uri}{}", .hint.as_ref().map(|h| format!("\n💡 Hint: {}", h)).unwrap_or_default())]
    Unresolved { uri: String, hint: Option<String> },
}

impl PipelineError {
    pub(crate) fn malformed(format: &'static str, reason: impl ToString) -> Self {
        PipelineError::Malformed {
            format,
            reason: reason.to_string(),
        }
    }

    /// Attach an actionable hint to the error
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        if let PipelineError::Unresolved { hint: ref mut h, .. } = self {
            *h = Some(hint.into());
        }
        self
    }
}

/// Named decoders plus the lookup tables used to infer one.
#[derive(Clone)]
pub struct DecoderRegistry {
    decoders: HashMap<String, Arc<dyn Decoder>>,
    content_types: HashMap<String, String>,
    extensions: HashMap<String, String>,
}

impl DecoderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
            content_types: HashMap::new(),
            extensions: HashMap::new(),
        }
    }

    /// Registry with the built-in decoders and their usual MIME types and extensions.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("json", Arc::new(decode::JsonDecoder));
        registry.register("ndjson", Arc::new(decode::NdjsonDecoder));
        registry.register("jsonl", Arc::new(decode::NdjsonDecoder));
        registry.register("text", Arc::new(decode::TextDecoder));
        registry.register("markdown", Arc::new(decode::FrontMatterDecoder));

        for (mime, name) in [
            ("application/json", "json"),
            ("text/json", "json"),
            ("application/x-ndjson", "ndjson"),
            ("application/jsonl", "ndjson"),
            ("text/markdown", "markdown"),
            ("text/x-markdown", "markdown"),
            ("text/plain", "text"),
        ] {
            registry.map_content_type(mime, name);
        }
        for (ext, name) in [
            ("json", "json"),
            ("ndjson", "ndjson"),
            ("jsonl", "ndjson"),
            ("md", "markdown"),
            ("markdown", "markdown"),
            ("txt", "text"),
        ] {
            registry.map_extension(ext, name);
        }
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, decoder: Arc<dyn Decoder>) {
        self.decoders.insert(name.into(), decoder);
    }

    pub fn map_content_type(&mut self, mime: impl Into<String>, decoder: impl Into<String>) {
        self.content_types
            .insert(mime.into().to_ascii_lowercase(), decoder.into());
    }

    pub fn map_extension(&mut self, ext: impl Into<String>, decoder: impl Into<String>) {
        self.extensions
            .insert(ext.into().to_ascii_lowercase(), decoder.into());
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Decoder>> {
        self.decoders.get(name).cloned()
    }

    /// Pick a decoder: explicit > default > content type > URI extension.
    ///
    /// A named decoder (explicit or default) that is not registered is an error
    /// rather than a reason to keep guessing.
    pub fn resolve(
        &self,
        explicit: Option<&str>,
        default: Option<&str>,
        content_type: Option<&str>,
        uri: &str,
    ) -> Result<Arc<dyn Decoder>, PipelineError> {
        if let Some(name) = explicit.or(default) {
            return self
                .get(name)
                .ok_or_else(|| PipelineError::UnknownDecoder(name.to_string()));
        }

        if let Some(name) = content_type.and_then(|ct| self.by_content_type(ct)) {
            if let Some(decoder) = self.get(name) {
                return Ok(decoder);
            }
        }

        if let Some(name) = extension_of(uri).and_then(|ext| self.extensions.get(&ext)) {
            if let Some(decoder) = self.get(name) {
                return Ok(decoder);
            }
        }

        Err(PipelineError::Unresolved {
            uri: uri.to_string(),
            hint: None,
        }
        .with_hint("pass a decoder explicitly or configure `default_decoder`"))
    }

    fn by_content_type(&self, content_type: &str) -> Option<&str> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if let Some(name) = self.content_types.get(&mime) {
            return Some(name.as_str());
        }
        // Structured syntax suffix, e.g. application/vnd.api+json
        if mime.ends_with("+json") {
            return Some("json");
        }
        None
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn extension_of(uri: &str) -> Option<String> {
    let path = match url::Url::parse(uri) {
        Ok(url) => url.path().to_string(),
        Err(_) => uri.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}
