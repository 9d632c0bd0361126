use crate::pipeline::PipelineError;
use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "config.base_uri")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "cache_store", "uri_resolver")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the content client.
///
/// HTTP-level outcomes are split the way callers act on them: a 4xx becomes
/// [`Error::NotFound`], every other non-success status (and any transport that
/// could not produce a response at all) becomes [`Error::FailedRequest`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("Cache backend '{backend}' does not support {capability}")]
    CacheCapability {
        capability: &'static str,
        backend: &'static str,
    },

    #[error("Not found: HTTP {status} for {uri}")]
    NotFound {
        status: u16,
        uri: String,
        body: String,
    },

    #[error("Request failed for {uri}{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    FailedRequest {
        /// `None` when the transport never produced a response.
        status: Option<u16>,
        uri: String,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    #[error("Decoder error: {0}")]
    Decoder(#[from] PipelineError),

    #[error("GraphQL errors: {}", .messages.join("; "))]
    GraphQl { messages: Vec<String> },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("Cache error: {message}{}", format_context(.context))]
    Cache {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new cache error with structured context
    pub fn cache_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Cache {
            message: msg.into(),
            context,
        }
    }

    /// A transport-level failure: no HTTP response was received.
    pub fn transport(uri: impl Into<String>, source: TransportError) -> Self {
        Error::FailedRequest {
            status: None,
            uri: uri.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Runtime { context, .. }
            | Error::Cache { context, .. } => Some(context),
            _ => None,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::NotFound { status, .. } => Some(*status),
            Error::FailedRequest { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// True when the request never got an HTTP response (DNS, connect, timeout).
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Error::FailedRequest { status: None, .. })
    }

    pub fn is_capability_error(&self) -> bool {
        matches!(self, Error::CacheCapability { .. })
    }
}
