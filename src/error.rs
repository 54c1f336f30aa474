use crate::transport::TransportError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "stream.concurrency", "request.input")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "session", "synthesizer", "quota")
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

/// Unified error type for the relay.
/// Upstream failures are split into transient (retried) and permanent (surfaced) classes.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Upstream error: HTTP {status}: {message}")]
    Remote {
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("Failed to acquire upstream session after {attempts} attempts: {message}")]
    SessionAcquisition { attempts: u32, message: String },

    #[error("Audio sink closed")]
    SinkClosed,

    #[error("Storage error: {message}{}", format_context(.context))]
    Storage {
        message: String,
        context: ErrorContext,
    },
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

static TIMEOUT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)time[d]?\s?out").expect("timeout pattern is valid"));

/// Whether an upstream failure message looks like a timeout.
pub(crate) fn is_timeout_message(message: &str) -> bool {
    TIMEOUT_PATTERN.is_match(message)
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Error::Runtime {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
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

    pub fn storage_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Storage {
            message: msg.into(),
            context,
        }
    }

    /// Classify a non-2xx upstream reply.
    ///
    /// Any 5xx status or a timeout-shaped body is transient; the rest is permanent.
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let retryable = (500..600).contains(&status) || is_timeout_message(&message);
        Error::Remote {
            status,
            message,
            retryable,
        }
    }

    /// True for failures worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Remote { retryable, .. } => *retryable,
            Error::Transport(TransportError::Http(e)) => {
                e.is_timeout() || is_timeout_message(&e.to_string())
            }
            Error::Transport(TransportError::Other(msg)) => is_timeout_message(msg),
            Error::Runtime { message, .. } => is_timeout_message(message),
            _ => false,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Runtime { context, .. }
            | Error::Storage { context, .. } => Some(context),
            _ => None,
        }
    }
}
