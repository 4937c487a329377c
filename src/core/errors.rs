//! Error types for the libsift-rs library.
//!
//! Three families of failure exist. Configuration errors (an extension, kind,
//! blueprint or strategy that was never registered) are programmer errors and
//! surface immediately. Format errors abort a whole profile load and carry the
//! source path when one is known. Comparison-domain conditions are not errors
//! at all: they resolve to a score instead.

use std::io;
use std::string::FromUtf8Error;

use thiserror::Error;

/// Main result type for libsift operations.
pub type Result<T> = std::result::Result<T, LibsiftError>;

/// Error type for all libsift operations.
#[derive(Error, Debug)]
pub enum LibsiftError {
    /// I/O related errors (profile files, configuration files)
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Lookup of something that was never registered with a manager or registry
    #[error("{what} not registered: {name}")]
    NotRegistered {
        /// Category of the missing item (extension, blueprint, strategy, type)
        what: &'static str,
        /// Name or identifier that was requested
        name: String,
    },

    /// Malformed or truncated profile stream
    #[error("Format error{}: {message}", .path.as_ref().map(|p| format!(" in {p}")).unwrap_or_default())]
    Format {
        /// Error description
        message: String,
        /// Source path of the profile being read
        path: Option<String>,
        /// Byte offset in the stream where the problem was detected
        offset: Option<u64>,
    },

    /// Validation errors for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Field or input that failed validation
        field: Option<String>,
    },

    /// Serialization/deserialization errors for text formats
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Data type being serialized
        data_type: Option<String>,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error description
        message: String,
        /// Additional context
        context: Option<String>,
    },
}

impl LibsiftError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new "not registered" error
    pub fn not_registered(what: &'static str, name: impl Into<String>) -> Self {
        Self::NotRegistered {
            what,
            name: name.into(),
        }
    }

    /// Create a new format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
            path: None,
            offset: None,
        }
    }

    /// Create a new format error at a known stream offset
    pub fn format_at(message: impl Into<String>, offset: u64) -> Self {
        Self::Format {
            message: message.into(),
            path: None,
            offset: Some(offset),
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new validation error with field context
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Tag a format error with the path of the profile it came from.
    ///
    /// I/O errors are tagged through their message; other variants are
    /// returned unchanged.
    pub fn with_path(mut self, source_path: impl Into<String>) -> Self {
        match &mut self {
            Self::Format { path, .. } => *path = Some(source_path.into()),
            Self::Io { message, .. } => {
                *message = format!("{message} ({})", source_path.into());
            }
            _ => {}
        }
        self
    }

    /// Add context to an existing error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        if let Self::Internal { context: ctx, .. } = &mut self {
            *ctx = Some(context.into());
        }
        self
    }

    /// True for errors raised while decoding a profile stream.
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }
}

impl From<io::Error> for LibsiftError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            return Self::format(format!("truncated stream: {err}"));
        }
        Self::io("I/O operation failed", err)
    }
}

impl From<FromUtf8Error> for LibsiftError {
    fn from(err: FromUtf8Error) -> Self {
        Self::format(format!("invalid UTF-8 string: {err}"))
    }
}

impl From<serde_json::Error> for LibsiftError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON serialization failed: {err}"),
            data_type: Some("JSON".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for LibsiftError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: format!("YAML serialization failed: {err}"),
            data_type: Some("YAML".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

/// Result extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error result
    fn context(self, msg: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<LibsiftError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }

    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| e.into().with_context(msg))
    }
}
