//! Error types for blogrefresh.
//!
//! Library crates return [`BlogRefreshError`] via `thiserror`.
//! The CLI wraps it with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all blogrefresh operations.
#[derive(Debug, thiserror::Error)]
pub enum BlogRefreshError {
    /// Missing credential, missing store location, or unsupported provider.
    #[error("config error: {message}")]
    Config { message: String },

    /// A required input field is missing or unusable.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Network failure or non-2xx response from an external API.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Response body, when one could be read.
        body: Option<String>,
    },

    /// The article store has no record for the requested id.
    #[error("not found: {0}")]
    NotFound(String),

    /// HTML, selector, or JSON parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BlogRefreshError>;

impl BlogRefreshError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Transport failure before any response was received.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
            status: None,
            body: None,
        }
    }

    /// Non-success HTTP response.
    pub fn http(context: impl std::fmt::Display, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = if body.is_empty() {
            format!("{context} failed: HTTP {status}")
        } else {
            format!("{context} failed: HTTP {status} - {body}")
        };
        Self::Transport {
            message,
            status: Some(status),
            body: (!body.is_empty()).then_some(body),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP-style status code for this error.
    ///
    /// Validation maps to 400, not-found to 404, transport errors to the
    /// upstream status (or 0 when the request never got a response).
    pub fn status(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::NotFound(_) => 404,
            Self::Transport { status, .. } => status.unwrap_or(0),
            Self::Config { .. } | Self::Parse { .. } | Self::Io { .. } => 500,
        }
    }

    /// The bare message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Config { message }
            | Self::Validation { message }
            | Self::Transport { message, .. }
            | Self::Parse { message } => message.clone(),
            Self::NotFound(what) => what.clone(),
            Self::Io { .. } => self.to_string(),
        }
    }
}
