//! Error handling for presigned uploads
//!
//! This module defines the error type returned by every upload operation.
//! Each variant names the stage that failed so callers can tell a protocol
//! violation from a byte-transfer failure or a polling timeout.

use std::fmt;
use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, UploadError>;

/// The transport stage in which a byte transfer failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStage {
    /// The single multipart/form-data POST
    SinglePart,
    /// One chunk of a multipart upload (1-based part number)
    Part(u32),
    /// The multipart completion notification
    MultipartComplete,
}

impl fmt::Display for TransportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportStage::SinglePart => write!(f, "single-part"),
            TransportStage::Part(n) => write!(f, "part {}", n),
            TransportStage::MultipartComplete => write!(f, "multipart-complete"),
        }
    }
}

/// Error types that can occur while uploading a batch of files
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
    /// The server sent something we do not understand. Never retried.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Byte transfer to the storage provider failed
    #[error("Transport failed for {file_name} ({stage}): {message}")]
    Transport {
        file_name: String,
        stage: TransportStage,
        status: Option<u16>,
        message: String,
    },

    /// The server did not finish processing within the polling ceiling
    #[error("Polling timed out for {file_name} after {elapsed_ms} ms")]
    PollTimeout { file_name: String, elapsed_ms: u64 },

    /// A file has no matching presigned descriptor
    #[error("No presigned descriptor found for file: {file_name}")]
    NotFound { file_name: String },

    /// HTTP client fault before any response was received
    #[error("Network error: {message}")]
    Network { message: String },

    /// The batch was cancelled by the caller
    #[error("Upload cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid parameter
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Local I/O error while reading file content
    #[error("I/O error for {path}: {message}")]
    Io { path: String, message: String },

    /// Anything else
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl UploadError {
    /// Create a new protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        UploadError::Protocol {
            message: message.into(),
        }
    }

    /// Create a new transport error
    pub fn transport(
        file_name: impl Into<String>,
        stage: TransportStage,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        UploadError::Transport {
            file_name: file_name.into(),
            stage,
            status,
            message: message.into(),
        }
    }

    /// Create a new poll timeout error
    pub fn poll_timeout(file_name: impl Into<String>, elapsed_ms: u64) -> Self {
        UploadError::PollTimeout {
            file_name: file_name.into(),
            elapsed_ms,
        }
    }

    /// Create a new not found error
    pub fn not_found(file_name: impl Into<String>) -> Self {
        UploadError::NotFound {
            file_name: file_name.into(),
        }
    }

    /// Create a new network error
    pub fn network(message: impl Into<String>) -> Self {
        UploadError::Network {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        UploadError::Config {
            message: message.into(),
        }
    }

    /// Create a new invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        UploadError::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error for a path
    pub fn io(path: impl Into<String>, message: impl Into<String>) -> Self {
        UploadError::Io {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        UploadError::Internal {
            message: message.into(),
        }
    }

    /// The file this error is about, when known
    pub fn file_name(&self) -> Option<&str> {
        match self {
            UploadError::Transport { file_name, .. }
            | UploadError::PollTimeout { file_name, .. }
            | UploadError::NotFound { file_name } => Some(file_name),
            _ => None,
        }
    }

    /// Short name of the stage that failed
    pub fn stage(&self) -> &'static str {
        match self {
            UploadError::Protocol { .. } => "protocol",
            UploadError::Transport { .. } => "transport",
            UploadError::PollTimeout { .. } => "polling",
            UploadError::NotFound { .. } => "matching",
            UploadError::Network { .. } => "network",
            UploadError::Cancelled => "cancelled",
            UploadError::Config { .. } | UploadError::InvalidParameter { .. } => "configuration",
            UploadError::Io { .. } => "io",
            UploadError::Internal { .. } => "internal",
        }
    }

    /// HTTP status attached to the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            UploadError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadError::Cancelled)
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        UploadError::Io {
            path: String::new(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for UploadError {
    fn from(err: serde_json::Error) -> Self {
        UploadError::protocol(format!("invalid JSON: {}", err))
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        UploadError::network(err.to_string())
    }
}

impl From<tokio::task::JoinError> for UploadError {
    fn from(err: tokio::task::JoinError) -> Self {
        UploadError::internal(format!("task failed: {}", err))
    }
}
