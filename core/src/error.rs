use std::path::PathBuf;
use thiserror::Error;

use crate::types::LookupFailure;

#[derive(Debug, Error)]
pub enum PostureError {
    #[error("Resource not found for {context}")]
    NotFound { context: String },

    #[error("Max retries reached. Unable to fetch data from {service}{}", .last_status.map(|s| format!(" (last status code: {})", s)).unwrap_or_default())]
    MaxRetriesReached {
        service: String,
        last_status: Option<u16>,
    },

    #[error("Received a {status} status code from {service}")]
    UnexpectedStatus { service: String, status: u16 },

    #[error("Request to {service} failed: {source}")]
    Transport {
        service: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed response from {service}: {message}")]
    Decode { service: String, message: String },

    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error in config file '{}':\n{}", .file.display(), .errors.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    InvalidConfig { file: PathBuf, errors: Vec<String> },

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Invalid YAML syntax in '{}' at line {line}, column {column}: {message}", .file.display())]
    YamlSyntaxError {
        file: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl PostureError {
    pub fn validation(message: impl Into<String>) -> Self {
        PostureError::Validation {
            message: message.into(),
        }
    }

    /// Caller contract violations abort a whole batch; everything else is
    /// recorded against the item that produced it.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PostureError::Validation { .. }
                | PostureError::Config { .. }
                | PostureError::InvalidConfig { .. }
                | PostureError::ConfigNotFound(_)
                | PostureError::YamlSyntaxError { .. }
        )
    }

    pub fn to_failure(&self) -> LookupFailure {
        match self {
            PostureError::NotFound { context } => LookupFailure::NotFound {
                context: context.clone(),
            },
            PostureError::MaxRetriesReached { last_status, .. } => LookupFailure::MaxRetries {
                last_status_code: *last_status,
            },
            PostureError::UnexpectedStatus { status, .. } => LookupFailure::UnexpectedStatus {
                status_code: *status,
            },
            other => LookupFailure::Transport {
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, PostureError>;
