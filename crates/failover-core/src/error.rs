use std::path::PathBuf;
use thiserror::Error;

use crate::cloud::CloudError;

#[derive(Debug, Error)]
pub enum FailoverError {
    #[error("configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid switching direction '{0}': expected ACTIVE or FAILOVER")]
    InvalidDirection(String),

    #[error("DB instance not found: {0}")]
    NotFound(String),

    #[error("no target group found for proxy {proxy}")]
    NoTargetGroup { proxy: String },

    #[error("{resource} is missing required field '{field}'")]
    MissingField { resource: String, field: String },

    #[error("{operation} failed: {message}")]
    Cloud { operation: String, message: String },

    #[error("gave up waiting for {description} after {attempts} attempts (last status: {last_status})")]
    PollExhausted {
        description: String,
        attempts: u32,
        last_status: String,
    },

    #[error("cancelled while waiting for {description}")]
    Cancelled { description: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<CloudError> for FailoverError {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::NotFound(identifier) => FailoverError::NotFound(identifier),
            CloudError::Cancelled(operation) => FailoverError::Cancelled {
                description: operation,
            },
            CloudError::Service { operation, message } => {
                FailoverError::Cloud { operation, message }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, FailoverError>;
