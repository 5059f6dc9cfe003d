//! Error types for the archival S3 client

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Wire code the store uses to ask clients to back off
pub const SLOW_DOWN_CODE: &str = "SlowDown";

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("S3 request throttled ({code}): {message}")]
    Throttled { code: String, message: String },

    #[error("Bucket already owned by you: {0}")]
    BucketAlreadyOwned(String),

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("S3 error {code}: {message}")]
    Service { code: String, message: String },

    #[error("S3 SDK error: {0}")]
    SdkError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration errors, reported once at client construction
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(String),

    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: String, value: String },

    #[error("{0}")]
    Validation(String),
}

impl StorageError {
    /// Map a store error code onto the error taxonomy.
    ///
    /// `subject` names the bucket or key the request was about and is used
    /// for the not-found and already-owned variants.
    pub fn from_code(code: &str, message: &str, subject: &str) -> Self {
        match code {
            SLOW_DOWN_CODE => StorageError::Throttled {
                code: code.to_string(),
                message: message.to_string(),
            },
            "BucketAlreadyOwnedByYou" => StorageError::BucketAlreadyOwned(subject.to_string()),
            "NoSuchBucket" => StorageError::BucketNotFound(subject.to_string()),
            "NoSuchKey" => StorageError::ObjectNotFound(subject.to_string()),
            _ => StorageError::Service {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }

    /// Wire error code, if the store reported one
    pub fn code(&self) -> Option<&str> {
        match self {
            StorageError::Throttled { code, .. } | StorageError::Service { code, .. } => {
                Some(code)
            }
            StorageError::BucketAlreadyOwned(_) => Some("BucketAlreadyOwnedByYou"),
            StorageError::BucketNotFound(_) => Some("NoSuchBucket"),
            StorageError::ObjectNotFound(_) => Some("NoSuchKey"),
            StorageError::SdkError(_) | StorageError::Io(_) | StorageError::Config(_) => None,
        }
    }

    /// Whether the store asked us to slow down
    pub fn is_throttling(&self) -> bool {
        matches!(self, StorageError::Throttled { .. })
    }
}
