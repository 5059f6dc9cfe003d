//! Archival S3 client
//!
//! A small client for S3-compatible object stores used by archival test
//! harnesses. It retries throttled requests with exponential backoff,
//! paginates listings lazily, normalizes object metadata and empties
//! buckets while reporting the keys it could not delete.
//!
//! # Modules
//!
//! - `config`: connection and retry settings, loaded from the environment
//! - `error`: error taxonomy keyed on store error codes
//! - `storage`: the client, its retry policy and the S3 transport

pub mod config;
pub mod error;
pub mod storage;

pub use config::{ClientConfig, RetryConfig, StorageConfig};
pub use error::{ConfigError, Result, StorageError};
pub use storage::{ObjectMetadata, RetryPolicy, S3Client};
