//! Storage module for S3-compatible backends
//!
//! Throttle-aware requests, lazy paginated listing and best-effort bucket
//! cleanup on top of a pluggable S3 transport.

mod retry;
mod s3_client;
mod transport;
mod types;

#[cfg(test)]
pub(crate) mod memory;

pub use retry::RetryPolicy;
pub use s3_client::{S3Client, DOWNLOAD_CHUNK_SIZE, LIST_PAGE_SIZE};
pub use transport::{
    AwsTransport, DeleteObjectAck, GetObjectOutput, ListEntry, ListPage, ListPageRequest,
    PutObjectAck, S3Transport,
};
pub use types::*;
