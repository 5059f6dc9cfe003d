//! S3-compatible storage client
//!
//! Every request goes through the [`RetryPolicy`], so throttling is absorbed
//! at single-request granularity. Listing and bucket cleanup are built on
//! those requests and never retry as a whole.

use std::path::Path;

use async_stream::try_stream;
use futures::{pin_mut, Stream, TryStreamExt};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{Result, StorageError};

use super::retry::RetryPolicy;
use super::transport::{
    AwsTransport, DeleteObjectAck, GetObjectOutput, ListPage, ListPageRequest, S3Transport,
};
use super::types::ObjectMetadata;

/// Entries requested per listing page
pub const LIST_PAGE_SIZE: i32 = 100;

/// Buffer size used when streaming an object to disk
pub const DOWNLOAD_CHUNK_SIZE: usize = 0x1000;

/// Region that must not be sent as an explicit location constraint
const DEFAULT_REGION: &str = "us-east-1";

/// S3-compatible storage client.
///
/// Holds no per-object state; safe for sequential reuse. Callers wanting
/// concurrency should use separate clients.
pub struct S3Client<T: S3Transport = AwsTransport> {
    transport: T,
    region: String,
    retry: RetryPolicy,
}

impl S3Client<AwsTransport> {
    /// Create a client backed by the AWS SDK, validating configuration once
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        config.retry.validate()?;
        // Storage settings are validated by the transport
        let transport = AwsTransport::new(&config.storage)?;
        tracing::info!(
            "S3 client configured for {} in region {}",
            config.storage.endpoint,
            config.storage.region
        );
        Ok(Self::with_transport(
            transport,
            config.storage.region.clone(),
            RetryPolicy::from(&config.retry),
        ))
    }
}

impl<T: S3Transport> S3Client<T> {
    pub fn with_transport(transport: T, region: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            region: region.into(),
            retry,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Create a bucket. Succeeds silently if we already own it.
    pub async fn create_bucket(&self, name: &str) -> Result<()> {
        let location = (self.region != DEFAULT_REGION).then_some(self.region.as_str());
        match self.transport.create_bucket(name, location).await {
            Ok(()) => Ok(()),
            Err(StorageError::BucketAlreadyOwned(_)) => {
                debug!("bucket {} already exists and is owned by us", name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Upload an object from memory
    pub async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<ObjectMetadata> {
        let size = data.len() as i64;
        let ack = self
            .retry
            .run("put_object", || self.transport.put_object(bucket, key, data.clone()))
            .await?;
        Ok(ObjectMetadata::from_wire(bucket, key, ack.e_tag.as_deref(), Some(size)))
    }

    /// Remove an object, returning the store's acknowledgment
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<DeleteObjectAck> {
        self.retry
            .run("delete_object", || self.transport.delete_object(bucket, key))
            .await
            .map_err(log_error_response)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<GetObjectOutput> {
        self.retry
            .run("get_object", || self.transport.get_object(bucket, key))
            .await
            .map_err(log_error_response)
    }

    /// Fetch a whole object into memory
    pub async fn get_object_data(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let response = self.get_object(bucket, key).await?;
        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::SdkError(format!("Failed to read object body: {}", e)))?
            .into_bytes()
            .to_vec();
        Ok(data)
    }

    /// Fetch object metadata; the ETag comes back without quotes
    pub async fn get_object_meta(&self, bucket: &str, key: &str) -> Result<ObjectMetadata> {
        let response = self.get_object(bucket, key).await?;
        Ok(ObjectMetadata::from_wire(
            bucket,
            key,
            response.e_tag.as_deref(),
            response.content_length,
        ))
    }

    /// Stream an object to `dest_path` in fixed-size chunks, replacing any
    /// existing file. Returns the number of bytes written.
    pub async fn write_object_to_file(
        &self,
        bucket: &str,
        key: &str,
        dest_path: impl AsRef<Path>,
    ) -> Result<u64> {
        let response = self.get_object(bucket, key).await?;
        let body = response.body.into_async_read();
        tokio::pin!(body);
        let mut file = File::create(dest_path.as_ref()).await?;

        let mut chunk = [0u8; DOWNLOAD_CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            let n = body.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            file.write_all(&chunk[..n]).await?;
            written += n as u64;
        }
        file.flush().await?;

        Ok(written)
    }

    async fn list_page(&self, bucket: &str, token: Option<String>) -> Result<ListPage> {
        let request = ListPageRequest {
            bucket: bucket.to_string(),
            max_keys: LIST_PAGE_SIZE,
            continuation_token: token,
        };
        self.retry
            .run("list_objects", || self.transport.list_objects_v2(&request))
            .await
            .map_err(log_error_response)
    }

    /// Lazily list every object in a bucket.
    ///
    /// Pages are fetched on demand: the next page is requested only after
    /// every entry of the current one has been yielded. Each call starts a
    /// fresh listing.
    pub fn list_objects<'a>(
        &'a self,
        bucket: &'a str,
    ) -> impl Stream<Item = Result<ObjectMetadata>> + 'a {
        try_stream! {
            let mut token: Option<String> = None;

            loop {
                let page = self.list_page(bucket, token.take()).await?;

                for entry in page.contents.unwrap_or_default() {
                    let key = match entry.key {
                        Some(key) if !key.is_empty() => key,
                        _ => {
                            warn!("skipping listing entry without key in {}", bucket);
                            continue;
                        }
                    };
                    yield ObjectMetadata::from_wire(
                        bucket,
                        key,
                        entry.e_tag.as_deref(),
                        entry.size,
                    );
                }

                if !page.is_truncated {
                    break;
                }

                token = page.next_continuation_token;
                if token.is_none() {
                    warn!("listing of {} truncated without continuation token", bucket);
                    break;
                }
            }
        }
    }

    /// Delete every object in a bucket, best effort.
    ///
    /// Returns the keys that could not be deleted; an empty list means the
    /// bucket was emptied. Listing failures (e.g. a missing bucket) are
    /// logged and treated as "nothing to delete". The listing is a single
    /// snapshot; objects written concurrently may survive.
    pub async fn empty_bucket(&self, name: &str) -> Vec<String> {
        debug!("running bucket cleanup on {}", name);

        let mut keys = Vec::new();
        // Any listing error is swallowed here, not only NoSuchBucket.
        if let Err(e) = self.collect_keys(name, &mut keys).await {
            debug!("empty_bucket error: {}", e);
        }

        let mut failed_keys = Vec::new();
        for key in keys {
            debug!("deleting key {}", key);
            match self.delete_object(name, &key).await {
                Ok(reply) => debug!("delete request reply: {:?}", reply),
                Err(e) => {
                    debug!("Delete request failed: {:?}: {}", e, error_chain(&e));
                    failed_keys.push(key);
                }
            }
        }

        failed_keys
    }

    async fn collect_keys(&self, bucket: &str, keys: &mut Vec<String>) -> Result<()> {
        let objects = self.list_objects(bucket);
        pin_mut!(objects);
        while let Some(object) = objects.try_next().await? {
            debug!("found key {}", object.key());
            keys.push(object.key().to_string());
        }
        Ok(())
    }
}

fn log_error_response(e: StorageError) -> StorageError {
    debug!("error response {}", e);
    e
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut chain = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}
