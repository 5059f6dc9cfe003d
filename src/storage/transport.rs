//! Wire-level S3 transport
//!
//! One trait method per S3 request. The AWS SDK implementation lives here;
//! signing, HTTP and XML parsing are delegated to it.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{retry::RetryConfig as SdkRetryConfig, Credentials, Region},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    primitives::ByteStream,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
    Client,
};

use crate::config::StorageConfig;
use crate::error::{Result, StorageError};

/// Response of a GET object request, body not yet consumed
#[derive(Debug)]
pub struct GetObjectOutput {
    pub e_tag: Option<String>,
    pub content_length: Option<i64>,
    pub body: ByteStream,
}

#[derive(Debug, Clone, Default)]
pub struct PutObjectAck {
    pub e_tag: Option<String>,
}

/// Raw acknowledgment of a delete request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteObjectAck {
    pub delete_marker: Option<bool>,
    pub version_id: Option<String>,
}

/// Parameters of a single ListObjectsV2 page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPageRequest {
    pub bucket: String,
    pub max_keys: i32,
    pub continuation_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub key: Option<String>,
    pub e_tag: Option<String>,
    pub size: Option<i64>,
}

/// One page of a ListObjectsV2 listing.
///
/// `contents` is `None` when the response carried no entries field at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub contents: Option<Vec<ListEntry>>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// S3-protocol requests the client is built on
#[async_trait]
pub trait S3Transport: Send + Sync {
    /// Create a bucket; `location` is the location constraint to send, if any
    async fn create_bucket(&self, bucket: &str, location: Option<&str>) -> Result<()>;

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<PutObjectAck>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<GetObjectOutput>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<DeleteObjectAck>;

    async fn list_objects_v2(&self, request: &ListPageRequest) -> Result<ListPage>;
}

/// Transport backed by the AWS SDK for S3-compatible stores
#[derive(Clone)]
pub struct AwsTransport {
    client: Client,
}

impl AwsTransport {
    /// Build the SDK client from validated configuration.
    ///
    /// SDK-level retries are disabled: throttling is retried by
    /// [`RetryPolicy`](super::RetryPolicy) only.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let endpoint = config.validate()?;

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "archival-s3",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(endpoint)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO and other S3-compatible services
            .retry_config(SdkRetryConfig::disabled())
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
        })
    }
}

#[async_trait]
impl S3Transport for AwsTransport {
    async fn create_bucket(&self, bucket: &str, location: Option<&str>) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(bucket);

        if let Some(location) = location {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(location))
                    .build(),
            );
        }

        request
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "create bucket", bucket))?;
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<PutObjectAck> {
        let response = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "put object", key))?;

        Ok(PutObjectAck {
            e_tag: response.e_tag().map(|s| s.to_string()),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<GetObjectOutput> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "get object", key))?;

        Ok(GetObjectOutput {
            e_tag: response.e_tag().map(|s| s.to_string()),
            content_length: response.content_length(),
            body: response.body,
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<DeleteObjectAck> {
        let response = self
            .client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "delete object", key))?;

        Ok(DeleteObjectAck {
            delete_marker: response.delete_marker(),
            version_id: response.version_id().map(|s| s.to_string()),
        })
    }

    async fn list_objects_v2(&self, request: &ListPageRequest) -> Result<ListPage> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&request.bucket)
            .max_keys(request.max_keys)
            .set_continuation_token(request.continuation_token.clone())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "list objects in", &request.bucket))?;

        let contents = response.contents.map(|objects| {
            objects
                .into_iter()
                .map(|obj| ListEntry {
                    key: obj.key,
                    e_tag: obj.e_tag,
                    size: obj.size,
                })
                .collect()
        });

        Ok(ListPage {
            contents,
            is_truncated: response.is_truncated.unwrap_or(false),
            next_continuation_token: response.next_continuation_token,
        })
    }
}

/// Classify an SDK failure by the error code the store returned
fn map_sdk_error<E, R>(err: SdkError<E, R>, action: &str, subject: &str) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.code() {
        Some(code) => StorageError::from_code(code, err.message().unwrap_or_default(), subject),
        None => StorageError::SdkError(format!(
            "Failed to {} {}: {}",
            action,
            subject,
            DisplayErrorContext(&err)
        )),
    }
}
