//! In-memory S3 transport for tests
//!
//! Keeps buckets in ordered maps, paginates like ListObjectsV2 and lets
//! tests inject throttling and per-key delete failures.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;

use super::transport::{
    DeleteObjectAck, GetObjectOutput, ListEntry, ListPage, ListPageRequest, PutObjectAck,
    S3Transport,
};
use crate::error::{Result, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CreateBucket,
    Put,
    Get,
    Delete,
    List,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    etag: String,
}

#[derive(Default)]
struct State {
    buckets: BTreeMap<String, BTreeMap<String, StoredObject>>,
    throttle: HashMap<Op, u32>,
    failing_deletes: HashSet<String>,
    calls: HashMap<Op, u32>,
    list_requests: Vec<ListPageRequest>,
    bucket_locations: Vec<Option<String>>,
    omit_continuation_tokens: bool,
}

#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object directly, bypassing call counters
    pub fn insert(&self, bucket: &str, key: &str, data: &[u8]) {
        self.insert_with_etag(bucket, key, data, &wire_etag(data));
    }

    pub fn insert_with_etag(&self, bucket: &str, key: &str, data: &[u8], etag: &str) {
        let mut state = self.state.lock().unwrap();
        state.buckets.entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                etag: etag.to_string(),
            },
        );
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        let state = self.state.lock().unwrap();
        state
            .buckets
            .get(bucket)
            .is_some_and(|objects| objects.contains_key(key))
    }

    /// Answer the next `times` requests of `op` with SlowDown
    pub fn throttle(&self, op: Op, times: u32) {
        self.state.lock().unwrap().throttle.insert(op, times);
    }

    /// Make every delete of `key` fail with an internal error
    pub fn fail_deletes_of(&self, key: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_deletes
            .insert(key.to_string());
    }

    pub fn calls(&self, op: Op) -> u32 {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    /// Location constraints received by create_bucket, in call order
    pub fn bucket_locations(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().bucket_locations.clone()
    }

    /// Answer truncated listings without a continuation token
    pub fn omit_continuation_tokens(&self) {
        self.state.lock().unwrap().omit_continuation_tokens = true;
    }

    pub fn list_requests(&self) -> Vec<ListPageRequest> {
        self.state.lock().unwrap().list_requests.clone()
    }

    fn begin(&self, op: Op) -> Result<std::sync::MutexGuard<'_, State>> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(op).or_default() += 1;
        if let Some(left) = state.throttle.get_mut(&op) {
            if *left > 0 {
                *left -= 1;
                return Err(StorageError::from_code(
                    "SlowDown",
                    "Please reduce your request rate.",
                    "",
                ));
            }
        }
        Ok(state)
    }
}

pub fn wire_etag(data: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("\"{:016x}{:016x}\"", hasher.finish(), data.len())
}

#[async_trait]
impl S3Transport for MemoryTransport {
    async fn create_bucket(&self, bucket: &str, location: Option<&str>) -> Result<()> {
        let mut state = self.begin(Op::CreateBucket)?;
        state.bucket_locations.push(location.map(|l| l.to_string()));
        if state.buckets.contains_key(bucket) {
            return Err(StorageError::from_code(
                "BucketAlreadyOwnedByYou",
                "Your previous request to create the named bucket succeeded",
                bucket,
            ));
        }
        state.buckets.insert(bucket.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<PutObjectAck> {
        let mut state = self.begin(Op::Put)?;
        let objects = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::from_code("NoSuchBucket", "", bucket))?;
        let etag = wire_etag(&body);
        objects.insert(
            key.to_string(),
            StoredObject {
                data: body,
                etag: etag.clone(),
            },
        );
        Ok(PutObjectAck { e_tag: Some(etag) })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<GetObjectOutput> {
        let state = self.begin(Op::Get)?;
        let object = state
            .buckets
            .get(bucket)
            .ok_or_else(|| StorageError::from_code("NoSuchBucket", "", bucket))?
            .get(key)
            .ok_or_else(|| StorageError::from_code("NoSuchKey", "", key))?;
        Ok(GetObjectOutput {
            e_tag: Some(object.etag.clone()),
            content_length: Some(object.data.len() as i64),
            body: ByteStream::from(object.data.clone()),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<DeleteObjectAck> {
        let mut state = self.begin(Op::Delete)?;
        if state.failing_deletes.contains(key) {
            return Err(StorageError::from_code(
                "InternalError",
                "We encountered an internal error. Please try again.",
                key,
            ));
        }
        let objects = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::from_code("NoSuchBucket", "", bucket))?;
        // S3 acknowledges deletes of absent keys too
        objects.remove(key);
        Ok(DeleteObjectAck::default())
    }

    async fn list_objects_v2(&self, request: &ListPageRequest) -> Result<ListPage> {
        let mut state = self.begin(Op::List)?;
        state.list_requests.push(request.clone());
        let objects = state
            .buckets
            .get(&request.bucket)
            .ok_or_else(|| StorageError::from_code("NoSuchBucket", "", &request.bucket))?;

        let after = request.continuation_token.as_deref();
        let mut remaining = objects
            .iter()
            .filter(|(key, _)| after.map_or(true, |token| key.as_str() > token));
        let page: Vec<ListEntry> = remaining
            .by_ref()
            .take(request.max_keys.max(0) as usize)
            .map(|(key, object)| ListEntry {
                key: Some(key.clone()),
                e_tag: Some(object.etag.clone()),
                size: Some(object.data.len() as i64),
            })
            .collect();
        let is_truncated = remaining.next().is_some();

        Ok(ListPage {
            next_continuation_token: if is_truncated && !state.omit_continuation_tokens {
                page.last().and_then(|entry| entry.key.clone())
            } else {
                None
            },
            contents: if page.is_empty() { None } else { Some(page) },
            is_truncated,
        })
    }
}
