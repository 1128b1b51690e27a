use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{BucketError, ObjectStore};

const DEFAULT_OWNER: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Debug)]
struct MemoryBucket {
    owner: String,
    region: String,
    objects: HashMap<String, StoredObject>,
}

/// Process-local [`ObjectStore`] that mimics S3 bucket ownership rules.
///
/// Every call is made as `owner`; buckets registered through
/// [`MemoryObjectStore::insert_foreign_bucket`] belong to someone else and reject writes.
#[derive(Debug)]
pub struct MemoryObjectStore {
    owner: String,
    buckets: Mutex<HashMap<String, MemoryBucket>>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new(DEFAULT_OWNER)
    }
}

impl MemoryObjectStore {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a bucket owned by another principal.
    pub fn insert_foreign_bucket(
        &self,
        bucket: &str,
        region: &str,
        owner: &str,
    ) -> Result<(), BucketError> {
        self.lock()?.insert(
            bucket.to_string(),
            MemoryBucket {
                owner: owner.to_string(),
                region: region.to_string(),
                objects: HashMap::new(),
            },
        );
        Ok(())
    }

    pub fn bucket_region(&self, bucket: &str) -> Option<String> {
        let buckets = self.buckets.lock().ok()?;
        buckets.get(bucket).map(|entry| entry.region.clone())
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        let buckets = self.buckets.lock().ok()?;
        buckets.get(bucket)?.objects.get(key).cloned()
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets
            .lock()
            .ok()
            .and_then(|buckets| buckets.get(bucket).map(|entry| entry.objects.len()))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, MemoryBucket>>, BucketError> {
        self.buckets
            .lock()
            .map_err(|_| BucketError::Unexpected("memory object store lock poisoned".into()))
    }

    fn owned_bucket<'a>(
        &self,
        buckets: &'a mut HashMap<String, MemoryBucket>,
        bucket: &str,
    ) -> Result<&'a mut MemoryBucket, BucketError> {
        let entry = buckets.get_mut(bucket).ok_or_else(|| {
            BucketError::client("NoSuchBucket", format!("the bucket '{bucket}' does not exist"))
        })?;
        if entry.owner != self.owner {
            return Err(BucketError::client("AccessDenied", "Access Denied"));
        }
        Ok(entry)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<(), BucketError> {
        if bucket.is_empty() {
            return Err(BucketError::client(
                "InvalidBucketName",
                "bucket name cannot be empty",
            ));
        }

        let mut buckets = self.lock()?;
        match buckets.get(bucket) {
            Some(existing) if existing.owner == self.owner => {
                Err(BucketError::AlreadyOwnedByYou(bucket.to_string()))
            }
            Some(_) => Err(BucketError::OwnedByOther(bucket.to_string())),
            None => {
                buckets.insert(
                    bucket.to_string(),
                    MemoryBucket {
                        owner: self.owner.clone(),
                        region: region.to_string(),
                        objects: HashMap::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), BucketError> {
        let mut buckets = self.lock()?;
        let entry = self.owned_bucket(&mut buckets, bucket)?;
        entry.objects.insert(
            key.to_string(),
            StoredObject {
                body: bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, BucketError> {
        let mut buckets = self.lock()?;
        let entry = self.owned_bucket(&mut buckets, bucket)?;
        entry
            .objects
            .get(key)
            .map(|object| object.body.clone())
            .ok_or_else(|| BucketError::NotFound(format!("{bucket}/{key}")))
    }
}
