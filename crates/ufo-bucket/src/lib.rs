//! Abstractions over S3-compatible object stores used to publish fetched CSV files and ETL outputs.

mod memory;
mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use memory::{MemoryObjectStore, StoredObject};
pub use s3::{S3Config, S3ObjectStore};

/// Region used when nothing else is configured.
pub const DEFAULT_REGION: &str = "eu-central-1";

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("bucket '{0}' already exists and is owned by you")]
    AlreadyOwnedByYou(String),
    #[error("bucket '{0}' already exists and is owned by someone else")]
    OwnedByOther(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("client error {code}: {message}")]
    Client { code: String, message: String },
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl BucketError {
    pub fn client(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Client {
            code: code.into(),
            message: message.into(),
        }
    }

    /// True for errors the provider reported about the request itself, as opposed to
    /// transport or local failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyOwnedByYou(_) | Self::OwnedByOther(_) | Self::NotFound(_) | Self::Client { .. }
        )
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Creates `bucket` in `region`. Existing buckets surface as
    /// [`BucketError::AlreadyOwnedByYou`] or [`BucketError::OwnedByOther`].
    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<(), BucketError>;

    /// Stores `bytes` under `key`, replacing any existing object.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), BucketError>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, BucketError>;
}
