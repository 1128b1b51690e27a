//! Fetch a remote CSV and publish it into an object-store bucket.
//!
//! Provider failures are returned as outcome values rather than raised, so the caller decides
//! what is fatal. Bucket problems never stop the put from being attempted.

use bytes::Bytes;
use tracing::{info, warn};
use ufo_bucket::{BucketError, ObjectStore};

use crate::fetch::{FetchError, HttpFetcher};

pub const CSV_CONTENT_TYPE: &str = "text/csv";

#[derive(Debug)]
pub enum BucketOutcome {
    Created,
    AlreadyOwnedByCaller,
    OwnedByOther,
    Failed(BucketError),
}

impl BucketOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, BucketOutcome::Created | BucketOutcome::AlreadyOwnedByCaller)
    }

    pub fn is_warning(&self) -> bool {
        !matches!(self, BucketOutcome::Created)
    }
}

#[derive(Debug)]
pub enum PublishOutcome {
    Stored { bytes: usize },
    ClientError(BucketError),
    Unexpected(BucketError),
}

impl PublishOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, PublishOutcome::Stored { .. })
    }

    pub fn error(&self) -> Option<&BucketError> {
        match self {
            PublishOutcome::Stored { .. } => None,
            PublishOutcome::ClientError(err) | PublishOutcome::Unexpected(err) => Some(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub url: String,
    pub bucket: String,
    pub key: String,
    pub region: String,
}

#[derive(Debug)]
pub struct PublishReport {
    pub bucket: BucketOutcome,
    pub object: PublishOutcome,
}

impl PublishReport {
    pub fn succeeded(&self) -> bool {
        self.object.is_stored()
    }
}

/// Creates `bucket` unless it already exists. Never fails; the outcome says what happened.
pub async fn ensure_bucket(store: &dyn ObjectStore, bucket: &str, region: &str) -> BucketOutcome {
    match store.create_bucket(bucket, region).await {
        Ok(()) => {
            info!(bucket, region, "bucket created");
            BucketOutcome::Created
        }
        Err(BucketError::AlreadyOwnedByYou(_)) => {
            warn!(bucket, "bucket already exists and is owned by you");
            BucketOutcome::AlreadyOwnedByCaller
        }
        Err(BucketError::OwnedByOther(_)) => {
            warn!(bucket, "bucket already exists and is owned by someone else");
            BucketOutcome::OwnedByOther
        }
        Err(err) => {
            warn!(bucket, error = %err, "unexpected error while creating bucket");
            BucketOutcome::Failed(err)
        }
    }
}

/// Unconditionally overwrites `bucket/key` with `body`.
pub async fn publish(store: &dyn ObjectStore, bucket: &str, key: &str, body: Bytes) -> PublishOutcome {
    let len = body.len();
    match store.put_object(bucket, key, body, CSV_CONTENT_TYPE).await {
        Ok(()) => {
            info!(bucket, key, bytes = len, "object uploaded");
            PublishOutcome::Stored { bytes: len }
        }
        Err(err) if err.is_client_error() => {
            warn!(bucket, key, error = %err, "client error while putting object");
            PublishOutcome::ClientError(err)
        }
        Err(err) => {
            warn!(bucket, key, error = %err, "unexpected error while putting object");
            PublishOutcome::Unexpected(err)
        }
    }
}

/// Fetch, ensure bucket, publish. Only a failed fetch aborts the flow.
pub async fn fetch_and_publish(
    fetcher: &HttpFetcher,
    store: &dyn ObjectStore,
    request: &PublishRequest,
) -> Result<PublishReport, FetchError> {
    let body = fetcher.fetch(&request.url).await?;
    let bucket = ensure_bucket(store, &request.bucket, &request.region).await;
    let object = publish(store, &request.bucket, &request.key, body).await;
    Ok(PublishReport { bucket, object })
}
