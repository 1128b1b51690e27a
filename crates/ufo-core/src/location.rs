use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use bytes::Bytes;
use thiserror::Error;
use ufo_bucket::{BucketError, ObjectStore};

const S3_SCHEME: &str = "s3://";
const FILE_SCHEME: &str = "file://";

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("invalid storage location '{0}'")]
    Invalid(String),
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Bucket(#[from] BucketError),
}

/// Where a catalog table's data lives: a local path or an `s3://bucket/key` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    Local(PathBuf),
    S3 { bucket: String, key: String },
}

impl StorageLocation {
    /// Appends a path segment, treating the current location as a directory or prefix.
    pub fn join(&self, name: &str) -> StorageLocation {
        match self {
            StorageLocation::Local(path) => StorageLocation::Local(path.join(name)),
            StorageLocation::S3 { bucket, key } => {
                let prefix = key.trim_end_matches('/');
                let key = if prefix.is_empty() {
                    name.to_string()
                } else {
                    format!("{prefix}/{name}")
                };
                StorageLocation::S3 {
                    bucket: bucket.clone(),
                    key,
                }
            }
        }
    }

    pub async fn read(&self, store: &dyn ObjectStore) -> Result<Bytes, LocationError> {
        match self {
            StorageLocation::Local(path) => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|source| LocationError::Io {
                    path: path.clone(),
                    source,
                }),
            StorageLocation::S3 { bucket, key } => Ok(store.get_object(bucket, key).await?),
        }
    }

    pub async fn write(
        &self,
        store: &dyn ObjectStore,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), LocationError> {
        match self {
            StorageLocation::Local(path) => {
                let io_error = |source| LocationError::Io {
                    path: path.clone(),
                    source,
                };
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
                }
                tokio::fs::write(path, &bytes).await.map_err(io_error)
            }
            StorageLocation::S3 { bucket, key } => {
                store.put_object(bucket, key, bytes, content_type).await?;
                Ok(())
            }
        }
    }
}

impl FromStr for StorageLocation {
    type Err = LocationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(LocationError::Invalid(value.to_string()));
        }

        if let Some(rest) = trimmed.strip_prefix(S3_SCHEME) {
            let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
            if bucket.is_empty() {
                return Err(LocationError::Invalid(value.to_string()));
            }
            return Ok(StorageLocation::S3 {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }

        let path = trimmed.strip_prefix(FILE_SCHEME).unwrap_or(trimmed);
        Ok(StorageLocation::Local(PathBuf::from(path)))
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageLocation::Local(path) => write!(f, "{}", path.display()),
            StorageLocation::S3 { bucket, key } => write!(f, "{S3_SCHEME}{bucket}/{key}"),
        }
    }
}
