use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::outputs::OutputCompression;

pub const DEFAULT_DATABASE: &str = "glue-etl-from-csv-to-parquet";
pub const DEFAULT_SOURCE_TABLE: &str = "ufo_reports_source_csv";
pub const DEFAULT_TARGET_TABLE: &str = "ufo_reports_target_parquet";
pub const DEFAULT_TARGET_PATH: &str = "s3://aws-glue-etl-job-spark/ufo_reports_target_parquet";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read job config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid job config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Source and destination of the ETL job. Any field left out of the TOML file keeps its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub source_database: String,
    pub source_table: String,
    pub target_database: String,
    pub target_table: String,
    pub target_path: String,
    pub compression: OutputCompression,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            source_database: DEFAULT_DATABASE.to_string(),
            source_table: DEFAULT_SOURCE_TABLE.to_string(),
            target_database: DEFAULT_DATABASE.to_string(),
            target_table: DEFAULT_TARGET_TABLE.to_string(),
            target_path: DEFAULT_TARGET_PATH.to_string(),
            compression: OutputCompression::Snappy,
        }
    }
}

impl JobConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = JobConfig::from_toml(
            r#"
                target_path = "/tmp/ufo/out"
                compression = "zstd"
            "#,
        )
        .unwrap();

        assert_eq!(config.target_path, "/tmp/ufo/out");
        assert_eq!(config.compression, OutputCompression::Zstd);
        assert_eq!(config.source_table, DEFAULT_SOURCE_TABLE);
        assert_eq!(config.target_database, DEFAULT_DATABASE);
    }

    #[test]
    fn unknown_codec_is_rejected() {
        assert!(JobConfig::from_toml("compression = \"lz4\"").is_err());
    }
}
