//! File-backed table catalog mapping (database, table) to a storage location and schema.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("table {database}.{table} is not registered in the catalog")]
    TableNotFound { database: String, table: String },
    #[error("catalog I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog at {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Parquet => "parquet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRun {
    pub run_id: Uuid,
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub source_rows: usize,
    pub output_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTable {
    pub database: String,
    pub name: String,
    pub location: String,
    pub format: TableFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<JobRun>,
}

impl CatalogTable {
    pub fn new(
        database: impl Into<String>,
        name: impl Into<String>,
        location: impl Into<String>,
        format: TableFormat,
    ) -> Self {
        let now = Utc::now();
        Self {
            database: database.into(),
            name: name.into(),
            location: location.into(),
            format,
            compression: None,
            columns: Vec::new(),
            parameters: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            last_run: None,
        }
    }

    pub fn with_schema_of(mut self, df: &DataFrame) -> Self {
        self.columns = df
            .get_columns()
            .iter()
            .map(|column| ColumnSchema {
                name: column.name().to_string(),
                data_type: column.dtype().to_string(),
            })
            .collect();
        self
    }

    fn matches(&self, database: &str, table: &str) -> bool {
        self.database == database && self.name == table
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub tables: Vec<CatalogTable>,
}

impl Catalog {
    /// Loads the catalog at `path`; a missing file is an empty catalog.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let contents = match fs::read(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "catalog file missing, starting empty");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(CatalogError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_slice(&contents).map_err(|source| CatalogError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the catalog through a uniquely named sibling file so readers never see a partial
    /// write and concurrent savers never share a scratch file.
    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        let io_error = |source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        };

        let json = serde_json::to_vec_pretty(self).map_err(|source| CatalogError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(io_error)?;

        let mut tmp = NamedTempFile::new_in(parent).map_err(io_error)?;
        tmp.write_all(&json).map_err(io_error)?;
        tmp.persist(path).map_err(|err| io_error(err.error))?;
        Ok(())
    }

    pub fn get(&self, database: &str, table: &str) -> Option<&CatalogTable> {
        self.tables.iter().find(|entry| entry.matches(database, table))
    }

    pub fn require(&self, database: &str, table: &str) -> Result<&CatalogTable, CatalogError> {
        self.get(database, table)
            .ok_or_else(|| CatalogError::TableNotFound {
                database: database.to_string(),
                table: table.to_string(),
            })
    }

    pub fn tables_in<'a>(&'a self, database: &'a str) -> impl Iterator<Item = &'a CatalogTable> + 'a {
        self.tables
            .iter()
            .filter(move |entry| entry.database == database)
    }

    /// Inserts `table`, or replaces the existing entry while keeping its `created_at`.
    pub fn upsert(&mut self, mut table: CatalogTable) -> UpsertOutcome {
        match self
            .tables
            .iter_mut()
            .find(|entry| entry.matches(&table.database, &table.name))
        {
            Some(existing) => {
                table.created_at = existing.created_at;
                table.updated_at = Utc::now();
                *existing = table;
                UpsertOutcome::Updated
            }
            None => {
                self.tables.push(table);
                UpsertOutcome::Created
            }
        }
    }
}
