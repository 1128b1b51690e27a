//! Transform-and-catalog job: cataloged CSV in, aggregated Parquet plus catalog entry out.

use std::path::Path;

use bytes::Bytes;
use chrono::Utc;
use tracing::info;
use ufo_bucket::ObjectStore;
use uuid::Uuid;

use crate::catalog::{Catalog, CatalogTable, JobRun, TableFormat, UpsertOutcome};
use crate::config::JobConfig;
use crate::error::{JobError, Result};
use crate::location::StorageLocation;
use crate::outputs::{self, PARQUET_CONTENT_TYPE};
use crate::transform;

/// What a finished run wrote and how the catalog changed.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub run: JobRun,
    pub output_object: StorageLocation,
    pub catalog_outcome: UpsertOutcome,
}

/// Registers (or re-points) a CSV source table so a job can read it.
pub fn register_source(
    catalog_path: &Path,
    database: &str,
    table: &str,
    location: &str,
) -> Result<UpsertOutcome> {
    // Reject unparsable locations before they reach the catalog.
    location.parse::<StorageLocation>()?;

    let mut catalog = Catalog::load(catalog_path)?;
    let outcome = catalog.upsert(CatalogTable::new(database, table, location, TableFormat::Csv));
    catalog.save(catalog_path)?;
    info!(database, table, location, ?outcome, "registered source table");
    Ok(outcome)
}

pub async fn run_job(
    store: &dyn ObjectStore,
    catalog_path: &Path,
    job_name: &str,
    config: &JobConfig,
) -> Result<JobSummary> {
    let started_at = Utc::now();
    let run_id = Uuid::new_v4();
    info!(job_name, %run_id, "starting job");

    let mut catalog = Catalog::load(catalog_path)?;
    let source = catalog.require(&config.source_database, &config.source_table)?;
    if source.format != TableFormat::Csv {
        return Err(JobError::UnexpectedFormat {
            table: format!("{}.{}", source.database, source.name),
            format: source.format.as_str().to_string(),
            expected: TableFormat::Csv.as_str().to_string(),
        });
    }

    let source_location: StorageLocation = source.location.parse()?;
    let raw = source_location.read(store).await?;
    let source_df = outputs::read_csv_bytes(&raw)?;
    let source_rows = source_df.height();
    info!(location = %source_location, rows = source_rows, "loaded source table");

    let result = transform::run_pipeline(source_df)?;
    let output_rows = result.height();

    let parquet = outputs::create_parquet_bytes(&result, config.compression)?;
    let target_dir: StorageLocation = config.target_path.parse()?;
    let output_object = target_dir.join(&config.compression.part_file_name());
    output_object
        .write(store, Bytes::from(parquet), PARQUET_CONTENT_TYPE)
        .await?;
    info!(location = %output_object, rows = output_rows, "wrote output");

    let run = JobRun {
        run_id,
        job_name: job_name.to_string(),
        started_at,
        finished_at: Utc::now(),
        source_rows,
        output_rows,
    };

    let mut target = CatalogTable::new(
        &config.target_database,
        &config.target_table,
        target_dir.to_string(),
        TableFormat::Parquet,
    )
    .with_schema_of(&result);
    target.compression = Some(config.compression.as_str().to_string());
    target
        .parameters
        .insert("classification".to_string(), TableFormat::Parquet.as_str().to_string());
    target.last_run = Some(run.clone());

    let catalog_outcome = catalog.upsert(target);
    catalog.save(catalog_path)?;
    info!(
        database = %config.target_database,
        table = %config.target_table,
        ?catalog_outcome,
        "job committed"
    );

    Ok(JobSummary {
        run,
        output_object,
        catalog_outcome,
    })
}
