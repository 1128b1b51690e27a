use std::fs;

use bytes::Bytes;
use polars::prelude::*;
use ufo_bucket::{MemoryObjectStore, ObjectStore};
use ufo_core::catalog::{Catalog, CatalogError, TableFormat, UpsertOutcome};
use ufo_core::config::{JobConfig, DEFAULT_DATABASE, DEFAULT_SOURCE_TABLE, DEFAULT_TARGET_TABLE};
use ufo_core::job::{register_source, run_job};
use ufo_core::outputs::read_parquet_bytes;
use ufo_core::JobError;

const SOURCE_CSV: &str = "\
City,Colors Reported,Shape Reported,State,Time
Ithaca,RED,CIRCLE,CA,6/1/1998 22:00
Ithaca,RED,CIRCLE,CA,7/4/1998 9:15
Ithaca,BLUE,CIRCLE,CA,8/15/1998 23:30
Ithaca,BLUE,TRIANGLE,CA,12/31/1998 0:00
Willingboro,,DISK,NJ,6/30/1930 20:00
Holyoke,GREEN,LIGHT,NY,2/15/1931 14:00
";

#[tokio::test]
async fn job_reads_local_source_and_writes_parquet_with_catalog_entry() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("ufo_reports.csv");
    fs::write(&source_path, SOURCE_CSV).unwrap();
    let catalog_path = dir.path().join("catalog.json");
    let target_dir = dir.path().join("target");

    let outcome = register_source(
        &catalog_path,
        DEFAULT_DATABASE,
        DEFAULT_SOURCE_TABLE,
        source_path.to_str().unwrap(),
    )
    .unwrap();
    assert_eq!(outcome, UpsertOutcome::Created);

    let config = JobConfig {
        target_path: target_dir.to_str().unwrap().to_string(),
        ..JobConfig::default()
    };
    let store = MemoryObjectStore::default();

    let summary = run_job(&store, &catalog_path, "ufo-etl", &config)
        .await
        .expect("job run");

    assert_eq!(summary.catalog_outcome, UpsertOutcome::Created);
    assert_eq!(summary.run.source_rows, 6);
    assert_eq!(summary.run.output_rows, 2);
    assert_eq!(summary.run.job_name, "ufo-etl");

    let written = fs::read(target_dir.join("part-00000.snappy.parquet")).unwrap();
    let df = read_parquet_bytes(&written).unwrap();
    assert_eq!(df.height(), 2);
    let states: Vec<Option<&str>> = df
        .column("state")
        .unwrap()
        .as_materialized_series()
        .str()
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(states, vec![Some("CA"), Some("NY")]);

    let catalog = Catalog::load(&catalog_path).unwrap();
    let target = catalog
        .get(DEFAULT_DATABASE, DEFAULT_TARGET_TABLE)
        .expect("target table registered");
    assert_eq!(target.format, TableFormat::Parquet);
    assert_eq!(target.compression.as_deref(), Some("snappy"));
    assert_eq!(target.location, target_dir.display().to_string());
    assert_eq!(
        target
            .columns
            .iter()
            .map(|column| column.name.as_str())
            .collect::<Vec<_>>(),
        vec![
            "year",
            "state",
            "shape_reported",
            "shape_occurrence",
            "color_reported",
            "color_occurrence"
        ]
    );
    assert_eq!(target.last_run.as_ref(), Some(&summary.run));
    assert_eq!(catalog.tables_in(DEFAULT_DATABASE).count(), 2);
}

#[tokio::test]
async fn rerun_updates_catalog_entry_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("source.csv");
    fs::write(&source_path, SOURCE_CSV).unwrap();
    let catalog_path = dir.path().join("catalog.json");
    register_source(
        &catalog_path,
        DEFAULT_DATABASE,
        DEFAULT_SOURCE_TABLE,
        source_path.to_str().unwrap(),
    )
    .unwrap();

    let config = JobConfig {
        target_path: dir.path().join("out").to_str().unwrap().to_string(),
        ..JobConfig::default()
    };
    let store = MemoryObjectStore::default();

    let first = run_job(&store, &catalog_path, "ufo-etl", &config).await.unwrap();
    let created_at = Catalog::load(&catalog_path)
        .unwrap()
        .get(DEFAULT_DATABASE, DEFAULT_TARGET_TABLE)
        .unwrap()
        .created_at;

    let second = run_job(&store, &catalog_path, "ufo-etl", &config).await.unwrap();

    assert_eq!(first.catalog_outcome, UpsertOutcome::Created);
    assert_eq!(second.catalog_outcome, UpsertOutcome::Updated);
    assert_ne!(first.run.run_id, second.run.run_id);

    let catalog = Catalog::load(&catalog_path).unwrap();
    let target = catalog.get(DEFAULT_DATABASE, DEFAULT_TARGET_TABLE).unwrap();
    assert_eq!(target.created_at, created_at);
    assert_eq!(target.last_run.as_ref().unwrap().run_id, second.run.run_id);
    assert_eq!(catalog.tables.len(), 2);
}

#[tokio::test]
async fn job_reads_and_writes_object_store_locations() {
    let dir = tempfile::tempdir().unwrap();
    let catalog_path = dir.path().join("catalog.json");
    let store = MemoryObjectStore::default();
    store.create_bucket("raw", "eu-central-1").await.unwrap();
    store.create_bucket("curated", "eu-central-1").await.unwrap();
    store
        .put_object("raw", "ufo/source.csv", Bytes::from_static(SOURCE_CSV.as_bytes()), "text/csv")
        .await
        .unwrap();

    register_source(
        &catalog_path,
        DEFAULT_DATABASE,
        DEFAULT_SOURCE_TABLE,
        "s3://raw/ufo/source.csv",
    )
    .unwrap();

    let config = JobConfig {
        target_path: "s3://curated/ufo_reports_target_parquet".to_string(),
        ..JobConfig::default()
    };

    let summary = run_job(&store, &catalog_path, "ufo-etl", &config).await.unwrap();
    assert_eq!(
        summary.output_object.to_string(),
        "s3://curated/ufo_reports_target_parquet/part-00000.snappy.parquet"
    );

    let stored = store
        .object("curated", "ufo_reports_target_parquet/part-00000.snappy.parquet")
        .expect("parquet object stored");
    let df = read_parquet_bytes(&stored.body).unwrap();
    assert_eq!(df.height(), 2);
}

#[tokio::test]
async fn missing_source_table_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let catalog_path = dir.path().join("catalog.json");
    let store = MemoryObjectStore::default();

    let err = run_job(&store, &catalog_path, "ufo-etl", &JobConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        JobError::Catalog(CatalogError::TableNotFound { ref table, .. }) if table == DEFAULT_SOURCE_TABLE
    ));
    assert!(!catalog_path.exists());
}

#[test]
fn catalog_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let catalog_path = dir.path().join("nested").join("catalog.json");

    assert!(Catalog::load(&catalog_path).unwrap().tables.is_empty());

    register_source(&catalog_path, "db", "t", "/data/t.csv").unwrap();
    let again = register_source(&catalog_path, "db", "t", "/data/t2.csv").unwrap();
    assert_eq!(again, UpsertOutcome::Updated);

    let catalog = Catalog::load(&catalog_path).unwrap();
    assert_eq!(catalog.tables.len(), 1);
    assert_eq!(catalog.require("db", "t").unwrap().location, "/data/t2.csv");
    assert!(catalog.require("db", "other").is_err());

    fs::write(&catalog_path, "{ not json").unwrap();
    assert!(matches!(
        Catalog::load(&catalog_path),
        Err(CatalogError::Json { .. })
    ));
}

#[test]
fn register_source_rejects_invalid_locations() {
    let dir = tempfile::tempdir().unwrap();
    let catalog_path = dir.path().join("catalog.json");

    let err = register_source(&catalog_path, "db", "t", "s3:///no-bucket").unwrap_err();
    assert!(matches!(err, JobError::Location(_)));
    assert!(!catalog_path.exists());
}

#[test]
fn parquet_output_uses_expected_types() {
    let df = ufo_core::transform::run_pipeline(
        ufo_core::outputs::read_csv_bytes(SOURCE_CSV.as_bytes()).unwrap(),
    )
    .unwrap();
    assert_eq!(df.column("year").unwrap().dtype(), &DataType::Int32);
    assert_eq!(df.column("state").unwrap().dtype(), &DataType::String);
}

#[test]
fn concurrent_catalog_saves_do_not_clobber_each_other() {
    let dir = tempfile::tempdir().unwrap();
    let catalog_path = dir.path().join("catalog.json");

    std::thread::scope(|scope| {
        for worker in 0..8 {
            let catalog_path = &catalog_path;
            scope.spawn(move || {
                for round in 0..20 {
                    let mut catalog = Catalog::default();
                    catalog.upsert(ufo_core::catalog::CatalogTable::new(
                        "db",
                        format!("t{worker}"),
                        format!("/data/{round}.csv"),
                        TableFormat::Csv,
                    ));
                    catalog.save(catalog_path).unwrap();
                }
            });
        }
    });

    let catalog = Catalog::load(&catalog_path).unwrap();
    assert_eq!(catalog.tables.len(), 1);
    assert_eq!(catalog.tables[0].location, "/data/19.csv");

    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .filter(|name| name != "catalog.json")
        .collect();
    assert!(leftovers.is_empty(), "stray scratch files: {leftovers:?}");
}
