use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ufo_bucket::{MemoryObjectStore, ObjectStore, S3Config, S3ObjectStore};
use ufo_core::catalog::Catalog;
use ufo_core::config::{JobConfig, DEFAULT_DATABASE};
use ufo_core::job;

const DEFAULT_CATALOG_PATH: &str = "catalog.json";

#[derive(Parser, Debug)]
#[command(author, version, about = "UFO report ETL: cataloged CSV to aggregated Parquet", long_about = None)]
struct Cli {
    /// Catalog file (defaults to UFO_CATALOG_PATH, then ./catalog.json)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the transform job and update the target catalog table
    Run(RunArgs),
    /// Inspect or edit catalog entries
    #[command(subcommand)]
    Catalog(CatalogCommand),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Job name recorded on the run
    #[arg(long)]
    job_name: String,
    /// TOML file overriding source/target settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// Read and write S3 locations through an in-process store
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Register a CSV source table
    Register(RegisterArgs),
    /// List registered tables
    Show(ShowArgs),
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long, default_value = DEFAULT_DATABASE)]
    database: String,
    #[arg(long)]
    table: String,
    /// Local path or s3://bucket/key
    #[arg(long)]
    location: String,
}

#[derive(Args, Debug)]
struct ShowArgs {
    #[arg(long)]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let catalog_path = cli
        .catalog
        .or_else(|| std::env::var_os("UFO_CATALOG_PATH").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_PATH));

    match cli.command {
        Command::Run(args) => handle_run(&catalog_path, args).await,
        Command::Catalog(CatalogCommand::Register(args)) => handle_register(&catalog_path, args),
        Command::Catalog(CatalogCommand::Show(args)) => handle_show(&catalog_path, args),
    }
}

async fn handle_run(catalog_path: &Path, args: RunArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => JobConfig::load(path)?,
        None => JobConfig::default(),
    };

    let store: Arc<dyn ObjectStore> = if args.dry_run {
        warn!("dry run: S3 locations resolve against an empty in-process store");
        Arc::new(MemoryObjectStore::default())
    } else {
        Arc::new(
            S3ObjectStore::new(S3Config::from_env())
                .await
                .context("failed to configure S3 client")?,
        )
    };

    let summary = job::run_job(store.as_ref(), catalog_path, &args.job_name, &config)
        .await
        .with_context(|| format!("job {} failed", args.job_name))?;

    info!(
        run_id = %summary.run.run_id,
        output = %summary.output_object,
        rows = summary.run.output_rows,
        "job finished"
    );
    println!(
        "Wrote {} rows to {} ({:?} {}.{})",
        summary.run.output_rows,
        summary.output_object,
        summary.catalog_outcome,
        config.target_database,
        config.target_table
    );
    Ok(())
}

fn handle_register(catalog_path: &Path, args: RegisterArgs) -> Result<()> {
    let outcome = job::register_source(catalog_path, &args.database, &args.table, &args.location)
        .with_context(|| format!("failed to register {}.{}", args.database, args.table))?;
    println!("{outcome:?} {}.{} -> {}", args.database, args.table, args.location);
    Ok(())
}

fn handle_show(catalog_path: &Path, args: ShowArgs) -> Result<()> {
    let catalog = Catalog::load(catalog_path)?;
    let tables: Vec<_> = match &args.database {
        Some(database) => catalog.tables_in(database).collect(),
        None => catalog.tables.iter().collect(),
    };

    if tables.is_empty() {
        println!("No tables registered in {}.", catalog_path.display());
        return Ok(());
    }

    for table in tables {
        println!(
            "{}.{}  [{}]  {}",
            table.database,
            table.name,
            table.format.as_str(),
            table.location
        );
        for column in &table.columns {
            println!("    {}: {}", column.name, column.data_type);
        }
        if let Some(run) = &table.last_run {
            println!(
                "    last run {} by {} at {} ({} -> {} rows)",
                run.run_id, run.job_name, run.finished_at, run.source_rows, run.output_rows
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn register_defaults_database() {
        let cli = Cli::try_parse_from([
            "etl-job",
            "catalog",
            "register",
            "--table",
            "ufo_reports_source_csv",
            "--location",
            "s3://raw/ufo.csv",
        ])
        .unwrap();

        match cli.command {
            Command::Catalog(CatalogCommand::Register(args)) => {
                assert_eq!(args.database, DEFAULT_DATABASE);
                assert_eq!(args.location, "s3://raw/ufo.csv");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
