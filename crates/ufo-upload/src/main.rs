use std::ffi::OsString;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ufo_bucket::{MemoryObjectStore, ObjectStore, S3Config, S3ObjectStore};
use ufo_core::fetch::HttpFetcher;
use ufo_core::publish::{fetch_and_publish, PublishOutcome, PublishRequest};

/// Two-letter short flags accepted for compatibility, mapped to their long names.
const SHORT_FLAG_ALIASES: [(&str, &str); 3] = [
    ("-bn", "--bucket_name"),
    ("-ok", "--object_key"),
    ("-du", "--data_url"),
];

#[derive(Parser, Debug)]
#[command(author, version, about = "Upload CSV data to Amazon S3", long_about = None)]
struct Cli {
    /// Name of the S3 bucket
    #[arg(long = "bucket_name")]
    bucket_name: String,
    /// Name for the S3 object
    #[arg(long = "object_key")]
    object_key: String,
    /// URL of the remote CSV file
    #[arg(long = "data_url")]
    data_url: String,
    /// Region the bucket is created in (defaults to UFO_S3_REGION, then eu-central-1)
    #[arg(long)]
    region: Option<String>,
    /// Publish into an in-process store instead of S3
    #[arg(long)]
    dry_run: bool,
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

    let cli = Cli::parse_from(normalize_short_flags(std::env::args_os()));

    let config = s3_config(&cli, S3Config::from_env());
    let region = config.region.clone();

    let store: Arc<dyn ObjectStore> = if cli.dry_run {
        warn!("dry run: publishing into an in-process object store");
        Arc::new(MemoryObjectStore::default())
    } else {
        Arc::new(
            S3ObjectStore::new(config)
                .await
                .context("failed to configure S3 client")?,
        )
    };

    let request = PublishRequest {
        url: cli.data_url,
        bucket: cli.bucket_name,
        key: cli.object_key,
        region,
    };

    let report = fetch_and_publish(&HttpFetcher::default(), store.as_ref(), &request)
        .await
        .with_context(|| format!("failed to fetch {}", request.url))?;

    if !report.bucket.is_ready() {
        warn!(bucket = %request.bucket, outcome = ?report.bucket, "continuing despite bucket problem");
    }

    match report.object {
        PublishOutcome::Stored { bytes } => {
            info!(bucket = %request.bucket, key = %request.key, bytes, "publish complete");
            Ok(())
        }
        PublishOutcome::ClientError(err) | PublishOutcome::Unexpected(err) => {
            bail!(
                "failed to publish s3://{}/{}: {err}",
                request.bucket,
                request.key
            )
        }
    }
}

/// The bucket is created in the client's own region, so `--region` overrides both.
fn s3_config(cli: &Cli, mut config: S3Config) -> S3Config {
    if let Some(region) = &cli.region {
        config.region = region.clone();
    }
    config
}

/// Rewrites `-bn value` / `-bn=value` style arguments into their long form so clap can parse
/// them; clap only supports single-character short flags.
fn normalize_short_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let Some(text) = arg.to_str() else {
                return arg;
            };
            for (short, long) in SHORT_FLAG_ALIASES {
                if text == short {
                    return OsString::from(long);
                }
                if let Some(value) = text
                    .strip_prefix(short)
                    .and_then(|rest| rest.strip_prefix('='))
                {
                    return OsString::from(format!("{long}={value}"));
                }
            }
            arg
        })
        .collect()
}
