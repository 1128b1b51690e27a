use std::io::Cursor;

use polars::io::parquet::write::{ParquetCompression, ParquetWriter, StatisticsOptions};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

pub const PARQUET_CONTENT_TYPE: &str = "application/vnd.apache.parquet";

/// Compression codec for written Parquet files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputCompression {
    #[default]
    Snappy,
    Zstd,
    Gzip,
    Uncompressed,
}

impl OutputCompression {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputCompression::Snappy => "snappy",
            OutputCompression::Zstd => "zstd",
            OutputCompression::Gzip => "gzip",
            OutputCompression::Uncompressed => "uncompressed",
        }
    }

    /// File name of the single part written per job run.
    pub fn part_file_name(&self) -> String {
        match self {
            OutputCompression::Uncompressed => "part-00000.parquet".to_string(),
            other => format!("part-00000.{}.parquet", other.as_str()),
        }
    }

    fn parquet(&self) -> ParquetCompression {
        match self {
            OutputCompression::Snappy => ParquetCompression::Snappy,
            OutputCompression::Zstd => ParquetCompression::Zstd(None),
            OutputCompression::Gzip => ParquetCompression::Gzip(None),
            OutputCompression::Uncompressed => ParquetCompression::Uncompressed,
        }
    }
}

/// Reads a headed CSV document. Empty fields become null.
pub fn read_csv_bytes(content: &[u8]) -> PolarsResult<DataFrame> {
    let cursor = Cursor::new(content);
    CsvReadOptions::default()
        .with_has_header(true)
        .into_reader_with_file_handle(cursor)
        .finish()
}

pub fn create_parquet_bytes(df: &DataFrame, compression: OutputCompression) -> PolarsResult<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut cursor = Cursor::new(&mut buffer);
        let mut clone = df.clone();
        ParquetWriter::new(&mut cursor)
            .with_compression(compression.parquet())
            .with_statistics(StatisticsOptions::default())
            .finish(&mut clone)?;
    }
    Ok(buffer)
}

pub fn read_parquet_bytes(content: &[u8]) -> PolarsResult<DataFrame> {
    ParquetReader::new(Cursor::new(content)).finish()
}
