//! Reshape-and-aggregate pipeline for UFO sighting reports.
//!
//! Every stage is a plain function from frame to frame so it can be exercised on its own;
//! [`run_pipeline`] applies them in order.

use chrono::{Datelike, NaiveDateTime};
use polars::prelude::*;
use thiserror::Error;
use tracing::debug;

pub const SHAPE_REPORTED: &str = "shape_reported";
pub const COLOR_REPORTED: &str = "color_reported";
pub const STATE: &str = "state";
pub const TIME: &str = "time";
pub const CITY: &str = "city";
pub const YEAR: &str = "year";
pub const SHAPE_OCCURRENCE: &str = "shape_occurrence";
pub const COLOR_OCCURRENCE: &str = "color_occurrence";

/// Source header -> output name.
pub const SOURCE_RENAMES: [(&str, &str); 4] = [
    ("Shape Reported", SHAPE_REPORTED),
    ("Colors Reported", COLOR_REPORTED),
    ("State", STATE),
    ("Time", TIME),
];

/// `M/d/yyyy H:mm`; chrono accepts unpadded month, day and hour.
pub const TIME_FORMAT: &str = "%m/%d/%Y %H:%M";

pub const OUTPUT_COLUMNS: [&str; 6] = [
    YEAR,
    STATE,
    SHAPE_REPORTED,
    SHAPE_OCCURRENCE,
    COLOR_REPORTED,
    COLOR_OCCURRENCE,
];

const DROPPED_COLUMNS: [&str; 2] = [TIME, CITY];

type Stage = fn(DataFrame) -> PolarsResult<DataFrame>;

const PREPARE_STAGES: [(&str, Stage); 4] = [
    ("rename_columns", rename_columns),
    ("derive_year", derive_year),
    ("drop_columns", drop_columns),
    ("filter_reported", filter_reported),
];

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("source is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

/// Runs the full pipeline on a raw source frame and returns one row per (year, state).
pub fn run_pipeline(source: DataFrame) -> Result<DataFrame, TransformError> {
    validate_source(&source)?;

    let mut prepared = source;
    for (name, stage) in PREPARE_STAGES {
        prepared = stage(prepared)?;
        debug!(stage = name, rows = prepared.height(), "pipeline stage complete");
    }

    let shapes = top_per_partition(
        count_by(&prepared, SHAPE_REPORTED, SHAPE_OCCURRENCE)?,
        SHAPE_REPORTED,
        SHAPE_OCCURRENCE,
    )?;
    let colors = top_per_partition(
        count_by(&prepared, COLOR_REPORTED, COLOR_OCCURRENCE)?,
        COLOR_REPORTED,
        COLOR_OCCURRENCE,
    )?;

    let joined = join_top(shapes, colors)?;
    let output = sort_output(project(joined)?)?;
    debug!(rows = output.height(), "pipeline produced aggregate records");
    Ok(output)
}

pub fn validate_source(df: &DataFrame) -> Result<(), TransformError> {
    let missing: Vec<String> = SOURCE_RENAMES
        .iter()
        .map(|(source, _)| *source)
        .filter(|name| df.get_column_index(name).is_none())
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(TransformError::MissingColumns(missing))
    }
}

/// Renames the four source headers; absent columns are left alone.
pub fn rename_columns(mut df: DataFrame) -> PolarsResult<DataFrame> {
    for (source, target) in SOURCE_RENAMES {
        if df.get_column_index(source).is_some() {
            df.rename(source, target.into())?;
        }
    }
    Ok(df)
}

/// Adds `year` parsed from `time`. Values that do not match [`TIME_FORMAT`] yield null.
pub fn derive_year(mut df: DataFrame) -> PolarsResult<DataFrame> {
    let time = df.column(TIME)?.cast(&DataType::String)?;
    let years: Vec<Option<i32>> = time
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|value| value.and_then(parse_year))
        .collect();

    df.with_column(Series::new(YEAR.into(), years))?;
    Ok(df)
}

pub fn parse_year(value: &str) -> Option<i32> {
    NaiveDateTime::parse_from_str(value.trim(), TIME_FORMAT)
        .ok()
        .map(|timestamp| timestamp.year())
}

/// Drops `time` and `city`, matching names case-insensitively.
pub fn drop_columns(mut df: DataFrame) -> PolarsResult<DataFrame> {
    let doomed: Vec<String> = df
        .get_column_names()
        .into_iter()
        .filter(|name| DROPPED_COLUMNS.contains(&name.to_ascii_lowercase().as_str()))
        .map(|name| name.to_string())
        .collect();

    for name in doomed {
        df.drop_in_place(&name)?;
    }
    Ok(df)
}

pub fn filter_reported(df: DataFrame) -> PolarsResult<DataFrame> {
    df.lazy()
        .filter(
            col(SHAPE_REPORTED)
                .is_not_null()
                .and(col(COLOR_REPORTED).is_not_null()),
        )
        .collect()
}

/// Counts rows per (year, state, `value_column`) into `count_column`.
pub fn count_by(df: &DataFrame, value_column: &str, count_column: &str) -> PolarsResult<DataFrame> {
    df.clone()
        .lazy()
        .group_by([col(YEAR), col(STATE), col(value_column)])
        .agg([len().alias(count_column)])
        .collect()
}

/// Keeps the rank-1 row of each (year, state) partition: highest count first, ties broken by
/// the lexicographically smallest value.
pub fn top_per_partition(
    grouped: DataFrame,
    value_column: &str,
    count_column: &str,
) -> PolarsResult<DataFrame> {
    grouped
        .lazy()
        .sort(
            [count_column, value_column],
            SortMultipleOptions::default()
                .with_order_descending_multi([true, false])
                .with_nulls_last(true)
                .with_maintain_order(true),
        )
        .group_by_stable([col(YEAR), col(STATE)])
        .agg([col(value_column).first(), col(count_column).first()])
        .collect()
}

/// Inner join on (year, state). Null keys never match.
pub fn join_top(shapes: DataFrame, colors: DataFrame) -> PolarsResult<DataFrame> {
    shapes
        .lazy()
        .join(
            colors.lazy(),
            [col(YEAR), col(STATE)],
            [col(YEAR), col(STATE)],
            JoinArgs::new(JoinType::Inner),
        )
        .collect()
}

pub fn project(df: DataFrame) -> PolarsResult<DataFrame> {
    df.select(OUTPUT_COLUMNS)
}

pub fn sort_output(df: DataFrame) -> PolarsResult<DataFrame> {
    df.lazy()
        .sort(
            [SHAPE_OCCURRENCE, YEAR, STATE],
            SortMultipleOptions::default()
                .with_order_descending_multi([true, false, false])
                .with_nulls_last(true)
                .with_maintain_order(true),
        )
        .collect()
}
