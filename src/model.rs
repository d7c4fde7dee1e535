//! Snapshot loading, normalization, and engine orchestration.
//!
//! `PriceModel` owns the three read-only views derived from one snapshot:
//! the typed calculation view, the stringified display view (filter domain)
//! and the lowercase comparison view. Everything is rebuilt on `load`; after
//! that the model is immutable and every engine call borrows it.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::comparison::{self, ComparisonRow};
use crate::error::EngineError;
use crate::filters::{self, ActiveFilters, FilterOutcome, FilterPanel};
use crate::format::{date_from_days, datetime_from_micros, days_from_date, micros_from_any_unit};
use crate::positioning::{self, Axis, MatrixOutcome, PositioningReport};
use crate::schema::{category, datefmt, obs, sentinel};

/// Outcome of the most recent snapshot load.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    NotLoaded,
    Loaded { last_modified: String, rows: usize },
    FileMissing,
    Failed(String),
}

impl LoadStatus {
    /// Data-freshness indicator shown by the presentation layer.
    pub fn freshness_label(&self) -> &str {
        match self {
            LoadStatus::NotLoaded => sentinel::NOT_LOADED,
            LoadStatus::Loaded { last_modified, .. } => last_modified,
            LoadStatus::FileMissing => sentinel::FILE_MISSING,
            LoadStatus::Failed(_) => sentinel::LOAD_FAILED,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadStatus::Loaded { .. })
    }
}

/// Outcome of a positioning request, empty states kept distinct from load
/// failure so the caller can render "no data for this selection".
#[derive(Debug, Clone, PartialEq)]
pub enum PositioningOutcome {
    /// A filter column has an explicitly empty selection.
    EmptySelection(String),
    /// The selection (or the base table) matched nothing.
    NoRows,
    Report(PositioningReport),
}

pub struct PriceModel {
    observations: DataFrame,
    display: DataFrame,
    lower: DataFrame,
    comparison: Vec<ComparisonRow>,
    status: LoadStatus,
}

impl Default for PriceModel {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceModel {
    pub fn new() -> Self {
        Self {
            observations: DataFrame::empty(),
            display: DataFrame::empty(),
            lower: DataFrame::empty(),
            comparison: Vec::new(),
            status: LoadStatus::NotLoaded,
        }
    }

    // ── Loading ─────────────────────────────────────────────────────────────

    /// Load and normalize a Parquet snapshot. Never panics and never returns
    /// an error: failures leave an empty model with a sentinel status and
    /// every downstream call degrades to its empty variant.
    pub fn load(&mut self, path: impl AsRef<Path>) -> &LoadStatus {
        let path = path.as_ref();
        *self = Self::new();

        if !path.exists() {
            warn!(path = %path.display(), "snapshot file not found");
            self.status = LoadStatus::FileMissing;
            return &self.status;
        }

        let read = || -> Result<(DataFrame, String), EngineError> {
            let modified = std::fs::metadata(path)?.modified()?;
            let label = chrono::DateTime::<chrono::Local>::from(modified)
                .format(datefmt::FRESHNESS)
                .to_string();
            let file = std::fs::File::open(path)?;
            let raw = ParquetReader::new(file).finish()?;
            Ok((raw, label))
        };
        match read() {
            Ok((raw, label)) => {
                if let Err(err) = self.install(raw, label) {
                    warn!(error = %err, "snapshot normalization failed");
                    *self = Self::new();
                    self.status = LoadStatus::Failed(err.to_string());
                }
            }
            Err(err) => {
                warn!(error = %err, "snapshot read failed");
                self.status = LoadStatus::Failed(err.to_string());
            }
        }
        &self.status
    }

    /// Normalize a frame handed over directly by the caller instead of read
    /// from disk. Same degradation rules as [`PriceModel::load`].
    pub fn load_frame(&mut self, raw: DataFrame) -> &LoadStatus {
        *self = Self::new();
        let label = chrono::Local::now().format(datefmt::FRESHNESS).to_string();
        if let Err(err) = self.install(raw, label) {
            warn!(error = %err, "frame normalization failed");
            *self = Self::new();
            self.status = LoadStatus::Failed(err.to_string());
        }
        &self.status
    }

    fn install(&mut self, raw: DataFrame, label: String) -> Result<(), EngineError> {
        let observations = normalize(raw)?;
        let display = build_display(&observations)?;
        let lower = lowercase_view(&observations)?;
        let comparison = comparison::build_comparison_report(&lower)?;
        let rows = observations.height();
        info!(rows, comparison_rows = comparison.len(), "snapshot loaded");

        self.observations = observations;
        self.display = display;
        self.lower = lower;
        self.comparison = comparison;
        self.status = LoadStatus::Loaded {
            last_modified: label,
            rows,
        };
        Ok(())
    }

    // ── Views ───────────────────────────────────────────────────────────────

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    /// Typed calculation view (uppercase columns, pickup date as Date).
    pub fn observations(&self) -> &DataFrame {
        &self.observations
    }

    /// Display view: dates rendered to strings, survey timestamp under
    /// the `DATA` label. This is the filter resolver's domain.
    pub fn display(&self) -> &DataFrame {
        &self.display
    }

    // ── Comparison ──────────────────────────────────────────────────────────

    pub fn comparison_rows(&self) -> &[ComparisonRow] {
        &self.comparison
    }

    /// Formatted comparison report; empty table when there is nothing to
    /// compare.
    pub fn comparison_table(&self) -> DataFrame {
        match comparison::comparison_table(&self.comparison) {
            Ok(df) => df,
            Err(err) => {
                warn!(error = %err, "comparison table render failed");
                DataFrame::empty()
            }
        }
    }

    /// Most recent plan label, from the comparison report's first row.
    pub fn latest_plan(&self) -> Option<&str> {
        comparison::latest_plan(&self.comparison)
    }

    // ── Positioning ─────────────────────────────────────────────────────────

    /// Filter the calculation view and build both positioning matrices.
    pub fn positioning(&self, active: &ActiveFilters, axis: Axis) -> PositioningOutcome {
        if self.observations.height() == 0 {
            return PositioningOutcome::NoRows;
        }
        match filters::apply_filters(&self.observations, active) {
            Ok(FilterOutcome::Rows(filtered)) => {
                debug!(rows = filtered.height(), "positioning selection");
                PositioningOutcome::Report(positioning::build_positioning_matrices(
                    &filtered, axis,
                ))
            }
            Ok(FilterOutcome::EmptySelection(column)) => {
                PositioningOutcome::EmptySelection(column)
            }
            Ok(FilterOutcome::NoRows) => PositioningOutcome::NoRows,
            Err(err) => {
                warn!(error = %err, "positioning filter failed");
                PositioningOutcome::Report(PositioningReport {
                    cheapest: MatrixOutcome::Failed(err.to_string()),
                    distance: MatrixOutcome::Failed(err.to_string()),
                })
            }
        }
    }

    // ── Filters ─────────────────────────────────────────────────────────────

    /// Still-selectable values per display column under the given
    /// selections. Empty map when no data is loaded.
    pub fn filter_options(&self, active: &ActiveFilters) -> BTreeMap<String, Vec<String>> {
        if self.display.height() == 0 && self.display.width() == 0 {
            return BTreeMap::new();
        }
        match filters::resolve_filter_options(&self.display, active) {
            Ok(options) => options,
            Err(err) => {
                warn!(error = %err, "filter option resolution failed");
                BTreeMap::new()
            }
        }
    }

    /// Initial panel for the positioning views: unconstrained pools with the
    /// most recent plan pre-selected when one is known.
    pub fn default_positioning_panel(&self) -> FilterPanel {
        let options = self.filter_options(&ActiveFilters::new());
        match self.latest_plan() {
            Some(plan) => FilterPanel::with_default_plan(options, plan),
            None => FilterPanel::new(options),
        }
    }
}

// ── Normalization pipeline ──────────────────────────────────────────────────

fn normalize(raw: DataFrame) -> Result<DataFrame, EngineError> {
    let before = raw.height();
    let df = fold_columns(raw)?;
    require_columns(&df, &obs::SNAPSHOT_REQUIRED)?;
    let df = trim_string_columns(df)?;
    let df = rebuild_survey_timestamp(df)?;
    let df = parse_pickup_date(df)?;
    let df = coerce_price(df)?;
    let row_required: Vec<String> = obs::ROW_REQUIRED.iter().map(|c| c.to_string()).collect();
    let df = df.drop_nulls(Some(&row_required))?;
    let df = drop_invalid_categories(df)?;
    debug!(before, after = df.height(), "snapshot cleaned");
    Ok(df)
}

/// Uppercase and trim column names; on collision the first column wins.
fn fold_columns(raw: DataFrame) -> Result<DataFrame, EngineError> {
    let mut seen = std::collections::HashSet::new();
    let mut columns: Vec<Column> = Vec::with_capacity(raw.width());
    for column in raw.get_columns() {
        let name = column.name().trim().to_uppercase();
        if seen.insert(name.clone()) {
            let mut series = column.as_materialized_series().clone();
            series.rename(name.into());
            columns.push(series.into());
        }
    }
    Ok(DataFrame::new(columns)?)
}

fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), EngineError> {
    for &name in required {
        if df.column(name).is_err() {
            return Err(EngineError::MissingColumn(name.to_string()));
        }
    }
    Ok(())
}

fn trim_string_columns(df: DataFrame) -> Result<DataFrame, EngineError> {
    let exprs: Vec<Expr> = df
        .schema()
        .iter()
        .filter(|(_, dtype)| matches!(dtype, DataType::String))
        .map(|(name, _)| col(name.clone()).str().strip_chars(lit(" \t\r\n")))
        .collect();
    if exprs.is_empty() {
        return Ok(df);
    }
    Ok(df.lazy().with_columns(exprs).collect()?)
}

/// Rebuild the survey timestamp from the date part of `DATA` plus `HORA`.
/// The fields may be independently malformed; any failure yields a null that
/// the row-level cleanup drops.
fn rebuild_survey_timestamp(mut df: DataFrame) -> Result<DataFrame, EngineError> {
    let stamped = {
        let data = df.column(obs::DATA)?.as_materialized_series();
        let hora = df.column(obs::HORA)?.as_materialized_series();
        let mut stamps: Vec<Option<i64>> = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let date = date_part(&data.get(i)?);
            let time = time_part(&hora.get(i)?);
            stamps.push(
                date.zip(time)
                    .map(|(d, t)| NaiveDateTime::new(d, t).and_utc().timestamp_micros()),
            );
        }
        Series::new(obs::DATA.into(), stamps)
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
    };
    df.replace(obs::DATA, stamped)?;
    df.rename(obs::DATA, obs::DATA_HORA.into())?;
    Ok(df)
}

fn parse_pickup_date(mut df: DataFrame) -> Result<DataFrame, EngineError> {
    let parsed = {
        let pickup = df.column(obs::RETIRADA)?.as_materialized_series();
        match pickup.dtype() {
            DataType::Date => None,
            DataType::Datetime(_, _) => Some(pickup.cast(&DataType::Date)?),
            _ => {
                let mut days: Vec<Option<i32>> = Vec::with_capacity(pickup.len());
                for i in 0..pickup.len() {
                    days.push(date_part(&pickup.get(i)?).map(days_from_date));
                }
                Some(Series::new(obs::RETIRADA.into(), days).cast(&DataType::Date)?)
            }
        }
    };
    if let Some(series) = parsed {
        df.replace(obs::RETIRADA, series)?;
    }
    Ok(df)
}

fn coerce_price(mut df: DataFrame) -> Result<DataFrame, EngineError> {
    let coerced = {
        let price = df.column(obs::PRECO)?.as_materialized_series();
        if matches!(price.dtype(), DataType::Float64) {
            None
        } else {
            // Non-strict cast: unparseable values become nulls.
            Some(price.cast(&DataType::Float64)?)
        }
    };
    if let Some(series) = coerced {
        df.replace(obs::PRECO, series)?;
    }
    Ok(df)
}

fn drop_invalid_categories(df: DataFrame) -> Result<DataFrame, EngineError> {
    let invalid = Series::new("invalid".into(), category::INVALID.as_slice());
    let df = df
        .lazy()
        .filter(col(obs::CATEGORIA).is_in(lit(invalid), false).not())
        .collect()?;
    Ok(df)
}

fn date_part(value: &AnyValue) -> Option<NaiveDate> {
    match value {
        AnyValue::String(s) => parse_date_str(s),
        AnyValue::StringOwned(s) => parse_date_str(s.as_str()),
        AnyValue::Date(days) => Some(date_from_days(*days)),
        AnyValue::Datetime(us, unit, _) => {
            datetime_from_micros(micros_from_any_unit(*us, *unit)).map(|dt| dt.date())
        }
        AnyValue::DatetimeOwned(us, unit, _) => {
            datetime_from_micros(micros_from_any_unit(*us, *unit)).map(|dt| dt.date())
        }
        _ => None,
    }
}

fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
}

fn time_part(value: &AnyValue) -> Option<NaiveTime> {
    match value {
        AnyValue::String(s) => parse_time_str(s),
        AnyValue::StringOwned(s) => parse_time_str(s.as_str()),
        AnyValue::Time(ns) => NaiveTime::from_num_seconds_from_midnight_opt(
            (*ns / 1_000_000_000) as u32,
            (*ns % 1_000_000_000) as u32,
        ),
        _ => None,
    }
}

fn parse_time_str(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

// ── View construction ───────────────────────────────────────────────────────

/// Display view: temporal columns rendered to strings, survey timestamp
/// shown under the `DATA` label.
fn build_display(observations: &DataFrame) -> Result<DataFrame, EngineError> {
    let mut columns: Vec<Column> = Vec::with_capacity(observations.width());
    for column in observations.get_columns() {
        let series = column.as_materialized_series();
        let name = if series.name().as_str() == obs::DATA_HORA {
            obs::DATA
        } else {
            series.name().as_str()
        };
        let rendered = match series.dtype() {
            DataType::Datetime(_, _) => {
                temporal_strings(series, name, datefmt::ISO_DATETIME)?
            }
            DataType::Date => temporal_strings(series, name, datefmt::ISO_DATE)?,
            _ => {
                let mut s = series.clone();
                s.rename(name.into());
                s
            }
        };
        columns.push(rendered.into());
    }
    Ok(DataFrame::new(columns)?)
}

fn temporal_strings(series: &Series, name: &str, fmt: &str) -> Result<Series, EngineError> {
    let mut out: Vec<Option<String>> = Vec::with_capacity(series.len());
    for i in 0..series.len() {
        let rendered = match series.get(i)? {
            AnyValue::Null => None,
            AnyValue::Date(days) => Some(date_from_days(days).format(fmt).to_string()),
            AnyValue::Datetime(us, unit, _) => datetime_from_micros(micros_from_any_unit(us, unit))
                .map(|dt| dt.format(fmt).to_string()),
            AnyValue::DatetimeOwned(us, unit, _) => {
                datetime_from_micros(micros_from_any_unit(us, unit))
                    .map(|dt| dt.format(fmt).to_string())
            }
            _ => None,
        };
        out.push(rendered);
    }
    Ok(Series::new(name.into(), out))
}

fn lowercase_view(observations: &DataFrame) -> Result<DataFrame, EngineError> {
    let mut columns: Vec<Column> = Vec::with_capacity(observations.width());
    for column in observations.get_columns() {
        let mut series = column.as_materialized_series().clone();
        let lowered = series.name().to_lowercase();
        series.rename(lowered.into());
        columns.push(series.into());
    }
    Ok(DataFrame::new(columns)?)
}
