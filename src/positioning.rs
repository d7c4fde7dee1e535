//! Positioning matrix engine.
//!
//! From a filtered observation set, two dense matrices are derived per axis
//! pair: the cheapest vendor per group, and the signed percentage distance
//! between the group's best price and the reference vendor's best price.
//!
//! Pivoting is an explicit sparse→dense conversion over the sorted row and
//! column label sets; absent combinations render as `"-"`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::warn;

use crate::error::EngineError;
use crate::format::{date_from_days, percent1};
use crate::schema::{datefmt, obs, sentinel, vendor};

/// Grouping axis pair for the positioning matrices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Rows = pickup dates, columns = locations.
    ByLocation,
    /// Rows = categories, columns = pickup dates.
    ByCategory,
}

/// Distance-from-reference cell, per the positioning rule:
/// negative = the market leader undercuts the reference vendor, positive =
/// the reference vendor leads and the runner-up is this much dearer.
#[derive(Debug, Clone, PartialEq)]
pub enum DistanceCell {
    Pct(f64),
    /// Reference vendor is the only vendor in the group.
    Unique,
    /// Reference vendor has no observations in the group.
    Missing,
}

impl DistanceCell {
    pub fn render(&self) -> String {
        match self {
            DistanceCell::Pct(p) => percent1(*p),
            DistanceCell::Unique => sentinel::UNIQUE.to_string(),
            DistanceCell::Missing => sentinel::EMPTY_CELL.to_string(),
        }
    }

    pub fn is_reference_cheapest(&self) -> bool {
        match self {
            DistanceCell::Pct(p) => *p >= 0.0,
            DistanceCell::Unique => true,
            DistanceCell::Missing => false,
        }
    }
}

/// Dense 2-D table with labelled axes.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<C> {
    /// Display name of the row axis (corner header).
    pub corner: String,
    pub rows: Vec<String>,
    pub cols: Vec<String>,
    /// `cells[row][col]`.
    pub cells: Vec<Vec<C>>,
}

impl<C> Matrix<C> {
    pub fn cell(&self, row: usize, col: usize) -> Option<&C> {
        self.cells.get(row).and_then(|r| r.get(col))
    }
}

pub type VendorMatrix = Matrix<Option<String>>;
pub type DistanceMatrix = Matrix<DistanceCell>;

impl VendorMatrix {
    pub fn to_frame(&self) -> Result<DataFrame, EngineError> {
        frame_from(self, |cell| {
            cell.clone()
                .unwrap_or_else(|| sentinel::EMPTY_CELL.to_string())
        })
    }
}

impl DistanceMatrix {
    pub fn to_frame(&self) -> Result<DataFrame, EngineError> {
        frame_from(self, DistanceCell::render)
    }
}

fn frame_from<C>(
    matrix: &Matrix<C>,
    render: impl Fn(&C) -> String,
) -> Result<DataFrame, EngineError> {
    let mut columns = Vec::with_capacity(matrix.cols.len() + 1);
    columns.push(Column::new(
        matrix.corner.as_str().into(),
        matrix.rows.clone(),
    ));
    for (c, label) in matrix.cols.iter().enumerate() {
        let values: Vec<String> = matrix.cells.iter().map(|row| render(&row[c])).collect();
        columns.push(Column::new(label.as_str().into(), values));
    }
    Ok(DataFrame::new(columns)?)
}

/// One matrix either built or converted into a displayable error marker.
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixOutcome<C> {
    Ready(Matrix<C>),
    Failed(String),
}

/// The two positioning matrices; each fails independently.
#[derive(Debug, Clone, PartialEq)]
pub struct PositioningReport {
    pub cheapest: MatrixOutcome<Option<String>>,
    pub distance: MatrixOutcome<DistanceCell>,
}

impl PositioningReport {
    /// Rendering rule for the "reference is cheapest" highlight: the
    /// cheapest-vendor cell names the reference vendor, or the distance
    /// cell is numeric ≥ 0 or the unique sentinel.
    pub fn highlight(&self, row: usize, col: usize) -> bool {
        let by_vendor = matches!(
            &self.cheapest,
            MatrixOutcome::Ready(m)
                if matches!(m.cell(row, col), Some(Some(v)) if v == vendor::REFERENCE)
        );
        let by_distance = matches!(
            &self.distance,
            MatrixOutcome::Ready(m)
                if matches!(m.cell(row, col), Some(cell) if cell.is_reference_cheapest())
        );
        by_vendor || by_distance
    }
}

/// Build both positioning matrices for the given axis. A failure inside one
/// matrix becomes its `Failed` marker and never affects the sibling.
pub fn build_positioning_matrices(observations: &DataFrame, axis: Axis) -> PositioningReport {
    let cheapest = match build_cheapest_vendor(observations, axis) {
        Ok(matrix) => MatrixOutcome::Ready(matrix),
        Err(err) => {
            warn!(error = %err, "cheapest-vendor matrix failed");
            MatrixOutcome::Failed(err.to_string())
        }
    };
    let distance = match build_reference_distance(observations, axis) {
        Ok(matrix) => MatrixOutcome::Ready(matrix),
        Err(err) => {
            warn!(error = %err, "reference-distance matrix failed");
            MatrixOutcome::Failed(err.to_string())
        }
    };
    PositioningReport { cheapest, distance }
}

// ── Group collection ────────────────────────────────────────────────────────

/// Sortable axis key: dates order chronologically, not by rendered label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Key {
    Date(NaiveDate),
    Text(String),
}

impl Key {
    fn label(&self, date_format: &str) -> String {
        match self {
            Key::Date(d) => d.format(date_format).to_string(),
            Key::Text(t) => t.clone(),
        }
    }
}

impl Axis {
    fn corner(&self) -> &'static str {
        match self {
            Axis::ByLocation => obs::RETIRADA,
            Axis::ByCategory => obs::CATEGORIA,
        }
    }

    fn row_date_format(&self) -> &'static str {
        match self {
            Axis::ByLocation => datefmt::DAY_MONTH_YEAR,
            Axis::ByCategory => datefmt::ISO_DATE,
        }
    }

    fn col_date_format(&self) -> &'static str {
        match self {
            Axis::ByLocation => datefmt::ISO_DATE,
            Axis::ByCategory => datefmt::DAY_MONTH,
        }
    }
}

type Groups = BTreeMap<(Key, Key), Vec<(String, f64)>>;

fn collect_groups(observations: &DataFrame, axis: Axis) -> Result<Groups, EngineError> {
    let text_axis = match axis {
        Axis::ByLocation => obs::LOCALIDADE,
        Axis::ByCategory => obs::CATEGORIA,
    };
    for name in [obs::RETIRADA, text_axis, obs::LOCADORA, obs::PRECO] {
        if observations.column(name).is_err() {
            return Err(EngineError::MissingColumn(name.to_string()));
        }
    }

    let pickup = observations.column(obs::RETIRADA)?.as_materialized_series();
    let pickup = pickup.date()?;
    let text = observations.column(text_axis)?.as_materialized_series();
    let text = text.str()?;
    let vendors = observations.column(obs::LOCADORA)?.as_materialized_series();
    let vendors = vendors.str()?;
    let prices = observations.column(obs::PRECO)?.as_materialized_series();
    let prices = prices.f64()?;

    let mut groups: Groups = BTreeMap::new();
    for i in 0..observations.height() {
        let (Some(days), Some(t), Some(vend), Some(price)) =
            (pickup.phys.get(i), text.get(i), vendors.get(i), prices.get(i))
        else {
            continue;
        };
        let date = Key::Date(date_from_days(days));
        let text_key = Key::Text(t.to_string());
        let key = match axis {
            Axis::ByLocation => (date, text_key),
            Axis::ByCategory => (text_key, date),
        };
        groups.entry(key).or_default().push((vend.to_string(), price));
    }
    Ok(groups)
}

fn densify<C: Clone>(values: BTreeMap<(Key, Key), C>, fill: C, axis: Axis) -> Matrix<C> {
    let row_keys: BTreeSet<Key> = values.keys().map(|(r, _)| r.clone()).collect();
    let col_keys: BTreeSet<Key> = values.keys().map(|(_, c)| c.clone()).collect();

    let cells = row_keys
        .iter()
        .map(|r| {
            col_keys
                .iter()
                .map(|c| {
                    values
                        .get(&(r.clone(), c.clone()))
                        .cloned()
                        .unwrap_or_else(|| fill.clone())
                })
                .collect()
        })
        .collect();

    Matrix {
        corner: axis.corner().to_string(),
        rows: row_keys
            .iter()
            .map(|k| k.label(axis.row_date_format()))
            .collect(),
        cols: col_keys
            .iter()
            .map(|k| k.label(axis.col_date_format()))
            .collect(),
        cells,
    }
}

// ── Matrix 1: cheapest vendor ───────────────────────────────────────────────

fn build_cheapest_vendor(
    observations: &DataFrame,
    axis: Axis,
) -> Result<VendorMatrix, EngineError> {
    let groups = collect_groups(observations, axis)?;
    let values: BTreeMap<(Key, Key), Option<String>> = groups
        .into_iter()
        .map(|(key, offers)| (key, Some(cheapest_vendor(&offers))))
        .collect();
    Ok(densify(values, None, axis))
}

/// Lowest price wins; ties break on the lexically smallest vendor name.
fn cheapest_vendor(offers: &[(String, f64)]) -> String {
    let mut best = &offers[0];
    for offer in &offers[1..] {
        if offer.1 < best.1 || (offer.1 == best.1 && offer.0 < best.0) {
            best = offer;
        }
    }
    best.0.clone()
}

// ── Matrix 2: distance from the reference vendor ────────────────────────────

fn build_reference_distance(
    observations: &DataFrame,
    axis: Axis,
) -> Result<DistanceMatrix, EngineError> {
    let groups = collect_groups(observations, axis)?;
    let values: BTreeMap<(Key, Key), DistanceCell> = groups
        .into_iter()
        .map(|(key, offers)| (key, reference_distance(&offers)))
        .collect();
    Ok(densify(values, DistanceCell::Missing, axis))
}

fn reference_distance(offers: &[(String, f64)]) -> DistanceCell {
    let overall_min = offers.iter().map(|o| o.1).fold(f64::INFINITY, f64::min);
    let reference_min = offers
        .iter()
        .filter(|o| o.0 == vendor::REFERENCE)
        .map(|o| o.1)
        .fold(f64::INFINITY, f64::min);
    if reference_min.is_infinite() {
        return DistanceCell::Missing;
    }

    if reference_min == overall_min {
        let runner_up = offers
            .iter()
            .map(|o| o.1)
            .filter(|p| *p > overall_min)
            .fold(f64::INFINITY, f64::min);
        if runner_up.is_infinite() {
            DistanceCell::Unique
        } else {
            DistanceCell::Pct(runner_up / reference_min - 1.0)
        }
    } else {
        DistanceCell::Pct(overall_min / reference_min - 1.0)
    }
}
