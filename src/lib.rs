//! rental-pricekit: pricing comparison and positioning analytics for
//! car-rental price surveys.
//!
//! The engine turns a flat table of scraped price observations into a
//! plan-over-plan comparison report, cheapest-vendor and reference-distance
//! positioning matrices, and cascading filter options. The presentation
//! layer is an external caller: it hands the engine a snapshot plus filter
//! selections and renders the tabular results it gets back. With the
//! `python` feature the same surface builds as a CPython extension module.

pub mod access;
pub mod comparison;
pub mod error;
pub mod filters;
pub mod format;
pub mod model;
pub mod positioning;
pub mod schema;

#[cfg(feature = "python")]
mod python;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::EngineError;
pub use filters::{ActiveFilters, ColumnState, FilterOutcome, FilterPanel};
pub use model::{LoadStatus, PositioningOutcome, PriceModel};
pub use positioning::{Axis, DistanceCell, Matrix, MatrixOutcome, PositioningReport};
