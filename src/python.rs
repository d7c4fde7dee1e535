//! PyO3 bindings: the dashboard-facing mirror of the engine.
//!
//! Soft empty states (`EmptySelection`, `NoRows`) come back as `None` so the
//! dashboard can render its "no data for this selection" message; a failed
//! matrix raises, carrying the diagnostic message.

use std::collections::HashMap;

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyModule;
use pyo3_polars::PyDataFrame;

use crate::filters::ActiveFilters;
use crate::model::{LoadStatus, PositioningOutcome, PriceModel};
use crate::positioning::{Axis, MatrixOutcome, PositioningReport};
use crate::schema;

#[pyclass(name = "PriceModel")]
pub struct PyPriceModel {
    inner: PriceModel,
}

#[pymethods]
impl PyPriceModel {
    #[new]
    fn new() -> Self {
        Self {
            inner: PriceModel::new(),
        }
    }

    /// Load a Parquet snapshot; returns the data-freshness label.
    fn load(&mut self, path: String) -> String {
        self.inner.load(path).freshness_label().to_string()
    }

    /// Normalize a dataframe handed over by the caller.
    fn load_frame(&mut self, frame: PyDataFrame) -> String {
        self.inner.load_frame(frame.0).freshness_label().to_string()
    }

    #[getter]
    fn last_update(&self) -> String {
        self.inner.status().freshness_label().to_string()
    }

    #[getter]
    fn row_count(&self) -> usize {
        match self.inner.status() {
            LoadStatus::Loaded { rows, .. } => *rows,
            _ => 0,
        }
    }

    fn observations(&self) -> PyDataFrame {
        PyDataFrame(self.inner.observations().clone())
    }

    fn display_table(&self) -> PyDataFrame {
        PyDataFrame(self.inner.display().clone())
    }

    fn comparison_table(&self) -> PyDataFrame {
        PyDataFrame(self.inner.comparison_table())
    }

    fn latest_plan(&self) -> Option<String> {
        self.inner.latest_plan().map(|plan| plan.to_string())
    }

    /// Cheapest-vendor matrix, or `None` for an empty selection.
    /// `axis` is `"location"` or `"category"`.
    fn cheapest_matrix(
        &self,
        filters: HashMap<String, Vec<String>>,
        axis: &str,
    ) -> PyResult<Option<PyDataFrame>> {
        match self.report(filters, axis)? {
            Some(report) => match report.cheapest {
                MatrixOutcome::Ready(matrix) => Ok(Some(PyDataFrame(matrix.to_frame()?))),
                MatrixOutcome::Failed(message) => Err(PyRuntimeError::new_err(message)),
            },
            None => Ok(None),
        }
    }

    /// Reference-distance matrix, or `None` for an empty selection.
    fn distance_matrix(
        &self,
        filters: HashMap<String, Vec<String>>,
        axis: &str,
    ) -> PyResult<Option<PyDataFrame>> {
        match self.report(filters, axis)? {
            Some(report) => match report.distance {
                MatrixOutcome::Ready(matrix) => Ok(Some(PyDataFrame(matrix.to_frame()?))),
                MatrixOutcome::Failed(message) => Err(PyRuntimeError::new_err(message)),
            },
            None => Ok(None),
        }
    }

    /// Still-selectable values per display column.
    fn filter_options(
        &self,
        filters: HashMap<String, Vec<String>>,
    ) -> HashMap<String, Vec<String>> {
        self.inner
            .filter_options(&to_active(filters))
            .into_iter()
            .collect()
    }
}

impl PyPriceModel {
    fn report(
        &self,
        filters: HashMap<String, Vec<String>>,
        axis: &str,
    ) -> PyResult<Option<PositioningReport>> {
        let axis = parse_axis(axis)?;
        match self.inner.positioning(&to_active(filters), axis) {
            PositioningOutcome::Report(report) => Ok(Some(report)),
            PositioningOutcome::EmptySelection(_) | PositioningOutcome::NoRows => Ok(None),
        }
    }
}

fn to_active(filters: HashMap<String, Vec<String>>) -> ActiveFilters {
    filters.into_iter().collect()
}

fn parse_axis(axis: &str) -> PyResult<Axis> {
    match axis {
        "location" => Ok(Axis::ByLocation),
        "category" => Ok(Axis::ByCategory),
        other => Err(PyValueError::new_err(format!(
            "Invalid axis: '{other}'. Must be 'location' or 'category'"
        ))),
    }
}

/// Export schema constants as Python submodules.
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Observation columns
    let obs = PyModule::new(m.py(), "obs")?;
    obs.add("LOCALIDADE", schema::obs::LOCALIDADE)?;
    obs.add("RETIRADA", schema::obs::RETIRADA)?;
    obs.add("DATA", schema::obs::DATA)?;
    obs.add("HORA", schema::obs::HORA)?;
    obs.add("DATA_HORA", schema::obs::DATA_HORA)?;
    obs.add("DURACAO", schema::obs::DURACAO)?;
    obs.add("CATEGORIA", schema::obs::CATEGORIA)?;
    obs.add("LOCADORA", schema::obs::LOCADORA)?;
    obs.add("PLANO", schema::obs::PLANO)?;
    obs.add("PRECO", schema::obs::PRECO)?;
    m.add_submodule(&obs)?;

    // Report labels
    let report = PyModule::new(m.py(), "report")?;
    report.add("PRECO_ANTERIOR", schema::report::PRECO_ANTERIOR)?;
    report.add("PRECO_ATUAL", schema::report::PRECO_ATUAL)?;
    report.add("VARIACAO", schema::report::VARIACAO)?;
    report.add("LOCADORA_ANTERIOR", schema::report::LOCADORA_ANTERIOR)?;
    report.add("LOCADORA_ATUAL", schema::report::LOCADORA_ATUAL)?;
    report.add("PLANO_ANTERIOR", schema::report::PLANO_ANTERIOR)?;
    report.add("PLANO_ATUAL", schema::report::PLANO_ATUAL)?;
    m.add_submodule(&report)?;

    // Vendors
    let vendor = PyModule::new(m.py(), "vendor")?;
    vendor.add("REFERENCE", schema::vendor::REFERENCE)?;
    m.add_submodule(&vendor)?;

    // Sentinels
    let sentinel = PyModule::new(m.py(), "sentinel")?;
    sentinel.add("UNIQUE", schema::sentinel::UNIQUE)?;
    sentinel.add("EMPTY_CELL", schema::sentinel::EMPTY_CELL)?;
    sentinel.add("FILE_MISSING", schema::sentinel::FILE_MISSING)?;
    sentinel.add("LOAD_FAILED", schema::sentinel::LOAD_FAILED)?;
    sentinel.add("UNKNOWN_LOCATION", schema::sentinel::UNKNOWN_LOCATION)?;
    m.add_submodule(&sentinel)?;

    Ok(())
}

#[pymodule]
fn rental_pricekit(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyPriceModel>()?;
    add_schema_exports(m)?;
    Ok(())
}
