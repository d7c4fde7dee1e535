//! Cascading filter-option resolution and per-column selection state.
//!
//! The resolver answers, for every column of the display view, "which values
//! can still be picked without contradicting the *other* active filters".
//! The column being resolved is excluded from its own constraint, which is
//! what keeps a user's current selection visible in its own option list.
//!
//! All functions are pure over (frame, filter map); nothing here touches
//! shared state.

use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::*;

use crate::error::EngineError;
use crate::format::any_to_display;
use crate::schema::obs;

/// Column name → selected values. Values compare as strings, the same
/// stringification the display view uses.
pub type ActiveFilters = BTreeMap<String, Vec<String>>;

/// Result of applying a filter map to a frame.
#[derive(Debug, Clone)]
pub enum FilterOutcome {
    Rows(DataFrame),
    /// A column's selection is explicitly empty; named so the caller can
    /// report which one.
    EmptySelection(String),
    /// The combination matched nothing.
    NoRows,
}

fn column_strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, EngineError> {
    let series = df.column(name)?.as_materialized_series();
    let mut out = Vec::with_capacity(series.len());
    for i in 0..series.len() {
        out.push(any_to_display(&series.get(i)?));
    }
    Ok(out)
}

/// For every column of `df`, the sorted distinct values still selectable
/// under all *other* columns' active selections.
pub fn resolve_filter_options(
    df: &DataFrame,
    active: &ActiveFilters,
) -> Result<BTreeMap<String, Vec<String>>, EngineError> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    let mut columns: BTreeMap<&str, Vec<Option<String>>> = BTreeMap::new();
    for name in &names {
        columns.insert(name.as_str(), column_strings(df, name)?);
    }

    let constraints: Vec<(&str, BTreeSet<&str>)> = active
        .iter()
        .filter(|(col, _)| columns.contains_key(col.as_str()))
        .map(|(col, values)| {
            (
                col.as_str(),
                values.iter().map(|v| v.as_str()).collect::<BTreeSet<_>>(),
            )
        })
        .collect();

    let mut out = BTreeMap::new();
    for target in &names {
        let values = &columns[target.as_str()];
        let mut options: BTreeSet<&str> = BTreeSet::new();
        'rows: for i in 0..df.height() {
            for (col, selected) in &constraints {
                if *col == target.as_str() {
                    continue;
                }
                match &columns[col][i] {
                    Some(v) if selected.contains(v.as_str()) => {}
                    _ => continue 'rows,
                }
            }
            if let Some(v) = &values[i] {
                options.insert(v);
            }
        }
        out.insert(
            target.clone(),
            options.into_iter().map(|v| v.to_string()).collect(),
        );
    }
    Ok(out)
}

/// Filter `df` by the active selections.
///
/// A selection covering a column's full unconstrained pool is a no-op (it
/// would only drop rows that are null in that column); selections naming
/// columns absent from `df` are ignored.
pub fn apply_filters(df: &DataFrame, active: &ActiveFilters) -> Result<FilterOutcome, EngineError> {
    for (col, selected) in active {
        if selected.is_empty() {
            return Ok(FilterOutcome::EmptySelection(col.clone()));
        }
    }

    let n = df.height();
    let mut keep = vec![true; n];
    for (col, selected) in active {
        if df.column(col).is_err() {
            continue;
        }
        let values = column_strings(df, col)?;
        let selected_set: BTreeSet<&str> = selected.iter().map(|v| v.as_str()).collect();
        let pool: BTreeSet<&str> = values.iter().flatten().map(|v| v.as_str()).collect();
        if pool.iter().all(|v| selected_set.contains(v)) {
            continue;
        }
        for (i, slot) in keep.iter_mut().enumerate() {
            if *slot {
                *slot = matches!(&values[i], Some(v) if selected_set.contains(v.as_str()));
            }
        }
    }

    let mask = BooleanChunked::from_slice("mask".into(), &keep);
    let filtered = df.filter(&mask)?;
    if filtered.height() == 0 {
        Ok(FilterOutcome::NoRows)
    } else {
        Ok(FilterOutcome::Rows(filtered))
    }
}

// ── Per-column selection state ──────────────────────────────────────────────

/// Selection state of one filterable column.
///
/// The pool is whatever the cascade currently offers; `deselected` records
/// the user's explicit removals. Selected = pool − deselected, so pool
/// changes never auto-select and never resurrect a removed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnState {
    pool: Vec<String>,
    deselected: BTreeSet<String>,
}

impl ColumnState {
    pub fn new(pool: Vec<String>) -> Self {
        Self {
            pool,
            deselected: BTreeSet::new(),
        }
    }

    pub fn pool(&self) -> &[String] {
        &self.pool
    }

    pub fn selected(&self) -> Vec<String> {
        self.pool
            .iter()
            .filter(|v| !self.deselected.contains(*v))
            .cloned()
            .collect()
    }

    /// "Select all" meta-state: no pool member is deselected.
    pub fn is_select_all(&self) -> bool {
        self.pool.iter().all(|v| !self.deselected.contains(v))
    }

    pub fn selection_is_empty(&self) -> bool {
        self.pool.iter().all(|v| self.deselected.contains(v))
    }

    /// Whether this column contributes a constraint.
    pub fn constrains(&self) -> bool {
        self.pool.iter().any(|v| self.deselected.contains(v))
    }

    pub fn toggle(&mut self, value: &str) {
        if !self.deselected.remove(value) {
            self.deselected.insert(value.to_string());
        }
    }

    pub fn select_all(&mut self) {
        self.deselected.clear();
    }

    pub fn deselect_all(&mut self) {
        self.deselected.extend(self.pool.iter().cloned());
    }

    /// Swap in the option pool the cascade now offers. Deselections are kept
    /// verbatim: a value that disappears and later returns stays removed.
    pub fn refresh_pool(&mut self, pool: Vec<String>) {
        self.pool = pool;
    }
}

/// All filterable columns of one view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPanel {
    columns: BTreeMap<String, ColumnState>,
}

impl FilterPanel {
    pub fn new(options: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            columns: options
                .into_iter()
                .map(|(name, pool)| (name, ColumnState::new(pool)))
                .collect(),
        }
    }

    /// Initial panel for the positioning views: everything selected except
    /// the plan column, narrowed to the most recent plan label.
    pub fn with_default_plan(options: BTreeMap<String, Vec<String>>, latest_plan: &str) -> Self {
        let mut panel = Self::new(options);
        if let Some(state) = panel.columns.get_mut(obs::PLANO) {
            state.deselected = state
                .pool
                .iter()
                .filter(|v| v.as_str() != latest_plan)
                .cloned()
                .collect();
        }
        panel
    }

    pub fn column(&self, name: &str) -> Option<&ColumnState> {
        self.columns.get(name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut ColumnState> {
        self.columns.get_mut(name)
    }

    /// The selections that actually constrain, ready for `apply_filters`.
    pub fn active_filters(&self) -> ActiveFilters {
        self.columns
            .iter()
            .filter(|(_, state)| state.constrains())
            .map(|(name, state)| (name.clone(), state.selected()))
            .collect()
    }

    /// Global "clear filters": every column back to select-all.
    pub fn clear(&mut self) {
        for state in self.columns.values_mut() {
            state.select_all();
        }
    }

    /// Re-resolve pools after a filter change elsewhere; columns that left
    /// the view are dropped, new ones start unconstrained.
    pub fn refresh(&mut self, options: BTreeMap<String, Vec<String>>) {
        self.columns.retain(|name, _| options.contains_key(name));
        for (name, pool) in options {
            match self.columns.get_mut(&name) {
                Some(state) => state.refresh_pool(pool),
                None => {
                    self.columns.insert(name, ColumnState::new(pool));
                }
            }
        }
    }
}
