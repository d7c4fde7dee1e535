//! Plan-over-plan comparison engine.
//!
//! For every location, the two most recent pricing plans are compared cell
//! by cell, where a cell is (location, pickup date, duration, category) and
//! each plan contributes its cheapest offer for the cell.
//!
//! Plan recency is the lexicographic order of the plan labels: most recent =
//! greatest label. Plan labels are expected to be zero-padded/sortable; see
//! DESIGN.md for the rationale behind keeping this comparator explicit.

use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::debug;

use crate::error::EngineError;
use crate::format::{any_to_display, brl, date_from_days, percent2};
use crate::schema::{cmp, datefmt, report};

/// Cheapest offer one plan made for a comparison cell.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanQuote {
    pub plan: String,
    pub vendor: String,
    pub price: f64,
}

/// One comparison-report row: a cell present in both of its location's two
/// most recent plans.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub location: String,
    pub pickup_date: NaiveDate,
    pub duration: String,
    pub category: String,
    pub previous: PlanQuote,
    pub current: PlanQuote,
    /// current.price / previous.price − 1
    pub variation: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct CellKey {
    location: String,
    pickup_date: NaiveDate,
    duration: String,
    category: String,
}

#[derive(Debug, Clone)]
struct Offer {
    vendor: String,
    price: f64,
}

impl Offer {
    /// Tie-break: lowest price, then lexically smallest vendor; equal
    /// (price, vendor) keeps the first source row.
    fn beats(&self, other: &Offer) -> bool {
        self.price < other.price || (self.price == other.price && self.vendor < other.vendor)
    }
}

/// Build the comparison report from the lowercase view.
///
/// Locations with fewer than two distinct plans contribute nothing; cells
/// must exist in both selected plans to survive the join. Empty input and
/// no-match conditions return an empty vector, never an error.
pub fn build_comparison_report(lower: &DataFrame) -> Result<Vec<ComparisonRow>, EngineError> {
    if lower.height() == 0 {
        return Ok(Vec::new());
    }
    for name in [
        cmp::LOCALIDADE,
        cmp::RETIRADA,
        cmp::DURACAO,
        cmp::CATEGORIA,
        cmp::LOCADORA,
        cmp::PLANO,
        cmp::PRECO,
    ] {
        if lower.column(name).is_err() {
            return Err(EngineError::MissingColumn(name.to_string()));
        }
    }

    let location = lower.column(cmp::LOCALIDADE)?.as_materialized_series();
    let location = location.str()?;
    let pickup = lower.column(cmp::RETIRADA)?.as_materialized_series();
    let pickup = pickup.date()?;
    let duration = lower.column(cmp::DURACAO)?.as_materialized_series();
    let category = lower.column(cmp::CATEGORIA)?.as_materialized_series();
    let category = category.str()?;
    let vendor = lower.column(cmp::LOCADORA)?.as_materialized_series();
    let vendor = vendor.str()?;
    let plan = lower.column(cmp::PLANO)?.as_materialized_series();
    let plan = plan.str()?;
    let price = lower.column(cmp::PRECO)?.as_materialized_series();
    let price = price.f64()?;

    let n = lower.height();

    // The two lexically greatest distinct plans per location.
    let mut plans_by_location: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for i in 0..n {
        if let (Some(loc), Some(p)) = (location.get(i), plan.get(i)) {
            plans_by_location
                .entry(loc.to_string())
                .or_default()
                .insert(p.to_string());
        }
    }
    let mut selected: BTreeMap<String, (String, String)> = BTreeMap::new();
    for (loc, plans) in &plans_by_location {
        if plans.len() >= 2 {
            let mut newest_first = plans.iter().rev();
            let current = newest_first.next().unwrap().clone();
            let previous = newest_first.next().unwrap().clone();
            selected.insert(loc.clone(), (current, previous));
        }
    }
    if selected.is_empty() {
        debug!("no location has two distinct plans to compare");
        return Ok(Vec::new());
    }

    // Cheapest offer per cell, split by plan side.
    let mut current_best: BTreeMap<CellKey, Offer> = BTreeMap::new();
    let mut previous_best: BTreeMap<CellKey, Offer> = BTreeMap::new();
    for i in 0..n {
        let Some(loc) = location.get(i) else { continue };
        let Some((current_plan, previous_plan)) = selected.get(loc) else {
            continue;
        };
        let Some(p) = plan.get(i) else { continue };
        let side = if p == current_plan {
            &mut current_best
        } else if p == previous_plan {
            &mut previous_best
        } else {
            continue;
        };
        let (Some(days), Some(cat), Some(vend), Some(value)) = (
            pickup.phys.get(i),
            category.get(i),
            vendor.get(i),
            price.get(i),
        ) else {
            continue;
        };
        // A null duration cannot form a cell key; the row is skipped.
        let Some(dur) = any_to_display(&duration.get(i)?) else {
            continue;
        };

        let key = CellKey {
            location: loc.to_string(),
            pickup_date: date_from_days(days),
            duration: dur,
            category: cat.to_string(),
        };
        let offer = Offer {
            vendor: vend.to_string(),
            price: value,
        };
        match side.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(offer);
            }
            Entry::Occupied(mut slot) => {
                if offer.beats(slot.get()) {
                    slot.insert(offer);
                }
            }
        }
    }

    // Inner join on the cell key; ordering follows the key order
    // (location, pickup date, duration, category).
    let mut rows = Vec::new();
    for (key, current) in current_best {
        let Some(previous) = previous_best.get(&key) else {
            continue;
        };
        let (current_plan, previous_plan) = &selected[&key.location];
        let variation = current.price / previous.price - 1.0;
        rows.push(ComparisonRow {
            location: key.location,
            pickup_date: key.pickup_date,
            duration: key.duration,
            category: key.category,
            previous: PlanQuote {
                plan: previous_plan.clone(),
                vendor: previous.vendor.clone(),
                price: previous.price,
            },
            current: PlanQuote {
                plan: current_plan.clone(),
                vendor: current.vendor,
                price: current.price,
            },
            variation,
        });
    }

    debug!(
        locations = selected.len(),
        rows = rows.len(),
        "comparison report built"
    );
    Ok(rows)
}

/// Current-plan label of the first report row; seeds the default
/// positioning filter.
pub fn latest_plan(rows: &[ComparisonRow]) -> Option<&str> {
    rows.first().map(|row| row.current.plan.as_str())
}

/// Render the report as a display table in the fixed column order, with
/// localized prices and percentages.
pub fn comparison_table(rows: &[ComparisonRow]) -> Result<DataFrame, EngineError> {
    let mut locations = Vec::with_capacity(rows.len());
    let mut pickups = Vec::with_capacity(rows.len());
    let mut durations = Vec::with_capacity(rows.len());
    let mut categories = Vec::with_capacity(rows.len());
    let mut previous_prices = Vec::with_capacity(rows.len());
    let mut current_prices = Vec::with_capacity(rows.len());
    let mut variations = Vec::with_capacity(rows.len());
    let mut previous_vendors = Vec::with_capacity(rows.len());
    let mut current_vendors = Vec::with_capacity(rows.len());
    let mut previous_plans = Vec::with_capacity(rows.len());
    let mut current_plans = Vec::with_capacity(rows.len());

    for row in rows {
        locations.push(row.location.clone());
        pickups.push(row.pickup_date.format(datefmt::ISO_DATE).to_string());
        durations.push(row.duration.clone());
        categories.push(row.category.clone());
        previous_prices.push(brl(row.previous.price));
        current_prices.push(brl(row.current.price));
        variations.push(percent2(row.variation));
        previous_vendors.push(row.previous.vendor.clone());
        current_vendors.push(row.current.vendor.clone());
        previous_plans.push(row.previous.plan.clone());
        current_plans.push(row.current.plan.clone());
    }

    let df = DataFrame::new(vec![
        Column::new(report::LOCALIDADE.into(), locations),
        Column::new(report::RETIRADA.into(), pickups),
        Column::new(report::DURACAO.into(), durations),
        Column::new(report::CATEGORIA.into(), categories),
        Column::new(report::PRECO_ANTERIOR.into(), previous_prices),
        Column::new(report::PRECO_ATUAL.into(), current_prices),
        Column::new(report::VARIACAO.into(), variations),
        Column::new(report::LOCADORA_ANTERIOR.into(), previous_vendors),
        Column::new(report::LOCADORA_ATUAL.into(), current_vendors),
        Column::new(report::PLANO_ANTERIOR.into(), previous_plans),
        Column::new(report::PLANO_ATUAL.into(), current_plans),
    ])?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::lower_df;
    use pretty_assertions::assert_eq;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn compares_the_two_most_recent_plans_per_location() {
        // GRU has three plans; only P03 (current) and P02 (previous) count.
        let df = lower_df(&[
            ("GRU", "2025-10-01", "7", "SUV", "Foco", "P01", 90.0),
            ("GRU", "2025-10-01", "7", "SUV", "Alfa", "P02", 100.0),
            ("GRU", "2025-10-01", "7", "SUV", "Beta", "P02", 110.0),
            ("GRU", "2025-10-01", "7", "SUV", "Alfa", "P03", 120.0),
        ]);
        let rows = build_comparison_report(&df).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.location, "GRU");
        assert_eq!(row.pickup_date, date("2025-10-01"));
        assert_eq!(row.previous.plan, "P02");
        assert_eq!(row.previous.price, 100.0);
        assert_eq!(row.current.plan, "P03");
        assert_eq!(row.current.price, 120.0);
        assert!((row.variation - 0.2).abs() < 1e-12);
    }

    #[test]
    fn locations_with_a_single_plan_are_dropped() {
        let df = lower_df(&[
            ("GIG", "2025-10-01", "7", "SUV", "Alfa", "P01", 100.0),
            ("GIG", "2025-10-02", "7", "SUV", "Alfa", "P01", 100.0),
        ]);
        assert_eq!(build_comparison_report(&df).unwrap(), vec![]);
    }

    #[test]
    fn cells_must_match_on_both_plans() {
        // The SUV cell exists only in P02, the HATCH cell only in P01.
        let df = lower_df(&[
            ("GRU", "2025-10-01", "7", "SUV", "Alfa", "P02", 100.0),
            ("GRU", "2025-10-01", "7", "HATCH", "Alfa", "P01", 80.0),
        ]);
        assert_eq!(build_comparison_report(&df).unwrap(), vec![]);
    }

    #[test]
    fn cheapest_offer_wins_within_each_plan_cell() {
        let df = lower_df(&[
            ("GRU", "2025-10-01", "7", "SUV", "Caro", "P02", 150.0),
            ("GRU", "2025-10-01", "7", "SUV", "Barato", "P02", 100.0),
            ("GRU", "2025-10-01", "7", "SUV", "Caro", "P03", 130.0),
            ("GRU", "2025-10-01", "7", "SUV", "Medio", "P03", 110.0),
        ]);
        let rows = build_comparison_report(&df).unwrap();
        assert_eq!(rows[0].previous.vendor, "Barato");
        assert_eq!(rows[0].current.vendor, "Medio");
    }

    #[test]
    fn price_ties_break_on_vendor_name() {
        let df = lower_df(&[
            ("GRU", "2025-10-01", "7", "SUV", "Zeta", "P02", 100.0),
            ("GRU", "2025-10-01", "7", "SUV", "Alfa", "P02", 100.0),
            ("GRU", "2025-10-01", "7", "SUV", "Alfa", "P03", 100.0),
        ]);
        let rows = build_comparison_report(&df).unwrap();
        assert_eq!(rows[0].previous.vendor, "Alfa");
    }

    #[test]
    fn variation_satisfies_the_round_trip_law() {
        let df = lower_df(&[
            ("GRU", "2025-10-01", "7", "SUV", "Alfa", "P02", 137.77),
            ("GRU", "2025-10-01", "7", "SUV", "Alfa", "P03", 152.49),
        ]);
        let row = &build_comparison_report(&df).unwrap()[0];
        let roundtrip = (1.0 + row.variation) * row.previous.price;
        assert!((roundtrip - row.current.price).abs() < 1e-9);
    }

    #[test]
    fn independent_locations_compare_their_own_plan_pairs() {
        let df = lower_df(&[
            ("GIG", "2025-10-01", "7", "SUV", "Alfa", "P01", 100.0),
            ("GIG", "2025-10-01", "7", "SUV", "Alfa", "P02", 90.0),
            ("GRU", "2025-10-01", "7", "SUV", "Beta", "P04", 200.0),
            ("GRU", "2025-10-01", "7", "SUV", "Beta", "P05", 220.0),
        ]);
        let rows = build_comparison_report(&df).unwrap();
        assert_eq!(rows.len(), 2);
        // BTreeMap key order: GIG before GRU.
        assert_eq!(rows[0].location, "GIG");
        assert_eq!(rows[0].current.plan, "P02");
        assert_eq!(rows[1].location, "GRU");
        assert_eq!(rows[1].current.plan, "P05");
    }

    #[test]
    fn latest_plan_comes_from_the_first_row() {
        let df = lower_df(&[
            ("GIG", "2025-10-01", "7", "SUV", "Alfa", "P01", 100.0),
            ("GIG", "2025-10-01", "7", "SUV", "Alfa", "P02", 90.0),
        ]);
        let rows = build_comparison_report(&df).unwrap();
        assert_eq!(latest_plan(&rows), Some("P02"));
        assert_eq!(latest_plan(&[]), None);
    }

    #[test]
    fn table_renders_localized_formats_in_fixed_order() {
        let df = lower_df(&[
            ("GRU", "2025-10-01", "7", "SUV", "Alfa", "P02", 1234.5),
            ("GRU", "2025-10-01", "7", "SUV", "Beta", "P03", 1481.4),
        ]);
        let rows = build_comparison_report(&df).unwrap();
        let table = comparison_table(&rows).unwrap();

        let names: Vec<&str> = table
            .get_column_names()
            .iter()
            .map(|name| name.as_str())
            .collect();
        assert_eq!(names, report::ORDER.to_vec());

        let prev = table.column(report::PRECO_ANTERIOR).unwrap();
        assert_eq!(
            prev.as_materialized_series().str().unwrap().get(0),
            Some("R$ 1.234,50")
        );
        let var = table.column(report::VARIACAO).unwrap();
        assert_eq!(
            var.as_materialized_series().str().unwrap().get(0),
            Some("20.00%")
        );
        let pickup = table.column(report::RETIRADA).unwrap();
        assert_eq!(
            pickup.as_materialized_series().str().unwrap().get(0),
            Some("2025-10-01")
        );
    }

    #[test]
    fn empty_report_renders_an_empty_table_with_all_columns() {
        let table = comparison_table(&[]).unwrap();
        assert_eq!(table.height(), 0);
        assert_eq!(table.width(), report::ORDER.len());
    }
}
