//! End-to-end flow over the public API: snapshot on disk → load → default
//! filter panel → positioning matrices → comparison report.

use polars::prelude::*;
use pretty_assertions::assert_eq;
use rental_pricekit::{
    ActiveFilters, Axis, LoadStatus, MatrixOutcome, PositioningOutcome, PriceModel,
};

/// Two survey batches for one location plus a single-plan location, shaped
/// like the scraper's parquet output.
fn snapshot() -> DataFrame {
    let location = [
        "Centro", "Centro", "Centro", "Centro", "Centro", "Aeroporto",
    ];
    let pickup = [
        "2025-10-10",
        "2025-10-10",
        "2025-10-10",
        "2025-10-10",
        "2025-10-11",
        "2025-10-10",
    ];
    let survey = [
        "2025-09-20",
        "2025-09-27",
        "2025-09-27",
        "2025-09-27",
        "2025-09-27",
        "2025-09-27",
    ];
    let hour = [
        "08:00:00", "08:00:00", "08:00:00", "08:00:00", "08:00:00", "08:00:00",
    ];
    let duration = ["7", "7", "7", "7", "7", "7"];
    let categoria = ["SUV", "SUV", "SUV", "SUV", "SUV", "HATCH"];
    let vendor = ["Alfa", "Foco", "Alfa", "Beta", "Foco", "Gama"];
    let plan = ["P10", "P11", "P11", "P11", "P11", "P03"];
    let price = [110.0, 100.0, 100.0, 130.0, 90.0, 70.0];

    DataFrame::new(vec![
        Column::new("LOCALIDADE".into(), location.as_slice()),
        Column::new("RETIRADA".into(), pickup.as_slice()),
        Column::new("DATA".into(), survey.as_slice()),
        Column::new("HORA".into(), hour.as_slice()),
        Column::new("DURAÇÃO".into(), duration.as_slice()),
        Column::new("CATEGORIA".into(), categoria.as_slice()),
        Column::new("LOCADORA".into(), vendor.as_slice()),
        Column::new("PLANO".into(), plan.as_slice()),
        Column::new("PREÇO".into(), price.as_slice()),
    ])
    .unwrap()
}

fn loaded() -> PriceModel {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dados_consolidados.parquet");
    let mut df = snapshot();
    let file = std::fs::File::create(&path).unwrap();
    ParquetWriter::new(file).finish(&mut df).unwrap();

    let mut model = PriceModel::new();
    assert!(model.load(&path).is_loaded());
    model
}

#[test]
fn full_flow_from_snapshot_to_matrices() {
    let model = loaded();
    match model.status() {
        LoadStatus::Loaded { rows, .. } => assert_eq!(*rows, 6),
        other => panic!("unexpected status {other:?}"),
    }

    // Comparison: Centro compares P11 against P10 on the one shared cell.
    let rows = model.comparison_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].location, "Centro");
    assert_eq!(rows[0].previous.price, 110.0);
    // P11 cheapest for the cell: Alfa and Foco tie at 100, Alfa wins the tie.
    assert_eq!(rows[0].current.vendor, "Alfa");
    let roundtrip = (1.0 + rows[0].variation) * rows[0].previous.price;
    assert!((roundtrip - rows[0].current.price).abs() < 1e-9);

    // Default panel narrows the plan column to P11.
    let panel = model.default_positioning_panel();
    let active = panel.active_filters();
    assert_eq!(active["PLANO"], vec!["P11".to_string()]);

    let PositioningOutcome::Report(report) = model.positioning(&active, Axis::ByLocation) else {
        panic!("expected a report");
    };
    let MatrixOutcome::Ready(cheapest) = &report.cheapest else {
        panic!("cheapest matrix failed");
    };
    assert_eq!(cheapest.rows, vec!["10/10/2025", "11/10/2025"]);
    assert_eq!(cheapest.cols, vec!["Centro"]);
    // 10/10: Alfa/Foco tie at 100 → Alfa; 11/10: Foco alone.
    assert_eq!(cheapest.cell(0, 0), Some(&Some("Alfa".to_string())));

    let MatrixOutcome::Ready(distance) = &report.distance else {
        panic!("distance matrix failed");
    };
    // Foco ties the minimum; the runner-up (130) is 30% dearer.
    match distance.cell(0, 0) {
        Some(rental_pricekit::DistanceCell::Pct(p)) => assert!((p - 0.3).abs() < 1e-12),
        other => panic!("unexpected cell {other:?}"),
    }
    assert_eq!(
        distance.cell(1, 0),
        Some(&rental_pricekit::DistanceCell::Unique)
    );
    assert!(report.highlight(0, 0));
    assert!(report.highlight(1, 0));
}

#[test]
fn filter_option_resolution_stays_consistent_under_composition() {
    let model = loaded();

    let unconstrained = model.filter_options(&ActiveFilters::new());
    assert_eq!(
        unconstrained["LOCALIDADE"],
        vec!["Aeroporto".to_string(), "Centro".to_string()]
    );

    let mut active = ActiveFilters::new();
    active.insert("LOCALIDADE".to_string(), vec!["Aeroporto".to_string()]);
    let constrained = model.filter_options(&active);

    // Idempotent.
    assert_eq!(constrained, model.filter_options(&active));
    // Cascaded columns shrink to the Aeroporto subset...
    assert_eq!(constrained["CATEGORIA"], vec!["HATCH".to_string()]);
    assert_eq!(constrained["PLANO"], vec!["P03".to_string()]);
    // ...and every constrained set is a subset of the unconstrained one.
    for (column, options) in &constrained {
        if column == "LOCALIDADE" {
            continue;
        }
        assert!(options.iter().all(|v| unconstrained[column].contains(v)));
    }
}

#[test]
fn empty_and_missing_states_never_raise() {
    let mut model = PriceModel::new();
    model.load("/no/such/snapshot.parquet");
    assert_eq!(model.status(), &LoadStatus::FileMissing);
    assert_eq!(model.comparison_rows().len(), 0);
    assert_eq!(model.comparison_table().height(), 0);
    assert!(model.filter_options(&ActiveFilters::new()).is_empty());
    assert_eq!(
        model.positioning(&ActiveFilters::new(), Axis::ByCategory),
        PositioningOutcome::NoRows
    );
}
