//! Shared frame builders for unit tests.

use chrono::NaiveDate;
use polars::prelude::*;

use crate::format::days_from_date;
use crate::schema::{cmp, obs};

fn date_column(name: &str, dates: &[&str]) -> Column {
    let days: Vec<i32> = dates
        .iter()
        .map(|d| days_from_date(NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()))
        .collect();
    Series::new(name.into(), days)
        .cast(&DataType::Date)
        .unwrap()
        .into()
}

/// Lowercase comparison-view frame:
/// (localidade, retirada, duração, categoria, locadora, plano, preço).
pub(crate) fn lower_df(rows: &[(&str, &str, &str, &str, &str, &str, f64)]) -> DataFrame {
    let locations: Vec<&str> = rows.iter().map(|r| r.0).collect();
    let pickups: Vec<&str> = rows.iter().map(|r| r.1).collect();
    let durations: Vec<&str> = rows.iter().map(|r| r.2).collect();
    let categories: Vec<&str> = rows.iter().map(|r| r.3).collect();
    let vendors: Vec<&str> = rows.iter().map(|r| r.4).collect();
    let plans: Vec<&str> = rows.iter().map(|r| r.5).collect();
    let prices: Vec<f64> = rows.iter().map(|r| r.6).collect();

    DataFrame::new(vec![
        Column::new(cmp::LOCALIDADE.into(), locations),
        date_column(cmp::RETIRADA, &pickups),
        Column::new(cmp::DURACAO.into(), durations),
        Column::new(cmp::CATEGORIA.into(), categories),
        Column::new(cmp::LOCADORA.into(), vendors),
        Column::new(cmp::PLANO.into(), plans),
        Column::new(cmp::PRECO.into(), prices),
    ])
    .unwrap()
}

/// Typed calculation-view frame for positioning tests:
/// (localidade, retirada, categoria, locadora, preço); duration and plan are
/// constant, which the positioning axes never group by.
pub(crate) fn obs_df(rows: &[(&str, &str, &str, &str, f64)]) -> DataFrame {
    let locations: Vec<&str> = rows.iter().map(|r| r.0).collect();
    let pickups: Vec<&str> = rows.iter().map(|r| r.1).collect();
    let categories: Vec<&str> = rows.iter().map(|r| r.2).collect();
    let vendors: Vec<&str> = rows.iter().map(|r| r.3).collect();
    let prices: Vec<f64> = rows.iter().map(|r| r.4).collect();
    let n = rows.len();

    DataFrame::new(vec![
        Column::new(obs::LOCALIDADE.into(), locations),
        date_column(obs::RETIRADA, &pickups),
        Column::new(obs::DURACAO.into(), vec!["7"; n]),
        Column::new(obs::CATEGORIA.into(), categories),
        Column::new(obs::LOCADORA.into(), vendors),
        Column::new(obs::PLANO.into(), vec!["P01"; n]),
        Column::new(obs::PRECO.into(), prices),
    ])
    .unwrap()
}
