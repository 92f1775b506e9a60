use crate::engine::{PortfolioSample, ResultTable};
use crate::error::{Result, SimulationError};
use serde::Serialize;
use std::collections::BTreeMap;

/// A row of the result table picked by one of the selection keys.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OptimalPortfolio<'a> {
    /// Position in the result table.
    pub index: usize,
    pub sample: &'a PortfolioSample,
}

impl OptimalPortfolio<'_> {
    pub fn record(&self, symbols: &[String]) -> BTreeMap<String, f64> {
        self.sample.record(symbols)
    }
}

/// Max-Sharpe, min-risk and max-return rows of one simulation run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OptimalSet<'a> {
    pub max_sharpe: OptimalPortfolio<'a>,
    pub min_risk: OptimalPortfolio<'a>,
    pub max_return: OptimalPortfolio<'a>,
}

/// Scans `table` once per key. Exact ties go to the earliest row.
pub fn select_optimal(table: &ResultTable) -> Result<OptimalSet<'_>> {
    let rows = table.rows();
    if rows.is_empty() {
        return Err(SimulationError::EmptyResult);
    }

    let max_sharpe = first_best(rows, |s| s.sharpe_ratio, |cand, best| cand > best);
    let min_risk = first_best(rows, |s| s.annual_risk, |cand, best| cand < best);
    let max_return = first_best(rows, |s| s.annual_return, |cand, best| cand > best);

    Ok(OptimalSet {
        max_sharpe: OptimalPortfolio {
            index: max_sharpe,
            sample: &rows[max_sharpe],
        },
        min_risk: OptimalPortfolio {
            index: min_risk,
            sample: &rows[min_risk],
        },
        max_return: OptimalPortfolio {
            index: max_return,
            sample: &rows[max_return],
        },
    })
}

/// Index of the first row whose key beats every earlier row under `better`.
fn first_best<K, B>(rows: &[PortfolioSample], key: K, better: B) -> usize
where
    K: Fn(&PortfolioSample) -> f64,
    B: Fn(f64, f64) -> bool,
{
    let mut best_idx = 0;
    let mut best = key(&rows[0]);
    for (idx, row) in rows.iter().enumerate().skip(1) {
        let value = key(row);
        if better(value, best) {
            best = value;
            best_idx = idx;
        }
    }
    best_idx
}
