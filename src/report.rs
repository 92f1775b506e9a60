use crate::engine::ResultTable;
use crate::error::Result;
use crate::selector::{OptimalPortfolio, OptimalSet, select_optimal};
use serde::Serialize;
use std::collections::BTreeMap;

/// One distinguished portfolio as handed to the plotting side.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OptimalRecord {
    pub index: usize,
    pub values: BTreeMap<String, f64>,
}

impl OptimalRecord {
    fn from_pick(pick: &OptimalPortfolio<'_>, symbols: &[String]) -> Self {
        Self {
            index: pick.index,
            values: pick.record(symbols),
        }
    }
}

/// Everything the plotting collaborator needs from a run: the full table
/// as flat records and the three named optimal rows.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationReport {
    pub symbols: Vec<String>,
    pub portfolios: Vec<BTreeMap<String, f64>>,
    pub max_sharpe: OptimalRecord,
    pub min_variance: OptimalRecord,
    pub max_return: OptimalRecord,
}

impl SimulationReport {
    pub fn build(table: &ResultTable) -> Result<Self> {
        let optimal = select_optimal(table)?;
        Ok(Self::from_parts(table, &optimal))
    }

    pub fn from_parts(table: &ResultTable, optimal: &OptimalSet<'_>) -> Self {
        let symbols = table.symbols();
        Self {
            symbols: symbols.to_vec(),
            portfolios: table.records(),
            max_sharpe: OptimalRecord::from_pick(&optimal.max_sharpe, symbols),
            min_variance: OptimalRecord::from_pick(&optimal.min_risk, symbols),
            max_return: OptimalRecord::from_pick(&optimal.max_return, symbols),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Pretty-prints the optimal portfolios to stdout.
pub fn print_summary(table: &ResultTable, optimal: &OptimalSet<'_>, risk_free_rate: f64) {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║           Monte Carlo Portfolio Simulation                ║");
    println!("╠════════════════════════════════════════════════════════════╣");
    println!(
        "║  Portfolios Simulated   : {:>7}                          ║",
        table.len()
    );
    println!(
        "║  Risk-Free Rate         : {:>7.2}%                         ║",
        risk_free_rate * 100.0
    );

    let picks = [
        ("Max Sharpe", &optimal.max_sharpe),
        ("Min Variance", &optimal.min_risk),
        ("Max Return", &optimal.max_return),
    ];

    for (label, pick) in picks {
        let s = pick.sample;
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  {:<14} (row {:>6})                               ║", label, pick.index);
        println!(
            "║    Return {:>+9.2}%   Risk {:>8.2}%   Sharpe {:>7.2}      ║",
            s.annual_return * 100.0,
            s.annual_risk * 100.0,
            s.sharpe_ratio
        );
        for (sym, w) in table.symbols().iter().zip(&s.weights) {
            println!("║      {:<10} {:>7.2}%                                  ║", sym, w * 100.0);
        }
    }

    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
    println!("⚠  Random search over weights; not a global optimum. Not financial advice.");
}
