use crate::config::{
    CovarianceConvention, DEFAULT_NUM_PORTFOLIOS, DEFAULT_RISK_FREE_RATE, DEFAULT_SEED,
    PARALLEL_THRESHOLD, TRADING_DAYS,
};
use crate::data::PriceMatrix;
use crate::error::{InputError, Result, SimulationError};
use crate::sampler::PortfolioSampler;
use crate::statistics::ReturnStatistics;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const RETURN_KEY: &str = "Return";
pub const RISK_KEY: &str = "Risk";
pub const SHARPE_KEY: &str = "Sharpe";

/// Relative tolerance for negative variance caused by rounding in `wᵀ Σ w`.
const VARIANCE_ROUNDING_TOLERANCE: f64 = 1e-12;

/// One simulated portfolio.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PortfolioSample {
    /// Long-only weights summing to 1, in the price matrix's symbol order.
    pub weights: Vec<f64>,
    pub annual_return: f64,
    /// Annualized volatility.
    pub annual_risk: f64,
    /// Zero whenever `annual_risk` is zero.
    pub sharpe_ratio: f64,
}

impl PortfolioSample {
    /// Flattens the row into `Return`, `Risk`, `Sharpe` and one entry per symbol.
    pub fn record(&self, symbols: &[String]) -> BTreeMap<String, f64> {
        let mut record: BTreeMap<String, f64> = symbols
            .iter()
            .cloned()
            .zip(self.weights.iter().copied())
            .collect();
        record.insert(RETURN_KEY.to_string(), self.annual_return);
        record.insert(RISK_KEY.to_string(), self.annual_risk);
        record.insert(SHARPE_KEY.to_string(), self.sharpe_ratio);
        record
    }
}

/// All portfolios from one run, in the order they were sampled.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultTable {
    symbols: Vec<String>,
    rows: Vec<PortfolioSample>,
}

impl ResultTable {
    pub fn new(symbols: Vec<String>, rows: Vec<PortfolioSample>) -> Self {
        Self { symbols, rows }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn rows(&self) -> &[PortfolioSample] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PortfolioSample> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PortfolioSample> {
        self.rows.iter()
    }

    /// Row-wise records in the `Return`/`Risk`/`Sharpe`/symbol layout.
    pub fn records(&self) -> Vec<BTreeMap<String, f64>> {
        self.rows.iter().map(|r| r.record(&self.symbols)).collect()
    }
}

/// Parameters for one simulation run.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationParams {
    pub num_portfolios: usize,
    pub risk_free_rate: f64,
    pub seed: u64,
    pub covariance: CovarianceConvention,
    /// Runs with at least this many portfolios are evaluated on the rayon pool.
    pub parallel_threshold: usize,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            num_portfolios: DEFAULT_NUM_PORTFOLIOS,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            seed: DEFAULT_SEED,
            covariance: CovarianceConvention::default(),
            parallel_threshold: PARALLEL_THRESHOLD,
        }
    }
}

impl SimulationParams {
    pub fn new(num_portfolios: usize, risk_free_rate: f64, seed: u64) -> Self {
        Self {
            num_portfolios,
            risk_free_rate,
            seed,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_portfolios == 0 {
            return Err(InputError::ZeroPortfolios.into());
        }
        if !self.risk_free_rate.is_finite() {
            return Err(InputError::NonFiniteRiskFreeRate(self.risk_free_rate).into());
        }
        Ok(())
    }
}

/// Simulates `num_portfolios` random portfolios over `prices`.
pub fn simulate(
    prices: &PriceMatrix,
    num_portfolios: usize,
    risk_free_rate: f64,
    seed: u64,
) -> Result<ResultTable> {
    simulate_with(prices, &SimulationParams::new(num_portfolios, risk_free_rate, seed))
}

/// Simulates with explicit parameters.
///
/// Weight vectors are always drawn sequentially from a single seeded RNG;
/// only metric evaluation is spread across threads, so the parallel and
/// sequential paths return identical tables.
pub fn simulate_with(prices: &PriceMatrix, params: &SimulationParams) -> Result<ResultTable> {
    prices.validate()?;
    params.validate()?;

    let stats = ReturnStatistics::with_convention(prices, params.covariance)?;
    let num_assets = prices.num_assets();

    info!(
        "Simulating {} portfolios over {} assets ({} dates, seed {})",
        params.num_portfolios,
        num_assets,
        prices.num_dates(),
        params.seed
    );

    let mut sampler = PortfolioSampler::new(num_assets, params.seed)?;
    let all_weights = sampler.sample(params.num_portfolios)?;

    let tolerance = VARIANCE_ROUNDING_TOLERANCE * stats.covariance_scale();
    let rf = params.risk_free_rate;

    let rows: Vec<PortfolioSample> = if params.num_portfolios >= params.parallel_threshold {
        debug!("Evaluating portfolios on the rayon pool");
        all_weights
            .into_par_iter()
            .enumerate()
            .map(|(idx, w)| evaluate_portfolio(idx, w, &stats, rf, tolerance))
            .collect::<Result<Vec<_>>>()?
    } else {
        all_weights
            .into_iter()
            .enumerate()
            .map(|(idx, w)| evaluate_portfolio(idx, w, &stats, rf, tolerance))
            .collect::<Result<Vec<_>>>()?
    };

    info!("Simulation complete: {} portfolios simulated.", rows.len());

    Ok(ResultTable::new(prices.symbols().to_vec(), rows))
}

/// Annualizes the weighted mean daily log return by compounding it as a
/// simple daily rate over [`TRADING_DAYS`].
pub fn annualized_return(mean_daily: f64) -> f64 {
    (mean_daily + 1.0).powf(TRADING_DAYS) - 1.0
}

pub fn sharpe_ratio(annual_return: f64, annual_risk: f64, risk_free_rate: f64) -> f64 {
    if annual_risk > 0.0 {
        (annual_return - risk_free_rate) / annual_risk
    } else {
        0.0
    }
}

fn evaluate_portfolio(
    index: usize,
    weights: Vec<f64>,
    stats: &ReturnStatistics,
    risk_free_rate: f64,
    tolerance: f64,
) -> Result<PortfolioSample> {
    let annual_return = annualized_return(stats.portfolio_mean_return(&weights));
    if !annual_return.is_finite() {
        return Err(SimulationError::computation("annual return", index, annual_return));
    }

    let variance = stats.portfolio_variance(&weights);
    if !variance.is_finite() || variance < -tolerance {
        return Err(SimulationError::computation("variance", index, variance));
    }
    let annual_risk = variance.max(0.0).sqrt();

    let sharpe = sharpe_ratio(annual_return, annual_risk, risk_free_rate);
    if !sharpe.is_finite() {
        return Err(SimulationError::computation("sharpe ratio", index, sharpe));
    }

    Ok(PortfolioSample {
        weights,
        annual_return,
        annual_risk,
        sharpe_ratio: sharpe,
    })
}
