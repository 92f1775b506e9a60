use rayon::ThreadPoolBuilder;
use std::sync::OnceLock;
use tracing::{info, warn};

static RAYON_INIT: OnceLock<()> = OnceLock::new();

/// Annual trading days used for annualization.
pub const TRADING_DAYS: f64 = 252.0;

/// Number of random portfolios simulated when none is requested.
pub const DEFAULT_NUM_PORTFOLIOS: usize = 5_000;

/// Risk-free annual rate used in Sharpe calculations when none is requested.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.0;

pub const DEFAULT_SEED: u64 = 42;

/// Runs at or above this size evaluate portfolio metrics on the rayon pool.
pub const PARALLEL_THRESHOLD: usize = 2_048;

pub const ENV_NUM_PORTFOLIOS: &str = "PORTFOLIO_SIM_NUM_PORTFOLIOS";
pub const ENV_RISK_FREE_RATE: &str = "PORTFOLIO_SIM_RISK_FREE_RATE";
pub const ENV_SEED: &str = "PORTFOLIO_SIM_SEED";

pub fn init_cpu_parallelism() {
    RAYON_INIT.get_or_init(|| {
        let num_threads = num_cpus::get().max(1);
        match ThreadPoolBuilder::new().num_threads(num_threads).build_global() {
            Ok(_) => info!(
                "Initialized Rayon thread pool with {} threads (all logical CPU cores)",
                num_threads
            ),
            Err(e) => warn!(
                "Rayon thread pool already initialized or unavailable ({}). Using existing configuration.",
                e
            ),
        }
    });
}

/// Denominator used when estimating the covariance of daily log returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CovarianceConvention {
    /// Divide by N (ddof = 0).
    #[default]
    Population,
    /// Divide by N - 1 (ddof = 1).
    Sample,
}

impl CovarianceConvention {
    pub fn ddof(self) -> usize {
        match self {
            Self::Population => 0,
            Self::Sample => 1,
        }
    }
}

/// Run defaults resolved from the environment, before CLI overrides.
#[derive(Clone, Debug, PartialEq)]
pub struct RunDefaults {
    pub num_portfolios: usize,
    pub risk_free_rate: f64,
    pub seed: u64,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            num_portfolios: DEFAULT_NUM_PORTFOLIOS,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            seed: DEFAULT_SEED,
        }
    }
}

impl RunDefaults {
    /// Reads `PORTFOLIO_SIM_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves defaults through `lookup`; unparsable values are logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut defaults = Self::default();

        if let Some(v) = parse_var::<usize, _>(&lookup, ENV_NUM_PORTFOLIOS) {
            defaults.num_portfolios = v;
        }
        if let Some(v) = parse_var::<f64, _>(&lookup, ENV_RISK_FREE_RATE) {
            defaults.risk_free_rate = v;
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, ENV_SEED) {
            defaults.seed = v;
        }

        defaults
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring {}={} (could not parse value)", key, trimmed);
            None
        }
    }
}
