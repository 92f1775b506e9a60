use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use portfolio_sim::config::{self, CovarianceConvention, RunDefaults};
use portfolio_sim::report::{self, SimulationReport};
use portfolio_sim::data::{self, DateWindow};
use portfolio_sim::{SimulationParams, select_optimal, simulate_with};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CovarianceChoice {
    Population,
    Sample,
}

impl From<CovarianceChoice> for CovarianceConvention {
    fn from(value: CovarianceChoice) -> Self {
        match value {
            CovarianceChoice::Population => CovarianceConvention::Population,
            CovarianceChoice::Sample => CovarianceConvention::Sample,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Monte Carlo portfolio simulation: random long-only portfolios scored by return, risk and Sharpe ratio",
    after_help = "EXAMPLES:
    # Simulate 5000 portfolios from a CSV of daily closes (Date,SYM1,SYM2,...)
    cargo run --release -- --prices prices.csv

    # Date window, custom size, risk-free rate and seed, JSON output for plotting
    cargo run --release -- --prices prices.csv --start 2023-01-01 --end 2024-12-31 --portfolios 10000 --risk-free-rate 0.03 --seed 7 --json report.json"
)]
struct Args {
    /// CSV file with a Date column followed by one closing-price column per symbol
    #[arg(long)]
    prices: PathBuf,

    /// Drop price rows dated before this day (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Drop price rows dated after this day (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Number of random portfolios (default: 5000, or PORTFOLIO_SIM_NUM_PORTFOLIOS)
    #[arg(long)]
    portfolios: Option<usize>,

    /// Annual risk-free rate for the Sharpe ratio (default: 0.0, or PORTFOLIO_SIM_RISK_FREE_RATE)
    #[arg(long, allow_hyphen_values = true)]
    risk_free_rate: Option<f64>,

    /// RNG seed (default: 42, or PORTFOLIO_SIM_SEED)
    #[arg(long)]
    seed: Option<u64>,

    /// Covariance denominator for daily log returns
    #[arg(long, value_enum, default_value_t = CovarianceChoice::Population)]
    covariance: CovarianceChoice,

    /// Write the full result table and optimal portfolios as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,

    /// Skip the terminal summary
    #[arg(long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("portfolio_sim=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    config::init_cpu_parallelism();

    let args = Args::parse();
    let defaults = RunDefaults::from_env();

    let params = SimulationParams {
        num_portfolios: args.portfolios.unwrap_or(defaults.num_portfolios),
        risk_free_rate: args.risk_free_rate.unwrap_or(defaults.risk_free_rate),
        seed: args.seed.unwrap_or(defaults.seed),
        covariance: args.covariance.into(),
        ..SimulationParams::default()
    };

    let window = DateWindow::new(args.start, args.end)?;
    let prices = data::load_price_csv(&args.prices, window)?;

    let table = match simulate_with(&prices, &params) {
        Ok(table) => table,
        Err(e) => {
            error!("Simulation failed: {}", e);
            return Err(e.into());
        }
    };
    let optimal = select_optimal(&table)?;

    if !args.quiet {
        report::print_summary(&table, &optimal, params.risk_free_rate);
    }

    if let Some(path) = args.json {
        let json = SimulationReport::from_parts(&table, &optimal).to_json()?;
        std::fs::write(&path, json)?;
        info!("Wrote simulation report to {:?}", path);
    }

    Ok(())
}
