//! Monte Carlo portfolio simulation.
//!
//! Samples random long-only weight vectors over a basket of assets, scores
//! each by annualized return, volatility and Sharpe ratio, and picks out the
//! max-Sharpe, min-variance and max-return portfolios.

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod report;
pub mod sampler;
pub mod selector;
pub mod statistics;

pub use data::PriceMatrix;
pub use engine::{PortfolioSample, ResultTable, SimulationParams, simulate, simulate_with};
pub use error::{InputError, Result, SimulationError};
pub use sampler::PortfolioSampler;
pub use selector::{OptimalPortfolio, OptimalSet, select_optimal};
pub use statistics::ReturnStatistics;
