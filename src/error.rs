use thiserror::Error;

/// Result alias for the simulation core.
pub type Result<T> = std::result::Result<T, SimulationError>;

/// Failures raised by the simulation core.
///
/// Input problems are always reported before any numeric work starts, so a
/// caller never sees a partially computed table alongside an error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    /// A derived statistic came out NaN or infinite.
    #[error("non-finite {statistic} at index {index}: {value}")]
    Computation {
        statistic: &'static str,
        index: usize,
        value: f64,
    },

    #[error("cannot select an optimal portfolio from an empty result table")]
    EmptyResult,
}

impl SimulationError {
    pub fn computation(statistic: &'static str, index: usize, value: f64) -> Self {
        Self::Computation {
            statistic,
            index,
            value,
        }
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

/// The specific reason an input was rejected, with the offending value or
/// dimension so the caller can phrase its own message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("price matrix has no data")]
    EmptyMatrix,

    #[error("need at least {required} assets, got {found}")]
    TooFewAssets { required: usize, found: usize },

    #[error("need at least {required} dates, got {found}")]
    TooFewDates { required: usize, found: usize },

    #[error("series for {symbol} has {found} prices, expected {expected}")]
    SeriesLengthMismatch {
        symbol: String,
        expected: usize,
        found: usize,
    },

    #[error("price for {symbol} at row {row} is not positive: {value}")]
    NonPositivePrice {
        symbol: String,
        row: usize,
        value: f64,
    },

    #[error("price for {symbol} at row {row} is not finite: {value}")]
    NonFinitePrice {
        symbol: String,
        row: usize,
        value: f64,
    },

    #[error("dates must be strictly increasing (row {row})")]
    DatesNotIncreasing { row: usize },

    #[error("symbol {0} appears more than once")]
    DuplicateSymbol(String),

    #[error("number of portfolios must be positive")]
    ZeroPortfolios,

    #[error("risk-free rate must be finite, got {0}")]
    NonFiniteRiskFreeRate(f64),
}
