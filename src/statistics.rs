use crate::config::{CovarianceConvention, TRADING_DAYS};
use crate::data::PriceMatrix;
use crate::error::{InputError, Result, SimulationError};
use tracing::debug;

/// Per-asset mean daily log return and annualized covariance of log returns.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnStatistics {
    pub mean_returns: Vec<f64>,
    /// Symmetric n×n matrix, already scaled by [`TRADING_DAYS`].
    pub covariance: Vec<Vec<f64>>,
}

impl ReturnStatistics {
    pub fn from_prices(prices: &PriceMatrix) -> Result<Self> {
        Self::with_convention(prices, CovarianceConvention::default())
    }

    pub fn with_convention(prices: &PriceMatrix, convention: CovarianceConvention) -> Result<Self> {
        prices.validate()?;

        let num_returns = prices.num_dates() - 1;
        let ddof = convention.ddof();
        if num_returns <= ddof {
            return Err(InputError::TooFewDates {
                required: ddof + 2,
                found: prices.num_dates(),
            }
            .into());
        }

        let returns = prices.log_returns();
        let (means, cov) = compute_return_statistics(&returns, ddof);

        for (i, &m) in means.iter().enumerate() {
            if !m.is_finite() {
                return Err(SimulationError::computation("mean return", i, m));
            }
        }

        let n = means.len();
        for (i, row) in cov.iter().enumerate() {
            for (j, &c) in row.iter().enumerate() {
                if !c.is_finite() {
                    return Err(SimulationError::computation("covariance", i * n + j, c));
                }
            }
        }

        debug!(
            "Return statistics for {} assets over {} returns ({:?} covariance)",
            n, num_returns, convention
        );

        Ok(Self {
            mean_returns: means,
            covariance: cov,
        })
    }

    pub fn num_assets(&self) -> usize {
        self.mean_returns.len()
    }

    /// Weighted sum of mean daily log returns.
    pub fn portfolio_mean_return(&self, weights: &[f64]) -> f64 {
        portfolio_return(weights, &self.mean_returns)
    }

    /// Annualized portfolio variance `wᵀ Σ w`.
    pub fn portfolio_variance(&self, weights: &[f64]) -> f64 {
        portfolio_variance(weights, &self.covariance)
    }

    /// Largest absolute covariance entry, used to scale rounding tolerances.
    pub fn covariance_scale(&self) -> f64 {
        self.covariance
            .iter()
            .flatten()
            .fold(0.0f64, |acc, c| acc.max(c.abs()))
    }
}

/// Means and annualized covariance of per-asset return series of equal length.
fn compute_return_statistics(returns: &[Vec<f64>], ddof: usize) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = returns.len();
    let num_obs = returns[0].len();

    let means: Vec<f64> = returns
        .iter()
        .map(|r| r.iter().sum::<f64>() / num_obs as f64)
        .collect();

    let denom = (num_obs - ddof) as f64;
    let mut cov = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let mut sum = 0.0;
            for k in 0..num_obs {
                let di = returns[i][k] - means[i];
                let dj = returns[j][k] - means[j];
                sum += di * dj;
            }
            let covariance = sum / denom * TRADING_DAYS;
            cov[i][j] = covariance;
            cov[j][i] = covariance;
        }
    }

    (means, cov)
}

pub(crate) fn portfolio_return(weights: &[f64], means: &[f64]) -> f64 {
    weights.iter().zip(means.iter()).map(|(w, r)| w * r).sum()
}

pub(crate) fn portfolio_variance(weights: &[f64], cov: &[Vec<f64>]) -> f64 {
    let n = weights.len();
    let mut var = 0.0;
    for i in 0..n {
        for j in 0..n {
            var += weights[i] * weights[j] * cov[i][j];
        }
    }
    var
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::{daily_dates, linear_two_asset_matrix};

    fn three_asset_with_constant() -> PriceMatrix {
        PriceMatrix::new(
            daily_dates(6),
            vec![
                ("UP".into(), vec![10.0, 11.0, 10.5, 12.0, 12.5, 13.0]),
                ("FLAT".into(), vec![50.0; 6]),
                ("DOWN".into(), vec![20.0, 19.0, 19.5, 18.0, 18.2, 17.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_covariance_matrix_symmetry() {
        let stats = ReturnStatistics::from_prices(&three_asset_with_constant()).unwrap();
        assert_eq!(stats.num_assets(), 3);
        for i in 0..3 {
            assert!(stats.covariance[i][i] >= 0.0, "Variance should be non-negative");
            for j in 0..3 {
                assert!(
                    (stats.covariance[i][j] - stats.covariance[j][i]).abs() < 1e-12,
                    "Covariance matrix should be symmetric"
                );
            }
        }
    }

    #[test]
    fn test_constant_asset_has_zero_row() {
        let stats = ReturnStatistics::from_prices(&three_asset_with_constant()).unwrap();
        assert_eq!(stats.mean_returns[1], 0.0);
        for j in 0..3 {
            assert_eq!(stats.covariance[1][j], 0.0);
            assert_eq!(stats.covariance[j][1], 0.0);
        }
        assert!(stats.covariance[0][0] > 0.0);
    }

    #[test]
    fn test_population_covariance_matches_hand_computation() {
        let matrix = PriceMatrix::new(
            daily_dates(3),
            vec![
                ("A".into(), vec![100.0, 110.0, 99.0]),
                ("B".into(), vec![50.0, 50.0, 55.0]),
            ],
        )
        .unwrap();
        let stats = ReturnStatistics::from_prices(&matrix).unwrap();

        let ra = [(110.0f64 / 100.0).ln(), (99.0f64 / 110.0).ln()];
        let rb = [0.0, (55.0f64 / 50.0).ln()];
        let ma = (ra[0] + ra[1]) / 2.0;
        let mb = (rb[0] + rb[1]) / 2.0;
        let var_a = ((ra[0] - ma).powi(2) + (ra[1] - ma).powi(2)) / 2.0 * 252.0;
        let cov_ab = ((ra[0] - ma) * (rb[0] - mb) + (ra[1] - ma) * (rb[1] - mb)) / 2.0 * 252.0;

        assert!((stats.mean_returns[0] - ma).abs() < 1e-15);
        assert!((stats.covariance[0][0] - var_a).abs() < 1e-12);
        assert!((stats.covariance[0][1] - cov_ab).abs() < 1e-12);
    }

    #[test]
    fn test_sample_convention_scales_by_n_minus_one() {
        let matrix = three_asset_with_constant();
        let pop = ReturnStatistics::with_convention(&matrix, CovarianceConvention::Population).unwrap();
        let sample = ReturnStatistics::with_convention(&matrix, CovarianceConvention::Sample).unwrap();
        // 5 returns: sample = population * 5 / 4
        let ratio = sample.covariance[0][0] / pop.covariance[0][0];
        assert!((ratio - 1.25).abs() < 1e-12);
        assert_eq!(pop.mean_returns, sample.mean_returns);
    }

    #[test]
    fn test_sample_convention_needs_two_returns() {
        let matrix = PriceMatrix::new(
            daily_dates(2),
            vec![("A".into(), vec![1.0, 2.0]), ("B".into(), vec![3.0, 4.0])],
        )
        .unwrap();
        assert!(ReturnStatistics::with_convention(&matrix, CovarianceConvention::Population).is_ok());
        let err = ReturnStatistics::with_convention(&matrix, CovarianceConvention::Sample).unwrap_err();
        assert_eq!(
            err,
            SimulationError::InvalidInput(InputError::TooFewDates { required: 3, found: 2 })
        );
    }

    #[test]
    fn test_portfolio_variance_calculation() {
        let stats = ReturnStatistics::from_prices(&linear_two_asset_matrix()).unwrap();
        let equal_w = vec![0.5; 2];
        let var = stats.portfolio_variance(&equal_w);
        assert!(var >= 0.0, "Portfolio variance should be non-negative");
        assert!(stats.portfolio_mean_return(&equal_w) > 0.0);
    }
}
