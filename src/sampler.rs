use crate::data::MIN_ASSETS;
use crate::error::{InputError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded generator of long-only, fully-invested weight vectors.
///
/// Each vector is `n` independent uniform draws in `[0, 1)` divided by their
/// sum. This leans towards the interior of the simplex rather than covering
/// it uniformly; runs with the same seed reproduce the same sequence.
pub struct PortfolioSampler {
    num_assets: usize,
    rng: StdRng,
}

impl PortfolioSampler {
    pub fn new(num_assets: usize, seed: u64) -> Result<Self> {
        if num_assets < MIN_ASSETS {
            return Err(InputError::TooFewAssets {
                required: MIN_ASSETS,
                found: num_assets,
            }
            .into());
        }
        Ok(Self {
            num_assets,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn num_assets(&self) -> usize {
        self.num_assets
    }

    pub fn next_weights(&mut self) -> Vec<f64> {
        loop {
            let raw: Vec<f64> = (0..self.num_assets)
                .map(|_| self.rng.gen_range(0.0..1.0))
                .collect();
            let sum: f64 = raw.iter().sum();
            // All-zero draw cannot be normalized; draw again.
            if sum > 0.0 {
                return raw.iter().map(|v| v / sum).collect();
            }
        }
    }

    /// Draws exactly `count` weight vectors in generation order.
    pub fn sample(&mut self, count: usize) -> Result<Vec<Vec<f64>>> {
        if count == 0 {
            return Err(InputError::ZeroPortfolios.into());
        }
        Ok((0..count).map(|_| self.next_weights()).collect())
    }
}
