//! # Historical Bootstrap
//!
//! $$
//! V_t = V_{t-1}\,(1+r^\*_t),\qquad r^\*_t \sim \{r_1,\dots,r_T\}
//! $$
//!
//! Resamples the realized portfolio return series with replacement, either
//! one observation at a time or in contiguous blocks that preserve serial
//! correlation.

use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayViewMut1;
use ndarray::Zip;
use rand::Rng;
use tracing::debug;

use super::portfolio_series;
use super::seeded_rng;
use super::validate_common;
use super::PathModel;
use super::SimulationResult;
use crate::cancel::CancelToken;
use crate::data::ReturnMatrix;
use crate::data::WeightVector;
use crate::error::PortfolioError;
use crate::error::Result;

/// Paths drawn between cancellation checks.
const CANCEL_CHECK_STRIDE: usize = 256;

/// Parameters of a historical bootstrap run.
#[derive(Clone, Debug, PartialEq)]
pub struct BootstrapConfig {
  /// Portfolio value at day 0.
  pub initial_value: f64,
  /// Number of simulated days.
  pub horizon_days: usize,
  /// Number of simulated paths.
  pub n_simulations: usize,
  /// Contiguous block length; `1` resamples single observations.
  pub block_size: usize,
  /// Seed for reproducible draws; `None` seeds from OS entropy.
  pub seed: Option<u64>,
}

impl Default for BootstrapConfig {
  fn default() -> Self {
    Self {
      initial_value: 10_000.0,
      horizon_days: 252,
      n_simulations: 1000,
      block_size: 1,
      seed: None,
    }
  }
}

impl PathModel for BootstrapConfig {
  fn simulate_with_cancel(
    &self,
    matrix: &ReturnMatrix,
    weights: &WeightVector,
    cancel: &CancelToken,
  ) -> Result<SimulationResult> {
    validate_common(self.initial_value, self.n_simulations)?;
    if self.block_size == 0 {
      return Err(PortfolioError::invalid_argument(
        "block_size",
        "block size must be at least 1",
      ));
    }

    let n = self.n_simulations;
    let horizon = self.horizon_days;

    let Some(series) = portfolio_series(matrix, weights)? else {
      debug!("no weighted asset overlaps the return matrix, returning zero paths");
      return Ok(SimulationResult::from_paths(Array2::zeros((n, horizon + 1))));
    };

    if self.block_size > series.len() {
      return Err(PortfolioError::InsufficientData {
        observations: series.len(),
        assets: weights.len(),
      });
    }

    debug!(
      observations = series.len(),
      block_size = self.block_size,
      n_simulations = n,
      horizon_days = horizon,
      "running historical bootstrap"
    );

    let mut rng = seeded_rng(self.seed);
    let mut sampled = Array2::<f64>::zeros((n, horizon));
    for (sim, row) in sampled.rows_mut().into_iter().enumerate() {
      if sim % CANCEL_CHECK_STRIDE == 0 {
        cancel.check()?;
      }
      fill_resampled(row, series.view(), self.block_size, &mut rng);
    }

    let mut paths = Array2::<f64>::zeros((n, horizon + 1));
    let initial_value = self.initial_value;
    Zip::from(paths.rows_mut())
      .and(sampled.rows())
      .par_for_each(|mut path, returns| {
        let mut value = initial_value;
        path[0] = value;
        for (t, &r) in returns.iter().enumerate() {
          value *= 1.0 + r;
          path[t + 1] = value;
        }
      });

    Ok(SimulationResult::from_paths(paths))
  }
}

/// Fill `out` with returns drawn from `series`, in blocks of `block_size`.
///
/// Block starts are drawn only where a full block fits; the last block is
/// truncated to the remaining length of `out`.
fn fill_resampled<R: Rng + ?Sized>(
  mut out: ArrayViewMut1<f64>,
  series: ArrayView1<f64>,
  block_size: usize,
  rng: &mut R,
) {
  let len = out.len();
  if block_size == 1 {
    for slot in out.iter_mut() {
      *slot = series[rng.gen_range(0..series.len())];
    }
    return;
  }

  let n_starts = series.len() - block_size + 1;
  let mut filled = 0;
  while filled < len {
    let start = rng.gen_range(0..n_starts);
    let take = block_size.min(len - filled);
    for k in 0..take {
      out[filled + k] = series[start + k];
    }
    filled += take;
  }
}

/// Historical bootstrap simulation of the weighted portfolio.
pub fn historical_bootstrap(
  matrix: &ReturnMatrix,
  weights: &WeightVector,
  config: &BootstrapConfig,
) -> Result<SimulationResult> {
  config.simulate(matrix, weights)
}

/// [`historical_bootstrap`] polling `cancel` between batches of paths.
pub fn historical_bootstrap_with_cancel(
  matrix: &ReturnMatrix,
  weights: &WeightVector,
  config: &BootstrapConfig,
  cancel: &CancelToken,
) -> Result<SimulationResult> {
  config.simulate_with_cancel(matrix, weights, cancel)
}
