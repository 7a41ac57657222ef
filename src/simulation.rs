//! # Simulation Engine
//!
//! $$
//! V_t = V_{t-1}\exp\!\left(\mu-\tfrac12\sigma^2+\sigma Z_t\right)
//! \quad\text{or}\quad V_t = V_{t-1}(1+r^\*_t)
//! $$
//!
//! Forward simulation of portfolio value under Geometric Brownian Motion and
//! historical (block) bootstrap resampling, plus percentile bands over the
//! simulated paths.
//!
//! ## Reproducibility
//!
//! Every call owns one seeded [`StdRng`]. Random numbers are drawn on the
//! calling thread in a fixed order (day by day for GBM, path by path for the
//! bootstrap); only the arithmetic on pre-drawn numbers runs on the rayon
//! pool, so a fixed seed yields identical paths for any thread count.

pub mod bands;
pub mod bootstrap;
pub mod gbm;

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use rand::rngs::StdRng;
use rand::SeedableRng;

pub use bands::percentile_bands;
pub use bands::PercentileBands;
pub use bands::DEFAULT_PERCENTILES;
pub use bootstrap::historical_bootstrap;
pub use bootstrap::historical_bootstrap_with_cancel;
pub use bootstrap::BootstrapConfig;
pub use gbm::monte_carlo_gbm;
pub use gbm::monte_carlo_gbm_with_cancel;
pub use gbm::GbmConfig;

use crate::cancel::CancelToken;
use crate::data::mean_of;
use crate::data::percentile_sorted;
use crate::data::sort_ascending;
use crate::data::std_of;
use crate::data::ReturnMatrix;
use crate::data::WeightVector;
use crate::error::PortfolioError;
use crate::error::Result;

/// A stochastic model of portfolio value paths.
pub trait PathModel: Send + Sync {
  /// Simulate paths, polling `cancel` between steps.
  fn simulate_with_cancel(
    &self,
    matrix: &ReturnMatrix,
    weights: &WeightVector,
    cancel: &CancelToken,
  ) -> Result<SimulationResult>;

  fn simulate(&self, matrix: &ReturnMatrix, weights: &WeightVector) -> Result<SimulationResult> {
    self.simulate_with_cancel(matrix, weights, &CancelToken::new())
  }
}

/// Distribution summary of terminal portfolio values.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TerminalStatistics {
  pub mean: f64,
  pub median: f64,
  /// Population standard deviation.
  pub std: f64,
  pub p10: f64,
  pub p25: f64,
  pub p50: f64,
  pub p75: f64,
  pub p90: f64,
  pub min: f64,
  pub max: f64,
}

impl TerminalStatistics {
  pub fn from_values(values: &[f64]) -> Self {
    if values.is_empty() {
      return Self::default();
    }

    let mut sorted = values.to_vec();
    sort_ascending(&mut sorted);
    let median = percentile_sorted(&sorted, 50.0);

    Self {
      mean: mean_of(ArrayView1::from(&sorted)),
      median,
      std: std_of(ArrayView1::from(&sorted), 0),
      p10: percentile_sorted(&sorted, 10.0),
      p25: percentile_sorted(&sorted, 25.0),
      p50: median,
      p75: percentile_sorted(&sorted, 75.0),
      p90: percentile_sorted(&sorted, 90.0),
      min: sorted[0],
      max: sorted[sorted.len() - 1],
    }
  }
}

/// Simulated value paths and their terminal statistics.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationResult {
  /// `n_simulations × (horizon_days + 1)` value trajectories.
  pub paths: Array2<f64>,
  pub terminal: TerminalStatistics,
}

impl SimulationResult {
  pub fn from_paths(paths: Array2<f64>) -> Self {
    let terminal = match paths.ncols() {
      0 => TerminalStatistics::default(),
      w => TerminalStatistics::from_values(&paths.column(w - 1).to_vec()),
    };
    Self { paths, terminal }
  }

  pub fn n_simulations(&self) -> usize {
    self.paths.nrows()
  }

  pub fn horizon_days(&self) -> usize {
    self.paths.ncols().saturating_sub(1)
  }

  pub fn terminal_values(&self) -> Array1<f64> {
    match self.paths.ncols() {
      0 => Array1::zeros(0),
      w => self.paths.column(w - 1).to_owned(),
    }
  }
}

pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
  match seed {
    Some(seed) => StdRng::seed_from_u64(seed),
    None => StdRng::from_entropy(),
  }
}

/// Weighted portfolio return series, `None` when no weighted asset is in the matrix.
pub(crate) fn portfolio_series(
  matrix: &ReturnMatrix,
  weights: &WeightVector,
) -> Result<Option<Array1<f64>>> {
  if !weights.assets().any(|a| matrix.contains(a)) {
    return Ok(None);
  }

  let aligned = weights.align(matrix)?;
  let series = matrix.portfolio_returns(&aligned);
  if series.len() < 2 {
    return Err(PortfolioError::InsufficientData {
      observations: series.len(),
      assets: aligned.len(),
    });
  }
  Ok(Some(series))
}

pub(crate) fn validate_common(initial_value: f64, n_simulations: usize) -> Result<()> {
  if n_simulations == 0 {
    return Err(PortfolioError::invalid_argument(
      "n_simulations",
      "at least one simulation is required",
    ));
  }
  if !initial_value.is_finite() {
    return Err(PortfolioError::invalid_argument(
      "initial_value",
      "initial value must be finite",
    ));
  }
  Ok(())
}
