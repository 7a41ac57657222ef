//! # Monte Carlo (GBM)
//!
//! $$
//! V_t = V_{t-1}\exp\!\left(\left(\mu-\tfrac12\sigma^2\right)+\sigma Z_t\right),\quad Z_t\sim\mathcal N(0,1)
//! $$
//!
//! Daily drift and volatility are estimated from the realized weighted
//! portfolio series, then adjusted by the return and volatility tilts.

use ndarray::s;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::Zip;
use ndarray_rand::RandomExt;
use rand_distr::StandardNormal;
use tracing::debug;

use super::portfolio_series;
use super::seeded_rng;
use super::validate_common;
use super::PathModel;
use super::SimulationResult;
use crate::cancel::CancelToken;
use crate::data::mean_of;
use crate::data::std_of;
use crate::data::ReturnMatrix;
use crate::data::WeightVector;
use crate::data::PERIODS_PER_YEAR;
use crate::error::Result;

/// Parameters of a GBM Monte Carlo run.
#[derive(Clone, Debug, PartialEq)]
pub struct GbmConfig {
  /// Portfolio value at day 0.
  pub initial_value: f64,
  /// Number of simulated days.
  pub horizon_days: usize,
  /// Number of simulated paths.
  pub n_simulations: usize,
  /// Additive adjustment to the annualized expected return.
  pub return_tilt: f64,
  /// Multiplicative adjustment to the daily volatility.
  pub volatility_tilt: f64,
  /// Seed for reproducible draws; `None` seeds from OS entropy.
  pub seed: Option<u64>,
}

impl Default for GbmConfig {
  fn default() -> Self {
    Self {
      initial_value: 10_000.0,
      horizon_days: 252,
      n_simulations: 1000,
      return_tilt: 0.0,
      volatility_tilt: 1.0,
      seed: None,
    }
  }
}

impl PathModel for GbmConfig {
  fn simulate_with_cancel(
    &self,
    matrix: &ReturnMatrix,
    weights: &WeightVector,
    cancel: &CancelToken,
  ) -> Result<SimulationResult> {
    validate_common(self.initial_value, self.n_simulations)?;

    let n = self.n_simulations;
    let width = self.horizon_days + 1;

    let Some(series) = portfolio_series(matrix, weights)? else {
      debug!("no weighted asset overlaps the return matrix, returning zero paths");
      return Ok(SimulationResult::from_paths(Array2::zeros((n, width))));
    };

    let mu = mean_of(series.view()) + self.return_tilt / PERIODS_PER_YEAR;
    let sigma = std_of(series.view(), 1) * self.volatility_tilt;
    let drift = mu - 0.5 * sigma * sigma;

    debug!(
      mu,
      sigma,
      n_simulations = n,
      horizon_days = self.horizon_days,
      "running GBM Monte Carlo"
    );

    let mut rng = seeded_rng(self.seed);
    let mut paths = Array2::<f64>::zeros((n, width));
    paths.column_mut(0).fill(self.initial_value);

    for t in 1..width {
      cancel.check()?;
      let (prev, mut next) = paths.multi_slice_mut((s![.., t - 1], s![.., t]));

      if sigma == 0.0 {
        let growth = drift.exp();
        Zip::from(&mut next)
          .and(&prev)
          .par_for_each(|v, &p| *v = p * growth);
      } else {
        let shocks = Array1::<f64>::random_using(n, StandardNormal, &mut rng);
        Zip::from(&mut next)
          .and(&prev)
          .and(&shocks)
          .par_for_each(|v, &p, &z| *v = p * (drift + sigma * z).exp());
      }
    }

    Ok(SimulationResult::from_paths(paths))
  }
}

/// GBM Monte Carlo simulation of the weighted portfolio.
pub fn monte_carlo_gbm(
  matrix: &ReturnMatrix,
  weights: &WeightVector,
  config: &GbmConfig,
) -> Result<SimulationResult> {
  config.simulate(matrix, weights)
}

/// [`monte_carlo_gbm`] polling `cancel` once per simulated day.
pub fn monte_carlo_gbm_with_cancel(
  matrix: &ReturnMatrix,
  weights: &WeightVector,
  config: &GbmConfig,
  cancel: &CancelToken,
) -> Result<SimulationResult> {
  config.simulate_with_cancel(matrix, weights, cancel)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use approx::assert_relative_eq;

  use super::*;
  use crate::error::PortfolioError;

  fn matrix() -> ReturnMatrix {
    ReturnMatrix::from_columns(vec![
      ("A", vec![0.010, -0.004, 0.006, 0.002, -0.008, 0.012, 0.001, -0.003]),
      ("B", vec![0.002, 0.001, -0.001, 0.003, 0.000, -0.002, 0.004, 0.001]),
    ])
    .unwrap()
  }

  fn weights() -> WeightVector {
    [("A", 0.6), ("B", 0.4)].into_iter().collect()
  }

  fn config() -> GbmConfig {
    GbmConfig {
      initial_value: 1000.0,
      horizon_days: 30,
      n_simulations: 500,
      seed: Some(7),
      ..GbmConfig::default()
    }
  }

  #[test]
  fn fixed_seed_reproduces_terminal_statistics() {
    let first = monte_carlo_gbm(&matrix(), &weights(), &config()).unwrap();
    let second = monte_carlo_gbm(&matrix(), &weights(), &config()).unwrap();

    assert_eq!(first.terminal, second.terminal);
    assert_eq!(first.paths, second.paths);
  }

  #[test]
  fn paths_have_expected_shape_and_start() {
    let result = monte_carlo_gbm(&matrix(), &weights(), &config()).unwrap();
    assert_eq!(result.paths.dim(), (500, 31));
    assert!(result.paths.column(0).iter().all(|&v| v == 1000.0));
    assert!(result.paths.iter().all(|&v| v > 0.0));
  }

  #[test]
  fn different_seeds_diverge() {
    let a = monte_carlo_gbm(&matrix(), &weights(), &config()).unwrap();
    let b = monte_carlo_gbm(
      &matrix(),
      &weights(),
      &GbmConfig {
        seed: Some(8),
        ..config()
      },
    )
    .unwrap();
    assert_ne!(a.paths, b.paths);
  }

  #[test]
  fn zero_volatility_is_deterministic_drift() {
    let flat = ReturnMatrix::from_columns(vec![("A", vec![0.001; 10])]).unwrap();
    let w: WeightVector = [("A", 1.0)].into_iter().collect();
    let result = monte_carlo_gbm(&flat, &w, &GbmConfig { seed: None, ..config() }).unwrap();

    let expected = 1000.0 * (0.001_f64 * 30.0).exp();
    for &v in result.terminal_values().iter() {
      assert_relative_eq!(v, expected, max_relative = 1e-12);
    }
    assert_abs_diff_eq!(result.terminal.std, 0.0, epsilon = 1e-9);
  }

  #[test]
  fn no_overlap_returns_zero_paths() {
    let w: WeightVector = [("MISSING", 1.0)].into_iter().collect();
    let result = monte_carlo_gbm(&matrix(), &w, &config()).unwrap();
    assert_eq!(result.paths.dim(), (500, 31));
    assert!(result.paths.iter().all(|&v| v == 0.0));
    assert_eq!(result.terminal.max, 0.0);
  }

  #[test]
  fn return_tilt_shifts_the_distribution_up() {
    let base = monte_carlo_gbm(&matrix(), &weights(), &config()).unwrap();
    let tilted = monte_carlo_gbm(
      &matrix(),
      &weights(),
      &GbmConfig {
        return_tilt: 0.5,
        ..config()
      },
    )
    .unwrap();
    assert!(tilted.terminal.mean > base.terminal.mean);
  }

  #[test]
  fn cancelled_token_stops_the_run() {
    let token = CancelToken::new();
    token.cancel();
    let err = monte_carlo_gbm_with_cancel(&matrix(), &weights(), &config(), &token).unwrap_err();
    assert_eq!(err, PortfolioError::Cancelled);
  }

  #[test]
  fn zero_simulations_is_rejected() {
    let err = monte_carlo_gbm(
      &matrix(),
      &weights(),
      &GbmConfig {
        n_simulations: 0,
        ..config()
      },
    )
    .unwrap_err();
    assert!(matches!(err, PortfolioError::InvalidArgument { .. }));
  }
}
