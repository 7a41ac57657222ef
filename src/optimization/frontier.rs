//! # Efficient Frontier
//!
//! $$
//! \sigma^\*(r^\*) = \min_{\mathbf w\in\Delta,\ \boldsymbol\mu^\top\mathbf w\ge r^\*}\sqrt{\mathbf w^\top\Sigma\mathbf w},
//! \qquad r^\*\in\operatorname{linspace}(\min_i\mu_i,\ \max_i\mu_i)
//! $$
//!
//! Minimum-variance portfolios across equally spaced return targets.

use ndarray::Array1;
use rayon::prelude::*;
use tracing::debug;
use tracing::warn;

use super::performance::PerformanceMetrics;
use super::qp::SimplexQp;
use super::qp::SolverSettings;
use crate::cancel::CancelToken;
use crate::data::ReturnMatrix;
use crate::data::WeightVector;
use crate::error::Result;
use crate::estimators::ReturnMethod;
use crate::estimators::StatisticsBundle;

#[derive(Clone, Debug, PartialEq)]
pub struct FrontierConfig {
  /// Number of return targets.
  pub n_points: usize,
  pub risk_free_rate: f64,
  pub return_method: ReturnMethod,
  pub solver: SolverSettings,
}

impl Default for FrontierConfig {
  fn default() -> Self {
    Self {
      n_points: 50,
      risk_free_rate: 0.02,
      return_method: ReturnMethod::Mean,
      solver: SolverSettings::default(),
    }
  }
}

/// One solved target on the frontier.
#[derive(Clone, Debug, PartialEq)]
pub struct FrontierPoint {
  pub target_return: f64,
  pub expected_return: f64,
  pub volatility: f64,
  pub sharpe: f64,
  /// Solver weights over every asset, unpruned.
  pub weights: WeightVector,
}

/// Solved frontier points in non-decreasing target order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrontierCurve {
  pub points: Vec<FrontierPoint>,
}

impl FrontierCurve {
  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  pub fn returns(&self) -> Vec<f64> {
    self.points.iter().map(|p| p.expected_return).collect()
  }

  pub fn volatilities(&self) -> Vec<f64> {
    self.points.iter().map(|p| p.volatility).collect()
  }

  pub fn sharpes(&self) -> Vec<f64> {
    self.points.iter().map(|p| p.sharpe).collect()
  }
}

pub fn efficient_frontier(matrix: &ReturnMatrix, config: &FrontierConfig) -> Result<FrontierCurve> {
  efficient_frontier_with_cancel(matrix, config, &CancelToken::new())
}

/// [`efficient_frontier`] polling `cancel` before each target.
pub fn efficient_frontier_with_cancel(
  matrix: &ReturnMatrix,
  config: &FrontierConfig,
  cancel: &CancelToken,
) -> Result<FrontierCurve> {
  let stats = StatisticsBundle::estimate(matrix, config.return_method)?;
  efficient_frontier_from_stats(&stats, config, cancel)
}

/// Frontier over pre-estimated statistics.
///
/// Targets the solver cannot satisfy are omitted; no smoothing or monotone
/// filtering is applied to what remains.
pub fn efficient_frontier_from_stats(
  stats: &StatisticsBundle,
  config: &FrontierConfig,
  cancel: &CancelToken,
) -> Result<FrontierCurve> {
  let mu = &stats.expected_returns;
  if config.n_points == 0 || mu.is_empty() {
    return Ok(FrontierCurve::default());
  }

  let lo = mu.iter().copied().fold(f64::INFINITY, f64::min);
  let hi = mu.iter().copied().fold(f64::NEG_INFINITY, f64::max);
  let targets = Array1::linspace(lo, hi, config.n_points).to_vec();

  debug!(
    n_points = config.n_points,
    min_target = lo,
    max_target = hi,
    "sweeping efficient frontier"
  );

  let solved: Vec<Option<FrontierPoint>> = targets
    .par_iter()
    .map(|&target| -> Result<Option<FrontierPoint>> {
      cancel.check()?;

      let weights = match SimplexQp::new(stats.covariance.view(), Array1::zeros(mu.len()))
        .with_return_floor(mu.view(), target)
        .solve(&config.solver)
      {
        Ok(w) => w,
        Err(failure) => {
          warn!(target_return = target, %failure, "skipping frontier point");
          return Ok(None);
        }
      };

      let metrics = PerformanceMetrics::evaluate(
        weights.view(),
        mu.view(),
        stats.covariance.view(),
        config.risk_free_rate,
      )?;

      Ok(Some(FrontierPoint {
        target_return: target,
        expected_return: metrics.expected_return,
        volatility: metrics.volatility,
        sharpe: metrics.sharpe,
        weights: stats
          .assets
          .iter()
          .cloned()
          .zip(weights.iter().copied())
          .collect(),
      }))
    })
    .collect::<Result<Vec<_>>>()?;

  Ok(FrontierCurve {
    points: solved.into_iter().flatten().collect(),
  })
}
