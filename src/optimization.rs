//! # Optimization Engine
//!
//! $$
//! \min_{\mathbf w \in \Delta}\ \mathbf w^\top\Sigma\mathbf w
//! \qquad
//! \max_{\mathbf w \in \Delta}\ \boldsymbol\mu^\top\mathbf w - \tfrac{\lambda}{2}\mathbf w^\top\Sigma\mathbf w
//! $$
//!
//! Long-only, fully-invested mean-variance allocation: minimum variance,
//! quadratic-utility "maximum Sharpe", exact tangency search, the efficient
//! frontier sweep and performance evaluation of arbitrary weights.

pub mod engine;
pub mod frontier;
pub mod optimizers;
pub mod performance;
pub mod qp;

use std::str::FromStr;

use ndarray::Array1;

pub use engine::AllocationComparison;
pub use engine::EngineConfig;
pub use engine::PortfolioEngine;
pub use frontier::efficient_frontier;
pub use frontier::efficient_frontier_from_stats;
pub use frontier::efficient_frontier_with_cancel;
pub use frontier::FrontierConfig;
pub use frontier::FrontierCurve;
pub use frontier::FrontierPoint;
pub use optimizers::optimize;
pub use optimizers::optimize_max_sharpe;
pub use optimizers::optimize_min_variance;
pub use optimizers::optimize_stats;
pub use optimizers::optimize_tangency;
pub use performance::portfolio_performance;
pub use performance::PerformanceMetrics;
pub use qp::SimplexQp;
pub use qp::SolverSettings;

use crate::data::WeightVector;
use crate::error::PortfolioError;
use crate::estimators::ReturnMethod;

/// Weights below this are dropped from optimized allocations.
pub const DEFAULT_WEIGHT_FLOOR: f64 = 1e-4;

/// Allocation objective.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Objective {
  /// Minimize `wᵀΣw`.
  #[default]
  MinVariance,
  /// Maximize `μᵀw − ½λwᵀΣw` (tangency approximation).
  MaxSharpe,
  /// Maximize `(μᵀw − r_f)/√(wᵀΣw)` directly.
  Tangency,
}

impl FromStr for Objective {
  type Err = PortfolioError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "min-variance" | "min_variance" | "minvariance" | "minvar" => Ok(Self::MinVariance),
      "max-sharpe" | "max_sharpe" | "maxsharpe" | "sharpe" => Ok(Self::MaxSharpe),
      "tangency" | "exact-sharpe" => Ok(Self::Tangency),
      other => Err(PortfolioError::invalid_argument(
        "objective",
        format!("unknown objective '{other}'"),
      )),
    }
  }
}

/// Inputs shared by the single-portfolio optimizers.
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizerConfig {
  /// Annual risk-free rate used in Sharpe ratios.
  pub risk_free_rate: f64,
  /// Expected-return estimator.
  pub return_method: ReturnMethod,
  /// `λ` of the quadratic utility.
  pub risk_aversion: f64,
  /// Optional `μᵀw ≥ target` constraint for the quadratic-utility solve.
  pub target_return: Option<f64>,
  /// Pruning threshold applied after the solve.
  pub weight_floor: f64,
  pub solver: SolverSettings,
}

impl Default for OptimizerConfig {
  fn default() -> Self {
    Self {
      risk_free_rate: 0.02,
      return_method: ReturnMethod::Mean,
      risk_aversion: 1.0,
      target_return: None,
      weight_floor: DEFAULT_WEIGHT_FLOOR,
      solver: SolverSettings::default(),
    }
  }
}

/// Optimized allocation and its modeled performance.
///
/// The default value is the empty result a caller substitutes for a failed solve.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptimizationResult {
  /// Non-negative weights summing to one, tiny positions removed.
  pub weights: WeightVector,
  pub performance: PerformanceMetrics,
}

impl OptimizationResult {
  pub fn is_empty(&self) -> bool {
    self.weights.is_empty()
  }
}

/// Zero out weights below `floor` and renormalize the rest to sum to one.
pub(crate) fn prune_weights(weights: &Array1<f64>, floor: f64) -> Array1<f64> {
  let kept = weights.mapv(|w| if w < floor { 0.0 } else { w });
  let total = kept.sum();
  if total > 0.0 {
    kept / total
  } else {
    weights.clone()
  }
}
