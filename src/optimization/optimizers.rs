//! # Portfolio Optimizers
//!
//! $$
//! \mathbf w^\*_{\text{mv}}=\arg\min_{\mathbf w\in\Delta}\mathbf w^\top\Sigma\mathbf w,\qquad
//! \mathbf w^\*_{\text{u}}=\arg\max_{\mathbf w\in\Delta}\boldsymbol\mu^\top\mathbf w-\tfrac{\lambda}{2}\mathbf w^\top\Sigma\mathbf w
//! $$
//!
//! Minimum variance and quadratic-utility allocations are exact simplex QPs.
//! The tangency search maximizes the Sharpe ratio itself with Nelder-Mead over
//! a softmax parameterization of the simplex.

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::solver::neldermead::NelderMead;
use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;

use super::performance::PerformanceMetrics;
use super::prune_weights;
use super::qp::SimplexQp;
use super::Objective;
use super::OptimizationResult;
use super::OptimizerConfig;
use crate::data::ReturnMatrix;
use crate::data::WeightVector;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::error::SolveFailure;
use crate::estimators::StatisticsBundle;

const TANGENCY_MAX_ITERS: u64 = 5000;

/// Long-only minimum-variance allocation.
pub fn optimize_min_variance(
  matrix: &ReturnMatrix,
  config: &OptimizerConfig,
) -> Result<OptimizationResult> {
  optimize(matrix, Objective::MinVariance, config)
}

/// Long-only quadratic-utility allocation (`λ = config.risk_aversion`).
///
/// Approximates the tangency portfolio; it does not maximize the Sharpe ratio
/// exactly. See [`optimize_tangency`] for the exact search.
pub fn optimize_max_sharpe(
  matrix: &ReturnMatrix,
  config: &OptimizerConfig,
) -> Result<OptimizationResult> {
  optimize(matrix, Objective::MaxSharpe, config)
}

/// Long-only allocation maximizing `(μᵀw − r_f)/σ_p`.
pub fn optimize_tangency(
  matrix: &ReturnMatrix,
  config: &OptimizerConfig,
) -> Result<OptimizationResult> {
  optimize(matrix, Objective::Tangency, config)
}

/// Estimate statistics from `matrix` and solve for `objective`.
pub fn optimize(
  matrix: &ReturnMatrix,
  objective: Objective,
  config: &OptimizerConfig,
) -> Result<OptimizationResult> {
  let stats = StatisticsBundle::estimate(matrix, config.return_method)?;
  optimize_stats(&stats, objective, config)
}

/// Solve for `objective` on pre-estimated statistics.
pub fn optimize_stats(
  stats: &StatisticsBundle,
  objective: Objective,
  config: &OptimizerConfig,
) -> Result<OptimizationResult> {
  let mu = &stats.expected_returns;
  let cov = &stats.covariance;

  debug!(?objective, n_assets = stats.n_assets(), "optimizing allocation");

  let raw = match objective {
    Objective::MinVariance => SimplexQp::new(cov.view(), Array1::zeros(mu.len()))
      .solve(&config.solver)
      .map_err(PortfolioError::from)?,
    Objective::MaxSharpe => {
      let lambda = config.risk_aversion;
      if !lambda.is_finite() || lambda < 0.0 {
        return Err(PortfolioError::invalid_argument(
          "risk_aversion",
          "risk aversion must be finite and non-negative",
        ));
      }
      let hessian = cov * lambda;
      let mut qp = SimplexQp::new(hessian.view(), -mu);
      if let Some(target) = config.target_return {
        qp = qp.with_return_floor(mu.view(), target);
      }
      qp.solve(&config.solver).map_err(PortfolioError::from)?
    }
    Objective::Tangency => tangency_weights(mu, cov, config.risk_free_rate)?,
  };

  finish(stats, &raw, config)
}

fn finish(
  stats: &StatisticsBundle,
  raw: &Array1<f64>,
  config: &OptimizerConfig,
) -> Result<OptimizationResult> {
  let w = prune_weights(raw, config.weight_floor);
  let performance = PerformanceMetrics::evaluate(
    w.view(),
    stats.expected_returns.view(),
    stats.covariance.view(),
    config.risk_free_rate,
  )?;

  let weights: WeightVector = stats
    .assets
    .iter()
    .zip(w.iter())
    .filter(|(_, &wi)| wi > 0.0)
    .map(|(asset, &wi)| (asset.clone(), wi))
    .collect();

  Ok(OptimizationResult {
    weights,
    performance,
  })
}

fn softmax(x: &[f64]) -> Vec<f64> {
  if x.is_empty() {
    return Vec::new();
  }

  let max_x = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
  let exps: Vec<f64> = x.iter().map(|&v| (v - max_x).exp()).collect();
  let sum: f64 = exps.iter().sum();

  if sum < 1e-15 {
    vec![1.0 / x.len() as f64; x.len()]
  } else {
    exps.iter().map(|&e| e / sum).collect()
  }
}

struct TangencyCost {
  mu: Array1<f64>,
  cov: Array2<f64>,
  risk_free: f64,
}

impl CostFunction for TangencyCost {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    let w = Array1::from(softmax(x));
    let vol = w.dot(&self.cov.dot(&w)).max(0.0).sqrt();
    if vol < 1e-12 {
      return Ok(1e10);
    }
    Ok(-(self.mu.dot(&w) - self.risk_free) / vol)
  }
}

fn tangency_weights(mu: &Array1<f64>, cov: &Array2<f64>, risk_free: f64) -> Result<Array1<f64>> {
  let n = mu.len();
  match n {
    0 => return Err(SolveFailure::Infeasible.into()),
    1 => return Ok(Array1::ones(1)),
    _ => {}
  }
  if cov.iter().any(|v| !v.is_finite()) {
    return Err(SolveFailure::SingularCovariance.into());
  }

  let cost = TangencyCost {
    mu: mu.clone(),
    cov: cov.clone(),
    risk_free,
  };

  let x0 = vec![0.0; n];
  let mut simplex = Vec::with_capacity(n + 1);
  simplex.push(x0.clone());
  for i in 0..n {
    let mut point = x0.clone();
    point[i] = 1.0;
    simplex.push(point);
  }

  let non_convergent = SolveFailure::NonConvergent {
    iterations: TANGENCY_MAX_ITERS as usize,
  };
  let solver = NelderMead::new(simplex)
    .with_sd_tolerance(1e-10)
    .map_err(|_| non_convergent)?;
  let res = Executor::new(cost, solver)
    .configure(|state| state.max_iters(TANGENCY_MAX_ITERS))
    .run()
    .map_err(|_| non_convergent)?;

  let best = res.state.best_param.ok_or(non_convergent)?;
  Ok(Array1::from(softmax(&best)))
}
