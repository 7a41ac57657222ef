//! # Portfolio Engine
//!
//! $$
//! \mathbf{w}^\* = \operatorname{Optimize}(\hat\mu, \hat\Sigma;\ \text{objective})
//! $$
//!
//! High-level entry point bundling the optimizer, frontier and evaluation settings.

use super::efficient_frontier_with_cancel;
use super::optimize;
use super::portfolio_performance;
use super::FrontierConfig;
use super::FrontierCurve;
use super::Objective;
use super::OptimizationResult;
use super::OptimizerConfig;
use super::PerformanceMetrics;
use crate::cancel::CancelToken;
use crate::data::ReturnMatrix;
use crate::data::WeightVector;
use crate::error::Result;
use crate::simulation::PathModel;
use crate::simulation::SimulationResult;

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
  /// Objective used by [`PortfolioEngine::optimize`].
  pub objective: Objective,
  /// Risk-free rate, return estimator, risk aversion and solver settings.
  pub optimizer: OptimizerConfig,
  /// Number of targets swept by [`PortfolioEngine::frontier`].
  pub frontier_points: usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      objective: Objective::MinVariance,
      optimizer: OptimizerConfig::default(),
      frontier_points: 50,
    }
  }
}

/// Current allocation next to the optimized one.
#[derive(Clone, Debug, PartialEq)]
pub struct AllocationComparison {
  pub current: PerformanceMetrics,
  pub optimized: OptimizationResult,
}

impl AllocationComparison {
  /// Sharpe improvement of the optimized allocation over the current one.
  pub fn sharpe_gain(&self) -> f64 {
    self.optimized.performance.sharpe - self.current.sharpe
  }
}

/// Single entry-point engine for allocation workflows.
#[derive(Clone, Debug, Default)]
pub struct PortfolioEngine {
  config: EngineConfig,
}

impl PortfolioEngine {
  pub fn new(config: EngineConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Optimize with the configured objective.
  pub fn optimize(&self, matrix: &ReturnMatrix) -> Result<OptimizationResult> {
    self.optimize_with(matrix, self.config.objective)
  }

  pub fn optimize_with(
    &self,
    matrix: &ReturnMatrix,
    objective: Objective,
  ) -> Result<OptimizationResult> {
    optimize(matrix, objective, &self.config.optimizer)
  }

  pub fn frontier(&self, matrix: &ReturnMatrix) -> Result<FrontierCurve> {
    self.frontier_with_cancel(matrix, &CancelToken::new())
  }

  pub fn frontier_with_cancel(
    &self,
    matrix: &ReturnMatrix,
    cancel: &CancelToken,
  ) -> Result<FrontierCurve> {
    efficient_frontier_with_cancel(matrix, &self.frontier_config(), cancel)
  }

  /// Modeled performance of arbitrary weights.
  pub fn performance(&self, matrix: &ReturnMatrix, weights: &WeightVector) -> Result<PerformanceMetrics> {
    portfolio_performance(
      matrix,
      weights,
      self.config.optimizer.risk_free_rate,
      self.config.optimizer.return_method,
    )
  }

  /// Evaluate `current` and the configured optimum on the same matrix.
  pub fn compare(&self, matrix: &ReturnMatrix, current: &WeightVector) -> Result<AllocationComparison> {
    Ok(AllocationComparison {
      current: self.performance(matrix, current)?,
      optimized: self.optimize(matrix)?,
    })
  }

  /// Forward-simulate `weights` under any path model.
  pub fn simulate<M: PathModel + ?Sized>(
    &self,
    model: &M,
    matrix: &ReturnMatrix,
    weights: &WeightVector,
  ) -> Result<SimulationResult> {
    model.simulate(matrix, weights)
  }

  fn frontier_config(&self) -> FrontierConfig {
    FrontierConfig {
      n_points: self.config.frontier_points,
      risk_free_rate: self.config.optimizer.risk_free_rate,
      return_method: self.config.optimizer.return_method,
      solver: self.config.optimizer.solver,
    }
  }
}
