//! # Errors
//!
//! $$
//! \text{engine}:\ (\text{returns}, \mathbf{w}) \to \text{Result}\langle\text{record}, \text{PortfolioError}\rangle
//! $$
//!
//! Error kinds shared by the estimators, the simulation and optimization
//! engines and the analytics. Numerically degenerate inputs (no overlap, zero
//! volatility) resolve to neutral values inside the engines and never reach
//! this type.

use thiserror::Error;

/// Why a quadratic program did not produce a usable allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveFailure {
  /// The constraint set is empty (e.g. target return above every asset's mean).
  Infeasible,
  /// The solver stopped (iteration budget, stalled progress or numerical trouble) short of its tolerance.
  NonConvergent { iterations: usize },
  /// The covariance matrix is non-finite, asymmetric or indefinite.
  SingularCovariance,
}

impl std::fmt::Display for SolveFailure {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      SolveFailure::Infeasible => write!(f, "problem is infeasible"),
      SolveFailure::NonConvergent { iterations } => {
        write!(f, "solver did not converge after {iterations} iterations")
      }
      SolveFailure::SingularCovariance => write!(f, "covariance matrix fails solver tolerance"),
    }
  }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PortfolioError {
  #[error("insufficient data: {observations} aligned observations across {assets} assets")]
  InsufficientData { observations: usize, assets: usize },

  #[error("invalid weights: {0}")]
  InvalidWeights(String),

  #[error("optimization failed: {0}")]
  OptimizationFailed(SolveFailure),

  #[error("dimension mismatch in {context}: expected {expected}, found {found}")]
  DimensionMismatch {
    context: &'static str,
    expected: usize,
    found: usize,
  },

  #[error("invalid argument `{name}`: {reason}")]
  InvalidArgument { name: &'static str, reason: String },

  #[error("computation cancelled")]
  Cancelled,

  #[error("computation timed out")]
  TimedOut,
}

impl PortfolioError {
  pub(crate) fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
    Self::InvalidArgument {
      name,
      reason: reason.into(),
    }
  }

  /// `true` for solver failures that leave the caller with an empty allocation.
  pub fn is_optimization_failure(&self) -> bool {
    matches!(self, Self::OptimizationFailed(_))
  }
}

impl From<SolveFailure> for PortfolioError {
  fn from(failure: SolveFailure) -> Self {
    Self::OptimizationFailed(failure)
  }
}

pub type Result<T> = std::result::Result<T, PortfolioError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn singular_covariance_surfaces_as_optimization_failure() {
    let err: PortfolioError = SolveFailure::SingularCovariance.into();
    assert!(err.is_optimization_failure());
    assert_eq!(
      err.to_string(),
      "optimization failed: covariance matrix fails solver tolerance"
    );
  }
}
