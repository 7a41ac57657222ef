//! # Performance Evaluation
//!
//! $$
//! \mu_p=\boldsymbol\mu^\top\mathbf w,\qquad \sigma_p=\sqrt{\mathbf w^\top\Sigma\mathbf w},\qquad
//! S=\frac{\mu_p-r_f}{\sigma_p}
//! $$
//!
//! Modeled annual return, volatility and Sharpe ratio of a weight vector.

use ndarray::ArrayView1;
use ndarray::ArrayView2;

use crate::data::ReturnMatrix;
use crate::data::WeightVector;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::estimators::sharpe_ratio;
use crate::estimators::ReturnMethod;
use crate::estimators::StatisticsBundle;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PerformanceMetrics {
  pub expected_return: f64,
  pub volatility: f64,
  pub sharpe: f64,
}

impl PerformanceMetrics {
  /// Evaluate `w` against annualized `μ` and `Σ`.
  pub fn evaluate(
    weights: ArrayView1<f64>,
    mu: ArrayView1<f64>,
    cov: ArrayView2<f64>,
    risk_free: f64,
  ) -> Result<Self> {
    let n = weights.len();
    if mu.len() != n {
      return Err(PortfolioError::DimensionMismatch {
        context: "expected returns",
        expected: n,
        found: mu.len(),
      });
    }
    if cov.dim() != (n, n) {
      return Err(PortfolioError::DimensionMismatch {
        context: "covariance",
        expected: n,
        found: cov.nrows().max(cov.ncols()),
      });
    }

    let expected_return = mu.dot(&weights);
    let volatility = weights.dot(&cov.dot(&weights)).max(0.0).sqrt();

    Ok(Self {
      expected_return,
      volatility,
      sharpe: sharpe_ratio(expected_return, volatility, risk_free),
    })
  }
}

/// Performance of `weights` estimated on the assets they share with `matrix`.
///
/// Weights are renormalized over the overlap; with no overlap every metric is zero.
pub fn portfolio_performance(
  matrix: &ReturnMatrix,
  weights: &WeightVector,
  risk_free: f64,
  method: ReturnMethod,
) -> Result<PerformanceMetrics> {
  if !weights.assets().any(|a| matrix.contains(a)) {
    return Ok(PerformanceMetrics::default());
  }

  let aligned = weights.align(matrix)?;
  let subset = matrix.select_indices(&aligned.indices);
  let stats = StatisticsBundle::estimate(&subset, method)?;

  PerformanceMetrics::evaluate(
    aligned.weights.view(),
    stats.expected_returns.view(),
    stats.covariance.view(),
    risk_free,
  )
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  fn three_assets() -> ReturnMatrix {
    let n = 252;
    let a = (0..n).map(|t| 0.001 + 0.01 * ((t as f64) * 0.9).sin()).collect();
    let b = (0..n).map(|t| 0.0005 + 0.008 * ((t as f64) * 1.7).cos()).collect();
    let c = (0..n)
      .map(|t| -0.0002 + 0.015 * ((t as f64) * 0.4 + 0.3).sin())
      .collect();
    ReturnMatrix::from_columns(vec![("A", a), ("B", b), ("C", c)]).unwrap()
  }

  #[test]
  fn matches_hand_computation() {
    let matrix = three_assets();
    let w = [0.5, 0.3, 0.2];
    let weights: WeightVector = [("A", 0.5), ("B", 0.3), ("C", 0.2)].into_iter().collect();

    let values = matrix.values();
    let n = values.nrows() as f64;
    let means: Vec<f64> = (0..3).map(|j| values.column(j).sum() / n).collect();

    let mut expected_return = 0.0;
    for j in 0..3 {
      expected_return += w[j] * means[j] * 252.0;
    }

    let mut variance = 0.0;
    for i in 0..3 {
      for j in 0..3 {
        let mut cov = 0.0;
        for t in 0..values.nrows() {
          cov += (values[[t, i]] - means[i]) * (values[[t, j]] - means[j]);
        }
        cov = cov / (n - 1.0) * 252.0;
        variance += w[i] * w[j] * cov;
      }
    }
    let volatility = variance.sqrt();

    let metrics = portfolio_performance(&matrix, &weights, 0.02, ReturnMethod::Mean).unwrap();
    assert_abs_diff_eq!(metrics.expected_return, expected_return, epsilon = 1e-9);
    assert_abs_diff_eq!(metrics.volatility, volatility, epsilon = 1e-9);
    assert_abs_diff_eq!(
      metrics.sharpe,
      (expected_return - 0.02) / volatility,
      epsilon = 1e-9
    );
  }

  #[test]
  fn no_overlap_is_all_zero() {
    let weights: WeightVector = [("Z", 1.0)].into_iter().collect();
    let metrics = portfolio_performance(&three_assets(), &weights, 0.02, ReturnMethod::Mean).unwrap();
    assert_eq!(metrics, PerformanceMetrics::default());
  }

  #[test]
  fn partial_overlap_renormalizes() {
    let matrix = three_assets();
    let partial: WeightVector = [("A", 0.25), ("Z", 0.5)].into_iter().collect();
    let full: WeightVector = [("A", 1.0)].into_iter().collect();
    let lhs = portfolio_performance(&matrix, &partial, 0.0, ReturnMethod::Mean).unwrap();
    let rhs = portfolio_performance(&matrix, &full, 0.0, ReturnMethod::Mean).unwrap();
    assert_abs_diff_eq!(lhs.volatility, rhs.volatility, epsilon = 1e-12);
  }

  #[test]
  fn zero_volatility_has_zero_sharpe() {
    let w = array![1.0, 0.0];
    let mu = array![0.1, 0.2];
    let cov = array![[0.0, 0.0], [0.0, 0.04]];
    let metrics = PerformanceMetrics::evaluate(w.view(), mu.view(), cov.view(), 0.02).unwrap();
    assert_eq!(metrics.sharpe, 0.0);
    assert_abs_diff_eq!(metrics.expected_return, 0.1);
  }

  #[test]
  fn mismatched_dimensions_are_rejected() {
    let w = array![0.5, 0.5];
    let mu = array![0.1, 0.2, 0.3];
    let cov = array![[0.04, 0.0], [0.0, 0.04]];
    assert!(matches!(
      PerformanceMetrics::evaluate(w.view(), mu.view(), cov.view(), 0.0),
      Err(PortfolioError::DimensionMismatch { expected: 2, found: 3, .. })
    ));
  }
}
