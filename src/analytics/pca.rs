//! # Principal Components
//!
//! $$
//! \frac{1}{T-1}Z^\top Z = V\Lambda V^\top,\qquad Z_{ti}=\frac{r_{ti}-\bar r_i}{s_i}
//! $$
//!
//! Eigen-decomposition of the standardized return covariance.

use nalgebra::DMatrix;
use nalgebra::SymmetricEigen;
use ndarray::Array1;
use ndarray::Array2;
use ndarray_stats::CorrelationExt;
use tracing::debug;

use super::standardize_columns;
use crate::data::ReturnMatrix;
use crate::error::PortfolioError;
use crate::error::Result;

#[derive(Clone, Debug, PartialEq)]
pub struct PcaResult {
  pub assets: Vec<String>,
  /// `n_assets × k`, one unit-norm component per column.
  pub loadings: Array2<f64>,
  /// Component variances in descending order.
  pub explained_variance: Array1<f64>,
  /// Share of total variance per component.
  pub explained_variance_ratio: Array1<f64>,
}

impl PcaResult {
  pub fn n_components(&self) -> usize {
    self.loadings.ncols()
  }

  /// Cumulative share of variance explained by the first `k` components.
  pub fn cumulative_ratio(&self) -> Array1<f64> {
    let mut acc = 0.0;
    self.explained_variance_ratio.mapv(|r| {
      acc += r;
      acc
    })
  }
}

/// Principal components of the standardized returns.
///
/// Returns `min(n_components, n_assets)` components. Each component is signed
/// so that its largest-magnitude loading is positive.
pub fn pca(matrix: &ReturnMatrix, n_components: usize) -> Result<PcaResult> {
  if n_components == 0 {
    return Err(PortfolioError::invalid_argument(
      "n_components",
      "at least one component is required",
    ));
  }
  matrix.ensure_observations(2)?;

  let n = matrix.n_assets();
  let k = n_components.min(n);

  let mut z = matrix.values().to_owned();
  standardize_columns(&mut z);
  let cov = z
    .t()
    .cov(1.0)
    .map_err(|_| PortfolioError::InsufficientData {
      observations: matrix.n_observations(),
      assets: n,
    })?;

  let dense = DMatrix::from_fn(n, n, |i, j| 0.5 * (cov[[i, j]] + cov[[j, i]]));
  let eigen = SymmetricEigen::try_new(dense, f64::EPSILON, 0).ok_or_else(|| {
    PortfolioError::invalid_argument("returns", "eigen-decomposition did not converge")
  })?;

  let mut order: Vec<usize> = (0..n).collect();
  order.sort_by(|&a, &b| {
    eigen.eigenvalues[b]
      .partial_cmp(&eigen.eigenvalues[a])
      .unwrap_or(std::cmp::Ordering::Equal)
  });

  let eigenvalues: Vec<f64> = order.iter().map(|&i| eigen.eigenvalues[i].max(0.0)).collect();
  let total: f64 = eigenvalues.iter().sum();

  let mut loadings = Array2::<f64>::zeros((n, k));
  for (c, &src) in order.iter().take(k).enumerate() {
    let v = eigen.eigenvectors.column(src);
    let pivot = v
      .iter()
      .copied()
      .fold(0.0_f64, |best, x| if x.abs() > best.abs() { x } else { best });
    let sign = if pivot < 0.0 { -1.0 } else { 1.0 };
    for i in 0..n {
      loadings[[i, c]] = sign * v[i];
    }
  }

  let explained_variance = Array1::from(eigenvalues[..k].to_vec());
  let explained_variance_ratio = if total > 0.0 {
    &explained_variance / total
  } else {
    Array1::zeros(k)
  };

  debug!(n_assets = n, n_components = k, total_variance = total, "computed principal components");

  Ok(PcaResult {
    assets: matrix.assets().to_vec(),
    loadings,
    explained_variance,
    explained_variance_ratio,
  })
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  fn factor_universe() -> ReturnMatrix {
    let n = 200;
    let mut cols: Vec<(String, Vec<f64>)> = Vec::new();
    for (a, (beta, phase)) in [(1.0, 0.1), (0.8, 0.7), (1.2, 1.9), (-0.5, 2.3), (0.1, 3.1)]
      .into_iter()
      .enumerate()
    {
      let col = (0..n)
        .map(|t| {
          let x = t as f64;
          beta * 0.01 * (x * 0.21).sin() + 0.004 * (x * (1.3 + a as f64) + phase).cos()
        })
        .collect();
      cols.push((format!("X{a}"), col));
    }
    ReturnMatrix::from_columns(cols).unwrap()
  }

  #[test]
  fn ratios_are_non_negative_bounded_and_non_increasing() {
    let result = pca(&factor_universe(), 3).unwrap();
    let ratio = &result.explained_variance_ratio;

    assert_eq!(ratio.len(), 3);
    assert!(ratio.iter().all(|&r| r >= 0.0));
    assert!(ratio.sum() <= 1.0 + 1e-12);
    assert!(ratio.windows(2).into_iter().all(|w| w[0] >= w[1]));
  }

  #[test]
  fn all_components_explain_everything() {
    let result = pca(&factor_universe(), 10).unwrap();
    assert_eq!(result.n_components(), 5);
    assert_abs_diff_eq!(result.explained_variance_ratio.sum(), 1.0, epsilon = 1e-9);
    // standardized data: total variance equals asset count times T/(T-1)
    assert_abs_diff_eq!(
      result.explained_variance.sum(),
      5.0 * 200.0 / 199.0,
      epsilon = 1e-9
    );
  }

  #[test]
  fn loadings_are_unit_norm_with_positive_pivot() {
    let result = pca(&factor_universe(), 2).unwrap();
    for col in result.loadings.columns() {
      assert_abs_diff_eq!(col.dot(&col), 1.0, epsilon = 1e-9);
      let pivot = col.iter().copied().fold(0.0_f64, |b, x| if x.abs() > b.abs() { x } else { b });
      assert!(pivot > 0.0);
    }
  }

  #[test]
  fn zero_components_is_invalid() {
    assert!(matches!(
      pca(&factor_universe(), 0),
      Err(PortfolioError::InvalidArgument { .. })
    ));
  }
}
