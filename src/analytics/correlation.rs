//! # Correlation
//!
//! $$
//! \rho_{ij}=\frac{\operatorname{cov}(r_i,r_j)}{\sigma_i\sigma_j}
//! $$
//!
//! Pearson correlation with a fixed convention for zero-variance assets.

use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray_stats::CorrelationExt;

use crate::data::ReturnMatrix;
use crate::error::PortfolioError;
use crate::error::Result;

/// Standard deviations at or below this are treated as zero.
pub(crate) const ZERO_STD: f64 = 1e-12;

/// Symmetric asset-by-asset correlation matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationMatrix {
  pub assets: Vec<String>,
  pub values: Array2<f64>,
}

impl CorrelationMatrix {
  pub fn n_assets(&self) -> usize {
    self.assets.len()
  }

  pub fn get(&self, a: &str, b: &str) -> Option<f64> {
    let i = self.assets.iter().position(|x| x == a)?;
    let j = self.assets.iter().position(|x| x == b)?;
    Some(self.values[[i, j]])
  }

  /// Mean of the strictly upper-triangular entries.
  pub fn average_pairwise(&self) -> f64 {
    let n = self.n_assets();
    if n < 2 {
      return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
      for j in (i + 1)..n {
        sum += self.values[[i, j]];
      }
    }
    sum / (n * (n - 1) / 2) as f64
  }
}

/// Pearson correlation of every asset pair.
///
/// The diagonal is exactly one. A pair involving a zero-variance asset has
/// correlation zero.
pub fn correlation_matrix(matrix: &ReturnMatrix) -> Result<CorrelationMatrix> {
  matrix.ensure_observations(2)?;

  let cov = matrix
    .values()
    .t()
    .cov(1.0)
    .map_err(|_| PortfolioError::InsufficientData {
      observations: matrix.n_observations(),
      assets: matrix.n_assets(),
    })?;

  let n = matrix.n_assets();
  let std: Vec<f64> = (0..n)
    .map(|i| cov[[i, i]].max(0.0).sqrt())
    .map(|s| if s > ZERO_STD { s } else { 0.0 })
    .collect();
  let values = Array2::from_shape_fn((n, n), |(i, j)| {
    if i == j {
      1.0
    } else if std[i] > 0.0 && std[j] > 0.0 {
      (cov[[i, j]] / (std[i] * std[j])).clamp(-1.0, 1.0)
    } else {
      0.0
    }
  });

  Ok(CorrelationMatrix {
    assets: matrix.assets().to_vec(),
    values,
  })
}

/// Pearson correlation of two equally long series, `None` if either is constant.
pub(crate) fn pearson(x: ArrayView1<f64>, y: ArrayView1<f64>) -> Option<f64> {
  let n = x.len();
  if n < 2 || y.len() != n {
    return None;
  }

  let mx = x.sum() / n as f64;
  let my = y.sum() / n as f64;
  let mut sxy = 0.0;
  let mut sxx = 0.0;
  let mut syy = 0.0;
  for (&a, &b) in x.iter().zip(y.iter()) {
    let dx = a - mx;
    let dy = b - my;
    sxy += dx * dy;
    sxx += dx * dx;
    syy += dy * dy;
  }

  let dof = (n - 1) as f64;
  if (sxx / dof).sqrt() <= ZERO_STD || (syy / dof).sqrt() <= ZERO_STD {
    return None;
  }
  Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  fn matrix() -> ReturnMatrix {
    ReturnMatrix::from_columns(vec![
      ("A", vec![0.01, -0.02, 0.03, 0.00, 0.015]),
      ("B", vec![0.02, -0.04, 0.06, 0.00, 0.03]),
      ("C", vec![-0.01, 0.01, -0.02, 0.005, 0.0]),
      ("D", vec![0.001; 5]),
    ])
    .unwrap()
  }

  #[test]
  fn symmetric_with_unit_diagonal() {
    let corr = correlation_matrix(&matrix()).unwrap();
    for i in 0..4 {
      assert_eq!(corr.values[[i, i]], 1.0);
      for j in 0..4 {
        assert_abs_diff_eq!(corr.values[[i, j]], corr.values[[j, i]], epsilon = 1e-15);
      }
    }
  }

  #[test]
  fn scaled_series_are_perfectly_correlated() {
    let corr = correlation_matrix(&matrix()).unwrap();
    assert_abs_diff_eq!(corr.get("A", "B").unwrap(), 1.0, epsilon = 1e-12);
    assert!(corr.get("A", "C").unwrap() < 0.0);
  }

  #[test]
  fn constant_asset_has_zero_correlation() {
    let corr = correlation_matrix(&matrix()).unwrap();
    assert_eq!(corr.get("A", "D"), Some(0.0));
    assert_eq!(corr.get("D", "D"), Some(1.0));
  }

  #[test]
  fn pearson_matches_matrix_entry() {
    let m = matrix();
    let direct = pearson(m.column("A").unwrap(), m.column("C").unwrap()).unwrap();
    let corr = correlation_matrix(&m).unwrap();
    assert_abs_diff_eq!(direct, corr.get("A", "C").unwrap(), epsilon = 1e-12);
    assert_eq!(pearson(array![1.0, 1.0].view(), array![1.0, 2.0].view()), None);
  }
}
