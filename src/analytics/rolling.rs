//! # Rolling Correlation
//!
//! $$
//! \rho_t=\operatorname{corr}\left(r^{a}_{t-w+1:t},\ r^{b}_{t-w+1:t}\right)
//! $$
//!
//! Trailing-window Pearson correlation between two assets.

use super::correlation::pearson;
use crate::data::ReturnMatrix;
use crate::error::PortfolioError;
use crate::error::Result;

/// Default trailing window, in periods.
pub const DEFAULT_ROLLING_WINDOW: usize = 60;

/// One entry per observation; `None` until the window fills or when a window
/// has no variance.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RollingCorrelation {
  pub window: usize,
  pub values: Vec<Option<f64>>,
}

impl RollingCorrelation {
  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  /// Most recent defined value.
  pub fn latest(&self) -> Option<f64> {
    self.values.iter().rev().find_map(|v| *v)
  }
}

pub fn rolling_correlation(
  matrix: &ReturnMatrix,
  a: &str,
  b: &str,
  window: usize,
) -> Result<RollingCorrelation> {
  if window < 2 {
    return Err(PortfolioError::invalid_argument(
      "window",
      "rolling window must span at least two observations",
    ));
  }

  let (Some(x), Some(y)) = (matrix.column(a), matrix.column(b)) else {
    return Ok(RollingCorrelation {
      window,
      values: Vec::new(),
    });
  };

  let n = x.len();
  let values = (0..n)
    .map(|t| {
      if t + 1 < window {
        None
      } else {
        let start = t + 1 - window;
        pearson(
          x.slice(ndarray::s![start..=t]),
          y.slice(ndarray::s![start..=t]),
        )
      }
    })
    .collect();

  Ok(RollingCorrelation { window, values })
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  fn matrix() -> ReturnMatrix {
    let a: Vec<f64> = (0..30).map(|t| ((t as f64) * 0.7).sin()).collect();
    let b: Vec<f64> = a.iter().map(|x| -2.0 * x).collect();
    let mut c = vec![0.0; 30];
    for (t, v) in c.iter_mut().enumerate().skip(15) {
      *v = ((t as f64) * 1.3).cos();
    }
    ReturnMatrix::from_columns(vec![("A", a), ("B", b), ("C", c)]).unwrap()
  }

  #[test]
  fn leading_entries_are_undefined() {
    let rc = rolling_correlation(&matrix(), "A", "B", 10).unwrap();
    assert_eq!(rc.len(), 30);
    assert!(rc.values[..9].iter().all(Option::is_none));
    for v in &rc.values[9..] {
      assert_abs_diff_eq!(v.unwrap(), -1.0, epsilon = 1e-12);
    }
    assert_abs_diff_eq!(rc.latest().unwrap(), -1.0, epsilon = 1e-12);
  }

  #[test]
  fn flat_windows_are_undefined() {
    let rc = rolling_correlation(&matrix(), "A", "C", 5).unwrap();
    assert!(rc.values[4..15].iter().all(Option::is_none));
    assert!(rc.values[29].is_some());
  }

  #[test]
  fn missing_asset_is_empty() {
    assert!(rolling_correlation(&matrix(), "A", "SPY", 10).unwrap().is_empty());
  }

  #[test]
  fn window_below_two_is_invalid() {
    assert!(rolling_correlation(&matrix(), "A", "B", 1).is_err());
  }
}
