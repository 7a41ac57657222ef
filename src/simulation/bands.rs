//! # Percentile Bands
//!
//! $$
//! B_{t,q} = Q_q\left(V^{(1)}_t,\dots,V^{(m)}_t\right)
//! $$
//!
//! Per-day percentiles of simulated value paths (fan charts).

use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Zip;

use crate::data::percentile_sorted;
use crate::data::sort_ascending;
use crate::error::PortfolioError;
use crate::error::Result;

/// Percentiles reported when the caller has no preference.
pub const DEFAULT_PERCENTILES: [f64; 3] = [10.0, 50.0, 90.0];

/// One row per day, one column per requested percentile.
#[derive(Clone, Debug, PartialEq)]
pub struct PercentileBands {
  pub percentiles: Vec<f64>,
  /// `(horizon_days + 1) × percentiles.len()`.
  pub values: Array2<f64>,
}

impl PercentileBands {
  pub fn n_days(&self) -> usize {
    self.values.nrows()
  }

  /// Percentile values of day `t`, in request order.
  pub fn day(&self, t: usize) -> ArrayView1<'_, f64> {
    self.values.row(t)
  }

  /// Time series of one requested percentile.
  pub fn band(&self, percentile: f64) -> Option<ArrayView1<'_, f64>> {
    self
      .percentiles
      .iter()
      .position(|&p| (p - percentile).abs() < 1e-12)
      .map(|j| self.values.column(j))
  }
}

/// Percentiles across the simulation dimension for every time index.
pub fn percentile_bands(paths: ArrayView2<f64>, percentiles: &[f64]) -> Result<PercentileBands> {
  if paths.nrows() == 0 {
    return Err(PortfolioError::invalid_argument(
      "paths",
      "no simulated paths to summarize",
    ));
  }
  if let Some(&bad) = percentiles
    .iter()
    .find(|p| !p.is_finite() || **p < 0.0 || **p > 100.0)
  {
    return Err(PortfolioError::invalid_argument(
      "percentiles",
      format!("{bad} is outside [0, 100]"),
    ));
  }

  let mut values = Array2::<f64>::zeros((paths.ncols(), percentiles.len()));
  Zip::from(values.rows_mut())
    .and(paths.columns())
    .par_for_each(|mut row, day| {
      let mut sorted = day.to_vec();
      sort_ascending(&mut sorted);
      for (slot, &q) in row.iter_mut().zip(percentiles) {
        *slot = percentile_sorted(&sorted, q);
      }
    });

  Ok(PercentileBands {
    percentiles: percentiles.to_vec(),
    values,
  })
}
