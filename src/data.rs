//! # Data
//!
//! $$
//! r_{t,i} = \frac{P_{t,i}}{P_{t-1,i}} - 1
//! $$
//!
//! Aligned return matrices and weight vectors consumed by every engine.

pub mod returns;
pub mod weights;

pub use returns::PriceBar;
pub use returns::ReturnMatrix;
pub use weights::AlignedWeights;
pub use weights::WeightVector;

use ndarray::ArrayView1;

/// Trading periods per year used for annualization.
pub const PERIODS_PER_YEAR: f64 = 252.0;

/// Mean of a series; zero when empty.
pub(crate) fn mean_of(xs: ArrayView1<f64>) -> f64 {
  xs.mean().unwrap_or(0.0)
}

/// Standard deviation with `ddof` delta degrees of freedom; zero when undefined.
pub(crate) fn std_of(xs: ArrayView1<f64>, ddof: usize) -> f64 {
  if xs.len() <= ddof {
    0.0
  } else {
    xs.std(ddof as f64)
  }
}

/// Linear-interpolated percentile (`q` in `[0, 100]`) of an ascending slice.
pub(crate) fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
  match sorted.len() {
    0 => 0.0,
    1 => sorted[0],
    n => {
      let rank = (q / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
      let lower = rank.floor() as usize;
      let upper = (lower + 1).min(n - 1);
      let weight = rank - lower as f64;
      sorted[lower] + weight * (sorted[upper] - sorted[lower])
    }
  }
}

pub(crate) fn sort_ascending(xs: &mut [f64]) {
  xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}

#[cfg(test)]
mod tests {
  use ndarray::array;
  use ndarray::Array1;

  use super::*;

  #[test]
  fn percentile_interpolates_between_ranks() {
    let xs = [1.0, 2.0, 3.0, 4.0];
    assert_eq!(percentile_sorted(&xs, 0.0), 1.0);
    assert_eq!(percentile_sorted(&xs, 100.0), 4.0);
    assert!((percentile_sorted(&xs, 50.0) - 2.5).abs() < 1e-12);
    assert!((percentile_sorted(&xs, 10.0) - 1.3).abs() < 1e-12);
  }

  #[test]
  fn std_is_zero_when_undefined() {
    assert_eq!(std_of(array![1.0].view(), 1), 0.0);
    assert_eq!(mean_of(Array1::<f64>::zeros(0).view()), 0.0);
    assert!((std_of(array![1.0, 3.0].view(), 1) - 2.0_f64.sqrt()).abs() < 1e-12);
    assert!((std_of(array![1.0, 3.0].view(), 0) - 1.0).abs() < 1e-12);
  }
}
