//! # Risk Decomposition
//!
//! $$
//! MCR=\frac{\Sigma\mathbf w}{\sigma_p},\qquad CCR_i=w_i\,MCR_i,\qquad
//! \sum_i CCR_i=\sigma_p,\qquad \beta=\frac{\operatorname{cov}(r,r_m)}{\operatorname{var}(r_m)}
//! $$
//!
//! Diversification ratio, marginal and component risk contributions, and beta.

use ndarray::stack;
use ndarray::Array1;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;

use super::correlation::ZERO_STD;
use super::weighted_covariance;
use crate::data::ReturnMatrix;
use crate::data::WeightVector;
use crate::error::Result;

/// `(Σ wᵢσᵢ) / σ_p`; zero with no overlap or zero portfolio volatility.
pub fn diversification_ratio(matrix: &ReturnMatrix, weights: &WeightVector) -> Result<f64> {
  let Some((aligned, cov)) = weighted_covariance(matrix, weights)? else {
    return Ok(0.0);
  };

  let w = &aligned.weights;
  let vols = cov.diag().mapv(|v| v.max(0.0).sqrt());
  let weighted_vol = w.dot(&vols);
  let portfolio_vol = w.dot(&cov.dot(w)).max(0.0).sqrt();

  if portfolio_vol > ZERO_STD {
    Ok(weighted_vol / portfolio_vol)
  } else {
    Ok(0.0)
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RiskContributionRow {
  pub asset: String,
  /// Renormalized weight over the overlapping assets.
  pub weight: f64,
  pub marginal: f64,
  pub component: f64,
  /// Share of portfolio volatility, in percent.
  pub percent: f64,
}

/// Per-position decomposition of annualized portfolio volatility.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RiskContribution {
  pub rows: Vec<RiskContributionRow>,
  pub portfolio_volatility: f64,
}

impl RiskContribution {
  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  pub fn get(&self, asset: &str) -> Option<&RiskContributionRow> {
    self.rows.iter().find(|r| r.asset == asset)
  }
}

/// Marginal, component and percentage risk contribution of every position.
///
/// Empty when no weighted asset is present; all contributions are zero when
/// the portfolio has zero volatility.
pub fn risk_contribution(matrix: &ReturnMatrix, weights: &WeightVector) -> Result<RiskContribution> {
  let Some((aligned, cov)) = weighted_covariance(matrix, weights)? else {
    return Ok(RiskContribution::default());
  };

  let w = &aligned.weights;
  let sigma_w = cov.dot(w);
  let portfolio_vol = w.dot(&sigma_w).max(0.0).sqrt();

  let (marginal, component, percent) = if portfolio_vol > ZERO_STD {
    let marginal = &sigma_w / portfolio_vol;
    let component = w * &marginal;
    let percent = &component / portfolio_vol * 100.0;
    (marginal, component, percent)
  } else {
    let zeros = Array1::<f64>::zeros(w.len());
    (zeros.clone(), zeros.clone(), zeros)
  };

  let rows = aligned
    .assets
    .iter()
    .enumerate()
    .map(|(i, asset)| RiskContributionRow {
      asset: asset.clone(),
      weight: w[i],
      marginal: marginal[i],
      component: component[i],
      percent: percent[i],
    })
    .collect();

  Ok(RiskContribution {
    rows,
    portfolio_volatility: portfolio_vol,
  })
}

/// Sample beta of `asset` against `benchmark`; zero when either is missing
/// or the benchmark has no variance.
pub fn beta(matrix: &ReturnMatrix, asset: &str, benchmark: &str) -> f64 {
  let (Some(r), Some(m)) = (matrix.column(asset), matrix.column(benchmark)) else {
    return 0.0;
  };
  if r.len() < 2 {
    return 0.0;
  }

  let Ok(cov) = stack(Axis(0), &[r, m]).map(|pair| pair.cov(1.0)) else {
    return 0.0;
  };
  let Ok(cov) = cov else {
    return 0.0;
  };

  let market_var = cov[[1, 1]];
  if market_var.sqrt() <= ZERO_STD {
    return 0.0;
  }
  cov[[0, 1]] / market_var
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  fn matrix() -> ReturnMatrix {
    let n = 100;
    let m: Vec<f64> = (0..n).map(|t| 0.01 * ((t as f64) * 0.61).sin()).collect();
    let a: Vec<f64> = m.iter().map(|x| 1.5 * x + 0.0001).collect();
    let b: Vec<f64> = (0..n).map(|t| 0.008 * ((t as f64) * 1.37).cos()).collect();
    let c = vec![0.0002; n];
    ReturnMatrix::from_columns(vec![("MKT", m), ("A", a), ("B", b), ("CASH", c)]).unwrap()
  }

  #[test]
  fn single_asset_ratio_is_exactly_one() {
    let weights: WeightVector = [("B", 1.0)].into_iter().collect();
    assert_eq!(diversification_ratio(&matrix(), &weights).unwrap(), 1.0);
  }

  #[test]
  fn diversified_ratio_exceeds_one() {
    let weights: WeightVector = [("MKT", 0.5), ("B", 0.5)].into_iter().collect();
    assert!(diversification_ratio(&matrix(), &weights).unwrap() > 1.0);
  }

  #[test]
  fn ratio_without_overlap_or_volatility_is_zero() {
    let none: WeightVector = [("ZZZ", 1.0)].into_iter().collect();
    let cash: WeightVector = [("CASH", 1.0)].into_iter().collect();
    assert_eq!(diversification_ratio(&matrix(), &none).unwrap(), 0.0);
    assert_eq!(diversification_ratio(&matrix(), &cash).unwrap(), 0.0);
  }

  #[test]
  fn contributions_sum_to_volatility() {
    let weights: WeightVector = [("MKT", 0.2), ("A", 0.3), ("B", 0.5)].into_iter().collect();
    let rc = risk_contribution(&matrix(), &weights).unwrap();

    let component: f64 = rc.rows.iter().map(|r| r.component).sum();
    let percent: f64 = rc.rows.iter().map(|r| r.percent).sum();
    assert_abs_diff_eq!(component, rc.portfolio_volatility, epsilon = 1e-12);
    assert_abs_diff_eq!(percent, 100.0, epsilon = 1e-9);
    assert_eq!(rc.rows[0].asset, "MKT");
  }

  #[test]
  fn zero_volatility_contributions_are_zero() {
    let weights: WeightVector = [("CASH", 1.0)].into_iter().collect();
    let rc = risk_contribution(&matrix(), &weights).unwrap();
    assert_eq!(rc.rows.len(), 1);
    assert_eq!(rc.get("CASH").unwrap().percent, 0.0);
  }

  #[test]
  fn no_overlap_is_empty() {
    let weights: WeightVector = [("ZZZ", 1.0)].into_iter().collect();
    assert!(risk_contribution(&matrix(), &weights).unwrap().is_empty());
  }

  #[test]
  fn beta_of_scaled_series() {
    let m = matrix();
    assert_abs_diff_eq!(beta(&m, "A", "MKT"), 1.5, epsilon = 1e-9);
    assert_abs_diff_eq!(beta(&m, "MKT", "MKT"), 1.0, epsilon = 1e-12);
    assert_eq!(beta(&m, "A", "CASH"), 0.0);
    assert_eq!(beta(&m, "A", "SPY"), 0.0);
  }
}
