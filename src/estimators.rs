//! # Statistical Estimators
//!
//! $$
//! \hat\mu = 252\,\bar r,\qquad \hat\Sigma = \frac{252}{T-1}\sum_t (r_t-\bar r)(r_t-\bar r)^\top
//! $$
//!
//! Annualized expected returns and covariance, plus summary statistics for
//! single assets and weighted portfolios.

use std::str::FromStr;

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;

use crate::data::mean_of;
use crate::data::std_of;
use crate::data::ReturnMatrix;
use crate::data::WeightVector;
use crate::data::PERIODS_PER_YEAR;
use crate::error::PortfolioError;
use crate::error::Result;

/// Default EWMA span, in periods.
pub const DEFAULT_EWMA_SPAN: usize = 60;

/// Expected-return estimator.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum ReturnMethod {
  /// Arithmetic mean of periodic returns.
  #[default]
  Mean,
  /// Most recent value of an exponentially weighted mean.
  Ewma { span: usize },
}

impl ReturnMethod {
  pub fn ewma() -> Self {
    Self::Ewma {
      span: DEFAULT_EWMA_SPAN,
    }
  }
}

impl FromStr for ReturnMethod {
  type Err = PortfolioError;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_lowercase().as_str() {
      "mean" => Ok(Self::Mean),
      "ewma" | "ewm" => Ok(Self::ewma()),
      other => Err(PortfolioError::invalid_argument(
        "method",
        format!("unknown return method '{other}'"),
      )),
    }
  }
}

/// Annualized expected returns and covariance for one asset universe.
#[derive(Clone, Debug, PartialEq)]
pub struct StatisticsBundle {
  pub assets: Vec<String>,
  pub expected_returns: Array1<f64>,
  pub covariance: Array2<f64>,
}

impl StatisticsBundle {
  pub fn estimate(matrix: &ReturnMatrix, method: ReturnMethod) -> Result<Self> {
    Ok(Self {
      assets: matrix.assets().to_vec(),
      expected_returns: expected_returns(matrix, method)?,
      covariance: covariance(matrix)?,
    })
  }

  pub fn n_assets(&self) -> usize {
    self.assets.len()
  }

  /// Annualized volatility of each asset.
  pub fn volatilities(&self) -> Array1<f64> {
    self.covariance.diag().mapv(|v| v.max(0.0).sqrt())
  }
}

/// Annualized expected return per asset.
pub fn expected_returns(matrix: &ReturnMatrix, method: ReturnMethod) -> Result<Array1<f64>> {
  matrix.ensure_observations(2)?;
  let values = matrix.values();

  let per_period = match method {
    ReturnMethod::Mean => values
      .mean_axis(Axis(0))
      .unwrap_or_else(|| Array1::zeros(values.ncols())),
    ReturnMethod::Ewma { span } => {
      if span == 0 {
        return Err(PortfolioError::invalid_argument(
          "span",
          "EWMA span must be positive",
        ));
      }
      values
        .axis_iter(Axis(1))
        .map(|col| ewma_last(col, span))
        .collect()
    }
  };

  Ok(per_period * PERIODS_PER_YEAR)
}

/// Annualized sample covariance (ddof 1).
pub fn covariance(matrix: &ReturnMatrix) -> Result<Array2<f64>> {
  matrix.ensure_observations(2)?;
  let cov = matrix
    .values()
    .t()
    .cov(1.0)
    .map_err(|_| PortfolioError::InsufficientData {
      observations: matrix.n_observations(),
      assets: matrix.n_assets(),
    })?;
  Ok(cov * PERIODS_PER_YEAR)
}

/// Last value of the adjusted exponentially weighted mean,
/// `α = 2/(span+1)`, weight `(1-α)^i` for the value `i` periods back.
fn ewma_last(series: ArrayView1<f64>, span: usize) -> f64 {
  let alpha = 2.0 / (span as f64 + 1.0);
  let decay = 1.0 - alpha;

  let mut num = 0.0;
  let mut den = 0.0;
  let mut w = 1.0;
  for &x in series.iter().rev() {
    num += w * x;
    den += w;
    w *= decay;
  }

  if den > 0.0 {
    num / den
  } else {
    0.0
  }
}

/// Annualized statistics of one asset.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetStatistics {
  pub asset: String,
  pub annual_return: f64,
  pub annual_volatility: f64,
  pub sharpe: f64,
}

/// Annualized return, volatility and Sharpe ratio of every asset.
pub fn asset_statistics(matrix: &ReturnMatrix, risk_free: f64) -> Vec<AssetStatistics> {
  let sqrt_periods = PERIODS_PER_YEAR.sqrt();

  matrix
    .assets()
    .iter()
    .zip(matrix.values().axis_iter(Axis(1)))
    .map(|(asset, col)| {
      let annual_return = mean_of(col) * PERIODS_PER_YEAR;
      let annual_volatility = std_of(col, 1) * sqrt_periods;
      AssetStatistics {
        asset: asset.clone(),
        annual_return,
        annual_volatility,
        sharpe: sharpe_ratio(annual_return, annual_volatility, risk_free),
      }
    })
    .collect()
}

/// Realized statistics of a weighted portfolio return series.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PortfolioStatistics {
  pub annual_return: f64,
  pub annual_volatility: f64,
  pub sharpe: f64,
  /// Compounded return over the whole sample.
  pub total_return: f64,
}

/// Statistics of the weighted portfolio series; zeros when no asset overlaps.
pub fn portfolio_statistics(
  matrix: &ReturnMatrix,
  weights: &WeightVector,
  risk_free: f64,
) -> PortfolioStatistics {
  let aligned = match weights.align(matrix) {
    Ok(aligned) if matrix.n_observations() > 0 => aligned,
    _ => return PortfolioStatistics::default(),
  };

  let series = matrix.portfolio_returns(&aligned);
  let annual_return = mean_of(series.view()) * PERIODS_PER_YEAR;
  let annual_volatility = std_of(series.view(), 1) * PERIODS_PER_YEAR.sqrt();
  let total_return = series.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0;

  PortfolioStatistics {
    annual_return,
    annual_volatility,
    sharpe: sharpe_ratio(annual_return, annual_volatility, risk_free),
    total_return,
  }
}

/// `(ret - rf) / vol`, or zero for a non-positive volatility.
pub fn sharpe_ratio(expected_return: f64, volatility: f64, risk_free: f64) -> f64 {
  if volatility > 0.0 {
    (expected_return - risk_free) / volatility
  } else {
    0.0
  }
}
