//! # Return Matrix
//!
//! $$
//! R \in \mathbb{R}^{T \times n},\quad R_{t,i} = P_{t,i}/P_{t-1,i} - 1
//! $$
//!
//! Date-aligned periodic simple returns, one column per asset.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::NaiveDate;
use impl_new_derive::ImplNew;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;
use tracing::warn;

use super::weights::AlignedWeights;
use crate::error::PortfolioError;
use crate::error::Result;

/// One closing price observation from the market-data collaborator.
#[derive(ImplNew, Clone, Copy, Debug, PartialEq)]
pub struct PriceBar {
  pub date: NaiveDate,
  pub close: f64,
}

/// Immutable matrix of aligned periodic returns.
///
/// Rows are periods in chronological order, columns are assets. Asset ids are
/// unique and keep their construction order.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnMatrix {
  assets: Vec<String>,
  values: Array2<f64>,
  dates: Option<Vec<NaiveDate>>,
}

impl ReturnMatrix {
  /// Build a matrix from asset ids and a `(periods, assets)` array.
  pub fn new(assets: Vec<String>, values: Array2<f64>) -> Result<Self> {
    if values.ncols() != assets.len() {
      return Err(PortfolioError::DimensionMismatch {
        context: "return matrix columns",
        expected: assets.len(),
        found: values.ncols(),
      });
    }

    let unique: BTreeSet<&str> = assets.iter().map(String::as_str).collect();
    if unique.len() != assets.len() {
      return Err(PortfolioError::invalid_argument(
        "assets",
        "asset ids must be unique",
      ));
    }

    if values.iter().any(|v| !v.is_finite()) {
      return Err(PortfolioError::invalid_argument(
        "values",
        "returns must be finite",
      ));
    }

    Ok(Self {
      assets,
      values,
      dates: None,
    })
  }

  /// Build a matrix from equally long per-asset return columns.
  pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<f64>)>) -> Result<Self> {
    let n_obs = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
    let mut assets = Vec::with_capacity(columns.len());
    let mut values = Array2::<f64>::zeros((n_obs, columns.len()));

    for (j, (id, column)) in columns.into_iter().enumerate() {
      if column.len() != n_obs {
        return Err(PortfolioError::DimensionMismatch {
          context: "return column length",
          expected: n_obs,
          found: column.len(),
        });
      }
      values.column_mut(j).assign(&Array1::from(column));
      assets.push(id.into());
    }

    Self::new(assets, values)
  }

  /// Attach one date per row.
  pub fn with_dates(mut self, dates: Vec<NaiveDate>) -> Result<Self> {
    if dates.len() != self.values.nrows() {
      return Err(PortfolioError::DimensionMismatch {
        context: "return matrix dates",
        expected: self.values.nrows(),
        found: dates.len(),
      });
    }
    self.dates = Some(dates);
    Ok(self)
  }

  /// Derive simple returns from closing prices aligned on the date intersection.
  ///
  /// Bars are sorted by date (a repeated date keeps the last bar) and
  /// non-finite or non-positive closes are discarded. Assets with fewer than
  /// two valid bars are excluded. While the common dates number fewer than
  /// two, the asset whose removal leaves the largest shared date set is
  /// excluded, preferring the shorter history on ties.
  pub fn from_prices(prices: &BTreeMap<String, Vec<PriceBar>>) -> Result<Self> {
    let mut series: Vec<(String, BTreeMap<NaiveDate, f64>)> = Vec::with_capacity(prices.len());

    for (ticker, bars) in prices {
      let closes: BTreeMap<NaiveDate, f64> = bars
        .iter()
        .filter(|bar| bar.close.is_finite() && bar.close > 0.0)
        .map(|bar| (bar.date, bar.close))
        .collect();

      if closes.len() < 2 {
        warn!(ticker = %ticker, bars = closes.len(), "excluding asset without enough price history");
        continue;
      }
      series.push((ticker.clone(), closes));
    }

    let common = loop {
      if series.is_empty() {
        return Err(PortfolioError::InsufficientData {
          observations: 0,
          assets: 0,
        });
      }

      let common = common_dates(&series, None);
      if common.len() >= 2 {
        break common.into_iter().collect::<Vec<_>>();
      }

      // drop the asset whose removal leaves the most shared dates
      let excluded = (0..series.len())
        .max_by_key(|&i| {
          let kept = common_dates(&series, Some(i)).len();
          (kept, std::cmp::Reverse(series[i].1.len()), std::cmp::Reverse(i))
        })
        .unwrap_or(0);
      let (ticker, _) = series.remove(excluded);
      warn!(ticker = %ticker, "excluding asset with no overlapping price history");
    };

    let n_obs = common.len() - 1;
    let mut values = Array2::<f64>::zeros((n_obs, series.len()));
    for (j, (_, closes)) in series.iter().enumerate() {
      for t in 0..n_obs {
        let prev = closes[&common[t]];
        let next = closes[&common[t + 1]];
        values[[t, j]] = next / prev - 1.0;
      }
    }

    let assets = series.into_iter().map(|(ticker, _)| ticker).collect();
    Self::new(assets, values)?.with_dates(common[1..].to_vec())
  }

  pub fn assets(&self) -> &[String] {
    &self.assets
  }

  pub fn values(&self) -> ArrayView2<'_, f64> {
    self.values.view()
  }

  pub fn dates(&self) -> Option<&[NaiveDate]> {
    self.dates.as_deref()
  }

  pub fn n_assets(&self) -> usize {
    self.assets.len()
  }

  pub fn n_observations(&self) -> usize {
    self.values.nrows()
  }

  pub fn is_empty(&self) -> bool {
    self.assets.is_empty() || self.values.nrows() == 0
  }

  pub fn index_of(&self, asset: &str) -> Option<usize> {
    self.assets.iter().position(|a| a == asset)
  }

  pub fn contains(&self, asset: &str) -> bool {
    self.index_of(asset).is_some()
  }

  /// Return series of a single asset.
  pub fn column(&self, asset: &str) -> Option<ArrayView1<'_, f64>> {
    self.index_of(asset).map(|j| self.values.column(j))
  }

  /// New matrix restricted to the given column indices, in that order.
  pub fn select_indices(&self, indices: &[usize]) -> Self {
    Self {
      assets: indices.iter().map(|&j| self.assets[j].clone()).collect(),
      values: self.values.select(Axis(1), indices),
      dates: self.dates.clone(),
    }
  }

  /// New matrix restricted to the named assets; unknown ids are skipped.
  pub fn select<S: AsRef<str>>(&self, assets: &[S]) -> Self {
    let indices: Vec<usize> = assets
      .iter()
      .filter_map(|a| self.index_of(a.as_ref()))
      .collect();
    self.select_indices(&indices)
  }

  /// Weighted sum of the aligned columns, one value per period.
  pub fn portfolio_returns(&self, weights: &AlignedWeights) -> Array1<f64> {
    let sub = self.values.select(Axis(1), &weights.indices);
    sub.dot(&weights.weights)
  }

  pub(crate) fn ensure_observations(&self, min_observations: usize) -> Result<()> {
    if self.n_assets() == 0 || self.n_observations() < min_observations {
      return Err(PortfolioError::InsufficientData {
        observations: self.n_observations(),
        assets: self.n_assets(),
      });
    }
    Ok(())
  }
}

/// Dates shared by every series, optionally ignoring the one at `skip`.
fn common_dates(series: &[(String, BTreeMap<NaiveDate, f64>)], skip: Option<usize>) -> BTreeSet<NaiveDate> {
  let mut kept = series
    .iter()
    .enumerate()
    .filter(|(i, _)| Some(*i) != skip)
    .map(|(_, (_, closes))| closes);

  let Some(first) = kept.next() else {
    return BTreeSet::new();
  };
  let mut common: BTreeSet<NaiveDate> = first.keys().copied().collect();
  for closes in kept {
    common.retain(|d| closes.contains_key(d));
  }
  common
}
