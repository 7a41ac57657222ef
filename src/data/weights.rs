//! # Weight Vectors
//!
//! $$
//! \tilde w_i = \frac{w_i}{\sum_{j \in A \cap R} w_j},\quad i \in A \cap R
//! $$
//!
//! Raw weight maps from the portfolio ledger and their renormalized,
//! matrix-aligned form.

use std::collections::BTreeMap;

use ndarray::Array1;

use super::returns::ReturnMatrix;
use crate::error::PortfolioError;
use crate::error::Result;

/// Mapping asset id → weight. Weights need not sum to one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightVector(BTreeMap<String, f64>);

impl WeightVector {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, asset: impl Into<String>, weight: f64) {
    self.0.insert(asset.into(), weight);
  }

  pub fn get(&self, asset: &str) -> Option<f64> {
    self.0.get(asset).copied()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
    self.0.iter().map(|(k, &v)| (k.as_str(), v))
  }

  pub fn assets(&self) -> impl Iterator<Item = &str> {
    self.0.keys().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn total(&self) -> f64 {
    self.0.values().sum()
  }

  /// Copy scaled so the weights sum to one.
  pub fn normalized(&self) -> Result<Self> {
    let total = self.total();
    if !total.is_finite() || total.abs() < 1e-15 {
      return Err(PortfolioError::InvalidWeights(format!(
        "weights sum to {total}, cannot normalize"
      )));
    }
    Ok(self.0.iter().map(|(k, &v)| (k.clone(), v / total)).collect())
  }

  /// Intersect with the matrix assets and renormalize over the overlap.
  ///
  /// The result follows the matrix column order.
  pub fn align(&self, matrix: &ReturnMatrix) -> Result<AlignedWeights> {
    let mut assets = Vec::new();
    let mut indices = Vec::new();
    let mut raw = Vec::new();

    for (j, asset) in matrix.assets().iter().enumerate() {
      if let Some(w) = self.get(asset) {
        assets.push(asset.clone());
        indices.push(j);
        raw.push(w);
      }
    }

    if assets.is_empty() {
      return Err(PortfolioError::InvalidWeights(
        "no weighted asset is present in the return matrix".to_string(),
      ));
    }

    let total: f64 = raw.iter().sum();
    if !total.is_finite() || total.abs() < 1e-15 {
      return Err(PortfolioError::InvalidWeights(format!(
        "overlapping weights sum to {total}"
      )));
    }

    Ok(AlignedWeights {
      assets,
      indices,
      weights: Array1::from(raw) / total,
    })
  }
}

impl<S: Into<String>> FromIterator<(S, f64)> for WeightVector {
  fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
    Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
  }
}

/// Weights restricted to the assets shared with a [`ReturnMatrix`], summing to one.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignedWeights {
  /// Overlapping asset ids in matrix column order.
  pub assets: Vec<String>,
  /// Column index of each asset in the source matrix.
  pub indices: Vec<usize>,
  /// Renormalized weights.
  pub weights: Array1<f64>,
}

impl AlignedWeights {
  pub fn len(&self) -> usize {
    self.assets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.assets.is_empty()
  }

  pub fn to_weight_vector(&self) -> WeightVector {
    self
      .assets
      .iter()
      .cloned()
      .zip(self.weights.iter().copied())
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn matrix() -> ReturnMatrix {
    ReturnMatrix::from_columns(vec![
      ("A", vec![0.01, 0.02, -0.01]),
      ("B", vec![0.00, 0.01, 0.02]),
      ("C", vec![0.03, -0.02, 0.01]),
    ])
    .unwrap()
  }

  #[test]
  fn aligned_weights_sum_to_one() {
    let weights: WeightVector = [("C", 7.0), ("A", 2.0), ("ZZZ", 100.0)]
      .into_iter()
      .collect();
    let aligned = weights.align(&matrix()).unwrap();

    assert_eq!(aligned.assets, vec!["A".to_string(), "C".to_string()]);
    assert_eq!(aligned.indices, vec![0, 2]);
    assert!((aligned.weights.sum() - 1.0).abs() < 1e-6);
    assert!((aligned.weights[0] - 2.0 / 9.0).abs() < 1e-12);
  }

  #[test]
  fn no_overlap_is_invalid_weights() {
    let weights: WeightVector = [("X", 1.0)].into_iter().collect();
    let err = weights.align(&matrix()).unwrap_err();
    assert!(matches!(err, PortfolioError::InvalidWeights(_)));
  }

  #[test]
  fn normalized_sums_to_one() {
    let weights: WeightVector = [("A", 0.2), ("B", 0.2), ("C", 0.1)].into_iter().collect();
    let normalized = weights.normalized().unwrap();
    assert!((normalized.total() - 1.0).abs() < 1e-6);
    assert!((normalized.get("C").unwrap() - 0.2).abs() < 1e-12);
  }
}
