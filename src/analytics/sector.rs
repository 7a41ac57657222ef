//! # Sector Exposure
//!
//! $$
//! E_s=\sum_{i:\ \operatorname{sector}(i)=s} w_i
//! $$
//!
//! Portfolio weight aggregated by sector label.

use std::collections::BTreeMap;

use crate::data::WeightVector;

/// Sector assigned to assets missing from the sector map.
pub const UNKNOWN_SECTOR: &str = "Unknown";

#[derive(Clone, Debug, PartialEq)]
pub struct SectorWeight {
  pub sector: String,
  pub weight: f64,
}

impl SectorWeight {
  pub fn percent(&self) -> f64 {
    self.weight * 100.0
  }
}

/// Sector weights, largest first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SectorExposure {
  pub rows: Vec<SectorWeight>,
}

impl SectorExposure {
  pub fn get(&self, sector: &str) -> Option<f64> {
    self.rows.iter().find(|r| r.sector == sector).map(|r| r.weight)
  }

  pub fn total(&self) -> f64 {
    self.rows.iter().map(|r| r.weight).sum()
  }
}

/// Sum weights per sector. Weights are taken as given, not renormalized.
pub fn sector_exposure(weights: &WeightVector, sectors: &BTreeMap<String, String>) -> SectorExposure {
  let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
  for (asset, weight) in weights.iter() {
    let sector = sectors.get(asset).map(String::as_str).unwrap_or(UNKNOWN_SECTOR);
    *totals.entry(sector).or_insert(0.0) += weight;
  }

  let mut rows: Vec<SectorWeight> = totals
    .into_iter()
    .map(|(sector, weight)| SectorWeight {
      sector: sector.to_string(),
      weight,
    })
    .collect();
  rows.sort_by(|a, b| {
    b.weight
      .partial_cmp(&a.weight)
      .unwrap_or(std::cmp::Ordering::Equal)
  });

  SectorExposure { rows }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn aggregates_and_sorts_descending() {
    let weights: WeightVector = [("AAPL", 0.3), ("MSFT", 0.2), ("XOM", 0.4), ("NEW", 0.1)]
      .into_iter()
      .collect();
    let sectors: BTreeMap<String, String> = [
      ("AAPL", "Technology"),
      ("MSFT", "Technology"),
      ("XOM", "Energy"),
    ]
    .into_iter()
    .map(|(a, s)| (a.to_string(), s.to_string()))
    .collect();

    let exposure = sector_exposure(&weights, &sectors);
    assert_eq!(exposure.rows[0].sector, "Technology");
    assert_abs_diff_eq!(exposure.rows[0].weight, 0.5, epsilon = 1e-12);
    assert_eq!(exposure.rows[1].sector, "Energy");
    assert_eq!(exposure.get(UNKNOWN_SECTOR), Some(0.1));
    assert_abs_diff_eq!(exposure.total(), 1.0, epsilon = 1e-12);
  }
}
