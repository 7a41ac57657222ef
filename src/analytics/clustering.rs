//! # Asset Clustering
//!
//! $$
//! \min_{C_1,\dots,C_k}\sum_{j=1}^{k}\sum_{x\in C_j}\lVert x-\mu_j\rVert^2
//! $$
//!
//! K-means (Lloyd iterations, k-means++ seeding, best of several restarts)
//! over standardized per-asset features.

use std::str::FromStr;

use ndarray::s;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::debug;

use super::standardize_columns;
use crate::data::ReturnMatrix;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::estimators::asset_statistics;

/// Feature space an asset is described in before clustering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClusterFeatures {
  /// The raw return series, one feature per observation.
  #[default]
  ByReturns,
  /// Annual return and annual volatility.
  ByStats,
  /// Annual return, annual volatility, then the raw return series.
  ByBoth,
}

impl ClusterFeatures {
  fn feature_names(self, n_observations: usize) -> Vec<String> {
    let stats = ["annual_return".to_string(), "annual_volatility".to_string()];
    let returns = (0..n_observations).map(|t| format!("r{t}"));
    match self {
      Self::ByReturns => returns.collect(),
      Self::ByStats => stats.to_vec(),
      Self::ByBoth => stats.into_iter().chain(returns).collect(),
    }
  }

  /// `n_assets × n_features` matrix, before standardization.
  fn build(self, matrix: &ReturnMatrix) -> Array2<f64> {
    let returns = matrix.values().t().to_owned();
    if self == Self::ByReturns {
      return returns;
    }

    let stats = asset_statistics(matrix, 0.0);
    let n_stats = 2;
    let n_features = match self {
      Self::ByStats => n_stats,
      _ => n_stats + matrix.n_observations(),
    };

    let mut x = Array2::<f64>::zeros((matrix.n_assets(), n_features));
    for (i, stat) in stats.iter().enumerate() {
      x[[i, 0]] = stat.annual_return;
      x[[i, 1]] = stat.annual_volatility;
    }
    if self == Self::ByBoth {
      x.slice_mut(s![.., n_stats..]).assign(&returns);
    }
    x
  }
}

impl FromStr for ClusterFeatures {
  type Err = PortfolioError;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_lowercase().as_str() {
      "returns" => Ok(Self::ByReturns),
      "stats" => Ok(Self::ByStats),
      "both" => Ok(Self::ByBoth),
      other => Err(PortfolioError::invalid_argument(
        "features",
        format!("unknown feature set '{other}'"),
      )),
    }
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClusterConfig {
  pub n_clusters: usize,
  pub features: ClusterFeatures,
  /// Independent k-means++ restarts; the lowest inertia wins.
  pub n_init: usize,
  pub seed: u64,
  pub max_iter: usize,
  /// Center-shift tolerance, relative to the mean feature variance.
  pub tol: f64,
}

impl Default for ClusterConfig {
  fn default() -> Self {
    Self {
      n_clusters: 3,
      features: ClusterFeatures::ByReturns,
      n_init: 10,
      seed: 42,
      max_iter: 300,
      tol: 1e-4,
    }
  }
}

/// One asset's cluster and summary statistics.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterMember {
  pub asset: String,
  pub cluster: usize,
  pub annual_return: f64,
  pub annual_volatility: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClusterResult {
  pub assets: Vec<String>,
  pub labels: Vec<usize>,
  /// `k × n_features`, in the original (unstandardized) feature units.
  pub centers: Array2<f64>,
  pub feature_names: Vec<String>,
  /// Within-cluster sum of squares in standardized units.
  pub inertia: f64,
  pub asset_stats: Vec<ClusterMember>,
}

impl ClusterResult {
  pub fn n_clusters(&self) -> usize {
    self.centers.nrows()
  }

  /// Assets assigned to `cluster`, in matrix order.
  pub fn members(&self, cluster: usize) -> Vec<&str> {
    self
      .assets
      .iter()
      .zip(&self.labels)
      .filter(|(_, &label)| label == cluster)
      .map(|(asset, _)| asset.as_str())
      .collect()
  }
}

/// Cluster the assets of `matrix` in the configured feature space.
///
/// Uses `min(n_clusters, n_assets)` clusters. Restart `i` is seeded with
/// `seed + i`, so results do not depend on the thread count.
pub fn cluster_assets(matrix: &ReturnMatrix, config: &ClusterConfig) -> Result<ClusterResult> {
  if config.n_clusters == 0 {
    return Err(PortfolioError::invalid_argument(
      "n_clusters",
      "at least one cluster is required",
    ));
  }
  if config.n_init == 0 {
    return Err(PortfolioError::invalid_argument(
      "n_init",
      "at least one restart is required",
    ));
  }
  matrix.ensure_observations(2)?;

  let k = config.n_clusters.min(matrix.n_assets());
  let mut x = config.features.build(matrix);
  let (means, scales) = standardize_columns(&mut x);

  let mean_variance = x
    .columns()
    .into_iter()
    .map(|c| c.var(0.0))
    .sum::<f64>()
    / x.ncols().max(1) as f64;
  let tol = config.tol * mean_variance;

  debug!(
    n_assets = matrix.n_assets(),
    n_features = x.ncols(),
    k,
    n_init = config.n_init,
    "clustering assets"
  );

  let runs: Vec<KMeansRun> = (0..config.n_init)
    .into_par_iter()
    .map(|i| {
      let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(i as u64));
      lloyd(x.view(), k, config.max_iter, tol, &mut rng)
    })
    .collect();

  let best = runs
    .into_iter()
    .reduce(|best, run| if run.inertia < best.inertia { run } else { best })
    .ok_or_else(|| PortfolioError::invalid_argument("n_init", "no restart produced a result"))?;

  let mut centers = best.centers;
  for (j, mut col) in centers.columns_mut().into_iter().enumerate() {
    col.mapv_inplace(|v| v * scales[j] + means[j]);
  }

  let asset_stats = asset_statistics(matrix, 0.0)
    .into_iter()
    .zip(&best.labels)
    .map(|(stat, &cluster)| ClusterMember {
      asset: stat.asset,
      cluster,
      annual_return: stat.annual_return,
      annual_volatility: stat.annual_volatility,
    })
    .collect();

  Ok(ClusterResult {
    assets: matrix.assets().to_vec(),
    labels: best.labels,
    centers,
    feature_names: config.features.feature_names(matrix.n_observations()),
    inertia: best.inertia,
    asset_stats,
  })
}

struct KMeansRun {
  labels: Vec<usize>,
  centers: Array2<f64>,
  inertia: f64,
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
  a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// k-means++: first center uniformly at random, then each next center with
/// probability proportional to its squared distance from the chosen ones.
fn kmeans_plusplus_init<R: Rng + ?Sized>(x: ArrayView2<f64>, k: usize, rng: &mut R) -> Array2<f64> {
  let n = x.nrows();
  let mut centers = Array2::<f64>::zeros((k, x.ncols()));
  let first = rng.gen_range(0..n);
  centers.row_mut(0).assign(&x.row(first));

  let mut min_dist: Vec<f64> = x
    .rows()
    .into_iter()
    .map(|row| squared_distance(row, centers.row(0)))
    .collect();

  for c in 1..k {
    let total: f64 = min_dist.iter().sum();
    let chosen = if total > 0.0 {
      let target = rng.gen::<f64>() * total;
      let mut acc = 0.0;
      let mut pick = n - 1;
      for (i, &d) in min_dist.iter().enumerate() {
        acc += d;
        if acc > target && d > 0.0 {
          pick = i;
          break;
        }
      }
      pick
    } else {
      rng.gen_range(0..n)
    };

    centers.row_mut(c).assign(&x.row(chosen));
    for (i, row) in x.rows().into_iter().enumerate() {
      min_dist[i] = min_dist[i].min(squared_distance(row, centers.row(c)));
    }
  }

  centers
}

fn assign_labels(x: ArrayView2<f64>, centers: &Array2<f64>) -> (Vec<usize>, f64) {
  let mut inertia = 0.0;
  let labels = x
    .rows()
    .into_iter()
    .map(|row| {
      let (label, dist) = centers
        .rows()
        .into_iter()
        .enumerate()
        .map(|(c, center)| (c, squared_distance(row, center)))
        .fold((0, f64::INFINITY), |best, cand| if cand.1 < best.1 { cand } else { best });
      inertia += dist;
      label
    })
    .collect();
  (labels, inertia)
}

/// Mean of assigned points per cluster; an empty cluster keeps its previous center.
fn update_centers(x: ArrayView2<f64>, labels: &[usize], previous: &Array2<f64>) -> Array2<f64> {
  let k = previous.nrows();
  let mut sums = Array2::<f64>::zeros(previous.dim());
  let mut counts = vec![0usize; k];

  for (row, &label) in x.rows().into_iter().zip(labels) {
    let mut target = sums.row_mut(label);
    target += &row;
    counts[label] += 1;
  }

  for (c, mut row) in sums.axis_iter_mut(Axis(0)).enumerate() {
    if counts[c] > 0 {
      row /= counts[c] as f64;
    } else {
      row.assign(&previous.row(c));
    }
  }
  sums
}

fn lloyd<R: Rng + ?Sized>(
  x: ArrayView2<f64>,
  k: usize,
  max_iter: usize,
  tol: f64,
  rng: &mut R,
) -> KMeansRun {
  let mut centers = kmeans_plusplus_init(x, k, rng);

  for _ in 0..max_iter {
    let (labels, _) = assign_labels(x, &centers);
    let next = update_centers(x, &labels, &centers);
    let shift: f64 = (&next - &centers).mapv(|d| d * d).sum();
    centers = next;
    if shift <= tol {
      break;
    }
  }

  let (labels, inertia) = assign_labels(x, &centers);
  KMeansRun {
    labels,
    centers,
    inertia,
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  /// Two obvious groups: three calm assets and three volatile ones.
  fn two_groups() -> ReturnMatrix {
    let n = 120;
    let mut cols = Vec::new();
    for a in 0..3 {
      let col = (0..n)
        .map(|t| 0.0002 + 0.002 * ((t as f64) * (0.5 + a as f64 * 0.1)).sin())
        .collect();
      cols.push((format!("CALM{a}"), col));
    }
    for a in 0..3 {
      let col = (0..n)
        .map(|t| 0.003 + 0.04 * ((t as f64) * (0.9 + a as f64 * 0.1)).cos())
        .collect();
      cols.push((format!("WILD{a}"), col));
    }
    ReturnMatrix::from_columns(cols).unwrap()
  }

  #[test]
  fn stats_features_separate_obvious_groups() {
    let config = ClusterConfig {
      n_clusters: 2,
      features: ClusterFeatures::ByStats,
      ..ClusterConfig::default()
    };
    let result = cluster_assets(&two_groups(), &config).unwrap();

    assert_eq!(result.labels[0], result.labels[1]);
    assert_eq!(result.labels[1], result.labels[2]);
    assert_eq!(result.labels[3], result.labels[4]);
    assert_eq!(result.labels[4], result.labels[5]);
    assert_ne!(result.labels[0], result.labels[3]);
    assert_eq!(result.feature_names, vec!["annual_return", "annual_volatility"]);
  }

  #[test]
  fn centers_are_in_original_units() {
    let config = ClusterConfig {
      n_clusters: 2,
      features: ClusterFeatures::ByStats,
      ..ClusterConfig::default()
    };
    let result = cluster_assets(&two_groups(), &config).unwrap();
    let calm = result.labels[0];

    let calm_vol: f64 = result.asset_stats[..3].iter().map(|m| m.annual_volatility).sum::<f64>() / 3.0;
    assert_abs_diff_eq!(result.centers[[calm, 1]], calm_vol, epsilon = 1e-9);
  }

  #[test]
  fn fixed_seed_is_deterministic() {
    let config = ClusterConfig {
      n_clusters: 3,
      features: ClusterFeatures::ByBoth,
      ..ClusterConfig::default()
    };
    let a = cluster_assets(&two_groups(), &config).unwrap();
    let b = cluster_assets(&two_groups(), &config).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.centers.ncols(), 2 + 120);
  }

  #[test]
  fn cluster_count_is_capped_by_assets() {
    let config = ClusterConfig {
      n_clusters: 50,
      ..ClusterConfig::default()
    };
    let result = cluster_assets(&two_groups(), &config).unwrap();
    assert_eq!(result.n_clusters(), 6);
    assert_abs_diff_eq!(result.inertia, 0.0, epsilon = 1e-9);
  }

  #[test]
  fn zero_clusters_is_invalid() {
    let config = ClusterConfig {
      n_clusters: 0,
      ..ClusterConfig::default()
    };
    assert!(matches!(
      cluster_assets(&two_groups(), &config),
      Err(PortfolioError::InvalidArgument { .. })
    ));
  }

  #[test]
  fn features_parse_from_tags() {
    assert_eq!("stats".parse::<ClusterFeatures>().unwrap(), ClusterFeatures::ByStats);
    assert!("momentum".parse::<ClusterFeatures>().is_err());
  }
}
