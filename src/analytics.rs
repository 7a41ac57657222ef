//! # Risk & Structure Analytics
//!
//! $$
//! \rho_{ij}=\frac{\Sigma_{ij}}{\sqrt{\Sigma_{ii}\Sigma_{jj}}},\qquad
//! DR=\frac{\sum_i w_i\sigma_i}{\sqrt{\mathbf w^\top\Sigma\mathbf w}}
//! $$
//!
//! Correlation structure, principal components, asset clustering and
//! per-position risk decomposition of a return matrix.

pub mod clustering;
pub mod correlation;
pub mod pca;
pub mod risk;
pub mod rolling;
pub mod sector;

use ndarray::Array2;

pub use clustering::cluster_assets;
pub use clustering::ClusterConfig;
pub use clustering::ClusterFeatures;
pub use clustering::ClusterMember;
pub use clustering::ClusterResult;
pub use correlation::correlation_matrix;
pub use correlation::CorrelationMatrix;
pub use pca::pca;
pub use pca::PcaResult;
pub use risk::beta;
pub use risk::diversification_ratio;
pub use risk::risk_contribution;
pub use risk::RiskContribution;
pub use risk::RiskContributionRow;
pub use rolling::rolling_correlation;
pub use rolling::RollingCorrelation;
pub use rolling::DEFAULT_ROLLING_WINDOW;
pub use sector::sector_exposure;
pub use sector::SectorExposure;
pub use sector::SectorWeight;
pub use sector::UNKNOWN_SECTOR;

use crate::data::mean_of;
use crate::data::std_of;
use crate::data::AlignedWeights;
use crate::data::ReturnMatrix;
use crate::data::WeightVector;
use crate::error::Result;
use crate::estimators::covariance;

/// Aligned weights plus the annualized covariance of the overlapping assets.
///
/// `None` when no weighted asset is present in the matrix.
pub(crate) fn weighted_covariance(
  matrix: &ReturnMatrix,
  weights: &WeightVector,
) -> Result<Option<(AlignedWeights, Array2<f64>)>> {
  if !weights.assets().any(|a| matrix.contains(a)) {
    return Ok(None);
  }

  let aligned = weights.align(matrix)?;
  let cov = covariance(&matrix.select_indices(&aligned.indices))?;
  Ok(Some((aligned, cov)))
}

/// Standardize the columns of `x` in place (population std, zero std scales by one).
///
/// Returns the column means and scales needed to undo the transform.
pub(crate) fn standardize_columns(x: &mut Array2<f64>) -> (Vec<f64>, Vec<f64>) {
  let mut means = Vec::with_capacity(x.ncols());
  let mut scales = Vec::with_capacity(x.ncols());

  for mut col in x.columns_mut() {
    let mean = mean_of(col.view());
    let std = std_of(col.view(), 0);
    let scale = if std > 0.0 { std } else { 1.0 };
    col.mapv_inplace(|v| (v - mean) / scale);
    means.push(mean);
    scales.push(scale);
  }

  (means, scales)
}
