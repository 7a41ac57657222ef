use std::collections::BTreeMap;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use chrono::Days;
use chrono::NaiveDate;
use portfolio_rs::analytics;
use portfolio_rs::analytics::ClusterConfig;
use portfolio_rs::analytics::ClusterFeatures;
use portfolio_rs::data::PriceBar;
use portfolio_rs::data::ReturnMatrix;
use portfolio_rs::data::WeightVector;
use portfolio_rs::estimators::asset_statistics;
use portfolio_rs::optimization::EngineConfig;
use portfolio_rs::optimization::Objective;
use portfolio_rs::optimization::PortfolioEngine;
use portfolio_rs::simulation::percentile_bands;
use portfolio_rs::simulation::BootstrapConfig;
use portfolio_rs::simulation::GbmConfig;
use portfolio_rs::simulation::PathModel;
use portfolio_rs::simulation::DEFAULT_PERCENTILES;
use prettytable::row;
use prettytable::Table;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::Normal;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const RISK_FREE: f64 = 0.02;

/// (ticker, sector, annual drift, annual volatility, market beta)
const UNIVERSE: [(&str, &str, f64, f64, f64); 6] = [
  ("MKT", "Index", 0.07, 0.16, 1.0),
  ("TECH", "Technology", 0.14, 0.30, 1.3),
  ("SOFT", "Technology", 0.12, 0.27, 1.2),
  ("UTIL", "Utilities", 0.05, 0.12, 0.4),
  ("BOND", "Fixed Income", 0.03, 0.06, -0.1),
  ("GOLD", "Commodities", 0.04, 0.15, 0.0),
];

fn synthetic_prices(days: usize, seed: u64) -> Result<BTreeMap<String, Vec<PriceBar>>> {
  let start = NaiveDate::from_ymd_opt(2022, 1, 3).context("invalid start date")?;
  let dt = 1.0 / 252.0;
  let mut rng = StdRng::seed_from_u64(seed);
  let normal = Normal::new(0.0, 1.0)?;

  let mut prices: BTreeMap<String, Vec<PriceBar>> = UNIVERSE
    .iter()
    .map(|(ticker, ..)| (ticker.to_string(), Vec::with_capacity(days)))
    .collect();
  let mut levels = vec![100.0_f64; UNIVERSE.len()];

  for day in 0..days {
    let date = start
      .checked_add_days(Days::new(day as u64))
      .context("date overflow")?;
    let market: f64 = normal.sample(&mut rng);

    for (i, (ticker, _, drift, vol, beta)) in UNIVERSE.iter().enumerate() {
      if day > 0 {
        let idio: f64 = normal.sample(&mut rng);
        let systematic = (beta.abs().min(1.0)) * market;
        let residual = (1.0 - beta.abs().min(1.0).powi(2)).sqrt() * idio;
        let shock = beta.signum() * systematic + residual;
        levels[i] *= ((drift - 0.5 * vol * vol) * dt + vol * dt.sqrt() * shock).exp();
      }
      if let Some(series) = prices.get_mut(*ticker) {
        series.push(PriceBar::new(date, levels[i]));
      }
    }
  }

  Ok(prices)
}

fn print_statistics(matrix: &ReturnMatrix) {
  let mut table = Table::new();
  table.add_row(row!["Asset", "Annual return", "Annual vol", "Sharpe"]);
  for stat in asset_statistics(matrix, RISK_FREE) {
    table.add_row(row![
      stat.asset,
      format!("{:.2}%", stat.annual_return * 100.0),
      format!("{:.2}%", stat.annual_volatility * 100.0),
      format!("{:.3}", stat.sharpe)
    ]);
  }
  table.printstd();
}

fn print_simulations(matrix: &ReturnMatrix, weights: &WeightVector) -> Result<()> {
  let models: Vec<(&str, Box<dyn PathModel>)> = vec![
    (
      "GBM",
      Box::new(GbmConfig {
        seed: Some(7),
        ..GbmConfig::default()
      }) as Box<dyn PathModel>,
    ),
    (
      "Bootstrap (block 5)",
      Box::new(BootstrapConfig {
        block_size: 5,
        seed: Some(7),
        ..BootstrapConfig::default()
      }) as Box<dyn PathModel>,
    ),
  ];

  let mut table = Table::new();
  table.add_row(row!["Model", "Mean", "P10", "P50", "P90", "Min", "Max"]);
  for (name, model) in &models {
    let result = model.simulate(matrix, weights)?;
    let t = &result.terminal;
    table.add_row(row![
      name,
      format!("{:.0}", t.mean),
      format!("{:.0}", t.p10),
      format!("{:.0}", t.p50),
      format!("{:.0}", t.p90),
      format!("{:.0}", t.min),
      format!("{:.0}", t.max)
    ]);

    let bands = percentile_bands(result.paths.view(), &DEFAULT_PERCENTILES)?;
    let mid = bands.n_days() / 2;
    info!(model = name, day = mid, band = ?bands.day(mid).to_vec(), "mid-horizon percentile band");
  }
  table.printstd();
  Ok(())
}

fn print_allocations(engine: &PortfolioEngine, matrix: &ReturnMatrix, current: &WeightVector) -> Result<()> {
  let mut table = Table::new();
  table.add_row(row!["Objective", "Weights", "Return", "Vol", "Sharpe"]);

  for objective in [Objective::MinVariance, Objective::MaxSharpe, Objective::Tangency] {
    let result = match engine.optimize_with(matrix, objective) {
      Ok(result) => result,
      Err(err) if err.is_optimization_failure() => {
        info!(?objective, %err, "optimization failed, showing empty allocation");
        Default::default()
      }
      Err(err) => return Err(err.into()),
    };
    let weights = result
      .weights
      .iter()
      .map(|(a, w)| format!("{a} {:.1}%", w * 100.0))
      .collect::<Vec<_>>()
      .join(", ");
    table.add_row(row![
      format!("{objective:?}"),
      weights,
      format!("{:.2}%", result.performance.expected_return * 100.0),
      format!("{:.2}%", result.performance.volatility * 100.0),
      format!("{:.3}", result.performance.sharpe)
    ]);
  }
  table.printstd();

  let cmp = engine.compare(matrix, current)?;
  println!(
    "current Sharpe {:.3} -> optimized {:.3} (gain {:+.3})",
    cmp.current.sharpe,
    cmp.optimized.performance.sharpe,
    cmp.sharpe_gain()
  );

  let frontier = engine.frontier(matrix)?;
  let mut table = Table::new();
  table.add_row(row!["Target", "Return", "Vol", "Sharpe"]);
  for point in frontier.points.iter().step_by(5) {
    table.add_row(row![
      format!("{:.2}%", point.target_return * 100.0),
      format!("{:.2}%", point.expected_return * 100.0),
      format!("{:.2}%", point.volatility * 100.0),
      format!("{:.3}", point.sharpe)
    ]);
  }
  table.printstd();
  Ok(())
}

fn print_analytics(matrix: &ReturnMatrix, weights: &WeightVector) -> Result<()> {
  let corr = analytics::correlation_matrix(matrix)?;
  println!("average pairwise correlation {:.3}", corr.average_pairwise());

  let pca = analytics::pca(matrix, 3)?;
  println!(
    "PCA explained variance ratio {:?}",
    pca.explained_variance_ratio.to_vec()
  );

  let clusters = analytics::cluster_assets(
    matrix,
    &ClusterConfig {
      n_clusters: 3,
      features: ClusterFeatures::ByStats,
      ..ClusterConfig::default()
    },
  )?;
  let mut table = Table::new();
  table.add_row(row!["Asset", "Cluster", "Annual return", "Annual vol", "Beta"]);
  for member in &clusters.asset_stats {
    table.add_row(row![
      member.asset,
      member.cluster,
      format!("{:.2}%", member.annual_return * 100.0),
      format!("{:.2}%", member.annual_volatility * 100.0),
      format!("{:.2}", analytics::beta(matrix, &member.asset, "MKT"))
    ]);
  }
  table.printstd();

  let risk = analytics::risk_contribution(matrix, weights)?;
  let mut table = Table::new();
  table.add_row(row!["Asset", "Weight", "Marginal", "Component", "Share"]);
  for r in &risk.rows {
    table.add_row(row![
      r.asset,
      format!("{:.1}%", r.weight * 100.0),
      format!("{:.4}", r.marginal),
      format!("{:.4}", r.component),
      format!("{:.1}%", r.percent)
    ]);
  }
  table.printstd();
  println!(
    "diversification ratio {:.3}",
    analytics::diversification_ratio(matrix, weights)?
  );

  let rolling = analytics::rolling_correlation(matrix, "TECH", "MKT", analytics::DEFAULT_ROLLING_WINDOW)?;
  if let Some(latest) = rolling.latest() {
    println!("latest {}-day TECH/MKT correlation {latest:.3}", rolling.window);
  }

  let sectors: BTreeMap<String, String> = UNIVERSE
    .iter()
    .map(|(ticker, sector, ..)| (ticker.to_string(), sector.to_string()))
    .collect();
  let mut table = Table::new();
  table.add_row(row!["Sector", "Weight"]);
  for exposure in analytics::sector_exposure(weights, &sectors).rows {
    table.add_row(row![exposure.sector, format!("{:.1}%", exposure.percent())]);
  }
  table.printstd();
  Ok(())
}

fn main() -> Result<()> {
  tracing_subscriber::registry()
    .with(tracing_subscriber::fmt::layer())
    .with(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let prices = synthetic_prices(3 * 252, 2024)?;
  let matrix = ReturnMatrix::from_prices(&prices)?;
  if matrix.n_observations() < 2 {
    bail!("synthetic universe produced too few observations");
  }
  info!(
    assets = matrix.n_assets(),
    observations = matrix.n_observations(),
    "built return matrix"
  );

  let current: WeightVector = [("MKT", 0.4), ("TECH", 0.3), ("BOND", 0.2), ("GOLD", 0.1)]
    .into_iter()
    .collect();
  let engine = PortfolioEngine::new(EngineConfig {
    objective: Objective::MaxSharpe,
    ..EngineConfig::default()
  });

  print_statistics(&matrix);
  print_simulations(&matrix, &current)?;
  print_allocations(&engine, &matrix, &current)?;
  print_analytics(&matrix, &current)?;
  Ok(())
}
