//! # portfolio-rs
//!
//! $$
//! (\text{returns}, \mathbf w) \mapsto \{\text{paths},\ \mathbf w^\*,\ \text{risk structure}\}
//! $$
//!
//! Portfolio forecasting and evaluation on historical return series:
//! Monte Carlo and bootstrap simulation of portfolio value, long-only
//! mean-variance optimization, and correlation / PCA / clustering / risk
//! decomposition analytics.
//!
//! All engines are pure functions of their inputs (plus a seed where random
//! numbers are involved). The library emits `tracing` events and never
//! installs a subscriber.

pub mod analytics;
pub mod cancel;
pub mod data;
pub mod error;
pub mod estimators;
pub mod optimization;
pub mod simulation;

pub use cancel::CancelToken;
pub use data::PriceBar;
pub use data::ReturnMatrix;
pub use data::WeightVector;
pub use error::PortfolioError;
pub use error::Result;
pub use error::SolveFailure;
pub use estimators::ReturnMethod;
pub use estimators::StatisticsBundle;
pub use optimization::Objective;
pub use optimization::OptimizationResult;
pub use optimization::OptimizerConfig;
pub use optimization::PortfolioEngine;
pub use simulation::PathModel;
pub use simulation::SimulationResult;
