//! # Cancellation
//!
//! Cooperative cancellation for long-running simulation and frontier calls.
//! Engines poll [`CancelToken::check`] at per-day and per-point boundaries.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use crate::error::PortfolioError;
use crate::error::Result;

/// Shared cancellation flag with an optional deadline.
///
/// Clones observe the same flag, so a token handed to a worker can be
/// cancelled from the calling thread.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
  flag: Arc<AtomicBool>,
  deadline: Option<Instant>,
}

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  /// Token that reports [`PortfolioError::TimedOut`] once `timeout` has elapsed.
  pub fn with_timeout(timeout: Duration) -> Self {
    Self {
      flag: Arc::new(AtomicBool::new(false)),
      deadline: Instant::now().checked_add(timeout),
    }
  }

  pub fn cancel(&self) {
    self.flag.store(true, Ordering::Relaxed);
  }

  pub fn is_cancelled(&self) -> bool {
    self.flag.load(Ordering::Relaxed)
  }

  /// Return an error if the token was cancelled or its deadline passed.
  pub fn check(&self) -> Result<()> {
    if self.is_cancelled() {
      return Err(PortfolioError::Cancelled);
    }

    match self.deadline {
      Some(deadline) if Instant::now() >= deadline => Err(PortfolioError::TimedOut),
      _ => Ok(()),
    }
  }
}
