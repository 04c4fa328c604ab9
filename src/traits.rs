//! # Traits
//!
//! $$
//! \text{Trait contracts: }\mathcal{A}:\text{(seed, trial)}\to\text{path}
//! $$
//!
//! Path sampling with a seeded parallel fan-out and cooperative cancellation.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use anyhow::Result;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::error::AnalyticsError;

/// Cooperative stop signal shared between the caller and a running simulation.
///
/// Cloning is cheap and every clone observes the same flag. An optional deadline turns the token into a
/// wall-clock budget as well.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
  flag: Arc<AtomicBool>,
  deadline: Option<Instant>,
}

impl CancellationToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_deadline(deadline: Instant) -> Self {
    Self {
      flag: Arc::new(AtomicBool::new(false)),
      deadline: Some(deadline),
    }
  }

  pub fn with_timeout(timeout: Duration) -> Self {
    Self::with_deadline(Instant::now() + timeout)
  }

  pub fn cancel(&self) {
    self.flag.store(true, Ordering::Relaxed);
  }

  pub fn is_cancelled(&self) -> bool {
    self.check().is_err()
  }

  /// `Ok(())` while the run may continue.
  pub fn check(&self) -> std::result::Result<(), AnalyticsError> {
    if self.flag.load(Ordering::Relaxed) {
      return Err(AnalyticsError::Cancelled);
    }
    match self.deadline {
      Some(deadline) if Instant::now() >= deadline => Err(AnalyticsError::DeadlineExceeded),
      _ => Ok(()),
    }
  }
}

/// Seed of trial `trial` in a run seeded with `seed`.
#[inline]
pub fn trial_seed(seed: u64, trial: usize) -> u64 {
  seed.wrapping_add(0xD134_2543_DE82_EF95_u64.wrapping_mul((trial as u64).wrapping_add(1)))
}

pub trait PathSamplerExt: Send + Sync {
  /// Number of simulated steps; sampled paths have `n_steps() + 1` points including the start.
  fn n_steps(&self) -> usize;

  /// Sample one path from the supplied generator.
  fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64>;

  fn sample(&self) -> Vec<f64> {
    self.sample_with(&mut rand::thread_rng())
  }

  /// Sample `m` independent paths in parallel into an `m x (n_steps + 1)` matrix.
  ///
  /// Row `i` is always produced by `StdRng::seed_from_u64(trial_seed(seed, i))`, so the result is identical
  /// for any thread count or completion order.
  fn sample_par(&self, m: usize, seed: u64, cancel: &CancellationToken) -> Result<Array2<f64>> {
    let width = self.n_steps() + 1;
    let rows = (0..m)
      .into_par_iter()
      .map(|trial| -> Result<Vec<f64>> {
        cancel.check()?;
        let mut rng = StdRng::seed_from_u64(trial_seed(seed, trial));
        Ok(self.sample_with(&mut rng))
      })
      .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_vec((m, width), rows.concat())?)
  }
}
