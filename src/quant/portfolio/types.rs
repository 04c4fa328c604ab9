//! # Portfolio Types
//!
//! $$
//! R_{\text{ann}} = e^{\bar r \cdot f} - 1,\qquad \sigma_{\text{ann}} = \sqrt{\sigma^2_{\text{step}} \cdot f}
//! $$
//!
//! Result containers handed back to the calling layer.

use serde::Deserialize;
use serde::Serialize;

use super::monte_carlo::Contribution;

/// Annualized portfolio statistics from historical prices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct HistoricalStats {
  /// Arithmetic annual return converted from the mean log return.
  pub annualized_return: f64,
  /// Annualized standard deviation of portfolio step returns.
  pub annualized_volatility: f64,
  /// `(annualized_return - risk_free) / annualized_volatility`, zero without volatility.
  pub sharpe_ratio: f64,
}

/// One step of a [`PercentileCone`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ConeBand {
  pub p05: f64,
  pub median: f64,
  pub p95: f64,
}

/// Per-step percentile bands of simulated portfolio values. Index 0 is the starting value.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PercentileCone {
  pub median: Vec<f64>,
  pub p05: Vec<f64>,
  pub p95: Vec<f64>,
}

impl PercentileCone {
  pub fn len(&self) -> usize {
    self.median.len()
  }

  pub fn is_empty(&self) -> bool {
    self.median.is_empty()
  }

  pub fn band(&self, step: usize) -> Option<ConeBand> {
    Some(ConeBand {
      p05: *self.p05.get(step)?,
      median: *self.median.get(step)?,
      p95: *self.p95.get(step)?,
    })
  }

  pub fn push(&mut self, band: ConeBand) {
    self.p05.push(band.p05);
    self.median.push(band.median);
    self.p95.push(band.p95);
  }
}

impl FromIterator<ConeBand> for PercentileCone {
  fn from_iter<I: IntoIterator<Item = ConeBand>>(iter: I) -> Self {
    let mut cone = PercentileCone::default();
    for band in iter {
      cone.push(band);
    }
    cone
  }
}

/// Parameters of one forward projection.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct ProjectionRequest {
  pub initial_value: f64,
  /// Projection length in years.
  pub horizon_years: f64,
  #[serde(default)]
  pub contribution: Option<Contribution>,
  /// Fixed seed for reproducible runs; falls back to the engine config, then to entropy.
  #[serde(default)]
  pub seed: Option<u64>,
}

/// Forward projection of a basket.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Projection {
  pub cone: PercentileCone,
  /// Length of one step in years.
  pub step_years: f64,
  /// Initial value plus every scheduled contribution.
  pub total_invested: f64,
  /// Mean terminal value over all trials.
  pub expected_terminal_value: f64,
  /// Share of trials ending below `total_invested`.
  pub probability_below_invested: f64,
  /// Statistics of the history the projection was calibrated on.
  pub stats: HistoricalStats,
}
