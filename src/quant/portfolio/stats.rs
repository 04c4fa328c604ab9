//! # Historical Portfolio Statistics
//!
//! $$
//! f = \frac{N-1}{\Delta t_{\text{years}}},\qquad
//! \bar r_p = \sum_i w_i \bar r_i,\qquad
//! \sigma_p^2 = \sum_{i,j} w_i w_j \Sigma_{ij}
//! $$
//!
//! Calibrates per-step return moments of a weighted basket and annualizes them with the sampling frequency
//! implied by the actual calendar span, which copes with mixed daily/weekly/monthly grids.

use ndarray::Array2;
use serde::Deserialize;
use tracing::debug;
use tracing::warn;

use super::data::align_price_series;
use super::data::covariance_matrix;
use super::data::log_return_matrix;
use super::data::PriceSeries;
use super::types::HistoricalStats;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct HistoricalStatsConfig {
  /// A series needs strictly more points than this to take part.
  pub min_history: usize,
  /// Annual risk-free rate used for the Sharpe ratio.
  pub risk_free: f64,
  /// Shortest calendar span, in years, that is annualized at all.
  pub min_span_years: f64,
  pub days_per_year: f64,
}

impl Default for HistoricalStatsConfig {
  fn default() -> Self {
    Self {
      min_history: 5,
      risk_free: 0.04,
      min_span_years: 0.5,
      days_per_year: 365.25,
    }
  }
}

/// Intermediate moments of an aligned basket.
#[derive(Clone, Debug)]
pub struct HistoricalCalibration {
  /// `assets x observations` log returns.
  pub returns: Array2<f64>,
  /// Mean step log return per asset.
  pub mean_returns: Vec<f64>,
  /// Population covariance of step log returns.
  pub covariance: Array2<f64>,
  /// Weights normalised to sum to one.
  pub weights: Vec<f64>,
  pub samples_per_year: f64,
  pub elapsed_years: f64,
}

impl HistoricalCalibration {
  pub fn step_return(&self) -> f64 {
    self
      .weights
      .iter()
      .zip(self.mean_returns.iter())
      .map(|(w, r)| w * r)
      .sum()
  }

  pub fn step_variance(&self) -> f64 {
    let n = self.weights.len();
    let mut var = 0.0;
    for i in 0..n {
      for j in 0..n {
        var += self.weights[i] * self.weights[j] * self.covariance[[i, j]];
      }
    }
    var.max(0.0)
  }

  /// Per-asset step volatility from the covariance diagonal.
  pub fn step_volatilities(&self) -> Vec<f64> {
    self
      .covariance
      .diag()
      .iter()
      .map(|v| v.max(0.0).sqrt())
      .collect()
  }

  pub fn stats(&self, risk_free: f64) -> HistoricalStats {
    let annualized_return = (self.step_return() * self.samples_per_year).exp() - 1.0;
    let annualized_volatility = (self.step_variance() * self.samples_per_year).sqrt();

    if !annualized_return.is_finite() || !annualized_volatility.is_finite() {
      warn!(annualized_return, annualized_volatility, "non-finite annualized statistics");
      return HistoricalStats::default();
    }

    let sharpe_ratio = if annualized_volatility > 1e-12 {
      (annualized_return - risk_free) / annualized_volatility
    } else {
      0.0
    };

    HistoricalStats {
      annualized_return,
      annualized_volatility,
      sharpe_ratio,
    }
  }
}

/// Estimates annualized return and volatility of a weighted basket from its price history.
#[derive(Clone, Debug, Default)]
pub struct HistoricalStatsEstimator {
  config: HistoricalStatsConfig,
}

impl HistoricalStatsEstimator {
  pub fn new(config: HistoricalStatsConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &HistoricalStatsConfig {
    &self.config
  }

  /// Align the holdings and compute their step moments.
  ///
  /// `None` marks a degenerate basket: no series with enough history, zero total weight, fewer than two
  /// aligned points, or a span too short to annualize.
  pub fn calibrate(&self, holdings: &[(PriceSeries, f64)]) -> Option<HistoricalCalibration> {
    let valid: Vec<(&PriceSeries, f64)> = holdings
      .iter()
      .filter(|(series, _)| series.len() > self.config.min_history)
      .map(|(series, w)| (series, if w.is_finite() { *w } else { 0.0 }))
      .collect();

    if valid.is_empty() {
      debug!(holdings = holdings.len(), "no holding has enough history");
      return None;
    }

    let total_weight: f64 = valid.iter().map(|(_, w)| w).sum();
    if total_weight.abs() < 1e-12 {
      debug!("total weight of valid holdings is zero");
      return None;
    }

    let series: Vec<&PriceSeries> = valid.iter().map(|(s, _)| *s).collect();
    let aligned = align_price_series(&series);
    if aligned.len() < 2 {
      debug!(points = aligned.len(), "aligned history too short");
      return None;
    }

    let elapsed_years = aligned.elapsed_days() as f64 / self.config.days_per_year;
    if elapsed_years < self.config.min_span_years {
      warn!(
        elapsed_years,
        min_span_years = self.config.min_span_years,
        "elapsed span too short to annualize"
      );
      return None;
    }

    let samples_per_year = (aligned.len() - 1) as f64 / elapsed_years;
    let returns = log_return_matrix(&aligned.prices);
    let covariance = covariance_matrix(&returns);
    let mean_returns: Vec<f64> = returns
      .rows()
      .into_iter()
      .map(|row| {
        let m = row.mean().unwrap_or(0.0);
        if m.is_finite() {
          m
        } else {
          0.0
        }
      })
      .collect();
    let weights: Vec<f64> = valid.iter().map(|(_, w)| w / total_weight).collect();

    debug!(
      assets = weights.len(),
      points = aligned.len(),
      elapsed_years,
      samples_per_year,
      "calibrated historical moments"
    );

    Some(HistoricalCalibration {
      returns,
      mean_returns,
      covariance,
      weights,
      samples_per_year,
      elapsed_years,
    })
  }

  /// Annualized statistics, or all zeros for a degenerate basket.
  pub fn estimate(&self, holdings: &[(PriceSeries, f64)]) -> HistoricalStats {
    self
      .calibrate(holdings)
      .map(|c| c.stats(self.config.risk_free))
      .unwrap_or_default()
  }
}
