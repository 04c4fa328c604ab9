//! # Portfolio Engine
//!
//! $$
//! n = \lceil T f \rceil,\qquad \Delta t = T / n,\qquad \mu_i^{\Delta t} = (\bar r_i + \tfrac12 \sigma_i^2)\,\Delta t f
//! $$
//!
//! High-level entry point used by the request layer: historical statistics, forward projections, factor
//! scores and the sentiment reading, all configured from one [`PortfolioEngineConfig`].

use anyhow::Result;
use rand::thread_rng;
use rand::Rng;
use serde::Deserialize;
use tracing::debug;
use tracing::warn;

use super::cholesky::cholesky_lower;
use super::cone::percentile_cone;
use super::data::PriceSeries;
use super::monte_carlo::Contribution;
use super::monte_carlo::MonteCarloPathGenerator;
use super::monte_carlo::SimulationConfig;
use super::stats::HistoricalCalibration;
use super::stats::HistoricalStatsConfig;
use super::stats::HistoricalStatsEstimator;
use super::types::ConeBand;
use super::types::HistoricalStats;
use super::types::Projection;
use super::types::ProjectionRequest;
use crate::error::AnalyticsError;
use crate::quant::factors::forecast_expected_returns;
use crate::quant::factors::ExpectedReturnForecast;
use crate::quant::factors::FactorConfig;
use crate::quant::factors::FactorInputs;
use crate::quant::factors::FactorScore;
use crate::quant::factors::FactorScorer;
use crate::quant::sentiment::SentimentConfig;
use crate::quant::sentiment::SentimentReading;
use crate::quant::sentiment::SentimentRegimeClassifier;
use crate::traits::CancellationToken;
use crate::traits::PathSamplerExt;

/// Runtime configuration for [`PortfolioEngine`].
///
/// Every section falls back to its defaults, so partial TOML or JSON overrides are enough.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct PortfolioEngineConfig {
  pub history: HistoricalStatsConfig,
  pub simulation: SimulationConfig,
  pub factors: FactorConfig,
  pub sentiment: SentimentConfig,
}

/// Single entry-point engine for portfolio analytics.
#[derive(Clone, Debug, Default)]
pub struct PortfolioEngine {
  config: PortfolioEngineConfig,
}

impl PortfolioEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: PortfolioEngineConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &PortfolioEngineConfig {
    &self.config
  }

  fn estimator(&self) -> HistoricalStatsEstimator {
    HistoricalStatsEstimator::new(self.config.history.clone())
  }

  /// Annualized return and volatility of a weighted basket. Zeros for unusable history.
  pub fn historical_stats(&self, holdings: &[(PriceSeries, f64)]) -> HistoricalStats {
    self.estimator().estimate(holdings)
  }

  /// Simulate the basket forward and summarise the ensemble as a percentile cone.
  ///
  /// History that cannot be calibrated yields a flat projection at the invested amount instead of an error.
  /// Errors are returned for invalid requests and for cancelled or timed-out runs.
  pub fn project(
    &self,
    holdings: &[(PriceSeries, f64)],
    request: &ProjectionRequest,
    cancel: &CancellationToken,
  ) -> Result<Projection> {
    let sim = &self.config.simulation;

    if !request.initial_value.is_finite() || request.initial_value < 0.0 {
      anyhow::bail!(AnalyticsError::invalid_parameter(format!(
        "initial value must be finite and non-negative, got {}",
        request.initial_value
      )));
    }
    if !request.horizon_years.is_finite() || request.horizon_years <= 0.0 {
      anyhow::bail!(AnalyticsError::invalid_parameter(format!(
        "horizon must be positive, got {} years",
        request.horizon_years
      )));
    }
    if sim.trials == 0 {
      anyhow::bail!(AnalyticsError::invalid_parameter("at least one trial is required"));
    }
    cancel.check()?;

    let Some(calibration) = self.estimator().calibrate(holdings) else {
      debug!("history unusable, returning flat projection");
      return Ok(self.flat_projection(request));
    };

    let n_steps = self.step_count(request.horizon_years, calibration.samples_per_year);
    let step_years = request.horizon_years / n_steps as f64;
    let generator = self.generator(&calibration, request, n_steps, step_years)?;

    let seed = request
      .seed
      .or(sim.seed)
      .unwrap_or_else(|| thread_rng().gen());
    debug!(trials = sim.trials, steps = n_steps, seed, "simulating basket");

    let paths = generator.sample_par(sim.trials, seed, cancel)?;
    let cone = percentile_cone(&paths);

    let total_invested = generator.total_invested();
    let terminal: Vec<f64> = paths
      .column(n_steps)
      .iter()
      .copied()
      .filter(|v| v.is_finite())
      .collect();
    let expected_terminal_value = if terminal.is_empty() {
      total_invested
    } else {
      terminal.iter().sum::<f64>() / terminal.len() as f64
    };
    let probability_below_invested = terminal.iter().filter(|&&v| v < total_invested).count() as f64
      / sim.trials as f64;

    Ok(Projection {
      cone,
      step_years,
      total_invested,
      expected_terminal_value,
      probability_below_invested,
      stats: calibration.stats(self.config.history.risk_free),
    })
  }

  fn step_count(&self, horizon_years: f64, samples_per_year: f64) -> usize {
    let max_steps = self.config.simulation.max_steps.max(1);
    let raw = (horizon_years * samples_per_year).ceil();
    if raw > max_steps as f64 {
      warn!(requested = raw, max_steps, "projection coarsened to the step limit");
      max_steps
    } else {
      (raw as usize).max(1)
    }
  }

  /// Rescale the historical step moments to the projection step and build the path generator.
  fn generator(
    &self,
    calibration: &HistoricalCalibration,
    request: &ProjectionRequest,
    n_steps: usize,
    step_years: f64,
  ) -> Result<MonteCarloPathGenerator> {
    let scale = step_years * calibration.samples_per_year;
    let vols: Vec<f64> = calibration
      .step_volatilities()
      .iter()
      .map(|s| s * scale.sqrt())
      .collect();
    let drifts: Vec<f64> = calibration
      .mean_returns
      .iter()
      .zip(vols.iter())
      .map(|(r, s)| r * scale + 0.5 * s * s)
      .collect();
    let cholesky = cholesky_lower(&(&calibration.covariance * scale));

    MonteCarloPathGenerator::new(
      request.initial_value,
      &calibration.weights,
      &drifts,
      &vols,
      cholesky,
      n_steps,
      step_years,
      request.contribution,
    )
  }

  /// Projection without market moves: the invested amount at every step.
  fn flat_projection(&self, request: &ProjectionRequest) -> Projection {
    let spy = self.config.simulation.fallback_steps_per_year;
    let n_steps = self.step_count(request.horizon_years, spy);
    let contribution = request
      .contribution
      .filter(|c| c.amount.is_finite() && c.every_steps > 0);

    let invested_at = |step: usize| {
      request.initial_value
        + contribution
          .map(|c: Contribution| c.amount * c.count(step) as f64)
          .unwrap_or(0.0)
    };
    let cone = (0..=n_steps)
      .map(|step| {
        let v = invested_at(step);
        ConeBand {
          p05: v,
          median: v,
          p95: v,
        }
      })
      .collect();
    let total_invested = invested_at(n_steps);

    Projection {
      cone,
      step_years: request.horizon_years / n_steps as f64,
      total_invested,
      expected_terminal_value: total_invested,
      probability_below_invested: 0.0,
      stats: HistoricalStats::default(),
    }
  }

  /// Cross-sectional factor scores of a peer set.
  pub fn score_factors(&self, peers: &[FactorInputs]) -> Vec<FactorScore> {
    FactorScorer::new(self.config.factors.clone()).score(peers)
  }

  /// Expected returns from factor scores, using the configured risk-free rate.
  pub fn forecast_returns(
    &self,
    scores: &[FactorScore],
    benchmark_volatility: f64,
  ) -> Vec<ExpectedReturnForecast> {
    forecast_expected_returns(scores, self.config.history.risk_free, benchmark_volatility)
  }

  pub fn classify_sentiment(&self, series: &[f64]) -> SentimentReading {
    SentimentRegimeClassifier::new(self.config.sentiment.clone()).classify(series)
  }
}
