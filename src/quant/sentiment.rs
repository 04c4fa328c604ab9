//! # Sentiment Regime
//!
//! $$
//! \alpha = \frac{2}{N+1},\qquad e_t = \alpha\,s_t + (1-\alpha)\,e_{t-1},\qquad
//! \lambda = \operatorname{clamp}(2 - 0.015\,e_T,\ 0.5,\ 2)
//! $$
//!
//! Smooths a daily 0-100 sentiment score and classifies the risk regime with a hysteresis window: a regime
//! is only entered once the last `H` smoothed values all agree.
//!
//! The EMA is always folded from the first observation. Each value depends on its predecessor, so the chain
//! is never patched in place or split across threads.

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskRegime {
  RiskOn,
  #[default]
  Neutral,
  RiskOff,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
  /// EMA window `N`.
  pub window: usize,
  /// Consecutive days `H` required to enter a regime.
  pub hysteresis: usize,
  pub risk_on_threshold: f64,
  pub risk_off_threshold: f64,
  pub lambda_base: f64,
  pub lambda_slope: f64,
  pub lambda_min: f64,
  pub lambda_max: f64,
}

impl Default for SentimentConfig {
  fn default() -> Self {
    Self {
      window: 10,
      hysteresis: 3,
      risk_on_threshold: 75.0,
      risk_off_threshold: 25.0,
      lambda_base: 2.0,
      lambda_slope: 0.015,
      lambda_min: 0.5,
      lambda_max: 2.0,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SentimentReading {
  pub sentiment_ema: f64,
  pub risk_regime: RiskRegime,
  pub lambda: f64,
  /// Last raw observation, `None` for an empty series.
  pub latest_score: Option<f64>,
}

impl Default for SentimentReading {
  fn default() -> Self {
    Self {
      sentiment_ema: 50.0,
      risk_regime: RiskRegime::Neutral,
      lambda: 1.0,
      latest_score: None,
    }
  }
}

/// Exponential moving average of a sentiment series, same length as the input.
///
/// Observations are clamped to `[0, 100]`. A non-finite observation carries the previous value forward; a
/// non-finite first observation seeds the chain at the neutral midpoint.
pub fn ema_series(series: &[f64], window: usize) -> Vec<f64> {
  let alpha = 2.0 / (window as f64 + 1.0);

  series
    .iter()
    .scan(None::<f64>, |prev, &s| {
      let obs = if s.is_finite() { Some(s.clamp(0.0, 100.0)) } else { None };
      let next = match (*prev, obs) {
        (None, Some(v)) => v,
        (None, None) => 50.0,
        (Some(p), Some(v)) => alpha * v + (1.0 - alpha) * p,
        (Some(p), None) => p,
      };
      *prev = Some(next);
      Some(next)
    })
    .collect()
}

#[derive(Clone, Debug)]
pub struct SentimentRegimeClassifier {
  config: SentimentConfig,
}

impl Default for SentimentRegimeClassifier {
  fn default() -> Self {
    Self::new(SentimentConfig::default())
  }
}

impl SentimentRegimeClassifier {
  pub fn new(config: SentimentConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &SentimentConfig {
    &self.config
  }

  pub fn ema(&self, series: &[f64]) -> Vec<f64> {
    ema_series(series, self.config.window)
  }

  /// Regime implied by the trailing window of an EMA series. Fewer than `H` values is neutral.
  pub fn classify_regime(&self, ema: &[f64]) -> RiskRegime {
    let h = self.config.hysteresis.max(1);
    if ema.len() < h {
      return RiskRegime::Neutral;
    }

    let tail = &ema[ema.len() - h..];
    if tail.iter().all(|&e| e > self.config.risk_on_threshold) {
      RiskRegime::RiskOn
    } else if tail.iter().all(|&e| e < self.config.risk_off_threshold) {
      RiskRegime::RiskOff
    } else {
      RiskRegime::Neutral
    }
  }

  /// Regime as it would have been reported at the end of every day.
  pub fn regime_history(&self, ema: &[f64]) -> Vec<RiskRegime> {
    (1..=ema.len())
      .map(|end| self.classify_regime(&ema[..end]))
      .collect()
  }

  pub fn lambda(&self, ema: f64) -> f64 {
    let c = &self.config;
    (c.lambda_base - ema * c.lambda_slope).clamp(c.lambda_min, c.lambda_max)
  }

  pub fn classify(&self, series: &[f64]) -> SentimentReading {
    let ema = self.ema(series);
    let Some(&last) = ema.last() else {
      return SentimentReading::default();
    };

    let risk_regime = self.classify_regime(&ema);
    debug!(
      observations = series.len(),
      sentiment_ema = last,
      ?risk_regime,
      "classified sentiment"
    );

    SentimentReading {
      sentiment_ema: last,
      risk_regime,
      lambda: self.lambda(last),
      latest_score: series.last().copied(),
    }
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  fn ramp_then_hold() -> Vec<f64> {
    let mut series: Vec<f64> = (0..20).map(|d| 25.0 + 60.0 * d as f64 / 19.0).collect();
    series.extend(std::iter::repeat(85.0).take(20));
    series
  }

  #[test]
  fn ema_has_input_length() {
    for n in [0, 1, 7, 40] {
      let series: Vec<f64> = (0..n).map(|i| (i * 13 % 100) as f64).collect();
      assert_eq!(ema_series(&series, 10).len(), n);
    }
  }

  #[test]
  fn constant_series_is_its_own_ema() {
    for e in ema_series(&[62.5; 30], 10) {
      assert_abs_diff_eq!(e, 62.5, epsilon = 1e-12);
    }
  }

  #[test]
  fn ema_follows_the_recursion() {
    let ema = ema_series(&[40.0, 60.0, 50.0], 3);
    assert_eq!(ema[0], 40.0);
    assert_abs_diff_eq!(ema[1], 50.0, epsilon = 1e-12);
    assert_abs_diff_eq!(ema[2], 50.0, epsilon = 1e-12);
  }

  #[test]
  fn non_finite_observations_carry_the_previous_value() {
    let ema = ema_series(&[f64::NAN, 70.0, f64::INFINITY, 250.0], 1);
    assert_eq!(ema, vec![50.0, 70.0, 70.0, 100.0]);
  }

  #[test]
  fn three_days_above_threshold_turn_risk_on() {
    let classifier = SentimentRegimeClassifier::default();
    let ema = [70.0, 76.0, 77.0, 78.0, 74.0, 80.0];

    assert_eq!(
      classifier.regime_history(&ema),
      vec![
        RiskRegime::Neutral,
        RiskRegime::Neutral,
        RiskRegime::Neutral,
        RiskRegime::RiskOn,
        RiskRegime::Neutral,
        RiskRegime::Neutral,
      ]
    );
  }

  #[test]
  fn three_days_below_threshold_turn_risk_off() {
    let reading = SentimentRegimeClassifier::default().classify(&[10.0; 15]);
    assert_eq!(reading.risk_regime, RiskRegime::RiskOff);
    assert_abs_diff_eq!(reading.lambda, 2.0 - 10.0 * 0.015, epsilon = 1e-12);
  }

  #[test]
  fn rising_sentiment_waits_for_the_third_day() {
    let classifier = SentimentRegimeClassifier::default();
    let ema = classifier.ema(&ramp_then_hold());
    let history = classifier.regime_history(&ema);

    let first_above = ema.iter().position(|&e| e > 75.0).unwrap();
    assert_eq!(first_above, 21);
    assert_eq!(history[first_above], RiskRegime::Neutral);
    assert_eq!(history[first_above + 1], RiskRegime::Neutral);
    assert_eq!(history[first_above + 2], RiskRegime::RiskOn);
    assert!(history[..first_above + 2].iter().all(|r| *r == RiskRegime::Neutral));

    let reading = classifier.classify(&ramp_then_hold());
    assert_eq!(reading.risk_regime, RiskRegime::RiskOn);
    assert_eq!(reading.latest_score, Some(85.0));
  }

  #[test]
  fn lambda_is_clamped() {
    let classifier = SentimentRegimeClassifier::default();
    assert_eq!(classifier.lambda(0.0), 2.0);
    assert_eq!(classifier.lambda(100.0), 0.5);
    assert_abs_diff_eq!(classifier.lambda(50.0), 1.25, epsilon = 1e-12);
  }

  #[test]
  fn empty_series_is_neutral() {
    let reading = SentimentRegimeClassifier::default().classify(&[]);
    assert_eq!(reading, SentimentReading::default());
    assert_eq!(reading.sentiment_ema, 50.0);
    assert_eq!(reading.lambda, 1.0);
  }

  #[test]
  fn regime_parses_from_upper_case() {
    #[derive(Deserialize)]
    struct Snapshot {
      regime: RiskRegime,
    }

    let snapshot: Snapshot = toml::from_str(r#"regime = "RISK_OFF""#).unwrap();
    assert_eq!(snapshot.regime, RiskRegime::RiskOff);
  }
}
