//! # Factor Scoring
//!
//! $$
//! z_{i,f} = \frac{x_{i,f} - \bar x_f}{\max(s_f, \varepsilon)},\qquad
//! c_i = \tfrac13\,(z_{i,\text{val}} + z_{i,\text{qual}} + z_{i,\text{lowvol}}),\qquad
//! \mathbb E[R_i] = r_f + c_i\,\sigma_b
//! $$
//!
//! Cross-sectional valuation, quality and low-volatility scores. Z-scores are only defined relative to a
//! peer set, so every function here takes the whole set at once.

use impl_new_derive::ImplNew;
use serde::Deserialize;
use serde::Serialize;
use statrs::statistics::Statistics;

/// Beta assumed for assets without a usable beta.
pub const DEFAULT_BETA: f64 = 2.0;

/// Floor applied to peer standard deviations.
pub const STD_DEV_FLOOR: f64 = 1e-9;

/// Fundamentals of one asset as supplied by the data layer.
///
/// Dividend yield and five-year dividend growth are both in percentage points (`3.2` means 3.2%).
#[derive(ImplNew, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactorInputs {
  pub ticker: String,
  pub pe_ratio: Option<f64>,
  pub dividend_yield: f64,
  pub dividend_growth_5y: f64,
  pub beta: Option<f64>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FactorConfig {
  pub std_dev_floor: f64,
  pub default_beta: f64,
}

impl Default for FactorConfig {
  fn default() -> Self {
    Self {
      std_dev_floor: STD_DEV_FLOOR,
      default_beta: DEFAULT_BETA,
    }
  }
}

/// Untransformed factor values; larger is better for all three.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct FactorRawMetrics {
  /// Earnings yield, `1 / PE`, zero for missing or negative earnings.
  pub valuation: f64,
  /// Dividend yield plus dividend growth.
  pub quality: f64,
  /// `1 / beta`, with a penalty beta for missing values.
  pub low_vol: f64,
}

/// Mean and (floored) population standard deviation of one factor over a peer set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PeerGroupStats {
  pub mean: f64,
  pub std_dev: f64,
}

impl PeerGroupStats {
  pub fn from_values(values: &[f64], floor: f64) -> Self {
    if values.is_empty() {
      return Self {
        mean: 0.0,
        std_dev: floor,
      };
    }

    let mean = values.iter().mean();
    let std_dev = values.iter().population_std_dev();

    Self {
      mean: if mean.is_finite() { mean } else { 0.0 },
      std_dev: if std_dev.is_finite() {
        std_dev.max(floor)
      } else {
        floor
      },
    }
  }

  #[inline]
  pub fn z_score(&self, raw: f64) -> f64 {
    let z = (raw - self.mean) / self.std_dev;
    if z.is_finite() {
      z
    } else {
      0.0
    }
  }
}

/// Peer statistics for all three factors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PeerGroup {
  pub valuation: PeerGroupStats,
  pub quality: PeerGroupStats,
  pub low_vol: PeerGroupStats,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FactorScore {
  pub ticker: String,
  pub valuation: f64,
  pub quality: f64,
  pub low_vol: f64,
  pub composite: f64,
  /// 1 for the highest composite; ties keep input order.
  pub rank: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExpectedReturnForecast {
  pub ticker: String,
  pub expected_return: f64,
}

#[derive(Clone, Debug, Default)]
pub struct FactorScorer {
  config: FactorConfig,
}

impl FactorScorer {
  pub fn new(config: FactorConfig) -> Self {
    Self { config }
  }

  pub fn raw_metrics(&self, inputs: &FactorInputs) -> FactorRawMetrics {
    let valuation = match inputs.pe_ratio {
      Some(pe) if pe > 0.0 && pe.is_finite() => 1.0 / pe,
      _ => 0.0,
    };

    let finite_or_zero = |v: f64| if v.is_finite() { v } else { 0.0 };
    let quality = finite_or_zero(inputs.dividend_yield) + finite_or_zero(inputs.dividend_growth_5y);

    let beta = match inputs.beta {
      Some(b) if b > 0.0 && b.is_finite() => b,
      _ => self.config.default_beta,
    };

    FactorRawMetrics {
      valuation,
      quality,
      low_vol: 1.0 / beta,
    }
  }

  pub fn peer_group(&self, raw: &[FactorRawMetrics]) -> PeerGroup {
    let column = |f: fn(&FactorRawMetrics) -> f64| -> PeerGroupStats {
      let values: Vec<f64> = raw.iter().map(f).collect();
      PeerGroupStats::from_values(&values, self.config.std_dev_floor)
    };

    PeerGroup {
      valuation: column(|m| m.valuation),
      quality: column(|m| m.quality),
      low_vol: column(|m| m.low_vol),
    }
  }

  /// Score a peer set. Output order follows the input.
  pub fn score(&self, peers: &[FactorInputs]) -> Vec<FactorScore> {
    let raw: Vec<FactorRawMetrics> = peers.iter().map(|p| self.raw_metrics(p)).collect();
    let group = self.peer_group(&raw);

    let mut scores: Vec<FactorScore> = peers
      .iter()
      .zip(raw.iter())
      .map(|(p, m)| {
        let valuation = group.valuation.z_score(m.valuation);
        let quality = group.quality.z_score(m.quality);
        let low_vol = group.low_vol.z_score(m.low_vol);

        FactorScore {
          ticker: p.ticker.clone(),
          valuation,
          quality,
          low_vol,
          composite: (valuation + quality + low_vol) / 3.0,
          rank: 0,
        }
      })
      .collect();

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].composite.total_cmp(&scores[a].composite));
    for (rank, idx) in order.into_iter().enumerate() {
      scores[idx].rank = rank + 1;
    }

    scores
  }
}

/// Single-factor risk-premium forecast. A zero benchmark volatility collapses every forecast to `risk_free`.
pub fn forecast_expected_returns(
  scores: &[FactorScore],
  risk_free: f64,
  benchmark_volatility: f64,
) -> Vec<ExpectedReturnForecast> {
  scores
    .iter()
    .map(|s| ExpectedReturnForecast {
      ticker: s.ticker.clone(),
      expected_return: risk_free + s.composite * benchmark_volatility,
    })
    .collect()
}
