//! # Correlated Monte Carlo Paths
//!
//! $$
//! \ln\frac{S_{i,t}}{S_{i,t-1}} = \mu_i - \tfrac12\sigma_i^2 + (L z_t)_i,\qquad z_t\sim\mathcal N(0, I)
//! $$
//!
//! Forward portfolio values under correlated geometric Brownian motion. Each asset is held as a value
//! bucket that compounds with its own shock; scheduled contributions are split by weight and added before
//! the step compounds.

use anyhow::Result;
use rand::Rng;
use rand_distr::Distribution;
use rand_distr::StandardNormal;
use serde::Deserialize;
use serde::Serialize;

use super::cholesky::CholeskyFactor;
use crate::error::AnalyticsError;
use crate::traits::PathSamplerExt;

/// Fixed amount added every `every_steps` steps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
  pub amount: f64,
  pub every_steps: usize,
}

impl Contribution {
  /// Whether a contribution lands at the start of `step` (1-based).
  #[inline]
  pub fn is_due(&self, step: usize) -> bool {
    self.every_steps > 0 && step > 0 && step % self.every_steps == 0
  }

  /// Number of contributions within `n_steps` steps.
  pub fn count(&self, n_steps: usize) -> usize {
    if self.every_steps == 0 {
      0
    } else {
      n_steps / self.every_steps
    }
  }
}

/// Runtime configuration for projections.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
  /// Number of independent trials.
  pub trials: usize,
  /// Seed used when a request carries none.
  pub seed: Option<u64>,
  /// Upper bound on the number of steps of a single projection.
  pub max_steps: usize,
  /// Step frequency of the flat projection returned for unusable history.
  pub fallback_steps_per_year: f64,
}

impl Default for SimulationConfig {
  fn default() -> Self {
    Self {
      trials: 1000,
      seed: None,
      max_steps: 5000,
      fallback_steps_per_year: 12.0,
    }
  }
}

#[derive(Clone, Debug)]
pub struct MonteCarloPathGenerator {
  initial_value: f64,
  weights: Vec<f64>,
  /// `mu_i - 0.5 sigma_i^2` per asset.
  log_drifts: Vec<f64>,
  cholesky: CholeskyFactor,
  n_steps: usize,
  step_years: f64,
  contribution: Option<Contribution>,
}

impl MonteCarloPathGenerator {
  /// Build a generator from per-step drifts and volatilities.
  ///
  /// Weights are normalised to sum to one. All per-asset inputs and the Cholesky factor must agree on the
  /// number of assets.
  pub fn new(
    initial_value: f64,
    weights: &[f64],
    drifts: &[f64],
    volatilities: &[f64],
    cholesky: CholeskyFactor,
    n_steps: usize,
    step_years: f64,
    contribution: Option<Contribution>,
  ) -> Result<Self> {
    let n = weights.len();
    if n == 0 {
      anyhow::bail!(AnalyticsError::invalid_parameter("at least one asset is required"));
    }
    if drifts.len() != n {
      anyhow::bail!(AnalyticsError::dimension_mismatch("drifts", n, drifts.len()));
    }
    if volatilities.len() != n {
      anyhow::bail!(AnalyticsError::dimension_mismatch(
        "volatilities",
        n,
        volatilities.len()
      ));
    }
    if cholesky.dim() != n {
      anyhow::bail!(AnalyticsError::dimension_mismatch("cholesky", n, cholesky.dim()));
    }
    if !initial_value.is_finite() || initial_value < 0.0 {
      anyhow::bail!(AnalyticsError::invalid_parameter(format!(
        "initial value must be finite and non-negative, got {initial_value}"
      )));
    }

    let total: f64 = weights.iter().filter(|w| w.is_finite()).sum();
    if total.abs() < 1e-12 {
      anyhow::bail!(AnalyticsError::invalid_parameter("weights sum to zero"));
    }

    let weights = weights
      .iter()
      .map(|w| if w.is_finite() { w / total } else { 0.0 })
      .collect();
    let log_drifts = drifts
      .iter()
      .zip(volatilities.iter())
      .map(|(mu, sigma)| {
        let d = mu - 0.5 * sigma * sigma;
        if d.is_finite() {
          d
        } else {
          0.0
        }
      })
      .collect();

    Ok(Self {
      initial_value,
      weights,
      log_drifts,
      cholesky,
      n_steps,
      step_years,
      contribution: contribution.filter(|c| c.amount.is_finite() && c.every_steps > 0),
    })
  }

  pub fn n_assets(&self) -> usize {
    self.weights.len()
  }

  pub fn step_years(&self) -> f64 {
    self.step_years
  }

  /// Initial value plus every contribution scheduled within the horizon.
  pub fn total_invested(&self) -> f64 {
    let contributed = self
      .contribution
      .map(|c| c.amount * c.count(self.n_steps) as f64)
      .unwrap_or(0.0);
    self.initial_value + contributed
  }
}

impl PathSamplerExt for MonteCarloPathGenerator {
  fn n_steps(&self) -> usize {
    self.n_steps
  }

  fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
    let n = self.n_assets();
    let mut holdings: Vec<f64> = self.weights.iter().map(|w| w * self.initial_value).collect();
    let mut z = vec![0.0_f64; n];
    let mut shocks = vec![0.0_f64; n];

    let mut path: Vec<f64> = Vec::with_capacity(self.n_steps + 1);
    path.push(holdings.iter().sum());

    for step in 1..=self.n_steps {
      for zi in z.iter_mut() {
        *zi = StandardNormal.sample(rng);
      }
      self.cholesky.correlate(&z, &mut shocks);

      if let Some(c) = self.contribution.filter(|c| c.is_due(step)) {
        for (h, w) in holdings.iter_mut().zip(self.weights.iter()) {
          *h += c.amount * w;
        }
      }

      for i in 0..n {
        let growth = (self.log_drifts[i] + shocks[i]).exp();
        if growth.is_finite() {
          holdings[i] *= growth;
        }
      }

      path.push(holdings.iter().sum());
    }

    path
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use approx::assert_relative_eq;
  use ndarray::array;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  use super::*;
  use crate::quant::portfolio::cholesky::cholesky_lower;
  use crate::traits::CancellationToken;

  fn zero_vol_generator(contribution: Option<Contribution>) -> MonteCarloPathGenerator {
    MonteCarloPathGenerator::new(
      1000.0,
      &[0.5, 0.5],
      &[0.01, 0.0],
      &[0.0, 0.0],
      cholesky_lower(&array![[0.0, 0.0], [0.0, 0.0]]),
      12,
      1.0 / 12.0,
      contribution,
    )
    .unwrap()
  }

  #[test]
  fn path_has_one_point_per_step_plus_start() {
    let generator = zero_vol_generator(None);
    let path = generator.sample_with(&mut StdRng::seed_from_u64(1));

    assert_eq!(path.len(), 13);
    assert_eq!(path[0], 1000.0);
  }

  #[test]
  fn near_zero_volatility_compounds_drift() {
    let generator = zero_vol_generator(None);
    let path = generator.sample_with(&mut StdRng::seed_from_u64(5));

    let expected = 500.0 * (0.01f64 * 12.0).exp() + 500.0;
    assert_relative_eq!(path[12], expected, max_relative = 1e-3);
  }

  #[test]
  fn contributions_land_before_compounding() {
    let generator = MonteCarloPathGenerator::new(
      0.0,
      &[1.0],
      &[0.1],
      &[0.0],
      cholesky_lower(&array![[0.0]]),
      2,
      0.5,
      Some(Contribution {
        amount: 100.0,
        every_steps: 1,
      }),
    )
    .unwrap();

    let path = generator.sample_with(&mut StdRng::seed_from_u64(3));
    let g = 0.1f64.exp();

    assert_relative_eq!(path[1], 100.0 * g, max_relative = 1e-3);
    assert_relative_eq!(path[2], (100.0 * g + 100.0) * g, max_relative = 1e-3);
    assert_abs_diff_eq!(generator.total_invested(), 200.0, epsilon = 1e-12);
  }

  #[test]
  fn contribution_schedule() {
    let c = Contribution {
      amount: 10.0,
      every_steps: 4,
    };
    assert!(!c.is_due(0));
    assert!(!c.is_due(3));
    assert!(c.is_due(4));
    assert!(c.is_due(8));
    assert_eq!(c.count(10), 2);
    assert_eq!(Contribution::default().count(10), 0);
  }

  #[test]
  fn mismatched_inputs_are_rejected() {
    let err = MonteCarloPathGenerator::new(
      100.0,
      &[0.5, 0.5],
      &[0.0],
      &[0.1, 0.1],
      cholesky_lower(&array![[0.01, 0.0], [0.0, 0.01]]),
      10,
      0.1,
      None,
    )
    .unwrap_err();

    assert_eq!(
      err.downcast_ref::<AnalyticsError>(),
      Some(&AnalyticsError::dimension_mismatch("drifts", 2, 1))
    );
  }

  #[test]
  fn zero_weights_are_rejected() {
    let result = MonteCarloPathGenerator::new(
      100.0,
      &[0.0],
      &[0.0],
      &[0.1],
      cholesky_lower(&array![[0.01]]),
      10,
      0.1,
      None,
    );
    assert!(result.is_err());
  }

  #[test]
  fn perfectly_correlated_assets_move_together() {
    let cov = array![[0.0004, 0.0004], [0.0004, 0.0004]];
    let generator = MonteCarloPathGenerator::new(
      100.0,
      &[1.0, 0.0],
      &[0.0, 0.0],
      &[0.02, 0.02],
      cholesky_lower(&cov),
      1,
      1.0,
      None,
    )
    .unwrap();

    let mut rng = StdRng::seed_from_u64(9);
    let mut z = [0.0f64; 2];
    z[0] = StandardNormal.sample(&mut rng);
    z[1] = StandardNormal.sample(&mut rng);
    let mut shocks = [0.0; 2];
    generator.cholesky.correlate(&z, &mut shocks);

    assert_abs_diff_eq!(shocks[0], shocks[1], epsilon = 1e-4);
  }

  #[test]
  fn parallel_ensemble_is_seed_deterministic() {
    let cov = array![[0.0004, 0.0001], [0.0001, 0.0009]];
    let generator = MonteCarloPathGenerator::new(
      10_000.0,
      &[0.6, 0.4],
      &[0.0004, 0.0002],
      &[0.02, 0.03],
      cholesky_lower(&cov),
      50,
      1.0 / 252.0,
      None,
    )
    .unwrap();

    let token = CancellationToken::new();
    let a = generator.sample_par(200, 42, &token).unwrap();
    let b = generator.sample_par(200, 42, &token).unwrap();
    let c = generator.sample_par(200, 43, &token).unwrap();

    assert_eq!(a.dim(), (200, 51));
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a.iter().all(|v| v.is_finite() && *v > 0.0));
  }
}
