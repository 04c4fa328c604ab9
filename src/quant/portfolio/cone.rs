//! # Percentile Cone
//!
//! $$
//! h = q\,(n-1),\qquad Q(q) = x_{(\lfloor h\rfloor)} + (h-\lfloor h\rfloor)\,\bigl(x_{(\lceil h\rceil)} - x_{(\lfloor h\rfloor)}\bigr)
//! $$
//!
//! Collapses a `trials x steps` ensemble into p05/median/p95 bands. The interpolation is the linear rule on
//! 0-based order statistics (NumPy's default), so fixtures are reproducible across implementations.

use ndarray::parallel::prelude::*;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;

use super::types::ConeBand;
use super::types::PercentileCone;

/// Quantile `q` of an ascending slice with linear interpolation. Zero for an empty slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
  match sorted.len() {
    0 => 0.0,
    1 => sorted[0],
    n => {
      let pos = q.clamp(0.0, 1.0) * (n as f64 - 1.0);
      let lo = pos.floor() as usize;
      let hi = pos.ceil() as usize;
      if lo == hi {
        sorted[lo]
      } else {
        sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
      }
    }
  }
}

fn band(values: ArrayView1<f64>) -> ConeBand {
  let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
  finite.sort_by(|a, b| a.total_cmp(b));

  ConeBand {
    p05: quantile_sorted(&finite, 0.05),
    median: quantile_sorted(&finite, 0.5),
    p95: quantile_sorted(&finite, 0.95),
  }
}

/// Per-step bands of an ensemble with one trial per row.
///
/// Non-finite values are ignored. Because each band is computed from the sorted column, the result does
/// not depend on the order of the trials.
pub fn percentile_cone(paths: &Array2<f64>) -> PercentileCone {
  let bands: Vec<ConeBand> = paths
    .axis_iter(Axis(1))
    .into_par_iter()
    .map(band)
    .collect();
  bands.into_iter().collect()
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use ndarray::s;
  use rand::rngs::StdRng;
  use rand::Rng;
  use rand::SeedableRng;

  use super::*;

  #[test]
  fn quantile_interpolates_linearly() {
    let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
    assert_eq!(quantile_sorted(&xs, 0.5), 3.0);
    assert_abs_diff_eq!(quantile_sorted(&xs, 0.05), 1.2, epsilon = 1e-12);
    assert_abs_diff_eq!(quantile_sorted(&xs, 0.95), 4.8, epsilon = 1e-12);
    assert_eq!(quantile_sorted(&xs, 0.0), 1.0);
    assert_eq!(quantile_sorted(&xs, 1.0), 5.0);
  }

  #[test]
  fn quantile_of_tiny_slices() {
    assert_eq!(quantile_sorted(&[], 0.5), 0.0);
    assert_eq!(quantile_sorted(&[7.0], 0.05), 7.0);
    assert_abs_diff_eq!(quantile_sorted(&[0.0, 10.0], 0.5), 5.0, epsilon = 1e-12);
  }

  #[test]
  fn cone_bands_are_ordered() {
    let mut rng = StdRng::seed_from_u64(21);
    let paths = Array2::from_shape_fn((250, 40), |(_, t)| 100.0 + t as f64 * rng.gen_range(-3.0..3.0));

    let cone = percentile_cone(&paths);

    assert_eq!(cone.len(), 40);
    for t in 0..cone.len() {
      let b = cone.band(t).unwrap();
      assert!(b.p05 <= b.median && b.median <= b.p95, "step {t}: {b:?}");
    }
  }

  #[test]
  fn cone_ignores_trial_order() {
    let paths = array![[1.0, 5.0], [3.0, 2.0], [2.0, 9.0], [4.0, 1.0]];
    let reversed = paths.slice(s![..;-1, ..]).to_owned();

    assert_eq!(percentile_cone(&paths), percentile_cone(&reversed));
  }

  #[test]
  fn cone_skips_non_finite_values() {
    let paths = array![[1.0], [f64::NAN], [3.0], [f64::INFINITY]];
    let cone = percentile_cone(&paths);

    assert_abs_diff_eq!(cone.median[0], 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(cone.p05[0], 1.1, epsilon = 1e-12);
  }

  #[test]
  fn empty_ensemble_gives_zero_bands() {
    let cone = percentile_cone(&Array2::zeros((0, 3)));
    assert_eq!(cone.median, vec![0.0; 3]);
  }
}
