//! # Cholesky Factorization
//!
//! $$
//! L_{ii} = \sqrt{\Sigma_{ii} - \sum_{k<i} L_{ik}^2},\qquad
//! L_{ij} = \frac{\Sigma_{ij} - \sum_{k<j} L_{ik}L_{jk}}{L_{jj}}
//! $$
//!
//! Lower-triangular factor used to turn independent normals into correlated shocks. A pivot that is not
//! positive (duplicated or perfectly correlated assets) is floored at [`CHOLESKY_FLOOR`] instead of failing,
//! so the result is an approximation for matrices that are not positive definite.

use ndarray::Array2;
use tracing::warn;

/// Smallest pivot admitted under the square root.
pub const CHOLESKY_FLOOR: f64 = 1e-10;

#[derive(Clone, Debug, PartialEq)]
pub struct CholeskyFactor {
  /// Lower-triangular `L`.
  pub lower: Array2<f64>,
  /// Number of pivots that had to be floored.
  pub floored_pivots: usize,
}

impl CholeskyFactor {
  pub fn dim(&self) -> usize {
    self.lower.nrows()
  }

  /// True when no pivot was floored, i.e. `L Lᵗ` reproduces the input.
  pub fn is_exact(&self) -> bool {
    self.floored_pivots == 0
  }

  /// `L Lᵗ`.
  pub fn reconstruct(&self) -> Array2<f64> {
    self.lower.dot(&self.lower.t())
  }

  /// Write `L z` into `out`.
  #[inline]
  pub fn correlate(&self, z: &[f64], out: &mut [f64]) {
    correlate(&self.lower, z, out);
  }
}

/// `out = L z` for a lower-triangular `L`.
#[inline]
fn correlate(lower: &Array2<f64>, z: &[f64], out: &mut [f64]) {
  for (i, o) in out.iter_mut().enumerate() {
    let mut acc = 0.0;
    for j in 0..=i {
      acc += lower[[i, j]] * z[j];
    }
    *o = acc;
  }
}

/// Factor a covariance matrix. Never fails; see the module docs for the flooring rule.
///
/// Only the leading square block of a non-square input is used, and non-finite entries count as zero.
pub fn cholesky_lower(cov: &Array2<f64>) -> CholeskyFactor {
  let n = cov.nrows().min(cov.ncols());
  let entry = |i: usize, j: usize| {
    let v = cov[[i, j]];
    if v.is_finite() {
      v
    } else {
      0.0
    }
  };

  let mut l = Array2::<f64>::zeros((n, n));
  let mut floored_pivots = 0;

  for i in 0..n {
    for j in 0..=i {
      let mut sum = 0.0;
      for k in 0..j {
        sum += l[[i, k]] * l[[j, k]];
      }

      if i == j {
        let mut pivot = entry(i, i) - sum;
        if !(pivot > CHOLESKY_FLOOR) {
          pivot = CHOLESKY_FLOOR;
          floored_pivots += 1;
        }
        l[[i, j]] = pivot.sqrt();
      } else {
        l[[i, j]] = (entry(i, j) - sum) / l[[j, j]];
      }
    }
  }

  if floored_pivots > 0 {
    warn!(
      dim = n,
      floored_pivots, "covariance is not positive definite, pivots floored"
    );
  }

  CholeskyFactor {
    lower: l,
    floored_pivots,
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use nalgebra::DMatrix;
  use ndarray::array;

  use super::*;

  fn assert_reconstructs(cov: &Array2<f64>) {
    let factor = cholesky_lower(cov);
    assert!(factor.is_exact());

    let rebuilt = factor.reconstruct();
    for (a, b) in rebuilt.iter().zip(cov.iter()) {
      assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
    }

    for i in 0..factor.dim() {
      for j in (i + 1)..factor.dim() {
        assert_eq!(factor.lower[[i, j]], 0.0);
      }
    }
  }

  #[test]
  fn two_by_two_reconstructs() {
    assert_reconstructs(&array![[0.04, 0.006], [0.006, 0.09]]);
  }

  #[test]
  fn three_by_three_reconstructs() {
    assert_reconstructs(&array![
      [0.0004, 0.0001, -0.00005],
      [0.0001, 0.0009, 0.0002],
      [-0.00005, 0.0002, 0.0016]
    ]);
  }

  #[test]
  fn matches_nalgebra_on_positive_definite_input() {
    let cov = array![[4.0, 2.0, 0.6], [2.0, 2.0, 0.5], [0.6, 0.5, 3.0]];
    let reference = DMatrix::from_row_slice(3, 3, cov.as_slice().unwrap())
      .cholesky()
      .unwrap()
      .l();

    let factor = cholesky_lower(&cov);
    for i in 0..3 {
      for j in 0..3 {
        assert_abs_diff_eq!(factor.lower[[i, j]], reference[(i, j)], epsilon = 1e-12);
      }
    }
  }

  #[test]
  fn duplicated_asset_is_floored_not_failed() {
    let cov = array![[0.04, 0.04], [0.04, 0.04]];
    let factor = cholesky_lower(&cov);

    assert_eq!(factor.floored_pivots, 1);
    assert!(factor.lower.iter().all(|v| v.is_finite()));
    assert_abs_diff_eq!(factor.lower[[1, 1]], CHOLESKY_FLOOR.sqrt(), epsilon = 1e-18);
  }

  #[test]
  fn zero_and_nan_matrices_stay_finite() {
    let zero = cholesky_lower(&Array2::zeros((3, 3)));
    assert_eq!(zero.floored_pivots, 3);

    let nan = cholesky_lower(&array![[f64::NAN, 0.0], [0.0, 0.01]]);
    assert!(nan.lower.iter().all(|v| v.is_finite()));
  }

  #[test]
  fn correlate_applies_lower_triangle() {
    let factor = cholesky_lower(&array![[1.0, 0.5], [0.5, 1.0]]);
    let mut out = [0.0; 2];
    factor.correlate(&[1.0, 2.0], &mut out);

    assert_abs_diff_eq!(out[0], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(out[1], 0.5 + 2.0 * 0.75f64.sqrt(), epsilon = 1e-12);
  }
}
