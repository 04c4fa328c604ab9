//! # Errors
//!
//! Degenerate market data never ends up here; it resolves to neutral defaults inside each component.
//! These variants cover caller contract violations and cancelled simulations.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
  /// Input vectors that must describe the same asset set disagree in length.
  #[error("dimension mismatch for {context}: expected {expected}, got {actual}")]
  DimensionMismatch {
    context: &'static str,
    expected: usize,
    actual: usize,
  },

  /// A scalar parameter is outside its valid domain.
  #[error("invalid parameter: {0}")]
  InvalidParameter(String),

  /// The run was cancelled through its [`crate::CancellationToken`].
  #[error("simulation cancelled")]
  Cancelled,

  /// The run hit the wall-clock deadline carried by its token.
  #[error("simulation deadline exceeded")]
  DeadlineExceeded,
}

impl AnalyticsError {
  pub fn dimension_mismatch(context: &'static str, expected: usize, actual: usize) -> Self {
    Self::DimensionMismatch {
      context,
      expected,
      actual,
    }
  }

  pub fn invalid_parameter(message: impl Into<String>) -> Self {
    Self::InvalidParameter(message.into())
  }

  /// True for the two variants produced by a stopped run.
  pub fn is_cancellation(&self) -> bool {
    matches!(self, Self::Cancelled | Self::DeadlineExceeded)
  }
}
