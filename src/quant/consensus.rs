//! # Consensus Price
//!
//! $$
//! z_k = \frac{p_k - \bar p}{s},\qquad \hat p = \operatorname{mean}\{p_k : |z_k| \le 1.5\}
//! $$
//!
//! Reconciles quotes for the same instrument from several providers. `s` is the sample standard deviation.

use serde::Serialize;
use statrs::statistics::Statistics;
use tracing::warn;

/// Quotes with a larger absolute Z-score are discarded.
pub const OUTLIER_Z_THRESHOLD: f64 = 1.5;

/// Below this many quotes the plain mean is used.
pub const MIN_QUOTES_FOR_FILTER: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConsensusPrice {
  pub price: f64,
  /// Indices into the input of the discarded quotes.
  pub outliers: Vec<usize>,
}

/// Mean of the quotes that survive the Z-score filter.
///
/// Non-finite quotes are always outliers. Returns `None` when there are no quotes or when every quote was
/// discarded.
pub fn consensus_price(quotes: &[f64]) -> Option<ConsensusPrice> {
  if quotes.is_empty() {
    return None;
  }

  let (finite, mut outliers): (Vec<usize>, Vec<usize>) =
    (0..quotes.len()).partition(|&i| quotes[i].is_finite());
  let values: Vec<f64> = finite.iter().map(|&i| quotes[i]).collect();

  if values.is_empty() {
    warn!(quotes = quotes.len(), "no usable price quote");
    return None;
  }

  if values.len() < MIN_QUOTES_FOR_FILTER {
    return Some(ConsensusPrice {
      price: values.iter().mean(),
      outliers,
    });
  }

  let mean = values.iter().mean();
  let std_dev = values.iter().std_dev();
  if !(std_dev > 0.0) {
    return Some(ConsensusPrice {
      price: values[0],
      outliers,
    });
  }

  let mut kept = Vec::with_capacity(values.len());
  for (&idx, &price) in finite.iter().zip(values.iter()) {
    let z = (price - mean) / std_dev;
    if z.abs() <= OUTLIER_Z_THRESHOLD {
      kept.push(price);
    } else {
      warn!(index = idx, price, z_score = z, "discarding outlier price quote");
      outliers.push(idx);
    }
  }
  outliers.sort_unstable();

  if kept.is_empty() {
    warn!(quotes = quotes.len(), "every price quote was an outlier");
    return None;
  }

  Some(ConsensusPrice {
    price: kept.iter().mean(),
    outliers,
  })
}
