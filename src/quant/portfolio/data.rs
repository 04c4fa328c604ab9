//! # Portfolio Data Utilities
//!
//! $$
//! \Sigma_{ij} = \frac{1}{T}\sum_{t=1}^{T}(r_{i,t}-\bar r_i)(r_{j,t}-\bar r_j)
//! $$
//!
//! Price-series alignment, log-return preprocessing and covariance construction.

use chrono::NaiveDate;
use ndarray::Array2;
use ndarray_stats::CorrelationExt;
use serde::Deserialize;
use serde::Serialize;

/// One dated close.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
  pub date: NaiveDate,
  pub price: f64,
}

/// Close history of one asset, ascending by date with unique dates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<PricePoint>", into = "Vec<PricePoint>")]
pub struct PriceSeries {
  points: Vec<PricePoint>,
}

impl PriceSeries {
  /// Sorts by date and keeps the first quote of any repeated date.
  pub fn new(mut points: Vec<PricePoint>) -> Self {
    points.sort_by_key(|p| p.date);
    points.dedup_by_key(|p| p.date);
    Self { points }
  }

  pub fn from_pairs<I>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (NaiveDate, f64)>,
  {
    Self::new(
      pairs
        .into_iter()
        .map(|(date, price)| PricePoint { date, price })
        .collect(),
    )
  }

  pub fn points(&self) -> &[PricePoint] {
    &self.points
  }

  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  pub fn first_date(&self) -> Option<NaiveDate> {
    self.points.first().map(|p| p.date)
  }

  pub fn last_date(&self) -> Option<NaiveDate> {
    self.points.last().map(|p| p.date)
  }

  /// Points dated on or after `cutoff`.
  pub fn since(&self, cutoff: NaiveDate) -> &[PricePoint] {
    let start = self.points.partition_point(|p| p.date < cutoff);
    &self.points[start..]
  }
}

impl From<Vec<PricePoint>> for PriceSeries {
  fn from(points: Vec<PricePoint>) -> Self {
    Self::new(points)
  }
}

impl From<PriceSeries> for Vec<PricePoint> {
  fn from(series: PriceSeries) -> Self {
    series.points
  }
}

/// Price histories cut to a common grid.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AlignedPrices {
  /// Dates of the reference series (the one that set the cutoff).
  pub dates: Vec<NaiveDate>,
  /// One row of closes per input series, all of length `dates.len()`.
  pub prices: Vec<Vec<f64>>,
}

impl AlignedPrices {
  /// Number of aligned points per asset.
  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }

  pub fn n_assets(&self) -> usize {
    self.prices.len()
  }

  /// Calendar days between the first and last aligned date.
  pub fn elapsed_days(&self) -> i64 {
    match (self.dates.first(), self.dates.last()) {
      (Some(first), Some(last)) => last.signed_duration_since(*first).num_days(),
      _ => 0,
    }
  }
}

/// Align price histories on the latest common start date and the shortest common length.
///
/// Older series are cut to the start of the most recently listed one, so a young listing does not get
/// dropped in favour of a longer window.
pub fn align_price_series(series: &[&PriceSeries]) -> AlignedPrices {
  let Some(cutoff) = series.iter().filter_map(|s| s.first_date()).max() else {
    return AlignedPrices::default();
  };

  let windows: Vec<&[PricePoint]> = series.iter().map(|s| s.since(cutoff)).collect();
  let len = windows.iter().map(|w| w.len()).min().unwrap_or(0);
  let reference = series
    .iter()
    .position(|s| s.first_date() == Some(cutoff))
    .unwrap_or(0);

  AlignedPrices {
    dates: windows[reference][..len].iter().map(|p| p.date).collect(),
    prices: windows
      .iter()
      .map(|w| w[..len].iter().map(|p| p.price).collect())
      .collect(),
  }
}

/// Convert close prices to log-return series.
///
/// A pair with a non-positive or non-finite close yields a zero return so the series stays on the grid.
pub fn log_returns_series(closes: &[f64]) -> Vec<f64> {
  closes
    .windows(2)
    .map(|w| {
      let r = (w[1] / w[0]).ln();
      if w[0] > 0.0 && w[1] > 0.0 && r.is_finite() {
        r
      } else {
        0.0
      }
    })
    .collect()
}

/// Stack per-asset log returns into an `assets x observations` matrix.
pub fn log_return_matrix(prices: &[Vec<f64>]) -> Array2<f64> {
  let n = prices.len();
  let len = prices.iter().map(|p| p.len()).min().unwrap_or(0);
  let cols = len.saturating_sub(1);

  let mut out = Array2::<f64>::zeros((n, cols));
  for (i, closes) in prices.iter().enumerate() {
    for (t, r) in log_returns_series(&closes[..len]).into_iter().enumerate() {
      out[[i, t]] = r;
    }
  }
  out
}

/// Population covariance (divisor `T`) of an `assets x observations` return matrix.
///
/// Non-finite entries are zeroed and the upper triangle is mirrored into the lower one, so the result is
/// exactly symmetric.
pub fn covariance_matrix(returns: &Array2<f64>) -> Array2<f64> {
  let n = returns.nrows();
  if n == 0 || returns.ncols() == 0 {
    return Array2::zeros((n, n));
  }

  let mut cov = returns.cov(0.0).unwrap_or_else(|_| Array2::zeros((n, n)));
  cov.mapv_inplace(|v| if v.is_finite() { v } else { 0.0 });

  for i in 0..n {
    for j in (i + 1)..n {
      cov[[j, i]] = cov[[i, j]];
    }
  }

  cov
}
