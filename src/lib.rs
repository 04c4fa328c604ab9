//! # portfolio-analytics
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Analytics engine for a weighted basket of assets. Everything here is a pure function of in-memory inputs:
//! price histories, factor metrics and sentiment scores go in, plain values come out.
//!
//! | Module                 | Description                                                                 |
//! |------------------------|-----------------------------------------------------------------------------|
//! | [`quant::portfolio`]   | Return alignment, covariance, historical stats, Cholesky, Monte Carlo cone. |
//! | [`quant::factors`]     | Cross-sectional valuation/quality/low-vol Z-scores and return forecasts.    |
//! | [`quant::sentiment`]   | EMA smoothing and hysteresis risk-regime classification.                    |
//! | [`quant::consensus`]   | Z-score outlier filtering of multi-provider price quotes.                    |
//! | [`traits`]             | Path sampling contract with seeded parallel fan-out.                         |
//!
//! ## Parallelism
//!
//! Monte Carlo trials are sampled with `rayon`. Each trial owns an RNG derived from the run seed and the
//! trial index, so the ensemble does not depend on thread scheduling.

pub mod error;
pub mod quant;
pub mod traits;

pub use error::AnalyticsError;
pub use traits::CancellationToken;
pub use traits::PathSamplerExt;
