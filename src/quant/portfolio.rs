//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Historical calibration and correlated forward projection of a weighted basket.

pub mod cholesky;
pub mod cone;
pub mod data;
pub mod engine;
pub mod monte_carlo;
pub mod stats;
pub mod types;

pub use cholesky::cholesky_lower;
pub use cholesky::CholeskyFactor;
pub use cone::percentile_cone;
pub use cone::quantile_sorted;
pub use data::align_price_series;
pub use data::covariance_matrix;
pub use data::log_return_matrix;
pub use data::log_returns_series;
pub use data::AlignedPrices;
pub use data::PricePoint;
pub use data::PriceSeries;
pub use engine::PortfolioEngine;
pub use engine::PortfolioEngineConfig;
pub use monte_carlo::Contribution;
pub use monte_carlo::MonteCarloPathGenerator;
pub use monte_carlo::SimulationConfig;
pub use stats::HistoricalCalibration;
pub use stats::HistoricalStatsConfig;
pub use stats::HistoricalStatsEstimator;
pub use types::ConeBand;
pub use types::HistoricalStats;
pub use types::PercentileCone;
pub use types::Projection;
pub use types::ProjectionRequest;
