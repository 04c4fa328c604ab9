//! # Quant
//!
//! Portfolio statistics and simulation, factor scoring, sentiment regimes and price consensus.

pub mod consensus;
pub mod factors;
pub mod portfolio;
pub mod sentiment;
