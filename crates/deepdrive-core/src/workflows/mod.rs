//! # Workflows Module
//!
//! Public entry points of the library.
//!
//! - **Pipeline** ([`pipeline`]) - the round controller that generates and hands out stages,
//!   plus seeding of the first round
//! - **Outlier Detection** ([`outlier`]) - the detect-stage procedure: model selection,
//!   embedding loading, adaptive radius search and seed emission

pub mod outlier;
pub mod pipeline;
