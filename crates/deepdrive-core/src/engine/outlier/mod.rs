//! Adaptive outlier search.
//!
//! The search clusters a model's embedding with an escalating neighbourhood radius until the
//! number of outliers falls within a bound, remembers the accepted radius per model identity in
//! a run-wide record, and turns the outlier frames into seed structures for the next round.

pub mod clustering;
pub mod eps;
pub mod search;
pub mod seeds;
