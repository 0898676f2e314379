//! # Core Models Module
//!
//! Plain data exchanged between task managers, the stage generator and the external execution
//! collaborator, plus the minimal structural model used for seed snapshots.
//!
//! - [`task`] - Immutable task descriptors and their resource requirement records
//! - [`output`] - Named output records exposed by task managers to their subscribers
//! - [`structure`] - Single-frame atomic snapshots read from trajectories and written as seeds

pub mod output;
pub mod structure;
pub mod task;
