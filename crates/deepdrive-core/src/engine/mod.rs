//! # Engine Module
//!
//! Stateful machinery of a run: task managers, the dependency registry that wires them, stage
//! generation and the adaptive outlier search.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - run-wide settings validated by a builder
//! - **Task Managers** ([`managers`]) - one manager per stage-type, turning a round index into
//!   task descriptors
//! - **Registry** ([`registry`]) - subscriptions between managers and the resulting input maps
//! - **Stages** ([`stage`]) - stage-types, their display names and generated stage instances
//! - **Outlier Search** ([`outlier`]) - epsilon record, clustering seam, bounded escalation
//!   search and seed emission
//! - **State Tracking** ([`state`]) - controller states, transitions and run summaries
//! - **Progress Monitoring** ([`progress`]) - callback-based progress reporting
//! - **Error Handling** ([`error`]) - engine error type shared by all of the above

pub mod config;
pub mod error;
pub mod managers;
pub mod outlier;
pub mod progress;
pub mod registry;
pub mod stage;
pub mod state;
