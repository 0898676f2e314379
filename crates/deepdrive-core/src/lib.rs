//! # DeepDrive Core Library
//!
//! Orchestration core for adaptive molecular sampling. A run repeats four stages per round,
//! simulate, preprocess, learn and detect, and the detect stage reseeds the next round's
//! simulations with the outliers it finds.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data: task descriptors and their resource
//!   requirements, output records, the per-round filesystem layout, and structure, trajectory
//!   and embedding I/O.
//!
//! - **[`engine`]: The Logic Core.** Task managers and the dependency registry that wires them,
//!   the stage generator, the pipeline state machine, and the adaptive outlier search with its
//!   persisted epsilon record.
//!
//! - **[`workflows`]: The Public API.** Ties `engine` and `core` together: the round-by-round
//!   pipeline controller and the detect-stage outlier procedure.
//!
//! Simulation, training and task placement on hardware are external collaborators. The core only
//! emits [`core::models::task::TaskDescriptor`]s and consumes a stage completion signal through
//! [`workflows::pipeline::StageExecutor`].

pub mod core;
pub mod engine;
pub mod workflows;
