//! # Core Module
//!
//! Stateless building blocks shared by the engine and the workflows.
//!
//! - **Task Models** ([`models`]) - Task descriptors, resource requirements and output records
//! - **Run Layout** ([`layout`]) - The per-round directory tree used to hand artifacts between stages
//! - **File I/O** ([`io`]) - PDB snapshots and trajectories, embedding and loss tables
//! - **Utilities** ([`utils`]) - Filename identifier helpers

pub mod io;
pub mod layout;
pub mod models;
pub mod utils;
