//! Provides input/output functionality for the file formats exchanged between stages.
//!
//! Structures and trajectories travel as PDB files; embeddings and validation-loss curves
//! written by the learning collaborator travel as headerless CSV tables.

pub mod pdb;
pub mod tables;
pub mod traits;
