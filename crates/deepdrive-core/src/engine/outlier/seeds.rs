use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::StructureFile;
use crate::core::models::structure::Snapshot;
use crate::core::utils::identifiers::extract_index;
use crate::engine::error::EngineError;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TRAJECTORY_PREFIX: &str = "output-";
const TRAJECTORY_EXT: &str = ".pdb";

/// A frame of one simulation's trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FrameRef {
    pub sim_id: usize,
    pub frame: usize,
}

impl FrameRef {
    pub fn seed_file_name(&self) -> String {
        format!("seed-sim-{}-frame-{}.pdb", self.sim_id, self.frame)
    }
}

/// Maps flat embedding rows onto `(simulation, frame)` pairs, assuming simulations are
/// concatenated in order and each holds `frames_per_sim` frames.
pub fn locate_frames(indices: &[usize], frames_per_sim: usize) -> Vec<FrameRef> {
    if frames_per_sim == 0 {
        return Vec::new();
    }
    indices
        .iter()
        .map(|&index| FrameRef {
            sim_id: index / frames_per_sim,
            frame: index % frames_per_sim,
        })
        .collect()
}

/// Random access to trajectory frames.
pub trait FrameSource {
    fn simulation_count(&self) -> usize;
    fn frames_per_simulation(&self) -> usize;
    fn frame(&self, at: FrameRef) -> Option<&Snapshot>;

    fn total_frames(&self) -> usize {
        self.simulation_count() * self.frames_per_simulation()
    }
}

/// The `output-{sim}.pdb` trajectories of one simulation round, held in memory.
#[derive(Debug, Clone)]
pub struct PdbTrajectories {
    simulations: Vec<Vec<Snapshot>>,
    frames_per_sim: usize,
}

impl PdbTrajectories {
    /// Loads every trajectory of `md_dir`. Simulation ids must be contiguous from 0 and every
    /// trajectory must hold the same number of frames.
    pub fn load(md_dir: &Path) -> Result<Self, EngineError> {
        let entries = fs::read_dir(md_dir).map_err(|e| EngineError::io(md_dir, e))?;
        let mut files: BTreeMap<usize, PathBuf> = BTreeMap::new();
        for entry in entries {
            let path = entry.map_err(|e| EngineError::io(md_dir, e))?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(sim_id) = extract_index(name, TRAJECTORY_PREFIX, TRAJECTORY_EXT) {
                files.insert(sim_id, path);
            }
        }

        if files.is_empty() {
            return Err(EngineError::MissingArtifact(format!(
                "no {TRAJECTORY_PREFIX}*{TRAJECTORY_EXT} trajectories in {}",
                md_dir.display()
            )));
        }
        if let Some(gap) = (0..files.len()).find(|id| !files.contains_key(id)) {
            return Err(EngineError::MissingArtifact(format!(
                "trajectory {TRAJECTORY_PREFIX}{gap}{TRAJECTORY_EXT} in {}",
                md_dir.display()
            )));
        }

        let paths: Vec<&Path> = files.values().map(PathBuf::as_path).collect();

        #[cfg(not(feature = "parallel"))]
        let iterator = paths.iter();

        #[cfg(feature = "parallel")]
        let iterator = paths.par_iter();

        let parsed: Vec<Result<Vec<Snapshot>, EngineError>> = iterator
            .map(|path| {
                PdbFile::read_frames_from_path(path).map_err(|source| EngineError::Structure {
                    path: path.to_path_buf(),
                    source,
                })
            })
            .collect();

        let mut simulations = Vec::with_capacity(files.len());
        let mut frames_per_sim = None;
        for (path, frames) in paths.iter().zip(parsed) {
            let frames = frames?;
            let expected = *frames_per_sim.get_or_insert(frames.len());
            if frames.len() != expected {
                return Err(EngineError::RaggedTrajectories {
                    path: path.to_path_buf(),
                    found: frames.len(),
                    expected,
                });
            }
            simulations.push(frames);
        }

        let frames_per_sim = frames_per_sim.unwrap_or(0);
        debug!(
            simulations = simulations.len(),
            frames_per_sim, "Loaded trajectories."
        );
        Ok(Self {
            simulations,
            frames_per_sim,
        })
    }
}

impl FrameSource for PdbTrajectories {
    fn simulation_count(&self) -> usize {
        self.simulations.len()
    }

    fn frames_per_simulation(&self) -> usize {
        self.frames_per_sim
    }

    fn frame(&self, at: FrameRef) -> Option<&Snapshot> {
        self.simulations.get(at.sim_id)?.get(at.frame)
    }
}

/// Writes one single-frame structure per outlier into `seed_dir` and returns the written paths.
pub fn emit_seeds(
    source: &dyn FrameSource,
    frames: &[FrameRef],
    seed_dir: &Path,
) -> Result<Vec<PathBuf>, EngineError> {
    fs::create_dir_all(seed_dir).map_err(|e| EngineError::io(seed_dir, e))?;

    let mut written = Vec::with_capacity(frames.len());
    for at in frames {
        let snapshot = source.frame(*at).ok_or_else(|| {
            EngineError::Internal(format!(
                "outlier frame {} of simulation {} is out of range",
                at.frame, at.sim_id
            ))
        })?;
        let path = seed_dir.join(at.seed_file_name());
        PdbFile::write_to_path(snapshot, &path).map_err(|source| EngineError::Structure {
            path: path.clone(),
            source,
        })?;
        written.push(path);
    }
    info!(count = written.len(), dir = %seed_dir.display(), "Wrote seed structures.");
    Ok(written)
}
