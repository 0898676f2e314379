//! Per-round directory tree used to pass artifacts between stages.
//!
//! ```text
//! <root>/
//!   md/pipeline-{r}/          trajectories and contact maps
//!   preproc/pipeline-{r}/     aggregated learning input
//!   ml/pipeline-{r}/          model weights, losses, embeddings
//!   outlier/pipeline-{r}/     outlier search scratch space
//!   outlier/eps-record.json   epsilon record shared by all rounds
//!   shared/pipeline-{r}/pdb/  seed structures for round r
//! ```

use std::path::{Path, PathBuf};

const ROUND_PREFIX: &str = "pipeline-";
const EPS_RECORD_FILE: &str = "eps-record.json";
pub const PREPROC_OUTPUT_FILE: &str = "cvae-input.h5";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn md_root(&self) -> PathBuf {
        self.root.join("md")
    }

    pub fn preproc_root(&self) -> PathBuf {
        self.root.join("preproc")
    }

    pub fn ml_root(&self) -> PathBuf {
        self.root.join("ml")
    }

    pub fn outlier_root(&self) -> PathBuf {
        self.root.join("outlier")
    }

    pub fn shared_root(&self) -> PathBuf {
        self.root.join("shared")
    }

    pub fn md_dir(&self, round: usize) -> PathBuf {
        round_dir(&self.md_root(), round)
    }

    pub fn preproc_dir(&self, round: usize) -> PathBuf {
        round_dir(&self.preproc_root(), round)
    }

    pub fn ml_dir(&self, round: usize) -> PathBuf {
        round_dir(&self.ml_root(), round)
    }

    pub fn outlier_dir(&self, round: usize) -> PathBuf {
        round_dir(&self.outlier_root(), round)
    }

    pub fn seed_dir(&self, round: usize) -> PathBuf {
        seed_dir(&self.shared_root(), round)
    }

    pub fn eps_record_path(&self) -> PathBuf {
        self.outlier_root().join(EPS_RECORD_FILE)
    }
}

/// Round-specific subdirectory of a stage root.
pub fn round_dir(stage_root: &Path, round: usize) -> PathBuf {
    stage_root.join(format!("{ROUND_PREFIX}{round}"))
}

/// Seed directory for `round` below a shared root.
pub fn seed_dir(shared_root: &Path, round: usize) -> PathBuf {
    round_dir(shared_root, round).join("pdb")
}
