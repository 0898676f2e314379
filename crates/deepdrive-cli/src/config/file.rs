use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The run file as written by the user. Every value is optional here; required keys are
/// enforced when the core configuration is built.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub experiment_dir: Option<PathBuf>,
    pub max_iterations: Option<usize>,
    pub resource: Option<FileResourceConfig>,
    pub environment: Option<FileEnvironmentConfig>,
    pub seeding: Option<FileSeedingConfig>,
    pub stage_names: Option<FileStageNames>,
    #[serde(default)]
    pub simulate: Vec<FileSimulateStage>,
    #[serde(default)]
    pub preprocess: Vec<FileScriptStage>,
    #[serde(default)]
    pub learn: Vec<FileLearnStage>,
    #[serde(default)]
    pub detect: Vec<FileDetectStage>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileResourceConfig {
    pub name: Option<String>,
    pub queue: Option<String>,
    pub walltime_minutes: Option<u64>,
    pub cpus: Option<usize>,
    pub gpus: Option<usize>,
    pub project: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileEnvironmentConfig {
    pub python: Option<PathBuf>,
    #[serde(default)]
    pub setup_commands: Vec<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSeedingConfig {
    pub reference_structure: Option<PathBuf>,
    pub replicas: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileStageNames {
    pub simulate: Option<String>,
    pub preprocess: Option<String>,
    pub learn: Option<String>,
    pub detect: Option<String>,
}

/// Hardware requested per task of a stage.
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileResources {
    pub processes: Option<usize>,
    pub threads: Option<usize>,
    pub mpi: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileSimulateStage {
    pub name: String,
    pub script: Option<PathBuf>,
    pub num_sims: Option<usize>,
    pub sim_len: Option<f64>,
    pub initial_sim_len: Option<f64>,
    #[serde(default)]
    pub subscribe: Vec<String>,
    pub cpu: Option<FileResources>,
    pub gpu: Option<FileResources>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileScriptStage {
    pub name: String,
    pub script: Option<PathBuf>,
    #[serde(default)]
    pub subscribe: Vec<String>,
    pub cpu: Option<FileResources>,
    pub gpu: Option<FileResources>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileLearnStage {
    pub name: String,
    pub script: Option<PathBuf>,
    pub num_models: Option<usize>,
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub subscribe: Vec<String>,
    pub cpu: Option<FileResources>,
    pub gpu: Option<FileResources>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileDetectStage {
    pub name: String,
    /// The `deepdrive` binary to invoke; defaults to the running executable.
    pub executable: Option<PathBuf>,
    pub bound: Option<usize>,
    pub step: Option<f64>,
    pub default_eps: Option<f64>,
    pub max_attempts: Option<usize>,
    pub min_samples: Option<usize>,
    #[serde(default)]
    pub subscribe: Vec<String>,
    pub cpu: Option<FileResources>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading run file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
