//! Task managers: the configuration-holding components that turn a round index into task
//! descriptors for their stage.
//!
//! Each stage-type has one concrete manager:
//!
//! - [`simulate::SimulateManager`] - one simulation per available seed, bounded by a count
//! - [`preprocess::PreprocessManager`] - aggregates a round's simulation output
//! - [`learn::LearnManager`] - trains a family of models with growing latent dimension
//! - [`detect::DetectManager`] - runs the adaptive outlier search and reseeds the next round
//!
//! Managers communicate through [`Output`] records wired by the dependency registry; the
//! artifacts themselves travel through the run's filesystem layout.

pub mod detect;
pub mod learn;
pub mod preprocess;
pub mod simulate;

use super::error::EngineError;
use super::stage::StageKind;
use crate::core::models::output::{Inputs, Output};
use crate::core::models::task::{
    ResourceRequirements, TaskDescriptor, TaskDescriptorBuilder, shell_quote,
};
use std::path::{Path, PathBuf};

pub trait TaskManager: Send + Sync {
    /// Identity used for subscriptions; unique within one dependency graph.
    fn name(&self) -> &str;

    fn kind(&self) -> StageKind;

    /// Produces the task descriptors for `round`.
    fn produce(&self, round: usize) -> Result<Vec<TaskDescriptor>, EngineError>;

    /// Values subscribers should consume. Empty until the manager has something to expose.
    fn output(&self) -> Output {
        Output::default()
    }

    fn inputs(&self) -> &Inputs;

    fn set_inputs(&mut self, inputs: Inputs);
}

/// Static description of how a manager's tasks are launched.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskTemplate {
    pub executable: String,
    /// Script passed as the first argument, for interpreter-driven tasks.
    pub script: Option<PathBuf>,
    pub setup_commands: Vec<String>,
    pub cpu: ResourceRequirements,
    pub gpu: Option<ResourceRequirements>,
}

impl TaskTemplate {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            script: None,
            setup_commands: Vec::new(),
            cpu: ResourceRequirements::cpu(1, 1),
            gpu: None,
        }
    }

    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_setup_commands(mut self, commands: Vec<String>) -> Self {
        self.setup_commands = commands;
        self
    }

    pub fn with_resources(
        mut self,
        cpu: ResourceRequirements,
        gpu: Option<ResourceRequirements>,
    ) -> Self {
        self.cpu = cpu;
        self.gpu = gpu;
        self
    }

    /// Starts a descriptor with the environment setup, the interpreter script and the hardware
    /// requirements already applied.
    pub(crate) fn descriptor(&self, name: String) -> TaskDescriptorBuilder {
        let mut builder = TaskDescriptor::builder(name, self.executable.clone())
            .pre_exec_all(self.setup_commands.iter().cloned())
            .cpu(self.cpu)
            .gpu(self.gpu);
        if let Some(script) = &self.script {
            builder = builder.arg(script.display().to_string());
        }
        builder
    }
}

pub(crate) fn mkdir_command(dir: &Path) -> String {
    format!("mkdir -p {}", shell_quote(&dir.display().to_string()))
}

pub(crate) fn copy_command(from: &Path, to: &Path) -> String {
    format!(
        "cp {} {}",
        shell_quote(&from.display().to_string()),
        shell_quote(&to.display().to_string())
    )
}
