use super::{TaskManager, TaskTemplate, mkdir_command};
use crate::core::layout::{self, PREPROC_OUTPUT_FILE, RunLayout};
use crate::core::models::output::{Inputs, Output, lookup_input_path};
use crate::core::models::task::TaskDescriptor;
use crate::engine::error::EngineError;
use crate::engine::stage::StageKind;
use std::path::PathBuf;

/// Aggregates the trajectories of one round into a single learning input.
#[derive(Debug, Clone)]
pub struct PreprocessManager {
    name: String,
    layout: RunLayout,
    template: TaskTemplate,
    inputs: Inputs,
}

impl PreprocessManager {
    pub fn new(name: impl Into<String>, layout: RunLayout, template: TaskTemplate) -> Self {
        Self {
            name: name.into(),
            layout,
            template,
            inputs: Inputs::new(),
        }
    }

    fn md_dir(&self, round: usize) -> PathBuf {
        match lookup_input_path(&self.inputs, "md_root") {
            Some(md_root) => layout::round_dir(&md_root, round),
            None => self.layout.md_dir(round),
        }
    }
}

impl TaskManager for PreprocessManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Preprocess
    }

    fn produce(&self, round: usize) -> Result<Vec<TaskDescriptor>, EngineError> {
        let out_dir = self.layout.preproc_dir(round);
        let task = self
            .template
            .descriptor(format!("{}-{}", self.name, round))
            .pre_exec(mkdir_command(&out_dir))
            .path_flag("--sim_path", &self.md_dir(round))
            .path_flag("--out", &out_dir.join(PREPROC_OUTPUT_FILE))
            .build();
        Ok(vec![task])
    }

    fn output(&self) -> Output {
        Output::new()
            .with_path("preproc_root", &self.layout.preproc_root())
            .with("cm_file", PREPROC_OUTPUT_FILE)
    }

    fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    fn set_inputs(&mut self, inputs: Inputs) {
        self.inputs = inputs;
    }
}
