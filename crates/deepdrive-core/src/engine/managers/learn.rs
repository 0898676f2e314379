use super::{TaskManager, TaskTemplate, mkdir_command};
use crate::core::layout::{self, PREPROC_OUTPUT_FILE, RunLayout};
use crate::core::models::output::{Inputs, Output, lookup_input_path};
use crate::core::models::task::TaskDescriptor;
use crate::engine::error::EngineError;
use crate::engine::stage::StageKind;
use std::path::PathBuf;

const BASE_LATENT_DIM: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct LearnSettings {
    pub num_models: usize,
    pub epochs: usize,
    pub batch_size: usize,
}

impl Default for LearnSettings {
    fn default() -> Self {
        Self {
            num_models: 1,
            epochs: 100,
            batch_size: 512,
        }
    }
}

/// Trains `num_models` models per round; model `i` gets latent dimension `3 + i`.
#[derive(Debug, Clone)]
pub struct LearnManager {
    name: String,
    layout: RunLayout,
    template: TaskTemplate,
    settings: LearnSettings,
    inputs: Inputs,
}

impl LearnManager {
    pub fn new(
        name: impl Into<String>,
        layout: RunLayout,
        template: TaskTemplate,
        settings: LearnSettings,
    ) -> Self {
        Self {
            name: name.into(),
            layout,
            template,
            settings,
            inputs: Inputs::new(),
        }
    }

    fn training_input(&self, round: usize) -> PathBuf {
        let preproc_root = lookup_input_path(&self.inputs, "preproc_root")
            .unwrap_or_else(|| self.layout.preproc_root());
        let file_name = self
            .inputs
            .values()
            .find_map(|output| output.get("cm_file"))
            .unwrap_or(PREPROC_OUTPUT_FILE);
        layout::round_dir(&preproc_root, round).join(file_name)
    }
}

impl TaskManager for LearnManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Learn
    }

    fn produce(&self, round: usize) -> Result<Vec<TaskDescriptor>, EngineError> {
        let input = self.training_input(round);
        let out_dir = self.layout.ml_dir(round);
        Ok((0..self.settings.num_models)
            .map(|model_id| {
                self.template
                    .descriptor(format!("{}-{}-{}", self.name, round, model_id))
                    .pre_exec(mkdir_command(&out_dir))
                    .path_flag("--input", &input)
                    .path_flag("--out", &out_dir)
                    .flag("--model_id", model_id)
                    .flag("--epochs", self.settings.epochs)
                    .flag("--batch_size", self.settings.batch_size)
                    .flag("--latent_dim", BASE_LATENT_DIM + model_id)
                    .build()
            })
            .collect())
    }

    fn output(&self) -> Output {
        Output::new().with_path("ml_root", &self.layout.ml_root())
    }

    fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    fn set_inputs(&mut self, inputs: Inputs) {
        self.inputs = inputs;
    }
}
