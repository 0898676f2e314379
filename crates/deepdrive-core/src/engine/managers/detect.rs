use super::{TaskManager, TaskTemplate, mkdir_command};
use crate::core::layout::{self, RunLayout};
use crate::core::models::output::{Inputs, Output, lookup_input_path};
use crate::core::models::task::TaskDescriptor;
use crate::engine::error::EngineError;
use crate::engine::outlier::search::SearchParams;
use crate::engine::stage::StageKind;
use std::path::PathBuf;
use tracing::info;

/// Subcommand of the `deepdrive` binary that performs the outlier search.
pub const OUTLIER_SUBCOMMAND: &str = "outlier";

#[derive(Debug, Clone, PartialEq)]
pub struct DetectSettings {
    pub search: SearchParams,
    pub min_samples: usize,
}

impl Default for DetectSettings {
    fn default() -> Self {
        Self {
            search: SearchParams::default(),
            min_samples: 10,
        }
    }
}

/// Runs the adaptive outlier search over the round's embeddings and writes the next round's
/// seeds.
///
/// The template's executable is expected to be the `deepdrive` binary itself.
#[derive(Debug, Clone)]
pub struct DetectManager {
    name: String,
    layout: RunLayout,
    template: TaskTemplate,
    settings: DetectSettings,
    inputs: Inputs,
}

impl DetectManager {
    pub fn new(
        name: impl Into<String>,
        layout: RunLayout,
        template: TaskTemplate,
        settings: DetectSettings,
    ) -> Self {
        Self {
            name: name.into(),
            layout,
            template,
            settings,
            inputs: Inputs::new(),
        }
    }

    fn input_round_dir(&self, key: &str, fallback_root: PathBuf, round: usize) -> PathBuf {
        let root = lookup_input_path(&self.inputs, key).unwrap_or(fallback_root);
        layout::round_dir(&root, round)
    }
}

impl TaskManager for DetectManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Detect
    }

    fn produce(&self, round: usize) -> Result<Vec<TaskDescriptor>, EngineError> {
        let md_dir = self.input_round_dir("md_root", self.layout.md_root(), round);
        let ml_dir = self.input_round_dir("ml_root", self.layout.ml_root(), round);
        let out_dir = self.layout.outlier_dir(round);
        let next_seeds = self.layout.seed_dir(round + 1);
        let eps_record = self.layout.eps_record_path();

        if round == 0 && !eps_record.exists() {
            info!(
                default_eps = self.settings.search.default_eps,
                "No epsilon record yet; the outlier search starts from the default."
            );
        }

        let search = &self.settings.search;
        let task = self
            .template
            .descriptor(format!("{}-{}", self.name, round))
            .arg(OUTLIER_SUBCOMMAND)
            .pre_exec(mkdir_command(&out_dir))
            .pre_exec(mkdir_command(&next_seeds))
            .path_flag("--sim_path", &md_dir)
            .path_flag("--cvae_path", &ml_dir)
            .path_flag("--shared_path", &next_seeds)
            .path_flag("--eps_path", &eps_record)
            .path_flag("--out_path", &out_dir)
            .flag("--bound", search.bound)
            .flag("--step", search.step)
            .flag("--eps", search.default_eps)
            .flag("--min_samples", self.settings.min_samples)
            .flag("--max_attempts", search.max_attempts)
            .build();
        Ok(vec![task])
    }

    fn output(&self) -> Output {
        Output::new()
            .with_path("outlier_root", &self.layout.outlier_root())
            .with_path("eps_record", &self.layout.eps_record_path())
            .with_path("shared_root", &self.layout.shared_root())
    }

    fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    fn set_inputs(&mut self, inputs: Inputs) {
        self.inputs = inputs;
    }
}
