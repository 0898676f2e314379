use super::{TaskManager, TaskTemplate, copy_command, mkdir_command};
use crate::core::layout::{self, RunLayout};
use crate::core::models::output::{Inputs, Output, lookup_input_path};
use crate::core::models::task::TaskDescriptor;
use crate::engine::error::EngineError;
use crate::engine::stage::StageKind;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct SimulateSettings {
    /// Upper bound on simulations per round.
    pub num_sims: usize,
    /// Simulation length in nanoseconds for every round after the first.
    pub sim_len: f64,
    /// Simulation length in nanoseconds for round 0.
    pub initial_sim_len: f64,
}

/// Launches one simulation per seed structure, up to `num_sims`.
#[derive(Debug, Clone)]
pub struct SimulateManager {
    name: String,
    layout: RunLayout,
    template: TaskTemplate,
    settings: SimulateSettings,
    inputs: Inputs,
}

impl SimulateManager {
    pub fn new(
        name: impl Into<String>,
        layout: RunLayout,
        template: TaskTemplate,
        settings: SimulateSettings,
    ) -> Self {
        Self {
            name: name.into(),
            layout,
            template,
            settings,
            inputs: Inputs::new(),
        }
    }

    /// Seeds are read from the detect producer's shared root when subscribed, else from the
    /// run layout.
    fn seed_dir(&self, round: usize) -> PathBuf {
        match lookup_input_path(&self.inputs, "shared_root") {
            Some(shared_root) => layout::seed_dir(&shared_root, round),
            None => self.layout.seed_dir(round),
        }
    }

    fn sim_len(&self, round: usize) -> f64 {
        if round == 0 {
            self.settings.initial_sim_len
        } else {
            self.settings.sim_len
        }
    }
}

/// Sorted `*.pdb` files of `dir`. A missing directory holds no seeds.
pub(crate) fn list_seed_files(dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|e| EngineError::io(dir, e))?;
    let mut seeds = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| EngineError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "pdb") {
            seeds.push(path);
        }
    }
    seeds.sort();
    Ok(seeds)
}

impl TaskManager for SimulateManager {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Simulate
    }

    fn produce(&self, round: usize) -> Result<Vec<TaskDescriptor>, EngineError> {
        let seed_dir = self.seed_dir(round);
        let seeds = list_seed_files(&seed_dir)?;
        if seeds.is_empty() {
            return Err(EngineError::NoSeedsAvailable {
                round,
                dir: seed_dir,
            });
        }

        let count = self.settings.num_sims.min(seeds.len());
        if count < seeds.len() {
            debug!(
                available = seeds.len(),
                used = count,
                "More seeds than simulations; extra seeds are ignored."
            );
        }

        let md_dir = self.layout.md_dir(round);
        let sim_len = self.sim_len(round);
        let tasks = seeds
            .iter()
            .take(count)
            .enumerate()
            .map(|(sim_id, seed)| {
                let input = md_dir.join(format!("input-{sim_id}.pdb"));
                self.template
                    .descriptor(format!("{}-{}-{}", self.name, round, sim_id))
                    .pre_exec(mkdir_command(&md_dir))
                    .pre_exec(copy_command(seed, &input))
                    .path_flag("--pdb", &input)
                    .path_flag("--out", &md_dir)
                    .flag("--sim_id", sim_id)
                    .flag("--len", sim_len)
                    .build()
            })
            .collect::<Vec<_>>();

        info!(
            manager = %self.name,
            round,
            simulations = tasks.len(),
            "Prepared simulation tasks."
        );
        Ok(tasks)
    }

    fn output(&self) -> Output {
        Output::new().with_path("md_root", &self.layout.md_root())
    }

    fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    fn set_inputs(&mut self, inputs: Inputs) {
        self.inputs = inputs;
    }
}
