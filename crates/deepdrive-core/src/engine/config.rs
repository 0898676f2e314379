use super::stage::StageNames;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<&'static str>),
    #[error("Invalid parameter '{name}': {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Machine allocation requested for the whole run, handed through to the execution collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    pub resource: String,
    pub queue: Option<String>,
    pub walltime_minutes: u64,
    pub cpus: usize,
    pub gpus: usize,
    pub project: Option<String>,
}

/// How tasks find their interpreter and load their software environment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentConfig {
    pub python: PathBuf,
    pub setup_commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeedingConfig {
    pub reference_structure: PathBuf,
    pub replicas: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub experiment_dir: PathBuf,
    pub max_iterations: usize,
    pub resource: ResourceDescriptor,
    pub environment: EnvironmentConfig,
    pub seeding: SeedingConfig,
    pub stage_names: StageNames,
}

#[derive(Default)]
pub struct RunConfigBuilder {
    experiment_dir: Option<PathBuf>,
    max_iterations: Option<usize>,
    resource: Option<String>,
    queue: Option<String>,
    walltime_minutes: Option<u64>,
    cpus: Option<usize>,
    gpus: Option<usize>,
    project: Option<String>,
    python: Option<PathBuf>,
    setup_commands: Vec<String>,
    reference_structure: Option<PathBuf>,
    replicas: Option<usize>,
    stage_names: StageNames,
}

impl RunConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn experiment_dir(mut self, path: PathBuf) -> Self {
        self.experiment_dir = Some(path);
        self
    }
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }
    pub fn queue(mut self, queue: Option<String>) -> Self {
        self.queue = queue;
        self
    }
    pub fn walltime_minutes(mut self, minutes: u64) -> Self {
        self.walltime_minutes = Some(minutes);
        self
    }
    pub fn cpus(mut self, cpus: usize) -> Self {
        self.cpus = Some(cpus);
        self
    }
    pub fn gpus(mut self, gpus: usize) -> Self {
        self.gpus = Some(gpus);
        self
    }
    pub fn project(mut self, project: Option<String>) -> Self {
        self.project = project;
        self
    }
    pub fn python(mut self, path: PathBuf) -> Self {
        self.python = Some(path);
        self
    }
    pub fn setup_commands(mut self, commands: Vec<String>) -> Self {
        self.setup_commands = commands;
        self
    }
    pub fn reference_structure(mut self, path: PathBuf) -> Self {
        self.reference_structure = Some(path);
        self
    }
    pub fn replicas(mut self, replicas: usize) -> Self {
        self.replicas = Some(replicas);
        self
    }
    pub fn stage_names(mut self, names: StageNames) -> Self {
        self.stage_names = names;
        self
    }

    /// Validates every required setting at once so the caller sees the full list of gaps.
    pub fn build(self) -> Result<RunConfig, ConfigError> {
        let mut missing = Vec::new();
        macro_rules! require {
            ($field:ident) => {
                if self.$field.is_none() {
                    missing.push(stringify!($field));
                }
            };
        }
        require!(experiment_dir);
        require!(max_iterations);
        require!(resource);
        require!(walltime_minutes);
        require!(cpus);
        require!(gpus);
        require!(python);
        require!(reference_structure);
        require!(replicas);

        let (
            Some(experiment_dir),
            Some(max_iterations),
            Some(resource),
            Some(walltime_minutes),
            Some(cpus),
            Some(gpus),
            Some(python),
            Some(reference_structure),
            Some(replicas),
        ) = (
            self.experiment_dir,
            self.max_iterations,
            self.resource,
            self.walltime_minutes,
            self.cpus,
            self.gpus,
            self.python,
            self.reference_structure,
            self.replicas,
        )
        else {
            return Err(ConfigError::MissingParameters(missing));
        };

        if max_iterations == 0 {
            return Err(ConfigError::Invalid {
                name: "max_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if replicas == 0 {
            return Err(ConfigError::Invalid {
                name: "replicas",
                reason: "at least one seed structure is required".to_string(),
            });
        }

        Ok(RunConfig {
            experiment_dir,
            max_iterations,
            resource: ResourceDescriptor {
                resource,
                queue: self.queue,
                walltime_minutes,
                cpus,
                gpus,
                project: self.project,
            },
            environment: EnvironmentConfig {
                python,
                setup_commands: self.setup_commands,
            },
            seeding: SeedingConfig {
                reference_structure,
                replicas,
            },
            stage_names: self.stage_names,
        })
    }
}
