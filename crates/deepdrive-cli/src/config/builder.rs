use super::defaults::DefaultsConfig;
use super::file::{
    FileConfig, FileDetectStage, FileLearnStage, FileResources, FileScriptStage,
    FileSimulateStage,
};
use super::models::{AppConfig, ManagerSettings, ManagerSpec};
use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::utils::parser;
use deepdrive::core::models::task::{ProcessType, ResourceRequirements};
use deepdrive::engine::config::{EnvironmentConfig, RunConfigBuilder};
use deepdrive::engine::managers::TaskTemplate;
use deepdrive::engine::managers::detect::DetectSettings;
use deepdrive::engine::managers::learn::LearnSettings;
use deepdrive::engine::managers::simulate::SimulateSettings;
use deepdrive::engine::outlier::search::SearchParams;
use deepdrive::engine::stage::StageNames;
use std::path::{Path, PathBuf};

pub fn build_config(args: &RunArgs) -> Result<AppConfig> {
    let file_config = FileConfig::from_file(&args.config)?;
    let base_dir = args
        .config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    build_from_file(args, file_config, &base_dir)
}

/// Merges command-line overrides, `-S` assignments, the run file and the defaults, in that order
/// of precedence. Relative paths of the run file resolve against `base_dir`.
fn build_from_file(args: &RunArgs, file_config: FileConfig, base_dir: &Path) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let resource = file_config.resource.take().unwrap_or_default();
    let environment = file_config.environment.take().unwrap_or_default();
    let seeding = file_config.seeding.take().unwrap_or_default();

    let mut builder = RunConfigBuilder::new()
        .queue(resource.queue)
        .project(resource.project)
        .cpus(resource.cpus.unwrap_or(defaults.cpus))
        .gpus(resource.gpus.unwrap_or(defaults.gpus))
        .replicas(seeding.replicas.unwrap_or(defaults.replicas))
        .setup_commands(environment.setup_commands)
        .stage_names(merge_stage_names(file_config.stage_names.take()));

    let experiment_dir = args
        .experiment_dir
        .clone()
        .or_else(|| file_config.experiment_dir.as_deref().map(|p| resolve(base_dir, p)));
    if let Some(dir) = experiment_dir {
        builder = builder.experiment_dir(dir);
    }
    if let Some(iterations) = args.max_iterations.or(file_config.max_iterations) {
        builder = builder.max_iterations(iterations);
    }
    if let Some(name) = resource.name {
        builder = builder.resource(name);
    }
    if let Some(minutes) = resource.walltime_minutes {
        builder = builder.walltime_minutes(minutes);
    }
    if let Some(python) = environment.python {
        builder = builder.python(python);
    }
    if let Some(reference) = seeding.reference_structure {
        builder = builder.reference_structure(resolve(base_dir, &reference));
    }

    let core_config = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let mut managers = Vec::new();
    for stage in &file_config.simulate {
        managers.push(simulate_spec(stage, &core_config.environment, base_dir, &defaults)?);
    }
    for stage in &file_config.preprocess {
        managers.push(preprocess_spec(stage, &core_config.environment, base_dir, &defaults)?);
    }
    for stage in &file_config.learn {
        managers.push(learn_spec(stage, &core_config.environment, base_dir, &defaults)?);
    }
    for stage in &file_config.detect {
        managers.push(detect_spec(stage, &core_config.environment, base_dir, &defaults)?);
    }

    for (table, count) in [
        ("simulate", file_config.simulate.len()),
        ("preprocess", file_config.preprocess.len()),
        ("learn", file_config.learn.len()),
        ("detect", file_config.detect.len()),
    ] {
        if count == 0 {
            return Err(CliError::Config(format!(
                "Run file declares no [[{table}]] stage"
            )));
        }
    }

    Ok(AppConfig {
        core_config,
        managers,
    })
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn merge_stage_names(file_val: Option<super::file::FileStageNames>) -> StageNames {
    let defaults = StageNames::default();
    let Some(names) = file_val else {
        return defaults;
    };
    StageNames {
        simulate: names.simulate.unwrap_or(defaults.simulate),
        preprocess: names.preprocess.unwrap_or(defaults.preprocess),
        learn: names.learn.unwrap_or(defaults.learn),
        detect: names.detect.unwrap_or(defaults.detect),
    }
}

fn cpu_requirements(file_val: Option<FileResources>, defaults: &DefaultsConfig) -> ResourceRequirements {
    let file_val = file_val.unwrap_or_default();
    let mut requirements = ResourceRequirements::cpu(
        file_val.processes.unwrap_or(defaults.task_processes),
        file_val.threads.unwrap_or(defaults.task_threads),
    );
    if file_val.mpi.unwrap_or(false) {
        requirements.process_type = Some(ProcessType::Mpi);
    }
    requirements
}

fn gpu_requirements(file_val: Option<FileResources>) -> Option<ResourceRequirements> {
    file_val.map(|r| ResourceRequirements::gpu(r.processes.unwrap_or(1)))
}

/// Template of an interpreter-driven stage: the environment's python runs the stage script.
fn script_template(
    stage_name: &str,
    script: Option<&Path>,
    cpu: Option<FileResources>,
    gpu: Option<FileResources>,
    environment: &EnvironmentConfig,
    base_dir: &Path,
    defaults: &DefaultsConfig,
) -> Result<TaskTemplate> {
    let script = script.ok_or_else(|| {
        CliError::Config(format!("Stage '{stage_name}' requires a `script`"))
    })?;
    Ok(TaskTemplate::new(environment.python.display().to_string())
        .with_script(resolve(base_dir, script))
        .with_setup_commands(environment.setup_commands.clone())
        .with_resources(cpu_requirements(cpu, defaults), gpu_requirements(gpu)))
}

fn simulate_spec(
    stage: &FileSimulateStage,
    environment: &EnvironmentConfig,
    base_dir: &Path,
    defaults: &DefaultsConfig,
) -> Result<ManagerSpec> {
    let template = script_template(
        &stage.name,
        stage.script.as_deref(),
        stage.cpu,
        stage.gpu,
        environment,
        base_dir,
        defaults,
    )?;
    Ok(ManagerSpec {
        name: stage.name.clone(),
        template,
        settings: ManagerSettings::Simulate(SimulateSettings {
            num_sims: stage.num_sims.unwrap_or(defaults.num_sims),
            sim_len: stage.sim_len.unwrap_or(defaults.sim_len),
            initial_sim_len: stage.initial_sim_len.unwrap_or(defaults.initial_sim_len),
        }),
        subscribe: stage.subscribe.clone(),
    })
}

fn preprocess_spec(
    stage: &FileScriptStage,
    environment: &EnvironmentConfig,
    base_dir: &Path,
    defaults: &DefaultsConfig,
) -> Result<ManagerSpec> {
    let template = script_template(
        &stage.name,
        stage.script.as_deref(),
        stage.cpu,
        stage.gpu,
        environment,
        base_dir,
        defaults,
    )?;
    Ok(ManagerSpec {
        name: stage.name.clone(),
        template,
        settings: ManagerSettings::Preprocess,
        subscribe: stage.subscribe.clone(),
    })
}

fn learn_spec(
    stage: &FileLearnStage,
    environment: &EnvironmentConfig,
    base_dir: &Path,
    defaults: &DefaultsConfig,
) -> Result<ManagerSpec> {
    let template = script_template(
        &stage.name,
        stage.script.as_deref(),
        stage.cpu,
        stage.gpu,
        environment,
        base_dir,
        defaults,
    )?;
    Ok(ManagerSpec {
        name: stage.name.clone(),
        template,
        settings: ManagerSettings::Learn(LearnSettings {
            num_models: stage.num_models.unwrap_or(defaults.num_models),
            epochs: stage.epochs.unwrap_or(defaults.epochs),
            batch_size: stage.batch_size.unwrap_or(defaults.batch_size),
        }),
        subscribe: stage.subscribe.clone(),
    })
}

/// The detect stage runs this binary's `outlier` subcommand unless another executable is named.
fn detect_spec(
    stage: &FileDetectStage,
    environment: &EnvironmentConfig,
    base_dir: &Path,
    defaults: &DefaultsConfig,
) -> Result<ManagerSpec> {
    let executable = match &stage.executable {
        Some(path) => resolve(base_dir, path),
        None => std::env::current_exe()?,
    };
    let template = TaskTemplate::new(executable.display().to_string())
        .with_setup_commands(environment.setup_commands.clone())
        .with_resources(cpu_requirements(stage.cpu, defaults), None);

    let search = SearchParams {
        bound: stage.bound.unwrap_or(defaults.bound),
        step: stage.step.unwrap_or(defaults.step),
        default_eps: stage.default_eps.unwrap_or(defaults.default_eps),
        max_attempts: stage.max_attempts.unwrap_or(defaults.max_attempts),
    };
    search
        .validate()
        .map_err(|e| CliError::Config(format!("Stage '{}': {}", stage.name, e)))?;

    Ok(ManagerSpec {
        name: stage.name.clone(),
        template,
        settings: ManagerSettings::Detect(DetectSettings {
            search,
            min_samples: stage.min_samples.unwrap_or(defaults.min_samples),
        }),
        subscribe: stage.subscribe.clone(),
    })
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for raw in set_values {
        let (key, value) =
            parser::parse_assignment(raw).map_err(|e| CliError::Argument(e.to_string()))?;
        let invalid = |e: parser::ParseError| CliError::Config(e.to_string());

        match key {
            "max-iterations" => {
                config.max_iterations =
                    Some(parser::parse_value(key, value, "integer").map_err(invalid)?);
            }
            "experiment-dir" => {
                config.experiment_dir = Some(PathBuf::from(value));
            }
            "resource.name" => {
                config.resource.get_or_insert_with(Default::default).name = Some(value.to_string());
            }
            "resource.walltime-minutes" => {
                config
                    .resource
                    .get_or_insert_with(Default::default)
                    .walltime_minutes =
                    Some(parser::parse_value(key, value, "integer").map_err(invalid)?);
            }
            "resource.cpus" => {
                config.resource.get_or_insert_with(Default::default).cpus =
                    Some(parser::parse_value(key, value, "integer").map_err(invalid)?);
            }
            "resource.gpus" => {
                config.resource.get_or_insert_with(Default::default).gpus =
                    Some(parser::parse_value(key, value, "integer").map_err(invalid)?);
            }
            "seeding.replicas" => {
                config.seeding.get_or_insert_with(Default::default).replicas =
                    Some(parser::parse_value(key, value, "integer").map_err(invalid)?);
            }
            "seeding.reference-structure" => {
                config
                    .seeding
                    .get_or_insert_with(Default::default)
                    .reference_structure = Some(PathBuf::from(value));
            }
            "environment.python" => {
                config.environment.get_or_insert_with(Default::default).python =
                    Some(PathBuf::from(value));
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUN_FILE: &str = r#"
        experiment-dir = "exp"
        max-iterations = 2

        [resource]
        name = "local.localhost"
        walltime-minutes = 60
        cpus = 8

        [environment]
        python = "/opt/env/bin/python"
        setup-commands = ["source /opt/env/activate"]

        [seeding]
        reference-structure = "ref.pdb"
        replicas = 3

        [[simulate]]
        name = "MD"
        script = "scripts/run_md.py"
        num-sims = 3
        subscribe = ["Outlier"]
        gpu = { processes = 1 }

        [[preprocess]]
        name = "Contacts"
        script = "scripts/contact_map.py"
        subscribe = ["MD"]

        [[learn]]
        name = "CVAE"
        script = "scripts/train.py"
        num-models = 2
        subscribe = ["Contacts"]

        [[detect]]
        name = "Outlier"
        executable = "/usr/local/bin/deepdrive"
        bound = 20
        subscribe = ["MD", "CVAE"]
    "#;

    fn run_args() -> RunArgs {
        RunArgs {
            config: PathBuf::from("/runs/run.toml"),
            experiment_dir: None,
            max_iterations: None,
            dry_run: false,
            set_values: vec![],
        }
    }

    fn build(args: &RunArgs, content: &str) -> Result<AppConfig> {
        let file = FileConfig::from_toml(content).unwrap();
        build_from_file(args, file, Path::new("/runs"))
    }

    #[test]
    fn run_file_is_merged_with_defaults_and_resolved_paths() {
        let app = build(&run_args(), RUN_FILE).unwrap();
        let cfg = &app.core_config;

        assert_eq!(cfg.experiment_dir, PathBuf::from("/runs/exp"));
        assert_eq!(cfg.max_iterations, 2);
        assert_eq!(cfg.resource.gpus, DefaultsConfig::default().gpus);
        assert_eq!(
            cfg.seeding.reference_structure,
            PathBuf::from("/runs/ref.pdb")
        );
        assert_eq!(cfg.stage_names, StageNames::default());

        assert_eq!(app.managers.len(), 4);
        let md = &app.managers[0];
        assert_eq!(md.template.executable, "/opt/env/bin/python");
        assert_eq!(
            md.template.script,
            Some(PathBuf::from("/runs/scripts/run_md.py"))
        );
        assert_eq!(md.template.setup_commands, vec!["source /opt/env/activate"]);
        assert_eq!(md.template.gpu, Some(ResourceRequirements::gpu(1)));
        assert_eq!(
            md.settings,
            ManagerSettings::Simulate(SimulateSettings {
                num_sims: 3,
                sim_len: 10.0,
                initial_sim_len: 0.1,
            })
        );

        let detect = &app.managers[3];
        assert_eq!(detect.template.executable, "/usr/local/bin/deepdrive");
        assert_eq!(detect.template.script, None);
        assert_eq!(detect.subscribe, vec!["MD", "CVAE"]);
        let ManagerSettings::Detect(settings) = &detect.settings else {
            panic!("expected detect settings");
        };
        assert_eq!(settings.search.bound, 20);
        assert_eq!(settings.min_samples, 10);
    }

    #[test]
    fn command_line_overrides_take_precedence() {
        let mut args = run_args();
        args.experiment_dir = Some(PathBuf::from("/scratch/exp"));
        args.max_iterations = Some(5);
        args.set_values = vec!["resource.cpus=32".into(), "seeding.replicas=6".into()];

        let app = build(&args, RUN_FILE).unwrap();
        assert_eq!(app.core_config.experiment_dir, PathBuf::from("/scratch/exp"));
        assert_eq!(app.core_config.max_iterations, 5);
        assert_eq!(app.core_config.resource.cpus, 32);
        assert_eq!(app.core_config.seeding.replicas, 6);
    }

    #[test]
    fn missing_required_keys_are_all_reported() {
        let err = build(&run_args(), "[[simulate]]\nname = \"MD\"")
            .err()
            .unwrap();
        let CliError::Config(message) = err else {
            panic!("expected a config error, got {err:?}");
        };
        for key in [
            "experiment_dir",
            "max_iterations",
            "resource",
            "walltime_minutes",
            "python",
            "reference_structure",
        ] {
            assert!(message.contains(key), "{key} missing from '{message}'");
        }
    }

    #[test]
    fn stage_without_script_is_rejected() {
        let content = RUN_FILE.replace("script = \"scripts/train.py\"", "");
        let err = build(&run_args(), &content).err().unwrap();
        assert!(matches!(err, CliError::Config(ref m) if m.contains("CVAE")));
    }

    #[test]
    fn every_stage_type_must_be_declared() {
        let content = RUN_FILE.replace("[[preprocess]]", "[[learn]]");
        let err = build(&run_args(), &content).err().unwrap();
        assert!(matches!(err, CliError::Config(ref m) if m.contains("[[preprocess]]")));
    }

    #[test]
    fn unsupported_set_key_is_rejected() {
        let mut args = run_args();
        args.set_values = vec!["resource.memory=4".into()];
        assert!(matches!(
            build(&args, RUN_FILE),
            Err(CliError::Config(ref m)) if m.contains("resource.memory")
        ));

        args.set_values = vec!["max-iterations=many".into()];
        assert!(matches!(build(&args, RUN_FILE), Err(CliError::Config(_))));

        args.set_values = vec!["max-iterations".into()];
        assert!(matches!(build(&args, RUN_FILE), Err(CliError::Argument(_))));
    }

    #[test]
    fn invalid_search_parameters_are_rejected() {
        let content = RUN_FILE.replace("bound = 20", "bound = 20\n        step = 0.0");
        assert!(matches!(
            build(&run_args(), &content),
            Err(CliError::Config(ref m)) if m.contains("Outlier")
        ));
    }
}
