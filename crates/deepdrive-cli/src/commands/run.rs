use crate::cli::RunArgs;
use crate::config::builder::build_config;
use crate::config::models::{ManagerSettings, ManagerSpec};
use crate::error::Result;
use crate::executor::{DryRunExecutor, LocalExecutor};
use crate::utils::progress::CliProgressHandler;
use deepdrive::core::layout::RunLayout;
use deepdrive::engine::error::EngineError;
use deepdrive::engine::managers::TaskManager;
use deepdrive::engine::managers::detect::DetectManager;
use deepdrive::engine::managers::learn::LearnManager;
use deepdrive::engine::managers::preprocess::PreprocessManager;
use deepdrive::engine::managers::simulate::SimulateManager;
use deepdrive::engine::progress::ProgressReporter;
use deepdrive::engine::registry::ManagerGraph;
use deepdrive::engine::state::{RunSummary, Termination};
use deepdrive::workflows::pipeline::{Controller, seed_initial_structures};
use tracing::{info, warn};

pub async fn run(args: RunArgs) -> Result<()> {
    info!("Building run configuration from {:?}", &args.config);
    let app_config = build_config(&args)?;
    let run_config = &app_config.core_config;

    let layout = RunLayout::new(run_config.experiment_dir.clone());
    let graph = build_graph(&app_config.managers, &layout)?;
    info!(
        managers = graph.len(),
        edges = graph.edges().len(),
        "Dependency graph wired."
    );

    let resource = &run_config.resource;
    info!(
        resource = %resource.resource,
        queue = resource.queue.as_deref().unwrap_or("-"),
        project = resource.project.as_deref().unwrap_or("-"),
        walltime_minutes = resource.walltime_minutes,
        cpus = resource.cpus,
        gpus = resource.gpus,
        "Resource allocation requested."
    );

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Starting run in {} ({} round(s))...",
        run_config.experiment_dir.display(),
        run_config.max_iterations
    );

    let summary = tokio::task::block_in_place(|| -> Result<RunSummary> {
        seed_initial_structures(
            &layout,
            &run_config.seeding.reference_structure,
            run_config.seeding.replicas,
        )?;

        let mut controller = Controller::new(&graph, run_config, &reporter);
        let summary = if args.dry_run {
            let mut executor = DryRunExecutor::new(std::io::stdout().lock());
            controller.run(&mut executor)?
        } else {
            let mut executor = LocalExecutor::new(&reporter, &run_config.resource)?;
            controller.run(&mut executor)?
        };
        Ok(summary)
    })?;

    print_summary(&summary);
    Ok(())
}

/// Instantiates one manager per declaration, then applies every subscription.
fn build_graph(specs: &[ManagerSpec], layout: &RunLayout) -> Result<ManagerGraph> {
    let mut graph = ManagerGraph::new();
    for spec in specs {
        let template = spec.template.clone();
        let manager: Box<dyn TaskManager> = match &spec.settings {
            ManagerSettings::Simulate(settings) => Box::new(SimulateManager::new(
                &spec.name,
                layout.clone(),
                template,
                settings.clone(),
            )),
            ManagerSettings::Preprocess => Box::new(PreprocessManager::new(
                &spec.name,
                layout.clone(),
                template,
            )),
            ManagerSettings::Learn(settings) => Box::new(LearnManager::new(
                &spec.name,
                layout.clone(),
                template,
                settings.clone(),
            )),
            ManagerSettings::Detect(settings) => Box::new(DetectManager::new(
                &spec.name,
                layout.clone(),
                template,
                settings.clone(),
            )),
        };
        graph.add(manager).map_err(EngineError::from)?;
    }

    for spec in specs.iter().filter(|s| !s.subscribe.is_empty()) {
        let producers: Vec<&str> = spec.subscribe.iter().map(String::as_str).collect();
        graph
            .subscribe(&spec.name, &producers)
            .map_err(EngineError::from)?;
    }
    Ok(graph)
}

fn print_summary(summary: &RunSummary) {
    match summary.termination {
        Termination::MaxIterations => {
            println!(
                "Run finished after {} round(s), {} stage(s) executed.",
                summary.rounds_completed, summary.stages_executed
            );
        }
        Termination::SeedsExhausted { round } => {
            warn!(round, "Run stopped early: no seed structures left.");
            println!(
                "Run stopped at round {}: no seed structures were left. {} round(s) and {} stage(s) completed.",
                round, summary.rounds_completed, summary.stages_executed
            );
        }
    }
}
