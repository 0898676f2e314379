use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::StructureFile;
use crate::core::layout::RunLayout;
use crate::engine::config::RunConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::registry::ManagerGraph;
use crate::engine::stage::{Stage, StageDescriptor, StageKind};
use crate::engine::state::{PipelineState, RunSummary, Termination, Transition};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Runs the tasks of a generated stage. Returning is the completion signal for the stage.
pub trait StageExecutor {
    fn execute(&mut self, stage: &Stage) -> Result<(), EngineError>;
}

/// Round-by-round driver of a run.
pub struct Controller<'a> {
    graph: &'a ManagerGraph,
    config: &'a RunConfig,
    reporter: &'a ProgressReporter<'a>,
    state: PipelineState,
    next_round: usize,
}

impl<'a> Controller<'a> {
    pub fn new(
        graph: &'a ManagerGraph,
        config: &'a RunConfig,
        reporter: &'a ProgressReporter<'a>,
    ) -> Self {
        Self {
            graph,
            config,
            reporter,
            state: PipelineState::Building { round: 0 },
            next_round: 0,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Opens `round` and returns its four stage descriptors in execution order.
    ///
    /// Rounds must be opened one after another; the previous round has to be closed through
    /// [`Controller::complete_round`] first.
    pub fn advance(&mut self, round: usize) -> Result<Vec<StageDescriptor<'a>>, EngineError> {
        if self.state == PipelineState::Done {
            return Err(EngineError::Internal(format!(
                "cannot open round {round}: the run is finished"
            )));
        }
        if round != self.next_round {
            return Err(EngineError::Internal(format!(
                "round {round} opened out of sequence, expected {}",
                self.next_round
            )));
        }

        if round > 0 {
            info!(round = round - 1, "Round finished.");
            self.reporter
                .report(Progress::RoundFinish { round: round - 1 });
        }
        self.state = PipelineState::Building { round };
        self.reporter.report(Progress::RoundStart {
            round,
            max_iterations: self.config.max_iterations,
        });
        info!(round, max_iterations = self.config.max_iterations, "Starting round.");

        let (graph, config) = (self.graph, self.config);
        let names = &config.stage_names;
        Ok(StageKind::ORDER
            .iter()
            .map(|&kind| StageDescriptor {
                kind,
                name: names.name(kind),
                managers: graph.managers_for(kind),
            })
            .collect())
    }

    /// Closes `round` once its detect stage has completed and decides whether another round
    /// follows.
    pub fn complete_round(&mut self, round: usize) -> Result<Transition, EngineError> {
        if self.state != (PipelineState::Building { round }) {
            return Err(EngineError::Internal(format!(
                "round {round} completed while controller is in state {:?}",
                self.state
            )));
        }
        if round + 1 < self.config.max_iterations {
            self.next_round = round + 1;
            return Ok(Transition::Next(round + 1));
        }
        self.state = PipelineState::Done;
        self.reporter.report(Progress::RoundFinish { round });
        self.reporter.report(Progress::Message(format!(
            "Run complete after {} round(s).",
            round + 1
        )));
        info!(rounds = round + 1, "All rounds complete.");
        Ok(Transition::Done)
    }

    /// Drives the run to completion, generating each stage only after the previous one has
    /// been executed.
    ///
    /// A simulate manager without seeds ends the run normally with
    /// [`Termination::SeedsExhausted`].
    #[instrument(skip_all, name = "pipeline")]
    pub fn run(&mut self, executor: &mut dyn StageExecutor) -> Result<RunSummary, EngineError> {
        let mut round = self.next_round;
        let mut stages_executed = 0;

        loop {
            for descriptor in self.advance(round)? {
                let stage = match descriptor.generate(round) {
                    Ok(stage) => stage,
                    Err(EngineError::NoSeedsAvailable { round, dir }) => {
                        warn!(round, dir = %dir.display(), "No seeds left; stopping the run.");
                        self.state = PipelineState::Done;
                        self.reporter.report(Progress::Message(format!(
                            "No seed structures for round {round}; run stopped."
                        )));
                        return Ok(RunSummary {
                            rounds_completed: round,
                            stages_executed,
                            termination: Termination::SeedsExhausted { round },
                        });
                    }
                    Err(e) => return Err(e),
                };

                self.reporter.report(Progress::PhaseStart {
                    name: format!("{} (round {})", stage.name, round),
                });
                info!(stage = %stage.name, round, tasks = stage.len(), "Executing stage.");
                executor.execute(&stage)?;
                stages_executed += 1;
                self.reporter.report(Progress::PhaseFinish);
            }

            match self.complete_round(round)? {
                Transition::Next(next) => round = next,
                Transition::Done => break,
            }
        }

        Ok(RunSummary {
            rounds_completed: round + 1,
            stages_executed,
            termination: Termination::MaxIterations,
        })
    }
}

/// Validates `reference` as a structure file and copies it into round 0's seed directory
/// `replicas` times.
pub fn seed_initial_structures(
    layout: &RunLayout,
    reference: &Path,
    replicas: usize,
) -> Result<Vec<PathBuf>, EngineError> {
    PdbFile::read_frames_from_path(reference).map_err(|source| EngineError::Structure {
        path: reference.to_path_buf(),
        source,
    })?;

    let seed_dir = layout.seed_dir(0);
    fs::create_dir_all(&seed_dir).map_err(|e| EngineError::io(&seed_dir, e))?;
    let mut seeds = Vec::with_capacity(replicas);
    for i in 0..replicas {
        let target = seed_dir.join(format!("seed-{i}.pdb"));
        fs::copy(reference, &target).map_err(|e| EngineError::io(&target, e))?;
        seeds.push(target);
    }
    info!(replicas, dir = %seed_dir.display(), "Seeded initial structures.");
    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::RunConfigBuilder;
    use crate::engine::managers::TaskTemplate;
    use crate::engine::managers::detect::{DetectManager, DetectSettings};
    use crate::engine::managers::learn::{LearnManager, LearnSettings};
    use crate::engine::managers::preprocess::PreprocessManager;
    use crate::engine::managers::simulate::{SimulateManager, SimulateSettings};
    use crate::engine::outlier::clustering::Clusterer;
    use crate::engine::outlier::eps::EpsilonRecord;
    use crate::engine::outlier::search::SearchParams;
    use crate::workflows::outlier::{self, OutlierRequest, fixtures};
    use nalgebra::DMatrix;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const FRAMES_PER_SIM: usize = 120;

    fn config(root: &Path, max_iterations: usize) -> RunConfig {
        RunConfigBuilder::new()
            .experiment_dir(root.to_path_buf())
            .max_iterations(max_iterations)
            .resource("local.localhost")
            .walltime_minutes(60)
            .cpus(4)
            .gpus(0)
            .python(PathBuf::from("python"))
            .reference_structure(root.join("ref.pdb"))
            .replicas(2)
            .build()
            .unwrap()
    }

    fn graph(layout: &RunLayout) -> ManagerGraph {
        let mut graph = ManagerGraph::new();
        graph
            .add(Box::new(SimulateManager::new(
                "MD",
                layout.clone(),
                TaskTemplate::new("python").with_script("md.py"),
                SimulateSettings {
                    num_sims: 2,
                    sim_len: 10.0,
                    initial_sim_len: 0.1,
                },
            )))
            .unwrap();
        graph
            .add(Box::new(PreprocessManager::new(
                "Contacts",
                layout.clone(),
                TaskTemplate::new("python").with_script("contacts.py"),
            )))
            .unwrap();
        graph
            .add(Box::new(LearnManager::new(
                "CVAE",
                layout.clone(),
                TaskTemplate::new("python").with_script("cvae.py"),
                LearnSettings::default(),
            )))
            .unwrap();
        graph
            .add(Box::new(DetectManager::new(
                "Outlier",
                layout.clone(),
                TaskTemplate::new("deepdrive"),
                DetectSettings::default(),
            )))
            .unwrap();
        graph.subscribe("Contacts", &["MD"]).unwrap();
        graph.subscribe("CVAE", &["Contacts"]).unwrap();
        graph.subscribe("Outlier", &["MD", "CVAE"]).unwrap();
        graph.subscribe("MD", &["Outlier"]).unwrap();
        graph
    }

    fn write_reference(root: &Path) -> PathBuf {
        let path = root.join("ref.pdb");
        PdbFile::write_to_path(&fixtures::snapshot(0.0), &path).unwrap();
        path
    }

    /// Stands in for the external collaborators: fabricates the artifacts each stage would
    /// produce and runs the real outlier procedure for detect stages.
    struct Scripted<C> {
        layout: RunLayout,
        clusterer: C,
        simulations: usize,
        history: Vec<(StageKind, usize, usize)>,
    }

    impl<C> Scripted<C> {
        fn new(layout: RunLayout, clusterer: C) -> Self {
            Self {
                layout,
                clusterer,
                simulations: 0,
                history: Vec::new(),
            }
        }
    }

    impl<C: Clusterer> StageExecutor for Scripted<C> {
        fn execute(&mut self, stage: &Stage) -> Result<(), EngineError> {
            self.history.push((stage.kind, stage.round, stage.len()));
            match stage.kind {
                StageKind::Simulate => {
                    self.simulations = stage.len();
                    fixtures::write_trajectories(
                        &self.layout.md_dir(stage.round),
                        self.simulations,
                        FRAMES_PER_SIM,
                    );
                }
                StageKind::Preprocess => {}
                StageKind::Learn => fixtures::write_models(
                    &self.layout.ml_dir(stage.round),
                    &[(0, 0.1)],
                    self.simulations * FRAMES_PER_SIM,
                ),
                StageKind::Detect => {
                    let task = &stage.tasks[0];
                    let arg = |flag: &str| PathBuf::from(task.argument_value(flag).unwrap());
                    let request = OutlierRequest {
                        sim_path: arg("--sim_path"),
                        cvae_path: arg("--cvae_path"),
                        shared_path: arg("--shared_path"),
                        eps_path: arg("--eps_path"),
                        params: SearchParams::default(),
                    };
                    outlier::run(&request, &self.clusterer, &ProgressReporter::new())?;
                }
            }
            Ok(())
        }
    }

    /// 200 outliers below `eps = 0.25`, 100 from there on.
    fn escalating(_: &DMatrix<f64>, eps: f64) -> Vec<usize> {
        let count = if eps < 0.25 - 1e-9 { 200 } else { 100 };
        (0..count).collect()
    }

    #[test]
    fn every_round_builds_four_stages_in_order() {
        let temp = TempDir::new().unwrap();
        let layout = RunLayout::new(temp.path());
        let graph = graph(&layout);
        let config = config(temp.path(), 3);
        let reporter = ProgressReporter::new();
        let mut controller = Controller::new(&graph, &config, &reporter);

        for round in 0..3 {
            let descriptors = controller.advance(round).unwrap();
            let kinds: Vec<StageKind> = descriptors.iter().map(|d| d.kind).collect();
            assert_eq!(kinds, StageKind::ORDER.to_vec());
            assert_eq!(descriptors[0].name, "MD");
            assert_eq!(descriptors[3].managers[0].name(), "Outlier");
            let expected = if round < 2 {
                Transition::Next(round + 1)
            } else {
                Transition::Done
            };
            assert_eq!(controller.complete_round(round).unwrap(), expected);
        }
        assert_eq!(controller.state(), PipelineState::Done);
        assert!(controller.advance(3).is_err());
    }

    #[test]
    fn rounds_cannot_be_skipped() {
        let temp = TempDir::new().unwrap();
        let graph = ManagerGraph::new();
        let config = config(temp.path(), 3);
        let reporter = ProgressReporter::new();
        let mut controller = Controller::new(&graph, &config, &reporter);

        assert!(matches!(controller.advance(1), Err(EngineError::Internal(_))));
        controller.advance(0).unwrap();
        assert!(controller.advance(1).is_err());
        assert!(controller.complete_round(1).is_err());
    }

    #[test]
    fn two_round_run_escalates_eps_and_stops_at_max_iterations() {
        let temp = TempDir::new().unwrap();
        let layout = RunLayout::new(temp.path());
        let reference = write_reference(temp.path());
        seed_initial_structures(&layout, &reference, 2).unwrap();

        let graph = graph(&layout);
        let config = config(temp.path(), 2);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |p| {
            sink.lock().unwrap().push(p);
        }));
        let mut executor = Scripted::new(layout.clone(), escalating);

        let summary = Controller::new(&graph, &config, &reporter)
            .run(&mut executor)
            .unwrap();

        assert_eq!(summary.termination, Termination::MaxIterations);
        assert_eq!(summary.rounds_completed, 2);
        assert_eq!(summary.stages_executed, 8);

        let kinds: Vec<(StageKind, usize)> =
            executor.history.iter().map(|(k, r, _)| (*k, *r)).collect();
        let expected: Vec<(StageKind, usize)> = (0..2)
            .flat_map(|r| StageKind::ORDER.iter().map(move |k| (*k, r)))
            .collect();
        assert_eq!(kinds, expected);
        assert_eq!(executor.history[0].2, 2);
        assert_eq!(executor.history[4].2, 2);

        let record = EpsilonRecord::load(&layout.eps_record_path()).unwrap();
        let round0 = layout.ml_dir(0).join("weight-0.h5").display().to_string();
        assert!((record.get(&round0).unwrap() - 0.25).abs() < 1e-12);
        assert_eq!(record.len(), 2);

        assert_eq!(
            fs::read_dir(layout.seed_dir(1)).unwrap().count(),
            100,
            "round 0 detect writes the accepted outliers as seeds"
        );
        assert!(!layout.md_dir(2).exists());

        let events = events.lock().unwrap();
        let starts = events
            .iter()
            .filter(|e| matches!(e, Progress::RoundStart { .. }))
            .count();
        assert_eq!(starts, 2);
        assert!(events.contains(&Progress::RoundFinish { round: 1 }));
    }

    #[test]
    fn detect_without_outliers_ends_run_when_seeds_run_out() {
        let temp = TempDir::new().unwrap();
        let layout = RunLayout::new(temp.path());
        let reference = write_reference(temp.path());
        seed_initial_structures(&layout, &reference, 1).unwrap();

        let graph = graph(&layout);
        let config = config(temp.path(), 5);
        let reporter = ProgressReporter::new();
        let mut executor = Scripted::new(layout.clone(), |_: &DMatrix<f64>, _eps: f64| {
            Vec::<usize>::new()
        });

        let mut controller = Controller::new(&graph, &config, &reporter);
        let summary = controller.run(&mut executor).unwrap();

        assert_eq!(summary.termination, Termination::SeedsExhausted { round: 1 });
        assert_eq!(summary.rounds_completed, 1);
        assert_eq!(summary.stages_executed, 4);
        assert_eq!(controller.state(), PipelineState::Done);
    }

    #[test]
    fn execution_failure_aborts_the_run() {
        struct Failing;
        impl StageExecutor for Failing {
            fn execute(&mut self, stage: &Stage) -> Result<(), EngineError> {
                Err(EngineError::Execution {
                    stage: stage.name.clone(),
                    round: stage.round,
                    reason: "exit status 1".into(),
                })
            }
        }

        let temp = TempDir::new().unwrap();
        let layout = RunLayout::new(temp.path());
        let reference = write_reference(temp.path());
        seed_initial_structures(&layout, &reference, 1).unwrap();
        let graph = graph(&layout);
        let config = config(temp.path(), 2);
        let reporter = ProgressReporter::new();

        let err = Controller::new(&graph, &config, &reporter)
            .run(&mut Failing)
            .unwrap_err();
        assert!(matches!(err, EngineError::Execution { round: 0, .. }));
    }

    #[test]
    fn seeding_copies_reference_and_rejects_empty_structures() {
        let temp = TempDir::new().unwrap();
        let layout = RunLayout::new(temp.path().join("run"));
        let reference = write_reference(temp.path());

        let seeds = seed_initial_structures(&layout, &reference, 3).unwrap();
        assert_eq!(seeds.len(), 3);
        assert_eq!(seeds[2], layout.seed_dir(0).join("seed-2.pdb"));
        assert_eq!(
            fs::read(&seeds[0]).unwrap(),
            fs::read(&reference).unwrap()
        );

        let empty = temp.path().join("empty.pdb");
        fs::write(&empty, "REMARK nothing here\nEND\n").unwrap();
        assert!(matches!(
            seed_initial_structures(&layout, &empty, 1),
            Err(EngineError::Structure { .. })
        ));
    }
}
