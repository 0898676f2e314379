use crate::error::CliError;
use deepdrive::core::models::task::TaskDescriptor;
use deepdrive::engine::config::ResourceDescriptor;
use deepdrive::engine::error::EngineError;
use deepdrive::engine::progress::{Progress, ProgressReporter};
use deepdrive::engine::stage::Stage;
use deepdrive::workflows::pipeline::StageExecutor;
use rayon::prelude::*;
use std::io::Write;
use std::process::Command;
use tracing::{debug, error, info};

const STDERR_TAIL_LINES: usize = 5;

/// Runs every task of a stage as a local `sh -c` subprocess. At most `cpus` tasks of the
/// allocation run at once. The stage completes once all tasks have exited; any non-zero exit
/// fails it.
pub struct LocalExecutor<'a> {
    reporter: &'a ProgressReporter<'a>,
    pool: rayon::ThreadPool,
}

impl<'a> LocalExecutor<'a> {
    pub fn new(
        reporter: &'a ProgressReporter<'a>,
        resource: &ResourceDescriptor,
    ) -> Result<Self, CliError> {
        let slots = resource.cpus.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(slots)
            .thread_name(|i| format!("task-slot-{i}"))
            .build()
            .map_err(|e| {
                CliError::Other(anyhow::anyhow!("Failed to build task pool: {}", e))
            })?;
        info!(
            resource = %resource.resource,
            slots,
            gpus = resource.gpus,
            "Local executor ready."
        );
        Ok(Self { reporter, pool })
    }
}

impl StageExecutor for LocalExecutor<'_> {
    fn execute(&mut self, stage: &Stage) -> Result<(), EngineError> {
        let reporter = self.reporter;
        reporter.report(Progress::TaskStart {
            total_steps: stage.len() as u64,
        });

        let failures: Vec<String> = self.pool.install(|| {
            stage
                .tasks
                .par_iter()
                .filter_map(|task| {
                    let result = run_task(task);
                    reporter.report(Progress::TaskIncrement);
                    result.err()
                })
                .collect()
        });

        reporter.report(Progress::TaskFinish);

        match failures.first() {
            None => Ok(()),
            Some(first) => {
                for failure in &failures {
                    error!(stage = %stage.name, round = stage.round, "{}", failure);
                }
                Err(EngineError::Execution {
                    stage: stage.name.clone(),
                    round: stage.round,
                    reason: format!(
                        "{} of {} task(s) failed; first: {}",
                        failures.len(),
                        stage.len(),
                        first
                    ),
                })
            }
        }
    }
}

fn run_task(task: &TaskDescriptor) -> Result<(), String> {
    let script = task.to_shell_script();
    debug!(task = task.name(), script = %script, "Launching task.");

    let output = Command::new("sh")
        .arg("-c")
        .arg(&script)
        .output()
        .map_err(|e| format!("task '{}' could not be launched: {}", task.name(), e))?;

    if output.status.success() {
        info!(task = task.name(), "Task finished.");
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().collect();
    let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
    Err(format!(
        "task '{}' exited with {}: {}",
        task.name(),
        output.status,
        tail
    ))
}

/// Writes each generated stage as a JSON document instead of running it.
pub struct DryRunExecutor<W: Write> {
    writer: W,
}

impl<W: Write> DryRunExecutor<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> StageExecutor for DryRunExecutor<W> {
    fn execute(&mut self, stage: &Stage) -> Result<(), EngineError> {
        let dry_run_failure = |reason: String| EngineError::Execution {
            stage: stage.name.clone(),
            round: stage.round,
            reason,
        };
        serde_json::to_writer_pretty(&mut self.writer, stage)
            .map_err(|e| dry_run_failure(format!("could not serialize stage: {e}")))?;
        writeln!(self.writer).map_err(|e| dry_run_failure(e.to_string()))
    }
}
