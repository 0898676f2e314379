use crate::cli::OutlierArgs;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use deepdrive::engine::outlier::clustering::Dbscan;
use deepdrive::engine::outlier::search::SearchParams;
use deepdrive::engine::progress::ProgressReporter;
use deepdrive::workflows::outlier::{self, OutlierReport, OutlierRequest};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const REPORT_FILE: &str = "outlier-report.json";

pub async fn run(args: OutlierArgs) -> Result<()> {
    let request = OutlierRequest {
        sim_path: args.sim_path,
        cvae_path: args.cvae_path,
        shared_path: args.shared_path,
        eps_path: args.eps_path,
        params: SearchParams {
            bound: args.bound,
            step: args.step,
            default_eps: args.eps,
            max_attempts: args.max_attempts,
        },
    };
    let clusterer = Dbscan::new(args.min_samples);

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!("Invoking the outlier detection workflow...");
    let report =
        tokio::task::block_in_place(|| outlier::run(&request, &clusterer, &reporter))?;

    println!(
        "Model {} (loss {:.4}): eps {:.3} after {} attempt(s), {} outlier(s).",
        report.model.model_id,
        report.model.final_loss,
        report.eps,
        report.attempts,
        report.outliers.len()
    );
    println!(
        "✓ {} seed structure(s) written to {}",
        report.seeds.len(),
        request.shared_path.display()
    );

    if let Some(out_dir) = &args.out_path {
        let path = write_report(&report, out_dir)?;
        info!("Outlier report written to {:?}", path);
    }
    Ok(())
}

fn write_report(report: &OutlierReport, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)?;
    let path = out_dir.join(REPORT_FILE);
    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut writer, report).map_err(|e| CliError::FileParsing {
        path: path.clone(),
        source: e.into(),
    })?;
    writer.flush()?;
    Ok(path)
}
