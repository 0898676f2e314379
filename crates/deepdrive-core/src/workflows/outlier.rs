use crate::core::io::tables::{load_embeddings, load_series};
use crate::core::utils::identifiers::{extract_id, insert_id};
use crate::engine::error::EngineError;
use crate::engine::outlier::clustering::Clusterer;
use crate::engine::outlier::search::{SearchParams, search_and_persist};
use crate::engine::outlier::seeds::{
    FrameRef, FrameSource, PdbTrajectories, emit_seeds, locate_frames,
};
use crate::engine::progress::{Progress, ProgressReporter};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

const LOSS_PREFIX: &str = "val-loss-";
const LOSS_EXT: &str = ".csv";
const WEIGHT_PREFIX: &str = "weight-";
const WEIGHT_EXT: &str = ".h5";
const EMBEDDING_PREFIX: &str = "embeddings-";
const EMBEDDING_EXT: &str = ".csv";

/// The trained model whose final validation loss is the smallest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSelection {
    pub model_id: String,
    pub final_loss: f64,
    /// Path of the weights; doubles as the model identity in the epsilon record.
    pub weights: PathBuf,
    pub embeddings: PathBuf,
}

impl ModelSelection {
    pub fn identity(&self) -> String {
        self.weights.display().to_string()
    }
}

fn artifact_path(dir: &Path, prefix: &str, id: &str, ext: &str) -> PathBuf {
    let base = format!("{}/", dir.display());
    PathBuf::from(insert_id(&base, prefix, id, ext))
}

/// Picks the model in `ml_dir` with the smallest last value in its `val-loss-{id}.csv`.
///
/// Ties go to the lexicographically smaller id.
pub fn select_best_model(ml_dir: &Path) -> Result<ModelSelection, EngineError> {
    let entries = fs::read_dir(ml_dir).map_err(|e| EngineError::io(ml_dir, e))?;
    let mut ids = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| EngineError::io(ml_dir, e))?.path();
        if let Some(name) = path.file_name().and_then(|n| n.to_str())
            && let Ok(id) = extract_id(name, LOSS_PREFIX, LOSS_EXT)
        {
            ids.push(id.to_string());
        }
    }
    ids.sort();

    let mut best: Option<(String, f64)> = None;
    for id in ids {
        let loss_path = artifact_path(ml_dir, LOSS_PREFIX, &id, LOSS_EXT);
        let Some(&final_loss) = load_series(&loss_path)?.last() else {
            continue;
        };
        if best.as_ref().is_none_or(|(_, loss)| final_loss < *loss) {
            best = Some((id, final_loss));
        }
    }

    let (model_id, final_loss) = best.ok_or_else(|| {
        EngineError::MissingArtifact(format!(
            "no {LOSS_PREFIX}*{LOSS_EXT} files in {}",
            ml_dir.display()
        ))
    })?;

    let weights = artifact_path(ml_dir, WEIGHT_PREFIX, &model_id, WEIGHT_EXT);
    if !weights.exists() {
        return Err(EngineError::MissingArtifact(format!(
            "weights {}",
            weights.display()
        )));
    }
    let embeddings = artifact_path(ml_dir, EMBEDDING_PREFIX, &model_id, EMBEDDING_EXT);
    Ok(ModelSelection {
        model_id,
        final_loss,
        weights,
        embeddings,
    })
}

/// Inputs of one detect-stage invocation.
#[derive(Debug, Clone)]
pub struct OutlierRequest {
    /// Round's simulation directory holding `output-{sim}.pdb`.
    pub sim_path: PathBuf,
    /// Round's learning directory holding losses, weights and embeddings.
    pub cvae_path: PathBuf,
    /// Seed directory of the next round.
    pub shared_path: PathBuf,
    pub eps_path: PathBuf,
    pub params: SearchParams,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierReport {
    pub model: ModelSelection,
    pub eps: f64,
    pub attempts: usize,
    pub outliers: Vec<FrameRef>,
    pub seeds: Vec<PathBuf>,
}

#[instrument(skip_all, name = "outlier_workflow")]
pub fn run<C: Clusterer + ?Sized>(
    request: &OutlierRequest,
    clusterer: &C,
    reporter: &ProgressReporter,
) -> Result<OutlierReport, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Model selection".to_string(),
    });
    let model = select_best_model(&request.cvae_path)?;
    info!(
        model = %model.model_id,
        loss = model.final_loss,
        "Selected model with the lowest validation loss."
    );
    let embeddings = load_embeddings(&model.embeddings)?;
    let trajectories = PdbTrajectories::load(&request.sim_path)?;
    if embeddings.nrows() != trajectories.total_frames() {
        return Err(EngineError::EmbeddingMismatch {
            rows: embeddings.nrows(),
            expected: trajectories.total_frames(),
        });
    }
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart {
        name: "Outlier search".to_string(),
    });
    let outcome = search_and_persist(
        &model.identity(),
        &embeddings,
        clusterer,
        &request.params,
        &request.eps_path,
    )?;
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart {
        name: "Seed emission".to_string(),
    });
    let outliers = locate_frames(&outcome.outliers, trajectories.frames_per_simulation());
    let seeds = emit_seeds(&trajectories, &outliers, &request.shared_path)?;
    reporter.report(Progress::PhaseFinish);

    info!(
        eps = outcome.eps,
        seeds = seeds.len(),
        "Outlier detection complete."
    );
    Ok(OutlierReport {
        model,
        eps: outcome.eps,
        attempts: outcome.attempts,
        outliers,
        seeds,
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::engine::outlier::eps::EpsilonRecord;
    use crate::engine::outlier::search::SearchError;
    use nalgebra::DMatrix;
    use tempfile::TempDir;

    fn request(root: &Path) -> OutlierRequest {
        OutlierRequest {
            sim_path: root.join("md/pipeline-0"),
            cvae_path: root.join("ml/pipeline-0"),
            shared_path: root.join("shared/pipeline-1/pdb"),
            eps_path: root.join("outlier/eps-record.json"),
            params: SearchParams::default(),
        }
    }

    #[test]
    fn best_model_has_smallest_final_validation_loss() {
        let temp = TempDir::new().unwrap();
        write_models(temp.path(), &[(0, 0.4), (1, 0.1), (2, 0.3)], 2);

        let selection = select_best_model(temp.path()).unwrap();
        assert_eq!(selection.model_id, "1");
        assert_eq!(selection.final_loss, 0.1);
        assert_eq!(selection.weights, temp.path().join("weight-1.h5"));
        assert_eq!(selection.embeddings, temp.path().join("embeddings-1.csv"));
    }

    #[test]
    fn directory_without_losses_is_a_missing_artifact() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            select_best_model(temp.path()),
            Err(EngineError::MissingArtifact(_))
        ));
    }

    #[test]
    fn outlier_frames_become_next_round_seeds() {
        let temp = TempDir::new().unwrap();
        let request = request(temp.path());
        write_trajectories(&request.sim_path, 2, 5);
        write_models(&request.cvae_path, &[(0, 0.2)], 10);

        let clusterer = |_: &DMatrix<f64>, _eps: f64| vec![1, 7];
        let report = run(&request, &clusterer, &ProgressReporter::new()).unwrap();

        assert_eq!(
            report.outliers,
            vec![
                FrameRef { sim_id: 0, frame: 1 },
                FrameRef { sim_id: 1, frame: 2 }
            ]
        );
        assert!(request.shared_path.join("seed-sim-1-frame-2.pdb").exists());
        assert_eq!(report.seeds.len(), 2);

        let record = EpsilonRecord::load(&request.eps_path).unwrap();
        assert_eq!(record.get(&report.model.identity()), Some(0.2));
    }

    #[test]
    fn embedding_rows_must_match_trajectory_frames() {
        let temp = TempDir::new().unwrap();
        let request = request(temp.path());
        write_trajectories(&request.sim_path, 2, 5);
        write_models(&request.cvae_path, &[(0, 0.2)], 9);

        let clusterer = |_: &DMatrix<f64>, _eps: f64| Vec::new();
        let err = run(&request, &clusterer, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::EmbeddingMismatch {
                rows: 9,
                expected: 10
            }
        ));
    }

    #[test]
    fn exhausted_search_writes_no_seeds() {
        let temp = TempDir::new().unwrap();
        let mut request = request(temp.path());
        request.params.max_attempts = 3;
        write_trajectories(&request.sim_path, 1, 200);
        write_models(&request.cvae_path, &[(0, 0.2)], 200);

        let clusterer = |m: &DMatrix<f64>, _eps: f64| (0..m.nrows()).collect::<Vec<_>>();
        let err = run(&request, &clusterer, &ProgressReporter::new()).unwrap_err();

        assert!(matches!(
            err,
            EngineError::Search(SearchError::ClusteringSearchExhausted { attempts: 3, .. })
        ));
        assert!(!request.shared_path.exists());
    }
}
