use super::clustering::Clusterer;
use super::eps::{EpsilonRecord, EpsilonRecordError};
use nalgebra::DMatrix;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(
        "No radius within {attempts} attempts kept outliers of '{model}' under the bound \
         (last eps {last_eps:.3} gave {last_count})"
    )]
    ClusteringSearchExhausted {
        model: String,
        attempts: usize,
        last_eps: f64,
        last_count: usize,
    },
    #[error(transparent)]
    Record(#[from] EpsilonRecordError),
    #[error("Invalid search parameters: {0}")]
    InvalidParams(String),
}

/// Tuning of the escalating radius search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    /// Largest acceptable outlier count.
    pub bound: usize,
    /// Radius increment between attempts.
    pub step: f64,
    /// Starting radius for a model identity without a record entry.
    pub default_eps: f64,
    pub max_attempts: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            bound: 150,
            step: 0.05,
            default_eps: 0.2,
            max_attempts: 100,
        }
    }
}

impl SearchParams {
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_attempts == 0 {
            return Err(SearchError::InvalidParams(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(SearchError::InvalidParams(format!(
                "step must be a positive number, got {}",
                self.step
            )));
        }
        if !(self.default_eps.is_finite() && self.default_eps > 0.0) {
            return Err(SearchError::InvalidParams(format!(
                "default eps must be a positive number, got {}",
                self.default_eps
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    /// Accepted radius, now stored in the record for the model identity.
    pub eps: f64,
    pub start_eps: f64,
    pub attempts: usize,
    /// Outlier row indices, ascending.
    pub outliers: Vec<usize>,
}

/// Escalates the radius from the model's recorded value until the outlier count is within
/// `params.bound`, and stores the accepted radius in `record`.
///
/// Attempt `k` uses `start + k * step`, so the radius never accumulates rounding error.
#[instrument(skip_all, name = "outlier_search", fields(model = %model))]
pub fn search<C: Clusterer + ?Sized>(
    model: &str,
    embeddings: &DMatrix<f64>,
    clusterer: &C,
    params: &SearchParams,
    record: &mut EpsilonRecord,
) -> Result<SearchOutcome, SearchError> {
    params.validate()?;
    let start_eps = record.get(model).unwrap_or(params.default_eps);
    let mut last = (start_eps, 0);

    for attempt in 0..params.max_attempts {
        let eps = start_eps + attempt as f64 * params.step;
        let outliers = clusterer.outliers(embeddings, eps);
        debug!(attempt, eps, count = outliers.len(), "Clustering attempt.");

        if outliers.len() <= params.bound {
            record.set(model, eps);
            info!(
                eps,
                start_eps,
                attempts = attempt + 1,
                outliers = outliers.len(),
                "Accepted clustering radius."
            );
            return Ok(SearchOutcome {
                eps,
                start_eps,
                attempts: attempt + 1,
                outliers,
            });
        }
        last = (eps, outliers.len());
    }

    Err(SearchError::ClusteringSearchExhausted {
        model: model.to_string(),
        attempts: params.max_attempts,
        last_eps: last.0,
        last_count: last.1,
    })
}

/// Runs [`search`] against the record stored at `record_path` and persists the accepted radius
/// before returning.
pub fn search_and_persist<C: Clusterer + ?Sized>(
    model: &str,
    embeddings: &DMatrix<f64>,
    clusterer: &C,
    params: &SearchParams,
    record_path: &Path,
) -> Result<SearchOutcome, SearchError> {
    let mut record = EpsilonRecord::load(record_path)?;
    let outcome = search(model, embeddings, clusterer, params, &mut record)?;
    record.save(record_path)?;
    Ok(outcome)
}
