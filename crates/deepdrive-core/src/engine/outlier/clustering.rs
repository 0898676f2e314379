use nalgebra::DMatrix;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Density clustering over an embedding whose rows are frames.
///
/// Implementations return the indices of rows labelled as noise for radius `eps`, in ascending
/// order.
pub trait Clusterer {
    fn outliers(&self, embeddings: &DMatrix<f64>, eps: f64) -> Vec<usize>;
}

impl<F> Clusterer for F
where
    F: Fn(&DMatrix<f64>, f64) -> Vec<usize>,
{
    fn outliers(&self, embeddings: &DMatrix<f64>, eps: f64) -> Vec<usize> {
        self(embeddings, eps)
    }
}

/// DBSCAN noise detection with Euclidean distance.
///
/// A row is a core point when at least `min_samples` rows, itself included, lie within `eps`.
/// A row is noise when it is neither a core point nor within `eps` of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dbscan {
    pub min_samples: usize,
}

impl Dbscan {
    pub fn new(min_samples: usize) -> Self {
        Self { min_samples }
    }
}

impl Clusterer for Dbscan {
    fn outliers(&self, embeddings: &DMatrix<f64>, eps: f64) -> Vec<usize> {
        let n = embeddings.nrows();
        let eps_sq = eps * eps;
        let within = |i: usize, j: usize| {
            let dist_sq: f64 = embeddings
                .row(i)
                .iter()
                .zip(embeddings.row(j).iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            dist_sq <= eps_sq
        };

        #[cfg(not(feature = "parallel"))]
        let (rows, candidates) = (0..n, 0..n);

        #[cfg(feature = "parallel")]
        let (rows, candidates) = ((0..n).into_par_iter(), (0..n).into_par_iter());

        // Core rows are marked first; a second pass keeps the rows no core row reaches.
        let is_core: Vec<bool> = rows
            .map(|i| (0..n).filter(|&j| within(i, j)).count() >= self.min_samples)
            .collect();

        candidates
            .filter(|&i| !is_core[i] && !(0..n).any(|j| is_core[j] && within(i, j)))
            .collect()
    }
}
