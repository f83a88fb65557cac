//! K-means clustering with seeded initialization.
//!
//! Initial centroids are a uniform sample of distinct rows drawn from
//! `StdRng` seeded with `seed + restart`, so a fixed configuration always
//! produces the same labels. Each restart runs Lloyd's algorithm and the
//! restart with the lowest inertia wins.
//!
//! # Example
//!
//! ```rust
//! use tabprep::analysis::{kmeans_points, KMeansConfig};
//!
//! let points = vec![
//!     vec![1.0, 1.0], vec![1.5, 1.5], vec![1.2, 1.3],
//!     vec![8.0, 8.0], vec![8.5, 8.5], vec![8.2, 8.3],
//! ];
//! let result = kmeans_points(&points, &KMeansConfig::new(2)).unwrap();
//! assert_eq!(result.labels[0], result.labels[1]);
//! assert_ne!(result.labels[0], result.labels[3]);
//! ```

use super::numeric_column;
use crate::config::ConfigValidationError;
use crate::dataset::Dataset;
use crate::error::{PrepError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Configuration for k-means clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    /// Number of clusters.
    pub n_clusters: usize,
    /// Maximum Lloyd iterations per restart. Default: 300.
    pub max_iter: usize,
    /// Largest centroid shift treated as converged. Default: 1e-4.
    pub tolerance: f64,
    /// Base seed; restart `i` uses `seed + i`. Default: 42.
    pub seed: u64,
    /// Number of restarts. Default: 1.
    pub n_init: usize,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self::new(2)
    }
}

impl KMeansConfig {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tolerance: 1e-4,
            seed: 42,
            n_init: 1,
        }
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        let invalid = |field: &str, reason: &str| ConfigValidationError::InvalidParameter {
            field: format!("kmeans.{}", field),
            reason: reason.to_string(),
        };
        if self.n_clusters == 0 {
            return Err(invalid("n_clusters", "must be at least 1"));
        }
        if self.max_iter == 0 {
            return Err(invalid("max_iter", "must be at least 1"));
        }
        if self.n_init == 0 {
            return Err(invalid("n_init", "must be at least 1"));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(invalid("tolerance", "must be finite and non-negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansResult {
    pub n_clusters: usize,
    /// Cluster of each input row; `None` for rows with a missing feature.
    pub labels: Vec<Option<usize>>,
    /// One centroid per cluster, in feature order.
    pub centroids: Vec<Vec<f64>>,
    /// Points per cluster
    pub cluster_sizes: Vec<usize>,
    /// Sum of squared distances from each point to its centroid.
    pub inertia: f64,
    /// Lloyd iterations of the winning restart.
    pub iterations: usize,
    pub converged: bool,
    /// Mean silhouette coefficient, when `2 <= k < n`.
    pub silhouette: Option<f64>,
}

/// Cluster the rows of a dataset on the given numeric feature columns.
///
/// Rows missing any feature are left out and labelled `None`.
pub fn kmeans(dataset: &Dataset, columns: &[&str], config: &KMeansConfig) -> Result<KMeansResult> {
    if columns.is_empty() {
        return Err(PrepError::Configuration(
            "k-means needs at least one feature column".to_string(),
        ));
    }
    let features = columns
        .iter()
        .map(|name| numeric_column(dataset, name, "k-means"))
        .collect::<Result<Vec<_>>>()?;

    let mut rows = Vec::new();
    let mut points = Vec::new();
    for r in 0..dataset.height() {
        let point: Option<Vec<f64>> = features.iter().map(|f| f[r]).collect();
        if let Some(point) = point {
            rows.push(r);
            points.push(point);
        }
    }

    let fitted = kmeans_points(&points, config)?;
    let mut labels = vec![None; dataset.height()];
    for (row, label) in rows.into_iter().zip(fitted.labels.iter()) {
        labels[row] = *label;
    }
    debug!(
        "k-means on [{}]: {} of {} rows clustered",
        columns.join(", "),
        points.len(),
        dataset.height()
    );
    Ok(KMeansResult { labels, ..fitted })
}

/// Cluster raw points. Every point must have the same dimension.
pub fn kmeans_points(points: &[Vec<f64>], config: &KMeansConfig) -> Result<KMeansResult> {
    config.validate()?;
    let n = points.len();
    let k = config.n_clusters;
    if k > n {
        return Err(PrepError::Configuration(format!(
            "k-means with {} clusters needs at least {} complete rows, found {}",
            k, k, n
        )));
    }

    let dim = points[0].len();
    if dim == 0 {
        return Err(PrepError::Configuration(
            "k-means points must have at least one feature".to_string(),
        ));
    }
    for (i, point) in points.iter().enumerate() {
        if point.len() != dim {
            return Err(PrepError::Configuration(format!(
                "point {} has {} features, expected {}",
                i,
                point.len(),
                dim
            )));
        }
        if point.iter().any(|v| !v.is_finite()) {
            return Err(PrepError::Configuration(format!(
                "point {} has a non-finite feature",
                i
            )));
        }
    }

    let mut best: Option<Lloyd> = None;
    for restart in 0..config.n_init {
        let run = lloyd(points, config, config.seed.wrapping_add(restart as u64));
        debug!(
            "k-means restart {}: inertia {:.6} after {} iterations",
            restart, run.inertia, run.iterations
        );
        if best.as_ref().is_none_or(|b| run.inertia < b.inertia) {
            best = Some(run);
        }
    }
    let Some(best) = best else {
        return Err(PrepError::Internal("k-means produced no restart".to_string()));
    };

    let mut cluster_sizes = vec![0usize; k];
    for &label in &best.labels {
        cluster_sizes[label] += 1;
    }
    let silhouette = if k >= 2 && k < n {
        silhouette_score(points, &best.labels, k)
    } else {
        None
    };

    Ok(KMeansResult {
        n_clusters: k,
        labels: best.labels.into_iter().map(Some).collect(),
        centroids: best.centroids,
        cluster_sizes,
        inertia: best.inertia,
        iterations: best.iterations,
        converged: best.converged,
        silhouette,
    })
}

struct Lloyd {
    labels: Vec<usize>,
    centroids: Vec<Vec<f64>>,
    inertia: f64,
    iterations: usize,
    converged: bool,
}

fn lloyd(points: &[Vec<f64>], config: &KMeansConfig, seed: u64) -> Lloyd {
    let k = config.n_clusters;
    let dim = points[0].len();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids: Vec<Vec<f64>> = rand::seq::index::sample(&mut rng, points.len(), k)
        .into_iter()
        .map(|i| points[i].clone())
        .collect();

    let mut labels = vec![usize::MAX; points.len()];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        iterations += 1;
        if !assign(points, &centroids, &mut labels) {
            converged = true;
            break;
        }

        let mut sums = vec![vec![0.0; dim]; k];
        let mut counts = vec![0usize; k];
        for (point, &c) in points.iter().zip(&labels) {
            counts[c] += 1;
            for (s, v) in sums[c].iter_mut().zip(point) {
                *s += v;
            }
        }

        let mut max_shift = 0.0f64;
        for c in 0..k {
            if counts[c] == 0 {
                warn!("k-means cluster {} emptied; keeping its centroid", c);
                continue;
            }
            let updated: Vec<f64> = sums[c].iter().map(|s| s / counts[c] as f64).collect();
            max_shift = max_shift.max(squared_distance(&centroids[c], &updated).sqrt());
            centroids[c] = updated;
        }

        if max_shift <= config.tolerance {
            converged = true;
            break;
        }
    }

    // labels must match the final centroids
    assign(points, &centroids, &mut labels);
    let inertia = points
        .iter()
        .zip(&labels)
        .map(|(p, &c)| squared_distance(p, &centroids[c]))
        .sum();

    Lloyd {
        labels,
        centroids,
        inertia,
        iterations,
        converged,
    }
}

/// Assign each point to its nearest centroid, ties to the lowest index.
/// Returns whether any label changed.
fn assign(points: &[Vec<f64>], centroids: &[Vec<f64>], labels: &mut [usize]) -> bool {
    let mut changed = false;
    for (point, label) in points.iter().zip(labels.iter_mut()) {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (c, centroid) in centroids.iter().enumerate() {
            let d = squared_distance(point, centroid);
            if d < best_dist {
                best_dist = d;
                best = c;
            }
        }
        if *label != best {
            *label = best;
            changed = true;
        }
    }
    changed
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Mean silhouette coefficient over all points. Points in singleton
/// clusters score 0. `None` when fewer than two clusters are populated.
fn silhouette_score(points: &[Vec<f64>], labels: &[usize], k: usize) -> Option<f64> {
    let n = points.len();
    let mut sizes = vec![0usize; k];
    for &l in labels {
        sizes[l] += 1;
    }
    if sizes.iter().filter(|&&s| s > 0).count() < 2 {
        return None;
    }

    let mut total = 0.0;
    for i in 0..n {
        let own = labels[i];
        if sizes[own] == 1 {
            continue;
        }
        let mut sums = vec![0.0; k];
        for j in 0..n {
            if i != j {
                sums[labels[j]] += squared_distance(&points[i], &points[j]).sqrt();
            }
        }
        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }
    Some(total / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use polars::prelude::*;

    fn blobs() -> Vec<Vec<f64>> {
        vec![
            vec![1.0, 1.0],
            vec![1.5, 1.5],
            vec![1.2, 1.3],
            vec![8.0, 8.0],
            vec![8.5, 8.5],
            vec![8.2, 8.3],
        ]
    }

    #[test]
    fn test_two_clusters() {
        let result = kmeans_points(&blobs(), &KMeansConfig::new(2)).unwrap();
        let labels: Vec<usize> = result.labels.iter().map(|l| l.unwrap()).collect();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
        assert_eq!(result.cluster_sizes, vec![3, 3]);
        assert!(result.converged);
        assert!(result.silhouette.unwrap() > 0.8);
    }

    #[test]
    fn test_labels_are_nearest_centroid() {
        let points: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![(i * 7 % 13) as f64, (i * 5 % 11) as f64])
            .collect();
        let result = kmeans_points(&points, &KMeansConfig::new(4).n_init(3)).unwrap();
        for (point, label) in points.iter().zip(&result.labels) {
            let own = squared_distance(point, &result.centroids[label.unwrap()]);
            for centroid in &result.centroids {
                assert!(own <= squared_distance(point, centroid));
            }
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let points: Vec<Vec<f64>> = (0..30).map(|i| vec![(i * 17 % 23) as f64]).collect();
        let config = KMeansConfig::new(3).seed(7);
        assert_eq!(
            kmeans_points(&points, &config).unwrap(),
            kmeans_points(&points, &config).unwrap()
        );
    }

    #[test]
    fn test_restarts_never_increase_inertia() {
        let points: Vec<Vec<f64>> = (0..50)
            .map(|i| vec![(i * 31 % 17) as f64, (i * 13 % 19) as f64])
            .collect();
        let single = kmeans_points(&points, &KMeansConfig::new(5)).unwrap();
        let many = kmeans_points(&points, &KMeansConfig::new(5).n_init(8)).unwrap();
        assert!(many.inertia <= single.inertia);
    }

    #[test]
    fn test_single_cluster_has_no_silhouette() {
        let result = kmeans_points(&blobs(), &KMeansConfig::new(1)).unwrap();
        assert_eq!(result.silhouette, None);
        assert_eq!(result.cluster_sizes, vec![6]);
        let centroid = &result.centroids[0];
        assert!((centroid[0] - 28.4 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_k() {
        let err = kmeans_points(&blobs(), &KMeansConfig::new(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        let err = kmeans_points(&blobs(), &KMeansConfig::new(7)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_dataset_rows_with_missing_features() {
        let ds = Dataset::new(
            df![
                "x" => [Some(1.0), Some(1.2), None, Some(9.0), Some(9.1)],
                "y" => [Some(1.0), Some(0.9), Some(5.0), Some(9.0), Some(9.2)],
            ]
            .unwrap(),
        )
        .unwrap();
        let result = kmeans(&ds, &["x", "y"], &KMeansConfig::new(2)).unwrap();
        assert_eq!(result.labels.len(), 5);
        assert_eq!(result.labels[2], None);
        assert_eq!(result.labels[0], result.labels[1]);
        assert_eq!(result.labels[3], result.labels[4]);
        assert_ne!(result.labels[0], result.labels[3]);

        let err = kmeans(&ds, &["x", "y"], &KMeansConfig::new(5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
