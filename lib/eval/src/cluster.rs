//! K-means clustering, silhouette scoring and catalog-based cluster summaries.

use crate::distance::{check_dimensions, pairwise_distances, Metric};
use ahash::AHashMap;
use basketvec_core::vector::squared_l2;
use basketvec_core::{Catalog, CatalogLevel, EmbeddingTable, Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use tracing::{debug, info};

/// Mean silhouette coefficient of `vectors` grouped by `labels`.
///
/// Points alone in their label group contribute 0. Fails with
/// [`Error::InsufficientData`] when fewer than two distinct labels (or two
/// points) are present; callers are expected to skip the metric then.
pub fn cluster_quality<V, L>(vectors: &[V], labels: &[L], metric: Metric) -> Result<f32>
where
    V: AsRef<[f32]> + Sync,
    L: Eq + Hash,
{
    if vectors.len() != labels.len() {
        return Err(Error::InvalidConfig(format!(
            "{} vectors but {} labels",
            vectors.len(),
            labels.len()
        )));
    }
    if vectors.len() < 2 {
        return Err(Error::InsufficientData(format!(
            "silhouette needs at least 2 points, got {}",
            vectors.len()
        )));
    }

    let mut ids: AHashMap<&L, usize> = AHashMap::new();
    let assigned: Vec<usize> = labels
        .iter()
        .map(|l| {
            let next = ids.len();
            *ids.entry(l).or_insert(next)
        })
        .collect();
    let groups = ids.len();
    if groups < 2 {
        return Err(Error::InsufficientData(format!(
            "silhouette needs at least 2 distinct labels, got {}",
            groups
        )));
    }

    let mut sizes = vec![0usize; groups];
    for &g in &assigned {
        sizes[g] += 1;
    }

    let distances = pairwise_distances(vectors, metric)?;
    let n = vectors.len();
    let total: f64 = (0..n)
        .into_par_iter()
        .map(|i| {
            let own = assigned[i];
            if sizes[own] < 2 {
                return 0.0;
            }
            let mut sums = vec![0.0f64; groups];
            for (j, &g) in assigned.iter().enumerate() {
                if j != i {
                    sums[g] += f64::from(distances.get(i, j));
                }
            }
            let a = sums[own] / (sizes[own] - 1) as f64;
            let b = (0..groups)
                .filter(|&g| g != own)
                .map(|g| sums[g] / sizes[g] as f64)
                .fold(f64::INFINITY, f64::min);
            let denom = a.max(b);
            if denom > 0.0 {
                (b - a) / denom
            } else {
                0.0
            }
        })
        .sum();

    Ok((total / n as f64) as f32)
}

/// Lloyd's k-means with k-means++ seeding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeans {
    pub k: usize,
    pub max_iterations: usize,
    pub tolerance: f32,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansModel {
    pub centroids: Vec<Vec<f32>>,
    pub labels: Vec<usize>,
    /// Sum of squared distances of points to their centroid
    pub inertia: f32,
    pub iterations: usize,
}

impl KMeansModel {
    /// Index of the closest centroid.
    pub fn predict(&self, point: &[f32]) -> usize {
        closest(&self.centroids, point).0
    }
}

fn closest(centroids: &[Vec<f32>], point: &[f32]) -> (usize, f32) {
    centroids
        .iter()
        .enumerate()
        .map(|(c, centroid)| (c, squared_l2(centroid, point)))
        .fold((0, f32::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iterations: 300,
            tolerance: 1e-4,
            seed: 0,
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn fit<V>(&self, vectors: &[V]) -> Result<KMeansModel>
    where
        V: AsRef<[f32]> + Sync,
    {
        if self.k == 0 {
            return Err(Error::InvalidConfig("k must be positive".to_string()));
        }
        if vectors.len() < self.k {
            return Err(Error::InsufficientData(format!(
                "{} points cannot form {} clusters",
                vectors.len(),
                self.k
            )));
        }
        check_dimensions(vectors)?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = self.init_plus_plus(vectors, &mut rng);
        let dim = centroids[0].len();
        let mut labels = vec![0usize; vectors.len()];
        let mut iterations = 0;

        for iter in 0..self.max_iterations {
            iterations = iter + 1;
            labels = vectors
                .par_iter()
                .map(|v| closest(&centroids, v.as_ref()).0)
                .collect();

            let mut sums = vec![vec![0.0f64; dim]; self.k];
            let mut counts = vec![0usize; self.k];
            for (v, &label) in vectors.iter().zip(&labels) {
                counts[label] += 1;
                for (s, x) in sums[label].iter_mut().zip(v.as_ref()) {
                    *s += f64::from(*x);
                }
            }

            let mut shift = 0.0f32;
            for c in 0..self.k {
                // Empty clusters keep their previous centroid
                if counts[c] == 0 {
                    continue;
                }
                let updated: Vec<f32> = sums[c]
                    .iter()
                    .map(|s| (s / counts[c] as f64) as f32)
                    .collect();
                shift += squared_l2(&centroids[c], &updated);
                centroids[c] = updated;
            }

            debug!("k-means iteration {}: centroid shift {:.6}", iterations, shift);
            if shift <= self.tolerance {
                break;
            }
        }

        labels = vectors
            .par_iter()
            .map(|v| closest(&centroids, v.as_ref()).0)
            .collect();
        let inertia: f32 = vectors
            .iter()
            .zip(&labels)
            .map(|(v, &l)| squared_l2(&centroids[l], v.as_ref()))
            .sum();

        info!(
            "k-means: {} clusters over {} points in {} iterations, inertia {:.4}",
            self.k,
            vectors.len(),
            iterations,
            inertia
        );
        Ok(KMeansModel {
            centroids,
            labels,
            inertia,
            iterations,
        })
    }

    fn init_plus_plus<V: AsRef<[f32]>>(&self, vectors: &[V], rng: &mut StdRng) -> Vec<Vec<f32>> {
        let first = rng.random_range(0..vectors.len());
        let mut centroids = vec![vectors[first].as_ref().to_vec()];
        let mut nearest: Vec<f32> = vectors
            .iter()
            .map(|v| squared_l2(&centroids[0], v.as_ref()))
            .collect();

        while centroids.len() < self.k {
            let total: f32 = nearest.iter().sum();
            let pick = if total > 0.0 {
                let mut target = rng.random_range(0.0..total);
                let mut chosen = nearest.len() - 1;
                for (i, &d) in nearest.iter().enumerate() {
                    if target < d {
                        chosen = i;
                        break;
                    }
                    target -= d;
                }
                chosen
            } else {
                // All remaining points coincide with a centroid
                rng.random_range(0..vectors.len())
            };

            let centroid = vectors[pick].as_ref().to_vec();
            for (d, v) in nearest.iter_mut().zip(vectors) {
                *d = d.min(squared_l2(&centroid, v.as_ref()));
            }
            centroids.push(centroid);
        }
        centroids
    }
}

/// What one cluster contains, in catalog terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster: usize,
    pub size: usize,
    /// Most frequent labels with their counts, most frequent first
    pub top_labels: Vec<(String, usize)>,
    /// Members with no catalog entry
    pub unlabeled: usize,
}

/// Summarise each cluster by its most common catalog labels at `level`.
pub fn interpret_clusters<S: AsRef<str>>(
    ids: &[S],
    labels: &[usize],
    catalog: &Catalog,
    level: CatalogLevel,
    top_n: usize,
) -> Result<Vec<ClusterSummary>> {
    if ids.len() != labels.len() {
        return Err(Error::InvalidConfig(format!(
            "{} ids but {} cluster labels",
            ids.len(),
            labels.len()
        )));
    }

    let clusters = labels.iter().max().map_or(0, |&m| m + 1);
    let mut counts: Vec<AHashMap<&str, usize>> = vec![AHashMap::new(); clusters];
    let mut sizes = vec![0usize; clusters];
    let mut unlabeled = vec![0usize; clusters];

    for (id, &cluster) in ids.iter().zip(labels) {
        sizes[cluster] += 1;
        match catalog.label(id.as_ref(), level) {
            Some(label) => *counts[cluster].entry(label).or_insert(0) += 1,
            None => unlabeled[cluster] += 1,
        }
    }

    Ok(counts
        .into_iter()
        .enumerate()
        .map(|(cluster, hist)| {
            let mut top: Vec<(String, usize)> =
                hist.into_iter().map(|(l, c)| (l.to_string(), c)).collect();
            top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            top.truncate(top_n);
            ClusterSummary {
                cluster,
                size: sizes[cluster],
                top_labels: top,
                unlabeled: unlabeled[cluster],
            }
        })
        .collect())
}

/// Rows of `table` that have a catalog label at `level`, with those labels.
pub fn labelled_rows<'a>(
    table: &'a EmbeddingTable,
    catalog: &'a Catalog,
    level: CatalogLevel,
) -> (Vec<&'a [f32]>, Vec<&'a str>) {
    table
        .iter()
        .filter_map(|(id, v)| catalog.label(id, level).map(|l| (v.as_slice(), l)))
        .unzip()
}
