//! Low-dimensional projections of an embedding table for inspection.
//!
//! - SVD: truncated SVD of the raw (uncentred) matrix, rows mapped to `X·V`.
//! - t-SNE: exact t-SNE over the precomputed cosine distance matrix.

use crate::distance::pairwise_cosine_distances;
use basketvec_core::{EmbeddingTable, Error, Result};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const SVD_MAX_ITERATIONS: usize = 500;
const SVD_TOLERANCE: f64 = 1e-10;
const PERPLEXITY_TOLERANCE: f64 = 1e-5;
const PERPLEXITY_STEPS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsneParams {
    pub perplexity: f32,
    pub iterations: usize,
    pub learning_rate: f32,
    pub early_exaggeration: f32,
    pub seed: u64,
}

impl Default for TsneParams {
    fn default() -> Self {
        Self {
            perplexity: 30.0,
            iterations: 1000,
            learning_rate: 200.0,
            early_exaggeration: 12.0,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionMethod {
    Svd,
    Tsne(TsneParams),
}

/// Entity id → projected coordinates, in table row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub dims: usize,
    pub points: Vec<(String, Vec<f32>)>,
}

impl Projection {
    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.points
            .iter()
            .find(|(pid, _)| pid == id)
            .map(|(_, p)| p.as_slice())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

pub fn project(
    table: &EmbeddingTable,
    target_dims: usize,
    method: &ProjectionMethod,
) -> Result<Projection> {
    if target_dims == 0 {
        return Err(Error::InvalidConfig(
            "target dimension must be positive".to_string(),
        ));
    }
    if table.is_empty() {
        return Err(Error::InsufficientData("no vectors to project".to_string()));
    }

    let rows: Vec<&[f32]> = table.iter().map(|(_, v)| v.as_slice()).collect();
    let coords = match method {
        ProjectionMethod::Svd => svd(&rows, target_dims)?,
        ProjectionMethod::Tsne(params) => tsne(&rows, target_dims, params)?,
    };

    Ok(Projection {
        dims: target_dims,
        points: table.ids().map(str::to_string).zip(coords).collect(),
    })
}

/// A reproducible random subset of `n` rows (all rows if the table is smaller),
/// kept in table order.
pub fn sample(table: &EmbeddingTable, n: usize, seed: u64) -> EmbeddingTable {
    if n >= table.len() {
        return table.clone();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = index::sample(&mut rng, table.len(), n).into_vec();
    picked.sort_unstable();
    let ids: Vec<&str> = table.ids().collect();
    table.subset(picked.into_iter().map(|i| ids[i]))
}

fn svd(rows: &[&[f32]], k: usize) -> Result<Vec<Vec<f32>>> {
    let d = rows[0].len();
    if k > d {
        return Err(Error::InvalidConfig(format!(
            "cannot project {}-dimensional vectors onto {} components",
            d, k
        )));
    }

    // Gram matrix X^T X
    let mut gram = vec![0.0f64; d * d];
    for row in rows {
        for i in 0..d {
            let ri = f64::from(row[i]);
            if ri == 0.0 {
                continue;
            }
            for j in 0..d {
                gram[i * d + j] += ri * f64::from(row[j]);
            }
        }
    }

    let mut rng = StdRng::seed_from_u64(0);
    let mut components: Vec<Vec<f64>> = Vec::with_capacity(k);
    for c in 0..k {
        let mut v: Vec<f64> = (0..d).map(|_| rng.random_range(-1.0..1.0)).collect();
        normalize64(&mut v);
        let mut eigenvalue = 0.0;
        for _ in 0..SVD_MAX_ITERATIONS {
            let mut next = mat_vec(&gram, &v, d);
            eigenvalue = dot64(&next, &v);
            if normalize64(&mut next) == 0.0 {
                // Remaining spectrum is zero; any orthogonal direction will do
                break;
            }
            let delta: f64 = next.iter().zip(&v).map(|(a, b)| (a - b).abs()).sum();
            v = next;
            if delta < SVD_TOLERANCE {
                break;
            }
        }

        // Deterministic sign: largest component positive
        let pivot = v
            .iter()
            .copied()
            .fold(0.0f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
        if pivot < 0.0 {
            v.iter_mut().for_each(|x| *x = -*x);
        }

        for i in 0..d {
            for j in 0..d {
                gram[i * d + j] -= eigenvalue * v[i] * v[j];
            }
        }
        debug!("SVD component {}: singular value {:.4}", c, eigenvalue.max(0.0).sqrt());
        components.push(v);
    }

    Ok(rows
        .iter()
        .map(|row| {
            components
                .iter()
                .map(|comp| {
                    row.iter()
                        .zip(comp)
                        .map(|(x, c)| f64::from(*x) * c)
                        .sum::<f64>() as f32
                })
                .collect()
        })
        .collect())
}

fn tsne(rows: &[&[f32]], dims: usize, params: &TsneParams) -> Result<Vec<Vec<f32>>> {
    let n = rows.len();
    if n < 2 {
        return Err(Error::InsufficientData(format!(
            "t-SNE needs at least 2 points, got {}",
            n
        )));
    }
    if !(params.perplexity > 0.0) || params.perplexity as f64 >= n as f64 {
        return Err(Error::InvalidConfig(format!(
            "perplexity must be in (0, {}), got {}",
            n, params.perplexity
        )));
    }
    if params.iterations == 0 || !(params.learning_rate > 0.0) {
        return Err(Error::InvalidConfig(
            "t-SNE needs positive iterations and learning rate".to_string(),
        ));
    }

    info!(
        "Running t-SNE on {} points (perplexity={}, iterations={})",
        n, params.perplexity, params.iterations
    );
    let distances = pairwise_cosine_distances(rows)?;
    let p = joint_probabilities(distances.as_slice(), n, f64::from(params.perplexity));

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut y: Vec<f64> = (0..n * dims).map(|_| rng.random_range(-1e-4..1e-4)).collect();
    let mut velocity = vec![0.0f64; n * dims];
    let mut gains = vec![1.0f64; n * dims];

    let exaggeration_iters = 250.min(params.iterations / 4);
    let lr = f64::from(params.learning_rate);

    for iter in 0..params.iterations {
        let exaggeration = if iter < exaggeration_iters {
            f64::from(params.early_exaggeration)
        } else {
            1.0
        };
        let momentum = if iter < exaggeration_iters { 0.5 } else { 0.8 };

        // Student-t kernel numerators
        let num: Vec<f64> = (0..n * n)
            .into_par_iter()
            .map(|idx| {
                let (i, j) = (idx / n, idx % n);
                if i == j {
                    0.0
                } else {
                    1.0 / (1.0 + sq_dist(&y[i * dims..(i + 1) * dims], &y[j * dims..(j + 1) * dims]))
                }
            })
            .collect();
        let sum_num: f64 = num.iter().sum::<f64>().max(f64::MIN_POSITIVE);

        let grad: Vec<f64> = (0..n)
            .into_par_iter()
            .flat_map_iter(|i| {
                let mut g = vec![0.0f64; dims];
                for j in 0..n {
                    if i == j {
                        continue;
                    }
                    let nij = num[i * n + j];
                    let mult = (exaggeration * p[i * n + j] - nij / sum_num) * nij;
                    for c in 0..dims {
                        g[c] += 4.0 * mult * (y[i * dims + c] - y[j * dims + c]);
                    }
                }
                g
            })
            .collect();

        for idx in 0..n * dims {
            let same_sign = (grad[idx] > 0.0) == (velocity[idx] > 0.0);
            gains[idx] = if same_sign {
                (gains[idx] * 0.8).max(0.01)
            } else {
                gains[idx] + 0.2
            };
            velocity[idx] = momentum * velocity[idx] - lr * gains[idx] * grad[idx];
            y[idx] += velocity[idx];
        }

        for c in 0..dims {
            let mean = (0..n).map(|i| y[i * dims + c]).sum::<f64>() / n as f64;
            for i in 0..n {
                y[i * dims + c] -= mean;
            }
        }

        if (iter + 1) % 100 == 0 {
            let kl: f64 = p
                .iter()
                .zip(&num)
                .filter(|(&pij, _)| pij > 0.0)
                .map(|(&pij, &nij)| pij * (pij / (nij / sum_num).max(1e-12)).ln())
                .sum();
            debug!("t-SNE iteration {}: KL divergence {:.4}", iter + 1, kl);
        }
    }

    Ok((0..n)
        .map(|i| y[i * dims..(i + 1) * dims].iter().map(|&x| x as f32).collect())
        .collect())
}

/// Symmetrised input affinities with per-point bandwidth matched to `perplexity`.
fn joint_probabilities(distances: &[f32], n: usize, perplexity: f64) -> Vec<f64> {
    let target_entropy = perplexity.ln();
    let conditional: Vec<f64> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| {
            let row = &distances[i * n..(i + 1) * n];
            let mut beta = 1.0f64;
            let (mut lo, mut hi) = (f64::NEG_INFINITY, f64::INFINITY);
            let mut probs = vec![0.0f64; n];
            for _ in 0..PERPLEXITY_STEPS {
                let mut sum = 0.0;
                for j in 0..n {
                    probs[j] = if j == i {
                        0.0
                    } else {
                        (-f64::from(row[j]) * beta).exp()
                    };
                    sum += probs[j];
                }
                let sum = sum.max(1e-12);
                let mut weighted = 0.0;
                for j in 0..n {
                    probs[j] /= sum;
                    weighted += f64::from(row[j]) * probs[j];
                }
                let entropy = sum.ln() + beta * weighted;
                let diff = entropy - target_entropy;
                if diff.abs() < PERPLEXITY_TOLERANCE {
                    break;
                }
                if diff > 0.0 {
                    lo = beta;
                    beta = if hi.is_infinite() { beta * 2.0 } else { (beta + hi) / 2.0 };
                } else {
                    hi = beta;
                    beta = if lo.is_infinite() { beta / 2.0 } else { (beta + lo) / 2.0 };
                }
            }
            probs
        })
        .collect();

    let mut joint = vec![0.0f64; n * n];
    let denom = 2.0 * n as f64;
    for i in 0..n {
        for j in 0..n {
            if i != j {
                joint[i * n + j] = ((conditional[i * n + j] + conditional[j * n + i]) / denom).max(1e-12);
            }
        }
    }
    joint
}

#[inline]
fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[inline]
fn dot64(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Scales to unit length and returns the original norm.
fn normalize64(v: &mut [f64]) -> f64 {
    let norm = dot64(v, v).sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    norm
}

fn mat_vec(m: &[f64], v: &[f64], d: usize) -> Vec<f64> {
    (0..d).map(|i| dot64(&m[i * d..(i + 1) * d], v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use basketvec_core::Vector;

    fn clustered_table() -> EmbeddingTable {
        let mut rows = Vec::new();
        for i in 0..6 {
            let jitter = i as f32 * 0.01;
            rows.push((format!("a{}", i), Vector::new(vec![1.0, jitter, 0.0, 0.0])));
            rows.push((format!("b{}", i), Vector::new(vec![0.0, 0.0, 1.0, jitter])));
        }
        EmbeddingTable::from_rows(4, rows).unwrap()
    }

    #[test]
    fn test_svd_recovers_rank_one_direction() {
        let table = EmbeddingTable::from_rows(
            3,
            vec![
                ("x".to_string(), Vector::new(vec![1.0, 2.0, 0.0])),
                ("y".to_string(), Vector::new(vec![2.0, 4.0, 0.0])),
                ("z".to_string(), Vector::new(vec![-1.0, -2.0, 0.0])),
            ],
        )
        .unwrap();
        let proj = project(&table, 1, &ProjectionMethod::Svd).unwrap();
        let norm = 5.0f32.sqrt();
        assert!((proj.get("x").unwrap()[0] - norm).abs() < 1e-3);
        assert!((proj.get("y").unwrap()[0] - 2.0 * norm).abs() < 1e-3);
        assert!((proj.get("z").unwrap()[0] + norm).abs() < 1e-3);
    }

    #[test]
    fn test_svd_preserves_row_order_and_dims() {
        let table = clustered_table();
        let proj = project(&table, 2, &ProjectionMethod::Svd).unwrap();
        assert_eq!(proj.len(), table.len());
        assert_eq!(proj.points[0].0, "a0");
        assert!(proj.points.iter().all(|(_, p)| p.len() == 2));
    }

    #[test]
    fn test_svd_rejects_too_many_components() {
        let table = clustered_table();
        assert!(matches!(
            project(&table, 5, &ProjectionMethod::Svd),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_tsne_separates_clusters() {
        let table = clustered_table();
        let params = TsneParams {
            perplexity: 3.0,
            iterations: 300,
            ..TsneParams::default()
        };
        let proj = project(&table, 2, &ProjectionMethod::Tsne(params)).unwrap();

        let dist = |a: &str, b: &str| {
            let (pa, pb) = (proj.get(a).unwrap(), proj.get(b).unwrap());
            ((pa[0] - pb[0]).powi(2) + (pa[1] - pb[1]).powi(2)).sqrt()
        };
        assert!(dist("a0", "a1") < dist("a0", "b0"));
        assert!(dist("b2", "b3") < dist("b2", "a2"));
    }

    #[test]
    fn test_tsne_is_seeded() {
        let table = clustered_table();
        let params = TsneParams {
            perplexity: 3.0,
            iterations: 50,
            ..TsneParams::default()
        };
        let a = project(&table, 2, &ProjectionMethod::Tsne(params.clone())).unwrap();
        let b = project(&table, 2, &ProjectionMethod::Tsne(params)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tsne_needs_two_points() {
        let table =
            EmbeddingTable::from_rows(2, vec![("x".to_string(), Vector::new(vec![1.0, 0.0]))])
                .unwrap();
        assert!(matches!(
            project(&table, 2, &ProjectionMethod::Tsne(TsneParams::default())),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn test_sample_is_reproducible_subset() {
        let table = clustered_table();
        let a = sample(&table, 5, 42);
        let b = sample(&table, 5, 42);
        assert_eq!(a.len(), 5);
        assert_eq!(a, b);
        assert!(a.ids().all(|id| table.contains(id)));
        assert_eq!(sample(&table, 100, 1).len(), table.len());
    }
}
