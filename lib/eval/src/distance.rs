//! Pairwise distance matrices over embedding rows.

use basketvec_core::vector::{cosine, squared_l2};
use basketvec_core::{Error, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// `1 - cosine similarity`, in `[0, 2]`
    Cosine,
    Euclidean,
}

impl Metric {
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => (1.0 - cosine(a, b)).clamp(0.0, 2.0),
            Metric::Euclidean => squared_l2(a, b).sqrt(),
        }
    }
}

/// Dense symmetric `n x n` distance matrix, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<f32>,
}

impl DistanceMatrix {
    #[inline]
    pub fn len(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.data[i * self.n + j]
    }

    /// Row-major backing storage.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.n..(i + 1) * self.n]
    }
}

/// Distances between every pair of rows, computed one row per task.
/// The diagonal is exactly zero.
pub fn pairwise_distances<V>(rows: &[V], metric: Metric) -> Result<DistanceMatrix>
where
    V: AsRef<[f32]> + Sync,
{
    check_dimensions(rows)?;
    let n = rows.len();
    let mut data = vec![0.0f32; n * n];
    if n > 0 {
        data.par_chunks_mut(n).enumerate().for_each(|(i, out)| {
            let a = rows[i].as_ref();
            for (j, cell) in out.iter_mut().enumerate() {
                *cell = if i == j {
                    0.0
                } else {
                    metric.distance(a, rows[j].as_ref())
                };
            }
        });
    }
    Ok(DistanceMatrix { n, data })
}

pub fn pairwise_cosine_distances<V>(rows: &[V]) -> Result<DistanceMatrix>
where
    V: AsRef<[f32]> + Sync,
{
    pairwise_distances(rows, Metric::Cosine)
}

pub(crate) fn check_dimensions<V: AsRef<[f32]>>(rows: &[V]) -> Result<()> {
    if let Some(first) = rows.first() {
        let expected = first.as_ref().len();
        for row in rows {
            let actual = row.as_ref().len();
            if actual != expected {
                return Err(Error::InvalidDimension { expected, actual });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_matrix_is_symmetric() {
        let rows = vec![vec![1.0f32, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0]];
        let m = pairwise_cosine_distances(&rows).unwrap();
        assert_eq!(m.len(), 3);
        assert_eq!(m.get(0, 0), 0.0);
        assert!((m.get(0, 1) - 1.0).abs() < 1e-6);
        assert!((m.get(0, 2) - 2.0).abs() < 1e-6);
        assert_eq!(m.get(1, 2), m.get(2, 1));
    }

    #[test]
    fn test_euclidean() {
        let rows = vec![vec![0.0f32, 0.0], vec![3.0, 4.0]];
        let m = pairwise_distances(&rows, Metric::Euclidean).unwrap();
        assert!((m.get(0, 1) - 5.0).abs() < 1e-6);
        assert_eq!(m.row(1), &[m.get(1, 0), 0.0]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let rows = vec![vec![0.0f32, 0.0], vec![1.0]];
        assert!(matches!(
            pairwise_cosine_distances(&rows),
            Err(Error::InvalidDimension { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_empty() {
        let rows: Vec<Vec<f32>> = Vec::new();
        assert!(pairwise_cosine_distances(&rows).unwrap().is_empty());
    }
}
