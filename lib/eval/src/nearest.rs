use basketvec_core::{EmbeddingTable, Error, Result, Vector};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub entity_id: String,
    pub similarity: f32,
}

fn by_similarity_desc(a: &Neighbor, b: &Neighbor) -> Ordering {
    OrderedFloat(b.similarity).cmp(&OrderedFloat(a.similarity))
}

fn top_k(mut scored: Vec<Neighbor>, k: usize) -> Vec<Neighbor> {
    if k == 0 {
        return Vec::new();
    }
    if scored.len() > k {
        scored.select_nth_unstable_by(k - 1, by_similarity_desc);
        scored.truncate(k);
    }
    scored.sort_by(by_similarity_desc);
    scored
}

fn score_all(table: &EmbeddingTable, query: &Vector, skip: &[&str]) -> Vec<Neighbor> {
    table
        .rows()
        .par_iter()
        .filter(|(id, _)| !skip.contains(&id.as_str()))
        .map(|(id, v)| Neighbor {
            entity_id: id.clone(),
            similarity: query.cosine_similarity(v),
        })
        .collect()
}

/// The `k` entities most cosine-similar to `entity_id`.
///
/// With `include_self` the query comes first with similarity 1.0, followed by
/// up to `k` others (at most `k + 1` results). Without it the query is left
/// out. Order among equal similarities is unspecified.
pub fn nearest(
    table: &EmbeddingTable,
    entity_id: &str,
    k: usize,
    include_self: bool,
) -> Result<Vec<Neighbor>> {
    let query = table
        .get(entity_id)
        .ok_or_else(|| Error::UnknownEntity(entity_id.to_string()))?;

    let others = top_k(score_all(table, query, &[entity_id]), k);
    if !include_self {
        return Ok(others);
    }

    let mut out = Vec::with_capacity(others.len() + 1);
    out.push(Neighbor {
        entity_id: entity_id.to_string(),
        similarity: 1.0,
    });
    out.extend(others);
    Ok(out)
}

/// Rank the table against an arbitrary query vector, e.g. `a - b + c`,
/// leaving out the ids in `exclude`.
pub fn nearest_to_vector(
    table: &EmbeddingTable,
    query: &Vector,
    k: usize,
    exclude: &[&str],
) -> Result<Vec<Neighbor>> {
    if query.dim() != table.dimension() {
        return Err(Error::InvalidDimension {
            expected: table.dimension(),
            actual: query.dim(),
        });
    }
    Ok(top_k(score_all(table, query, exclude), k))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> EmbeddingTable {
        EmbeddingTable::from_rows(
            2,
            vec![
                ("A".to_string(), Vector::new(vec![1.0, 0.0])),
                ("B".to_string(), Vector::new(vec![0.0, 1.0])),
                ("C".to_string(), Vector::new(vec![0.9, 0.1])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_nearest_excluding_self() {
        let result = nearest(&table(), "A", 1, false).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].entity_id, "C");
        assert!((result[0].similarity - 0.9939).abs() < 1e-3);

        let all = nearest(&table(), "A", 5, false).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].entity_id, "C");
        assert_eq!(all[1].entity_id, "B");
        assert!(all[1].similarity.abs() < 1e-6);
    }

    #[test]
    fn test_nearest_including_self() {
        let result = nearest(&table(), "A", 2, true).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].entity_id, "A");
        assert_eq!(result[0].similarity, 1.0);
        assert!(result
            .windows(2)
            .all(|w| w[0].similarity >= w[1].similarity));
    }

    #[test]
    fn test_identical_vectors_stay_below_self() {
        let data = vec![0.3f32, -1.7, 2.9, 0.01, 5.5, -0.8, 1.3];
        let table = EmbeddingTable::from_rows(
            7,
            vec![
                ("A".to_string(), Vector::new(data.clone())),
                ("B".to_string(), Vector::new(data)),
            ],
        )
        .unwrap();
        let result = nearest(&table, "A", 1, true).unwrap();
        assert_eq!(result[0].entity_id, "A");
        assert_eq!(result[1].entity_id, "B");
        assert!(result[1].similarity <= 1.0);
        assert!(result
            .windows(2)
            .all(|w| w[0].similarity >= w[1].similarity));
    }

    #[test]
    fn test_k_zero() {
        assert!(nearest(&table(), "A", 0, false).unwrap().is_empty());
        assert_eq!(nearest(&table(), "A", 0, true).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_entity() {
        assert!(matches!(
            nearest(&table(), "Z", 3, true),
            Err(Error::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_nearest_to_vector_excludes() {
        let query = Vector::new(vec![1.0, 0.05]);
        let result = nearest_to_vector(&table(), &query, 1, &["A"]).unwrap();
        assert_eq!(result[0].entity_id, "C");

        let bad = Vector::new(vec![1.0]);
        assert!(nearest_to_vector(&table(), &bad, 1, &[]).is_err());
    }
}
