use crate::{Error, Result, Vector};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Entity id → vector mapping produced by a trainer.
///
/// All vectors share `dimension`. Rows keep insertion order, which is the
/// row order used for projections and distance matrices. Entities that were
/// filtered out during training (too rare) are simply absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "TableData", into = "TableData")]
pub struct EmbeddingTable {
    dimension: usize,
    rows: Vec<(String, Vector)>,
    index: AHashMap<String, usize>,
}

#[derive(Serialize, Deserialize)]
struct TableData {
    dimension: usize,
    rows: Vec<(String, Vector)>,
}

impl TryFrom<TableData> for EmbeddingTable {
    type Error = Error;

    fn try_from(data: TableData) -> Result<Self> {
        EmbeddingTable::from_rows(data.dimension, data.rows)
    }
}

impl From<EmbeddingTable> for TableData {
    fn from(table: EmbeddingTable) -> Self {
        TableData {
            dimension: table.dimension,
            rows: table.rows,
        }
    }
}

impl EmbeddingTable {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::InvalidConfig(
                "embedding dimension must be positive".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            rows: Vec::new(),
            index: AHashMap::new(),
        })
    }

    pub fn from_rows(dimension: usize, rows: Vec<(String, Vector)>) -> Result<Self> {
        let mut table = Self::new(dimension)?;
        table.rows.reserve(rows.len());
        for (id, vector) in rows {
            table.insert(id, vector)?;
        }
        Ok(table)
    }

    /// Insert or replace a vector. A replaced entity keeps its row position.
    pub fn insert(&mut self, id: impl Into<String>, vector: Vector) -> Result<Option<Vector>> {
        if vector.dim() != self.dimension {
            return Err(Error::InvalidDimension {
                expected: self.dimension,
                actual: vector.dim(),
            });
        }

        let id = id.into();
        if let Some(&pos) = self.index.get(&id) {
            let old = std::mem::replace(&mut self.rows[pos].1, vector);
            return Ok(Some(old));
        }
        self.index.insert(id.clone(), self.rows.len());
        self.rows.push((id, vector));
        Ok(None)
    }

    #[inline]
    pub fn get(&self, id: &str) -> Option<&Vector> {
        self.index.get(id).map(|&pos| &self.rows[pos].1)
    }

    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    pub fn rows(&self) -> &[(String, Vector)] {
        &self.rows
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|(id, _)| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Vector)> {
        self.rows.iter().map(|(id, v)| (id.as_str(), v))
    }

    /// A new table holding only the given ids that are present, in the order given.
    pub fn subset<'a, I>(&self, ids: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out = Self {
            dimension: self.dimension,
            rows: Vec::new(),
            index: AHashMap::new(),
        };
        for id in ids {
            if out.contains(id) {
                continue;
            }
            if let Some(v) = self.get(id) {
                out.index.insert(id.to_string(), out.rows.len());
                out.rows.push((id.to_string(), v.clone()));
            }
        }
        out
    }
}

impl PartialEq for EmbeddingTable {
    fn eq(&self, other: &Self) -> bool {
        self.dimension == other.dimension && self.rows == other.rows
    }
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
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_wrong_dimension() {
        let mut t = table();
        let err = t.insert("C", Vector::new(vec![1.0, 2.0, 3.0])).unwrap_err();
        assert!(matches!(err, Error::InvalidDimension { expected: 2, actual: 3 }));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(matches!(EmbeddingTable::new(0), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut t = table();
        let old = t.insert("A", Vector::new(vec![0.5, 0.5])).unwrap();
        assert_eq!(old, Some(Vector::new(vec![1.0, 0.0])));
        assert_eq!(t.ids().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(t.get("A").unwrap().as_slice(), &[0.5, 0.5]);
    }

    #[test]
    fn test_missing_lookup_is_none() {
        assert!(table().get("Z").is_none());
    }

    #[test]
    fn test_subset_skips_unknown() {
        let t = table();
        let s = t.subset(["B", "Z", "A"]);
        assert_eq!(s.ids().collect::<Vec<_>>(), vec!["B", "A"]);
        assert_eq!(s.dimension(), 2);
    }

    #[test]
    fn test_json_round_trip_rebuilds_index() {
        let t = table();
        let json = serde_json::to_string(&t).unwrap();
        let back: EmbeddingTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
        assert!(back.contains("B"));
    }

    #[test]
    fn test_deserialize_rejects_inconsistent_rows() {
        let json = r#"{"dimension":2,"rows":[["A",{"data":[1.0]}]]}"#;
        assert!(serde_json::from_str::<EmbeddingTable>(json).is_err());
    }
}
