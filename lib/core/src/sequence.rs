//! Corpus construction: grouping transaction records into ordered token
//! sequences, one per group key.

use crate::{EntityKey, Error, Result, TransactionRecord};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// The ordered entity tokens of one group (an order, or a customer's history).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub group_key: EntityKey,
    pub tokens: Vec<String>,
}

impl Sequence {
    #[inline]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// A sequence labelled with a document tag, for paragraph-vector style trainers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedSequence {
    pub tag: String,
    pub tokens: Vec<String>,
}

/// All sequences of a dataset, in ascending group-key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corpus {
    sequences: Vec<Sequence>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusStats {
    pub sequences: usize,
    pub tokens: usize,
    pub vocabulary: usize,
    pub mean_length: f64,
    pub max_length: usize,
}

impl Corpus {
    #[inline]
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    #[inline]
    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sequence> {
        self.sequences.iter()
    }

    /// Total number of tokens across all sequences.
    pub fn token_count(&self) -> usize {
        self.sequences.iter().map(Sequence::len).sum()
    }

    /// Token lists only, the shape a skip-gram trainer consumes.
    pub fn sentences(&self) -> impl Iterator<Item = &[String]> {
        self.sequences.iter().map(|s| s.tokens.as_slice())
    }

    /// Document view with each group key as the tag.
    pub fn tagged(&self) -> Vec<TaggedSequence> {
        self.sequences
            .iter()
            .map(|s| TaggedSequence {
                tag: s.group_key.token(),
                tokens: s.tokens.clone(),
            })
            .collect()
    }

    /// Occurrence count per token.
    pub fn frequencies(&self) -> AHashMap<&str, usize> {
        let mut counts: AHashMap<&str, usize> = AHashMap::new();
        for token in self.sequences.iter().flat_map(|s| s.tokens.iter()) {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }
        counts
    }

    pub fn stats(&self) -> CorpusStats {
        let tokens = self.token_count();
        CorpusStats {
            sequences: self.len(),
            tokens,
            vocabulary: self.frequencies().len(),
            mean_length: if self.is_empty() {
                0.0
            } else {
                tokens as f64 / self.len() as f64
            },
            max_length: self.sequences.iter().map(Sequence::len).max().unwrap_or(0),
        }
    }
}

impl IntoIterator for Corpus {
    type Item = Sequence;
    type IntoIter = std::vec::IntoIter<Sequence>;

    fn into_iter(self) -> Self::IntoIter {
        self.sequences.into_iter()
    }
}

/// Build a corpus with one sequence per distinct group key.
///
/// Records are stably sorted by `(group_key, secondary_sort_key or 0,
/// position)`, so records tying on all three keep their input order. Which
/// of two records sharing a position comes first is therefore up to the
/// caller's input order; no further tie-break is applied.
///
/// Every record is validated before any sequence is built: a missing group
/// key or entity id fails the whole build with [`Error::InvalidRecord`].
pub fn build_corpus(records: &[TransactionRecord]) -> Result<Corpus> {
    let mut rows: Vec<(&EntityKey, u32, u32, &EntityKey)> = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let group = record
            .group_key
            .as_ref()
            .ok_or_else(|| Error::invalid_record(index, "missing group key"))?;
        let entity = record
            .entity_id
            .as_ref()
            .ok_or_else(|| Error::invalid_record(index, "missing entity id"))?;
        rows.push((
            group,
            record.secondary_sort_key.unwrap_or(0),
            record.position,
            entity,
        ));
    }

    // slice::sort_by is stable
    rows.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));

    let mut sequences = Vec::new();
    let mut current: Option<Sequence> = None;
    for (group, _, _, entity) in rows {
        if let Some(open) = current.as_mut().filter(|s| &s.group_key == group) {
            open.tokens.push(entity.token());
            continue;
        }
        if let Some(done) = current.take() {
            sequences.push(done);
        }
        current = Some(Sequence {
            group_key: group.clone(),
            tokens: vec![entity.token()],
        });
    }
    if let Some(done) = current {
        sequences.push(done);
    }

    let corpus = Corpus { sequences };
    info!(
        "Built corpus: {} sequences from {} records",
        corpus.len(),
        records.len()
    );
    debug!("Corpus stats: {:?}", corpus.stats());
    Ok(corpus)
}
