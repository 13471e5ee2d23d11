//! Trainer interfaces and a deterministic baseline implementation.
//!
//! Real skip-gram and paragraph-vector training live outside this crate and
//! plug in through [`EmbeddingTrainer`] and [`DocumentTrainer`]. The
//! [`HashingTrainer`] shipped here keeps the pipeline runnable without one:
//! it embeds every token as a seeded random projection of its own frequency
//! plus its windowed co-occurrence counts, so tokens bought in the same
//! orders land close together.

use crate::{Corpus, EmbeddingTable, Error, Result, TaggedSequence, Vector};
use ahash::{AHashMap, AHashSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_DIMENSION: usize = 100;
pub const DEFAULT_WINDOW: usize = 5;
pub const DEFAULT_MIN_FREQUENCY: usize = 5;
pub const DEFAULT_EPOCHS: usize = 20;
pub const DEFAULT_SEED: u64 = 1;

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Skip-gram style training configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainParams {
    pub dimension: usize,
    pub window: usize,
    pub min_frequency: usize,
    pub workers: usize,
    pub seed: Option<u64>,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
            window: DEFAULT_WINDOW,
            min_frequency: DEFAULT_MIN_FREQUENCY,
            workers: default_workers(),
            seed: None,
        }
    }
}

impl TrainParams {
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::InvalidConfig("dimension must be positive".to_string()));
        }
        if self.window == 0 {
            return Err(Error::InvalidConfig("window must be positive".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be positive".to_string()));
        }
        Ok(())
    }
}

/// Linear learning-rate decay from `start` to `end` over training.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningRateSchedule {
    pub start: f32,
    pub end: f32,
}

impl Default for LearningRateSchedule {
    fn default() -> Self {
        Self {
            start: 0.025,
            end: 0.0001,
        }
    }
}

/// Paragraph-vector style training configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocTrainParams {
    pub dimension: usize,
    pub window: usize,
    pub min_frequency: usize,
    pub epochs: usize,
    pub learning_rate: LearningRateSchedule,
    pub seed: Option<u64>,
}

impl Default for DocTrainParams {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
            window: DEFAULT_WINDOW,
            min_frequency: DEFAULT_MIN_FREQUENCY,
            epochs: DEFAULT_EPOCHS,
            learning_rate: LearningRateSchedule::default(),
            seed: None,
        }
    }
}

impl DocTrainParams {
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::InvalidConfig("dimension must be positive".to_string()));
        }
        if self.window == 0 {
            return Err(Error::InvalidConfig("window must be positive".to_string()));
        }
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be positive".to_string()));
        }
        let lr = self.learning_rate;
        if !(lr.start > 0.0 && lr.end > 0.0 && lr.end <= lr.start) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must decay from a positive start to a positive end, got {} -> {}",
                lr.start, lr.end
            )));
        }
        Ok(())
    }

    fn as_token_params(&self) -> TrainParams {
        TrainParams {
            dimension: self.dimension,
            window: self.window,
            min_frequency: self.min_frequency,
            workers: default_workers(),
            seed: self.seed,
        }
    }
}

/// Learns one vector per token from a corpus of sentences.
pub trait EmbeddingTrainer {
    fn train(&self, corpus: &Corpus, params: &TrainParams) -> Result<EmbeddingTable>;
}

/// Learns one vector per document tag.
pub trait DocumentTrainer {
    fn train_tagged(
        &self,
        documents: &[TaggedSequence],
        params: &DocTrainParams,
    ) -> Result<EmbeddingTable>;
}

/// Deterministic co-occurrence projection trainer.
#[derive(Debug, Clone)]
pub struct HashingTrainer {
    default_seed: u64,
}

impl Default for HashingTrainer {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

type Cooccurrence<'a> = AHashMap<&'a str, AHashMap<&'a str, u64>>;

impl HashingTrainer {
    pub fn new(default_seed: u64) -> Self {
        Self { default_seed }
    }

    fn token_vectors<'a, I>(
        &self,
        sentences: I,
        params: &TrainParams,
    ) -> Result<Vec<(&'a str, Vector)>>
    where
        I: IntoIterator<Item = &'a [String]>,
    {
        let sentences: Vec<&'a [String]> = sentences.into_iter().collect();
        let seed = params.seed.unwrap_or(self.default_seed);

        let mut counts: AHashMap<&'a str, usize> = AHashMap::new();
        for token in sentences.iter().flat_map(|s| s.iter()) {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }

        // Frequency-descending vocabulary, ties by token
        let mut vocab: Vec<(&'a str, usize)> = counts
            .into_iter()
            .filter(|&(_, c)| c >= params.min_frequency)
            .collect();
        vocab.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let kept: AHashSet<&'a str> = vocab.iter().map(|&(t, _)| t).collect();
        debug!(
            "Vocabulary: {} tokens at min_frequency {}",
            vocab.len(),
            params.min_frequency
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(params.workers)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("worker pool: {}", e)))?;

        let window = params.window;
        let dimension = params.dimension;
        let vectors = pool.install(|| {
            let cooc: Cooccurrence<'a> = sentences
                .par_iter()
                .fold(AHashMap::new, |mut acc: Cooccurrence<'a>, sentence| {
                    let sentence: &'a [String] = *sentence;
                    let tokens: Vec<&'a str> = sentence
                        .iter()
                        .map(String::as_str)
                        .filter(|t| kept.contains(t))
                        .collect();
                    for (i, &center) in tokens.iter().enumerate() {
                        let lo = i.saturating_sub(window);
                        let hi = (i + window).min(tokens.len() - 1);
                        let row = acc.entry(center).or_default();
                        for (j, &context) in tokens.iter().enumerate().take(hi + 1).skip(lo) {
                            if j != i {
                                *row.entry(context).or_insert(0) += 1;
                            }
                        }
                    }
                    acc
                })
                .reduce(AHashMap::new, merge_cooccurrence);

            vocab
                .par_iter()
                .map(|&(token, count)| {
                    let mut v = Vector::zeros(dimension);
                    v.add_scaled(&basis(token, seed, dimension), count as f32);
                    if let Some(row) = cooc.get(token) {
                        let mut contexts: Vec<(&str, u64)> =
                            row.iter().map(|(&c, &n)| (c, n)).collect();
                        contexts.sort_unstable_by(|a, b| a.0.cmp(b.0));
                        for (context, n) in contexts {
                            v.add_scaled(&basis(context, seed, dimension), n as f32);
                        }
                    }
                    v.normalize();
                    (token, v)
                })
                .collect::<Vec<_>>()
        });

        Ok(vectors)
    }
}

fn merge_cooccurrence<'a>(mut a: Cooccurrence<'a>, b: Cooccurrence<'a>) -> Cooccurrence<'a> {
    for (center, row) in b {
        let target = a.entry(center).or_default();
        for (context, n) in row {
            *target.entry(context).or_insert(0) += n;
        }
    }
    a
}

/// FNV-1a, stable across platforms and releases.
fn stable_hash(seed: u64, token: &str) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325 ^ seed;
    for b in token.as_bytes() {
        h ^= u64::from(*b);
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}

/// Seeded random basis vector for one token.
fn basis(token: &str, seed: u64, dimension: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(stable_hash(seed, token));
    (0..dimension)
        .map(|_| rng.random_range(-1.0f32..1.0f32))
        .collect()
}

impl EmbeddingTrainer for HashingTrainer {
    fn train(&self, corpus: &Corpus, params: &TrainParams) -> Result<EmbeddingTable> {
        params.validate()?;
        info!(
            "Training token embeddings: {} sequences, dim={}, window={}, min_frequency={}, workers={}",
            corpus.len(),
            params.dimension,
            params.window,
            params.min_frequency,
            params.workers
        );

        let vectors = self.token_vectors(corpus.sentences(), params)?;
        let mut table = EmbeddingTable::new(params.dimension)?;
        for (token, v) in vectors {
            table.insert(token, v)?;
        }

        info!("Trained {} token vectors", table.len());
        Ok(table)
    }
}

impl DocumentTrainer for HashingTrainer {
    /// Each tag's vector is the normalised mean of its tokens' vectors.
    /// Documents sharing a tag are merged. A document whose tokens were all
    /// too rare falls back to the mean of their basis vectors, so every tag
    /// gets a row.
    fn train_tagged(
        &self,
        documents: &[TaggedSequence],
        params: &DocTrainParams,
    ) -> Result<EmbeddingTable> {
        params.validate()?;
        info!(
            "Training document embeddings: {} documents, dim={}, epochs={}",
            documents.len(),
            params.dimension,
            params.epochs
        );

        let token_params = params.as_token_params();
        let seed = token_params.seed.unwrap_or(self.default_seed);
        let token_vectors: AHashMap<&str, Vector> = self
            .token_vectors(documents.iter().map(|d| d.tokens.as_slice()), &token_params)?
            .into_iter()
            .collect();

        let mut order: Vec<&str> = Vec::new();
        let mut by_tag: AHashMap<&str, Vec<&str>> = AHashMap::new();
        for doc in documents {
            let entry = by_tag.entry(doc.tag.as_str()).or_insert_with(|| {
                order.push(doc.tag.as_str());
                Vec::new()
            });
            entry.extend(doc.tokens.iter().map(String::as_str));
        }

        let mut table = EmbeddingTable::new(params.dimension)?;
        for tag in order {
            let tokens = by_tag.remove(tag).unwrap_or_default();
            let mut v = Vector::zeros(params.dimension);
            let mut known = 0usize;
            for token in &tokens {
                if let Some(tv) = token_vectors.get(token) {
                    v.add_scaled(tv.as_slice(), 1.0);
                    known += 1;
                }
            }
            if known == 0 {
                for token in &tokens {
                    v.add_scaled(&basis(token, seed, params.dimension), 1.0);
                }
            }
            v.normalize();
            table.insert(tag, v)?;
        }

        info!("Trained {} document vectors", table.len());
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_corpus, TransactionRecord};

    fn corpus() -> Corpus {
        let mut records = Vec::new();
        // milk and bread always bought together, beer and chips together
        for order in 0..20u64 {
            let (a, b) = if order % 2 == 0 {
                ("milk", "bread")
            } else {
                ("beer", "chips")
            };
            records.push(TransactionRecord::new(order, a, 1));
            records.push(TransactionRecord::new(order, b, 2));
        }
        records.push(TransactionRecord::new(100u64, "caviar", 1));
        build_corpus(&records).unwrap()
    }

    fn params() -> TrainParams {
        TrainParams {
            dimension: 32,
            window: 2,
            min_frequency: 2,
            workers: 2,
            seed: Some(7),
        }
    }

    #[test]
    fn test_rare_tokens_are_absent() {
        let table = HashingTrainer::default().train(&corpus(), &params()).unwrap();
        assert_eq!(table.len(), 4);
        assert!(table.get("caviar").is_none());
        assert_eq!(table.dimension(), 32);
    }

    #[test]
    fn test_cooccurring_tokens_are_closer() {
        let table = HashingTrainer::default().train(&corpus(), &params()).unwrap();
        let milk = table.get("milk").unwrap();
        let bread = table.get("bread").unwrap();
        let beer = table.get("beer").unwrap();
        assert!(milk.cosine_similarity(bread) > milk.cosine_similarity(beer));
    }

    #[test]
    fn test_same_seed_same_vectors() {
        let a = HashingTrainer::default().train(&corpus(), &params()).unwrap();
        let b = HashingTrainer::default().train(&corpus(), &params()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_params() {
        let mut p = params();
        p.window = 0;
        assert!(matches!(
            HashingTrainer::default().train(&corpus(), &p),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_tagged_documents_get_one_row_per_tag() {
        let docs = vec![
            TaggedSequence {
                tag: "u1".to_string(),
                tokens: vec!["milk".to_string(), "bread".to_string()],
            },
            TaggedSequence {
                tag: "u2".to_string(),
                tokens: vec!["caviar".to_string()],
            },
            TaggedSequence {
                tag: "u1".to_string(),
                tokens: vec!["milk".to_string()],
            },
        ];
        let p = DocTrainParams {
            dimension: 16,
            min_frequency: 2,
            ..DocTrainParams::default()
        };
        let table = HashingTrainer::default().train_tagged(&docs, &p).unwrap();
        assert_eq!(table.ids().collect::<Vec<_>>(), vec!["u1", "u2"]);
        assert!((table.get("u2").unwrap().norm() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_inverted_learning_rate_rejected() {
        let p = DocTrainParams {
            learning_rate: LearningRateSchedule {
                start: 0.001,
                end: 0.1,
            },
            ..DocTrainParams::default()
        };
        assert!(p.validate().is_err());
    }
}
