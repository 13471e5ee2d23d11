//! # basketvec Core
//!
//! Core library for basketvec: everything between raw transaction rows and
//! a trained embedding table.
//!
//! - [`TransactionRecord`] - one order line, keyed by group and entity
//! - [`build_corpus`] - groups records into ordered token [`Sequence`]s
//! - [`Corpus`] - the sequences of a dataset, with a tagged document view
//! - [`EmbeddingTable`] - entity id → fixed-dimension [`Vector`]
//! - [`EmbeddingTrainer`] / [`DocumentTrainer`] - pluggable training
//! - [`Catalog`] - product → aisle → department labels for evaluation
//!
//! ## Example
//!
//! ```rust
//! use basketvec_core::{build_corpus, TransactionRecord};
//!
//! let records = vec![
//!     TransactionRecord::new(1u64, "A", 1),
//!     TransactionRecord::new(1u64, "B", 2),
//!     TransactionRecord::new(2u64, "C", 1),
//! ];
//! let corpus = build_corpus(&records).unwrap();
//! let sentences: Vec<&[String]> = corpus.sentences().collect();
//! assert_eq!(sentences[0], &["A".to_string(), "B".to_string()][..]);
//! assert_eq!(sentences[1], &["C".to_string()][..]);
//! ```

pub mod catalog;
pub mod error;
pub mod key;
pub mod record;
pub mod sequence;
pub mod table;
pub mod trainer;
pub mod vector;

pub use catalog::{Aisle, Catalog, CatalogLevel, Department, Product};
pub use error::{Error, Result};
pub use key::EntityKey;
pub use record::{
    customer_records, load_jsonl, product_records, read_jsonl, EvalSet, Order, OrderLine,
    TransactionRecord,
};
pub use sequence::{build_corpus, Corpus, CorpusStats, Sequence, TaggedSequence};
pub use table::EmbeddingTable;
pub use trainer::{
    DocTrainParams, DocumentTrainer, EmbeddingTrainer, HashingTrainer, LearningRateSchedule,
    TrainParams,
};
pub use vector::Vector;
