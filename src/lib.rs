//! # basketvec
//!
//! Product and customer embeddings from e-commerce order histories.
//!
//! Order lines are grouped into ordered token sequences, an embedding table
//! is trained (or loaded from the on-disk cache) and the result is checked
//! qualitatively: nearest neighbours, 2-D projections and how well catalog
//! labels cluster.
//!
//! ## Quick Start
//!
//! ```bash
//! basketvec --records order_products.jsonl --retrain --query 24852
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use basketvec::prelude::*;
//!
//! let records = vec![
//!     TransactionRecord::new(1u64, "banana", 1),
//!     TransactionRecord::new(1u64, "milk", 2),
//! ];
//! let corpus = build_corpus(&records).unwrap();
//!
//! let manager = ModelManager::new("./models").unwrap();
//! let params = TrainParams { min_frequency: 1, ..TrainParams::default() };
//! let table = manager
//!     .product_table(ModelSource::TrainAndCache, &corpus, &HashingTrainer::default(), &params)
//!     .unwrap();
//! let similar = nearest(&table, "banana", 5, false).unwrap();
//! ```
//!
//! ## Crate Structure
//!
//! - [`basketvec-core`](basketvec_core) - records, corpus building, tables, trainers
//! - [`basketvec-storage`](basketvec_storage) - embedding cache and train-or-load
//! - [`basketvec-eval`](basketvec_eval) - neighbours, projections, clustering

pub mod config;

pub use config::PipelineConfig;

// Re-export core types
pub use basketvec_core::{
    build_corpus, customer_records, load_jsonl, product_records, Catalog, CatalogLevel, Corpus,
    CorpusStats, DocTrainParams, DocumentTrainer, EmbeddingTable, EmbeddingTrainer, EntityKey,
    Error, HashingTrainer, Result, Sequence, TaggedSequence, TrainParams, TransactionRecord,
    Vector,
};

// Re-export storage
pub use basketvec_storage::{CacheKey, EmbeddingCache, EntityKind, ModelManager, ModelSource};

// Re-export evaluation
pub use basketvec_eval::{
    cluster_quality, interpret_clusters, nearest, nearest_to_vector, project, sample, KMeans,
    Metric, Neighbor, Projection, ProjectionMethod, TsneParams,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        build_corpus, cluster_quality, nearest, project, Corpus, EmbeddingTable, Error,
        HashingTrainer, Metric, ModelManager, ModelSource, ProjectionMethod, Result, TrainParams,
        TransactionRecord, Vector,
    };
}
