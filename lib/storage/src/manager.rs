use crate::cache::{CacheKey, EmbeddingCache, EntityKind};
use basketvec_core::{
    Corpus, DocTrainParams, DocumentTrainer, EmbeddingTable, EmbeddingTrainer, Result,
    TaggedSequence, TrainParams,
};
use std::path::Path;
use tracing::info;

/// Where an embedding table comes from on this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    /// Train from the corpus and store the result under the configuration's key.
    TrainAndCache,
    /// Load a previously stored table; a miss is fatal, nothing is trained.
    LoadCached,
}

impl ModelSource {
    pub fn from_retrain_flag(retrain: bool) -> Self {
        if retrain {
            ModelSource::TrainAndCache
        } else {
            ModelSource::LoadCached
        }
    }
}

/// Produces embedding tables by training or by loading from the cache.
/// Either path yields the same [`EmbeddingTable`] type.
pub struct ModelManager {
    cache: EmbeddingCache,
}

impl ModelManager {
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Result<Self> {
        Ok(Self {
            cache: EmbeddingCache::new(cache_dir)?,
        })
    }

    pub fn with_cache(cache: EmbeddingCache) -> Self {
        Self { cache }
    }

    #[inline]
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn product_table<T>(
        &self,
        source: ModelSource,
        corpus: &Corpus,
        trainer: &T,
        params: &TrainParams,
    ) -> Result<EmbeddingTable>
    where
        T: EmbeddingTrainer + ?Sized,
    {
        let key = CacheKey::new(EntityKind::Product, params.dimension);
        self.resolve(source, key, || trainer.train(corpus, params))
    }

    pub fn customer_table<T>(
        &self,
        source: ModelSource,
        documents: &[TaggedSequence],
        trainer: &T,
        params: &DocTrainParams,
    ) -> Result<EmbeddingTable>
    where
        T: DocumentTrainer + ?Sized,
    {
        let key = CacheKey::new(EntityKind::Customer, params.dimension);
        self.resolve(source, key, || trainer.train_tagged(documents, params))
    }

    fn resolve<F>(&self, source: ModelSource, key: CacheKey, train: F) -> Result<EmbeddingTable>
    where
        F: FnOnce() -> Result<EmbeddingTable>,
    {
        let key_str = key.to_string();
        match source {
            ModelSource::LoadCached => {
                info!("Loading cached model '{}'", key_str);
                self.cache.load(&key_str, Some(key.dimension))
            }
            ModelSource::TrainAndCache => {
                info!("Training model '{}'", key_str);
                let table = train()?;
                self.cache.save(&table, &key_str)?;
                Ok(table)
            }
        }
    }
}
