pub mod cache;
pub mod manager;

pub use cache::{CacheEntry, CacheKey, EmbeddingCache, EntityKind, FORMAT_VERSION};
pub use manager::{ModelManager, ModelSource};
