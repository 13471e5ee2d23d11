// Write-once-read-many store for trained embedding tables
use anyhow::{anyhow, Result as AnyResult};
use atomicwrites::{AllowOverwrite, AtomicFile};
use basketvec_core::{EmbeddingTable, Error, Result, Vector};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bumped whenever the on-disk layout changes; older artifacts then load as misses.
pub const FORMAT_VERSION: u32 = 1;

const EXTENSION: &str = "emb";

/// What the embedded entities are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Product,
    Customer,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Product => write!(f, "product"),
            EntityKind::Customer => write!(f, "customer"),
        }
    }
}

/// Cache key derived from the model configuration, e.g. `product_200d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: EntityKind,
    pub dimension: usize,
}

impl CacheKey {
    pub fn new(kind: EntityKind, dimension: usize) -> Self {
        Self { kind, dimension }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}d", self.kind, self.dimension)
    }
}

/// Listing entry for a stored artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Artifact {
    format_version: u32,
    dimension: usize,
    created_at: String,
    checksum: String,
    rows: Vec<(String, Vec<f32>)>,
}

pub struct EmbeddingCache {
    cache_dir: PathBuf,
}

impl EmbeddingCache {
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    #[inline]
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn artifact_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.cache_dir.join(format!("{}.{}", key, EXTENSION)))
    }

    /// Persist `table` under `key`, replacing any previous artifact atomically.
    pub fn save(&self, table: &EmbeddingTable, key: &str) -> Result<()> {
        let path = self.artifact_path(key)?;
        if path.exists() {
            warn!("Overwriting cached embeddings {:?}", path);
        }

        let rows: Vec<(String, Vec<f32>)> = table
            .iter()
            .map(|(id, v)| (id.to_string(), v.as_slice().to_vec()))
            .collect();
        let checksum = rows_checksum(&rows).map_err(|e| Error::Serialization(e.to_string()))?;
        let artifact = Artifact {
            format_version: FORMAT_VERSION,
            dimension: table.dimension(),
            created_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            checksum,
            rows,
        };

        write_artifact(&path, &artifact).map_err(|e| Error::Storage(e.to_string()))?;
        info!(
            "Saved {} vectors (dim={}) to {:?}",
            table.len(),
            table.dimension(),
            path
        );
        Ok(())
    }

    /// Load the table stored under `key`.
    ///
    /// Every way the artifact can be unusable (never saved, written by an
    /// incompatible format, unexpected dimension, corrupt payload) is a
    /// [`Error::NotFound`].
    pub fn load(&self, key: &str, expected_dimension: Option<usize>) -> Result<EmbeddingTable> {
        let path = self.artifact_path(key)?;
        if !path.exists() {
            return Err(Error::NotFound(format!("no cached embeddings for key '{}'", key)));
        }

        let artifact = read_artifact(&path)
            .map_err(|e| Error::NotFound(format!("unreadable artifact '{}': {}", key, e)))?;

        if artifact.format_version != FORMAT_VERSION {
            return Err(Error::NotFound(format!(
                "artifact '{}' has format version {}, expected {}",
                key, artifact.format_version, FORMAT_VERSION
            )));
        }
        if let Some(expected) = expected_dimension {
            if artifact.dimension != expected {
                return Err(Error::NotFound(format!(
                    "artifact '{}' has dimension {}, expected {}",
                    key, artifact.dimension, expected
                )));
            }
        }
        let actual = rows_checksum(&artifact.rows).map_err(|e| Error::Serialization(e.to_string()))?;
        if actual != artifact.checksum {
            return Err(Error::NotFound(format!(
                "artifact '{}' checksum mismatch: expected {}, got {}",
                key, artifact.checksum, actual
            )));
        }

        let rows = artifact
            .rows
            .into_iter()
            .map(|(id, data)| (id, Vector::new(data)))
            .collect();
        let table = EmbeddingTable::from_rows(artifact.dimension, rows)
            .map_err(|e| Error::NotFound(format!("artifact '{}' is inconsistent: {}", key, e)))?;

        debug!("Artifact '{}' created at {}", key, artifact.created_at);
        info!(
            "Loaded {} vectors (dim={}) from {:?}",
            table.len(),
            table.dimension(),
            path
        );
        Ok(table)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.artifact_path(key).map(|p| p.exists()).unwrap_or(false)
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        let path = self.artifact_path(key)?;
        if path.exists() {
            fs::remove_file(&path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// All stored artifacts, sorted by key.
    pub fn list(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let metadata = fs::metadata(&path)?;
            let created_at = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .and_then(|d| DateTime::from_timestamp(d.as_secs() as i64, 0))
                .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string());

            entries.push(CacheEntry {
                key: key.to_string(),
                size: metadata.len(),
                created_at,
            });
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!("invalid cache key '{}'", key)))
    }
}

fn rows_checksum(rows: &[(String, Vec<f32>)]) -> AnyResult<String> {
    let bytes = bincode::serialize(rows)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

fn write_artifact(path: &Path, artifact: &Artifact) -> AnyResult<()> {
    let data = bincode::serialize(artifact).map_err(|e| anyhow!("Serialization error: {}", e))?;
    AtomicFile::new(path, AllowOverwrite).write(|f| {
        let mut encoder = GzEncoder::new(f, Compression::default());
        encoder.write_all(&data)?;
        encoder.finish()?;
        Ok::<(), std::io::Error>(())
    })?;
    Ok(())
}

fn read_artifact(path: &Path) -> AnyResult<Artifact> {
    let file = File::open(path)?;
    let mut decoder = GzDecoder::new(BufReader::new(file));
    let mut data = Vec::new();
    decoder.read_to_end(&mut data)?;
    let artifact: Artifact =
        bincode::deserialize(&data).map_err(|e| anyhow!("Deserialization error: {}", e))?;
    Ok(artifact)
}
