//! Pipeline configuration read from an optional JSON file.

use basketvec_core::trainer::{
    DEFAULT_DIMENSION, DEFAULT_EPOCHS, DEFAULT_MIN_FREQUENCY, DEFAULT_SEED, DEFAULT_WINDOW,
};
use basketvec_core::{DocTrainParams, Error, LearningRateSchedule, Result, TrainParams};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_dimension() -> usize {
    DEFAULT_DIMENSION
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

fn default_min_frequency() -> usize {
    DEFAULT_MIN_FREQUENCY
}

fn default_epochs() -> usize {
    DEFAULT_EPOCHS
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_sample_size() -> usize {
    2000
}

fn default_clusters() -> usize {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_min_frequency")]
    pub min_frequency: usize,
    /// Training threads; `None` uses every available core
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default)]
    pub learning_rate: LearningRateSchedule,
    /// Rows drawn from the table before projecting and clustering
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    #[serde(default = "default_clusters")]
    pub clusters: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            window: default_window(),
            min_frequency: default_min_frequency(),
            workers: None,
            seed: default_seed(),
            epochs: default_epochs(),
            learning_rate: LearningRateSchedule::default(),
            sample_size: default_sample_size(),
            clusters: default_clusters(),
        }
    }
}

impl PipelineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    pub fn train_params(&self) -> TrainParams {
        let defaults = TrainParams::default();
        TrainParams {
            dimension: self.dimension,
            window: self.window,
            min_frequency: self.min_frequency,
            workers: self.workers.unwrap_or(defaults.workers),
            seed: Some(self.seed),
        }
    }

    pub fn doc_train_params(&self) -> DocTrainParams {
        DocTrainParams {
            dimension: self.dimension,
            window: self.window,
            min_frequency: self.min_frequency,
            epochs: self.epochs,
            learning_rate: self.learning_rate,
            seed: Some(self.seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = PipelineConfig::from_json("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.train_params().dimension, 100);
        assert_eq!(config.train_params().window, 5);
        assert_eq!(config.doc_train_params().epochs, 20);
    }

    #[test]
    fn test_partial_override() {
        let config = PipelineConfig::from_json(r#"{"dimension": 32, "workers": 2}"#).unwrap();
        let params = config.train_params();
        assert_eq!(params.dimension, 32);
        assert_eq!(params.workers, 2);
        assert_eq!(params.min_frequency, 5);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            PipelineConfig::from_json(r#"{"dimensions": 32}"#),
            Err(Error::InvalidConfig(_))
        ));
    }
}
