//! Persisted model artifacts for behavior-based detection
//!
//! A trained isolation forest is stored in aprender's `.apr` format together
//! with the feature count it was trained on, its contamination threshold,
//! and provenance metadata. Detection runs deserialize the artifact and use
//! its single capability: one prediction label per table row.

use std::path::Path;

use aprender::primitives::Matrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::isolation_forest::IsolationForest;

/// Prediction label for a normal traffic record.
pub const NORMAL_LABEL: i32 = 1;
/// Prediction label for an anomalous traffic record.
pub const ANOMALY_LABEL: i32 = -1;

/// Errors that can occur while loading or saving a model artifact
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to load model: {0}")]
    LoadError(String),

    #[error("Failed to save model: {0}")]
    SaveError(String),
}

/// Errors that can occur while predicting
#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Model expects {expected} features, table has {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("Model has no trained trees")]
    NotFitted,
}

/// Metadata for a persisted model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Centinela version that created this model
    pub centinela_version: String,
    /// When the model was trained (Unix seconds)
    pub trained_at: String,
    /// Number of samples used for training
    pub training_samples: usize,
    /// Model-specific hyperparameters
    pub hyperparameters: std::collections::HashMap<String, String>,
    /// Optional description
    pub description: Option<String>,
}

impl ModelMetadata {
    /// Create new metadata with current timestamp
    pub fn new(training_samples: usize) -> Self {
        Self {
            centinela_version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: chrono_lite_timestamp(),
            training_samples,
            hyperparameters: std::collections::HashMap::new(),
            description: None,
        }
    }

    /// Add a hyperparameter
    pub fn with_hyperparameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.hyperparameters.insert(key.into(), value.into());
        self
    }

    /// Add a description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Lightweight timestamp without chrono dependency
fn chrono_lite_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", duration.as_secs())
}

/// A trained classifier plus the contract it was trained under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyModel {
    forest: IsolationForest,
    n_features: usize,
    contamination: f32,
    /// Model metadata
    pub metadata: ModelMetadata,
}

impl AnomalyModel {
    pub fn new(
        forest: IsolationForest,
        n_features: usize,
        contamination: f32,
        metadata: ModelMetadata,
    ) -> Self {
        Self {
            forest,
            n_features,
            contamination,
            metadata,
        }
    }

    /// Number of feature columns the model was trained on
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Expected anomaly fraction; sets the scoring threshold
    pub fn contamination(&self) -> f32 {
        self.contamination
    }

    /// Predict one label per row, in row order: 1 = normal, -1 = anomalous.
    ///
    /// The table's column count must match the feature count the model was
    /// trained on; otherwise no labels are produced.
    pub fn predict(&self, features: &Matrix<f32>) -> Result<Vec<i32>, PredictionError> {
        if !self.forest.is_fitted() {
            return Err(PredictionError::NotFitted);
        }

        let (n_rows, n_cols) = features.shape();
        if n_cols != self.n_features {
            return Err(PredictionError::FeatureMismatch {
                expected: self.n_features,
                actual: n_cols,
            });
        }

        let mut labels = Vec::with_capacity(n_rows);
        for i in 0..n_rows {
            let sample: Vec<f64> = (0..n_cols).map(|j| f64::from(features.get(i, j))).collect();
            let label = if self.forest.predict(&sample, self.contamination) {
                ANOMALY_LABEL
            } else {
                NORMAL_LABEL
            };
            labels.push(label);
        }

        Ok(labels)
    }
}

/// Options for saving models
#[derive(Debug, Clone)]
pub struct PersistenceOptions {
    /// Enable compression (default: true)
    pub compress: bool,
    /// Model name
    pub name: Option<String>,
    /// Model description
    pub description: Option<String>,
}

impl Default for PersistenceOptions {
    fn default() -> Self {
        Self {
            compress: true,
            name: None,
            description: None,
        }
    }
}

impl PersistenceOptions {
    /// Create new options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set compression
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Set model name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set model description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Save a model to .apr format
pub fn save_model(
    model: &AnomalyModel,
    path: impl AsRef<Path>,
    options: PersistenceOptions,
) -> Result<(), ModelError> {
    use aprender::format::{save, Compression, ModelType, SaveOptions};

    let compression = if options.compress {
        Compression::ZstdDefault
    } else {
        Compression::None
    };

    let mut save_options = SaveOptions::new().with_compression(compression);

    if let Some(name) = options.name {
        save_options = save_options.with_name(name);
    }
    if let Some(desc) = options.description {
        save_options = save_options.with_description(desc);
    }

    save(model, ModelType::Custom, path.as_ref(), save_options)
        .map_err(|e| ModelError::SaveError(e.to_string()))
}

/// Load a model from .apr format
pub fn load_model(path: impl AsRef<Path>) -> Result<AnomalyModel, ModelError> {
    use aprender::format::{load, ModelType};

    if !path.as_ref().exists() {
        return Err(ModelError::FileNotFound(
            path.as_ref().display().to_string(),
        ));
    }

    load::<AnomalyModel>(path.as_ref(), ModelType::Custom)
        .map_err(|e| ModelError::LoadError(e.to_string()))
}

/// Generate a status line for model information
pub fn model_status_line(metadata: &ModelMetadata) -> String {
    format!(
        "model: centinela v{}, trained with {} samples",
        metadata.centinela_version, metadata.training_samples
    )
}
