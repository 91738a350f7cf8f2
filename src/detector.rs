//! Behavior-based detection pipeline
//!
//! Single-shot batch orchestration: load the traffic table, run the
//! preprocessing collaborator, load the persisted model, predict one label
//! per row, persist the annotated table, and report an anomaly count.
//! Fail-fast at every stage; no output file is written unless prediction
//! succeeded.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::dataset::{self, DataError, FeatureTable, PersistError};
use crate::model::{self, ModelError, PredictionError, ANOMALY_LABEL};
use crate::preprocess::{self, PreprocessError, PreprocessOutput};

/// Default input table for the fixed entry-point behavior.
pub const DEFAULT_INPUT: &str = "processed_network_data.csv";
/// Default location of the persisted model artifact.
pub const DEFAULT_MODEL: &str = "models/anomaly_detector.apr";
/// Result file, overwritten on every run.
pub const DEFAULT_OUTPUT: &str = "behavior_based_results.csv";

/// Errors for the detection pipeline, one variant per stage
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Failed to load traffic data: {0}")]
    DataLoad(#[from] DataError),

    #[error("Preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),

    #[error("Failed to load model: {0}")]
    ModelLoad(#[from] ModelError),

    #[error("Prediction failed: {0}")]
    Prediction(#[from] PredictionError),

    #[error("Failed to persist results: {0}")]
    Persist(#[from] PersistError),
}

/// Result of one detection run: the annotated table and its summary.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Transformed feature columns, row-aligned with the input
    pub table: FeatureTable,
    /// One label per row: 1 = normal, -1 = anomalous
    pub labels: Vec<i32>,
    /// Rows labeled anomalous
    pub anomaly_count: usize,
    /// Where the annotated table was written
    pub output_path: PathBuf,
}

impl Detection {
    pub fn is_clean(&self) -> bool {
        self.anomaly_count == 0
    }

    /// Format the run summary for display
    pub fn format(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "Behavior-based detection completed. Results saved in '{}'.\n",
            self.output_path.display()
        ));

        if self.anomaly_count > 0 {
            output.push_str(&format!("{} anomalies detected!", self.anomaly_count));
        } else {
            output.push_str("No anomalies detected.");
        }

        output
    }
}

/// Detect anomalies in a traffic table using a persisted model.
///
/// Loads `input` in full, preprocesses it (the intermediate-file side effect
/// is suppressed on this path), applies the model at `model_path`, appends
/// the prediction labels as the `anomaly` column, and writes the annotated
/// table to `output`. The returned [`Detection`] retains the in-memory
/// result, so a caller still has it even if only the file write failed.
pub fn detect_anomalies(
    input: &Path,
    model_path: &Path,
    output: &Path,
) -> Result<Detection, DetectError> {
    info!(input = %input.display(), "loading network traffic records");
    let table = dataset::load_csv(input)?;
    info!(rows = table.len(), "traffic records loaded");

    let PreprocessOutput {
        table: features,
        encoders: _encoders,
        scaler: _scaler,
    } = preprocess::preprocess(&table, false)?;

    // Predictions are joined to input rows by position, so the collaborator
    // must not have added or dropped rows.
    if features.len() != table.len() {
        return Err(PreprocessError::RowCountChanged {
            before: table.len(),
            after: features.len(),
        }
        .into());
    }

    let model = model::load_model(model_path)?;
    info!(
        n_features = model.n_features(),
        contamination = model.contamination(),
        "{}",
        model::model_status_line(&model.metadata)
    );

    let labels = model.predict(features.data())?;
    debug_assert_eq!(labels.len(), features.len());

    let anomaly_count = labels.iter().filter(|&&label| label == ANOMALY_LABEL).count();

    dataset::write_features(&features, Some(&labels), output)?;
    info!(
        path = %output.display(),
        anomalies = anomaly_count,
        "detection results written"
    );

    Ok(Detection {
        table: features,
        labels,
        anomaly_count,
        output_path: output.to_path_buf(),
    })
}
