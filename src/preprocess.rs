//! Preprocessing collaborator: categorical encoding and numeric scaling
//!
//! Converts raw traffic records into the model-ready numeric representation.
//! Columns where every value parses as a number are kept numeric; all other
//! columns are label-encoded. The assembled matrix is then standardized with
//! aprender's `StandardScaler`.
//!
//! Callers receive the fitted encoders and scaler parameters alongside the
//! transformed table; the detection path discards them, but they stay in the
//! contract so training-side callers can reuse the same transform.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use aprender::preprocessing::StandardScaler;
use aprender::primitives::Matrix;
use aprender::traits::Transformer;
use thiserror::Error;
use tracing::debug;

use crate::dataset::{self, FeatureTable, PersistError, TrafficTable};

/// Intermediate file written when preprocessing is asked to persist its output.
pub const PREPROCESSED_FILE: &str = "preprocessed_data.csv";

/// Errors raised by the preprocessing stage
#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Failed to assemble feature matrix: {0}")]
    Matrix(String),

    #[error("Feature scaling failed: {0}")]
    Scaling(String),

    #[error("Preprocessing changed the row count: {before} rows in, {after} rows out")]
    RowCountChanged { before: usize, after: usize },

    #[error("Failed to persist preprocessed table: {0}")]
    Persist(#[from] PersistError),
}

/// Maps the values of one categorical column onto integer codes.
///
/// Classes are sorted lexicographically and mapped to their index.
#[derive(Debug, Clone)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    fn fit<'a>(values: impl Iterator<Item = &'a str>) -> Self {
        let classes: BTreeSet<&str> = values.collect();
        Self {
            classes: classes.into_iter().map(String::from).collect(),
        }
    }

    /// Code for a value seen during fitting, `None` otherwise.
    pub fn transform(&self, value: &str) -> Option<f32> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .ok()
            .map(|idx| idx as f32)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// Mean/std parameters of the fitted scaler.
#[derive(Debug, Clone)]
pub struct FittedScaler {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

/// Everything preprocessing produces.
///
/// The detection path keeps `table` and explicitly ignores the rest.
#[derive(Debug, Clone)]
pub struct PreprocessOutput {
    pub table: FeatureTable,
    pub encoders: BTreeMap<String, LabelEncoder>,
    pub scaler: FittedScaler,
}

/// Transform raw traffic records into scaled numeric features.
///
/// Row count and order are preserved. With `save_csv` set, the transformed
/// table is also written to [`PREPROCESSED_FILE`] in the working directory;
/// the detection path passes `false` to suppress that side effect.
pub fn preprocess(table: &TrafficTable, save_csv: bool) -> Result<PreprocessOutput, PreprocessError> {
    let n_rows = table.len();
    let headers = table.headers();
    let n_cols = headers.len();

    // Fit an encoder for every column holding at least one non-numeric value.
    let mut encoders = BTreeMap::new();
    for (j, name) in headers.iter().enumerate() {
        let numeric = table
            .rows()
            .iter()
            .all(|row| row[j].trim().parse::<f32>().is_ok());
        if !numeric {
            let encoder = LabelEncoder::fit(table.rows().iter().map(|row| row[j].as_str()));
            debug!(
                column = %name,
                classes = encoder.classes().len(),
                "encoded categorical column"
            );
            encoders.insert(name.clone(), encoder);
        }
    }

    let mut values = Vec::with_capacity(n_rows * n_cols);
    for row in table.rows() {
        for (j, name) in headers.iter().enumerate() {
            let value = match encoders.get(name) {
                Some(encoder) => encoder.transform(&row[j]).ok_or_else(|| {
                    PreprocessError::Matrix(format!("unseen value in column '{name}'"))
                })?,
                None => row[j].trim().parse::<f32>().map_err(|e| {
                    PreprocessError::Matrix(format!("column '{name}': {e}"))
                })?,
            };
            values.push(value);
        }
    }

    let matrix = Matrix::from_vec(n_rows, n_cols, values)
        .map_err(|e| PreprocessError::Matrix(e.to_string()))?;

    let mut scaler = StandardScaler::new().with_mean(true).with_std(true);
    scaler
        .fit(&matrix)
        .map_err(|e| PreprocessError::Scaling(e.to_string()))?;
    let scaled = scaler
        .transform(&matrix)
        .map_err(|e| PreprocessError::Scaling(e.to_string()))?;

    let features = FeatureTable::new(headers.to_vec(), scaled);

    if save_csv {
        dataset::write_features(&features, None, Path::new(PREPROCESSED_FILE))?;
    }

    Ok(PreprocessOutput {
        table: features,
        encoders,
        scaler: FittedScaler {
            mean: scaler.mean().to_vec(),
            std: scaler.std().to_vec(),
        },
    })
}
