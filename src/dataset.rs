//! CSV table loading and persistence for network traffic records
//!
//! The detection pipeline is a batch operation: the whole input table is read
//! into memory, and the annotated result overwrites the output file on every
//! run. Row order is preserved end-to-end so predictions can be joined to
//! input rows by position.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use aprender::primitives::Matrix;
use thiserror::Error;

/// Column name attached to model predictions in the result table.
pub const ANOMALY_COLUMN: &str = "anomaly";

/// Errors raised while loading the input table
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Input file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse CSV: {0}")]
    Parse(String),

    #[error("Input table has no data rows")]
    Empty,
}

/// Errors raised while writing a table to disk
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Failed to write table: {0}")]
    Write(String),
}

/// Raw traffic records: named columns over ordered rows of string fields.
#[derive(Debug, Clone)]
pub struct TrafficTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TrafficTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows (the header is not counted).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Numeric table produced by preprocessing: column names over a row-major matrix.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    columns: Vec<String>,
    data: Matrix<f32>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>, data: Matrix<f32>) -> Self {
        debug_assert_eq!(columns.len(), data.shape().1);
        Self { columns, data }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn data(&self) -> &Matrix<f32> {
        &self.data
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.data.shape().0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Load the full table from a headered CSV file into memory.
///
/// No streaming or chunking; the entire dataset must fit in memory. A missing
/// file, a ragged row, or a table without data rows is rejected.
pub fn load_csv(path: &Path) -> Result<TrafficTable, DataError> {
    let file = File::open(path)
        .map_err(|e| DataError::FileNotFound(format!("{}: {}", path.display(), e)))?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DataError::Parse(e.to_string()))?
        .iter()
        .map(String::from)
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| DataError::Parse(e.to_string()))?;
        rows.push(record.iter().map(String::from).collect());
    }

    if rows.is_empty() {
        return Err(DataError::Empty);
    }

    Ok(TrafficTable::new(headers, rows))
}

/// Write a numeric table as CSV, overwriting any existing file.
///
/// When `labels` is given, an extra `anomaly` column is appended with one
/// label per row, by position. No synthetic row-index column is written.
pub fn write_features(
    table: &FeatureTable,
    labels: Option<&[i32]>,
    path: &Path,
) -> Result<(), PersistError> {
    if let Some(labels) = labels {
        debug_assert_eq!(labels.len(), table.len());
    }

    let mut writer =
        csv::Writer::from_path(path).map_err(|e| PersistError::Write(e.to_string()))?;

    let mut header: Vec<&str> = table.columns().iter().map(String::as_str).collect();
    if labels.is_some() {
        header.push(ANOMALY_COLUMN);
    }
    writer
        .write_record(&header)
        .map_err(|e| PersistError::Write(e.to_string()))?;

    let (n_rows, n_cols) = table.data().shape();
    for i in 0..n_rows {
        let mut record: Vec<String> = (0..n_cols)
            .map(|j| table.data().get(i, j).to_string())
            .collect();
        if let Some(labels) = labels {
            record.push(labels[i].to_string());
        }
        writer
            .write_record(&record)
            .map_err(|e| PersistError::Write(e.to_string()))?;
    }

    writer
        .flush()
        .map_err(|e| PersistError::Write(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_csv_basic() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "traffic.csv",
            "protocol,duration,bytes\ntcp,1.0,10\nudp,2.5,42\n",
        );

        let table = load_csv(&path).unwrap();
        assert_eq!(table.headers(), &["protocol", "duration", "bytes"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1], vec!["udp", "2.5", "42"]);
    }

    #[test]
    fn test_load_csv_preserves_row_order() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "ordered.csv", "n\n3\n1\n2\n");

        let table = load_csv(&path).unwrap();
        let values: Vec<&str> = table.rows().iter().map(|r| r[0].as_str()).collect();
        assert_eq!(values, vec!["3", "1", "2"]);
    }

    #[test]
    fn test_load_csv_missing_file() {
        let result = load_csv(Path::new("/nonexistent/traffic.csv"));
        assert!(matches!(result, Err(DataError::FileNotFound(_))));
    }

    #[test]
    fn test_load_csv_header_only_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty.csv", "protocol,duration\n");

        let result = load_csv(&path);
        assert!(matches!(result, Err(DataError::Empty)));
    }

    #[test]
    fn test_load_csv_ragged_row_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "ragged.csv", "a,b\n1,2\n3\n");

        let result = load_csv(&path);
        assert!(matches!(result, Err(DataError::Parse(_))));
    }

    #[test]
    fn test_write_features_without_labels() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("features.csv");

        let data = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let table = FeatureTable::new(vec!["a".to_string(), "b".to_string()], data);

        write_features(&table, None, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("a,b"));
        assert_eq!(lines.next(), Some("1,2"));
        assert_eq!(lines.next(), Some("3,4"));
    }

    #[test]
    fn test_write_features_appends_anomaly_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.csv");

        let data = Matrix::from_vec(2, 1, vec![0.5, -0.5]).unwrap();
        let table = FeatureTable::new(vec!["duration".to_string()], data);

        write_features(&table, Some(&[1, -1]), &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("duration,anomaly"));
        assert_eq!(lines.next(), Some("0.5,1"));
        assert_eq!(lines.next(), Some("-0.5,-1"));
    }

    #[test]
    fn test_write_features_overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "results.csv", "stale contents\n");

        let data = Matrix::from_vec(1, 1, vec![1.0]).unwrap();
        let table = FeatureTable::new(vec!["x".to_string()], data);
        write_features(&table, Some(&[1]), &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("stale"));
        assert!(contents.starts_with("x,anomaly"));
    }

    #[test]
    fn test_write_features_unwritable_destination() {
        let data = Matrix::from_vec(1, 1, vec![1.0]).unwrap();
        let table = FeatureTable::new(vec!["x".to_string()], data);

        let result = write_features(&table, None, Path::new("/nonexistent/dir/out.csv"));
        assert!(matches!(result, Err(PersistError::Write(_))));
    }
}
