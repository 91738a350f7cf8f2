//! CLI argument parsing for Centinela

use std::path::PathBuf;

use clap::Parser;

use crate::detector::{DEFAULT_INPUT, DEFAULT_MODEL, DEFAULT_OUTPUT};

#[derive(Parser, Debug)]
#[command(name = "centinela")]
#[command(version)]
#[command(about = "Behavior-based network traffic anomaly detection", long_about = None)]
pub struct Cli {
    /// CSV file with network traffic records
    #[arg(value_name = "INPUT", default_value = DEFAULT_INPUT)]
    pub input: PathBuf,

    /// Path to the trained anomaly detection model
    #[arg(short = 'm', long = "model", value_name = "PATH", default_value = DEFAULT_MODEL)]
    pub model: PathBuf,

    /// Where to write the annotated result table
    #[arg(short = 'o', long = "output", value_name = "PATH", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Enable debug logging on stderr
    #[arg(long)]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["centinela"]);
        assert_eq!(cli.input, PathBuf::from("processed_network_data.csv"));
        assert_eq!(cli.model, PathBuf::from("models/anomaly_detector.apr"));
        assert_eq!(cli.output, PathBuf::from("behavior_based_results.csv"));
        assert!(!cli.debug);
    }

    #[test]
    fn test_cli_parses_input_path() {
        let cli = Cli::parse_from(["centinela", "capture.csv"]);
        assert_eq!(cli.input, PathBuf::from("capture.csv"));
    }

    #[test]
    fn test_cli_model_override() {
        let cli = Cli::parse_from(["centinela", "--model", "models/retrained.apr"]);
        assert_eq!(cli.model, PathBuf::from("models/retrained.apr"));
    }

    #[test]
    fn test_cli_output_override() {
        let cli = Cli::parse_from(["centinela", "-o", "out/results.csv"]);
        assert_eq!(cli.output, PathBuf::from("out/results.csv"));
    }

    #[test]
    fn test_cli_debug_flag() {
        let cli = Cli::parse_from(["centinela", "--debug"]);
        assert!(cli.debug);
    }
}
