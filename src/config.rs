//! Run configuration.
//!
//! A [`MiningConfig`] comes from the command line or a JSON file and is
//! validated once, before any stage runs.

use crate::error::{MiningError, MiningResult};
use crate::runner::{ExecMode, Runner, default_partitions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_max_pass() -> u32 {
    10
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MiningConfig {
    /// File, directory or glob pattern with one transaction per line.
    pub input_path: PathBuf,
    /// Directory that receives every report.
    pub output_path: PathBuf,
    /// Minimum support as a fraction of all transactions.
    pub min_support: f64,
    pub min_confidence: f64,
    /// Total number of transactions, used for every ratio. Defaults to the
    /// number of records read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_count: Option<u64>,
    #[serde(default = "default_delimiter")]
    pub item_delimiter: String,
    #[serde(default = "default_max_pass")]
    pub max_pass: u32,
    /// Keep only rules with lift above 1.
    #[serde(default)]
    pub lift_filter: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partitions: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,
}

impl MiningConfig {
    /// Config with the required fields and defaults for everything else.
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        min_support: f64,
        min_confidence: f64,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            min_support,
            min_confidence,
            transaction_count: None,
            item_delimiter: default_delimiter(),
            max_pass: default_max_pass(),
            lift_filter: false,
            partitions: None,
            threads: None,
            state_path: None,
        }
    }

    /// Fix the transaction count instead of counting the records read.
    #[must_use]
    pub fn with_transaction_count(mut self, transaction_count: u64) -> Self {
        self.transaction_count = Some(transaction_count);
        self
    }

    /// Load from a JSON file. The result is not validated yet.
    ///
    /// # Errors
    ///
    /// [`MiningError::Io`] if the file cannot be read and
    /// [`MiningError::Configuration`] if it is not a valid config.
    pub fn from_json_file(path: &Path) -> MiningResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| MiningError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| {
            MiningError::configuration(format!("invalid config file {}: {e}", path.display()))
        })
    }

    /// Check every option; all problems are reported together.
    ///
    /// # Errors
    ///
    /// [`MiningError::Configuration`] listing each invalid field.
    pub fn validate(&self) -> MiningResult<()> {
        let mut errors = Vec::new();

        if !(0.0..=1.0).contains(&self.min_support) {
            errors.push(format!("min_support must be in [0, 1], got {}", self.min_support));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            errors.push(format!(
                "min_confidence must be in [0, 1], got {}",
                self.min_confidence
            ));
        }
        if self.transaction_count == Some(0) {
            errors.push("transaction_count must be positive".to_string());
        }
        if self.item_delimiter.is_empty() {
            errors.push("item_delimiter cannot be empty".to_string());
        }
        if self.max_pass == 0 {
            errors.push("max_pass must be at least 1".to_string());
        }
        if self.partitions == Some(0) {
            errors.push("partitions must be at least 1".to_string());
        }
        if self.threads == Some(0) {
            errors.push("threads must be at least 1".to_string());
        }
        if self.input_path.as_os_str().is_empty() {
            errors.push("input_path cannot be empty".to_string());
        }
        if self.output_path.as_os_str().is_empty() {
            errors.push("output_path cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(MiningError::configuration(errors.join("; ")))
        }
    }

    /// `ceil(min_support × transaction_count)`
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn min_support_count(&self, transaction_count: u64) -> u64 {
        (self.min_support * transaction_count as f64).ceil() as u64
    }

    /// Where the pass state lives; defaults to `<output>/_state/pass-state.bin`.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.state_path
            .clone()
            .unwrap_or_else(|| self.output_path.join("_state").join("pass-state.bin"))
    }

    /// Runner for this configuration.
    #[must_use]
    pub fn runner(&self) -> Runner {
        Runner {
            mode: ExecMode::Parallel {
                threads: self.threads,
            },
            partitions: self.partitions.unwrap_or_else(default_partitions),
        }
    }
}
