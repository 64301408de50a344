//! Error types for the mining pipeline.
//!
//! Everything a stage, the state store or the driver can fail with is a
//! [`MiningError`]. Callbacks inside a stage (`map`, `reduce`) return
//! `anyhow::Result` and the runner wraps their failures into
//! [`MiningError::StageExecution`] together with the phase that failed.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations
pub type MiningResult<T> = Result<T, MiningError>;

/// Phase of a stage in which a failure happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StagePhase {
    Map,
    Combine,
    Reduce,
}

impl fmt::Display for StagePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StagePhase::Map => "map",
            StagePhase::Combine => "combine",
            StagePhase::Reduce => "reduce",
        };
        f.write_str(name)
    }
}

/// Pipeline error taxonomy
#[derive(Error, Debug)]
pub enum MiningError {
    /// Missing or invalid option, reported before any stage runs
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed input record. Absorbed by the mapping step (skip and count).
    #[error("malformed record: {reason}")]
    RecordParse { reason: String },

    /// A map, combine or reduce invocation failed; the whole stage is aborted
    #[error("stage `{stage}` failed during {phase}: {source:#}")]
    StageExecution {
        stage: String,
        phase: StagePhase,
        #[source]
        source: anyhow::Error,
    },

    /// Cross-pass state could not be saved or loaded
    #[error("pass state at {path} could not be persisted: {source:#}")]
    StatePersistence {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Reading input records or writing reports failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MiningError {
    /// Create a configuration error
    pub fn configuration<E: fmt::Display>(msg: E) -> Self {
        Self::Configuration(msg.to_string())
    }

    /// Create a record parse error
    pub fn record_parse<E: fmt::Display>(reason: E) -> Self {
        Self::RecordParse {
            reason: reason.to_string(),
        }
    }

    /// Create a state persistence error for `path`
    pub fn state<E: Into<anyhow::Error>>(path: impl Into<PathBuf>, err: E) -> Self {
        Self::StatePersistence {
            path: path.into(),
            source: err.into(),
        }
    }

    /// Create an I/O error for `path`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the pipeline can continue after this error.
    ///
    /// Only malformed records are recoverable; they are skipped by the map step.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MiningError::RecordParse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_error_names_the_phase() {
        let err = MiningError::StageExecution {
            stage: "apriori-pass-2".into(),
            phase: StagePhase::Reduce,
            source: anyhow::anyhow!("boom"),
        };
        let msg = err.to_string();
        assert!(msg.contains("apriori-pass-2"));
        assert!(msg.contains("reduce"));
        assert!(msg.contains("boom"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn only_record_errors_are_recoverable() {
        assert!(MiningError::record_parse("bad").is_recoverable());
        assert!(!MiningError::configuration("bad").is_recoverable());
    }
}
