//! Search-session configuration.
//!
//! Every field has a default, so a TOML file only needs the keys it wants
//! to change:
//!
//! ```toml
//! corpus_dir = "./data"
//! iterations = 20
//! ground_truth = "./data/poison_metadata.json"
//!
//! [batch]
//! workers = 8
//!
//! [batch.budget]
//! deadline = 50
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::batch::BatchConfig;
use crate::collaborator::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0}")]
    Invalid(String),

    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings for one search session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory of corpus files (non-recursive).
    pub corpus_dir: PathBuf,
    /// Number of search iterations.
    pub iterations: u32,
    /// Files shown to the generator per iteration.
    pub prompt_samples: usize,
    /// Previous hypotheses included in the generator prompt.
    pub history_len: usize,
    /// Generator attempts per iteration before falling back.
    pub max_proposal_attempts: u32,
    /// Matched and unmatched files each sent to the judge when no ground
    /// truth is available.
    pub validation_sample: usize,
    /// Optional ground-truth labels; enables exact metrics.
    pub ground_truth: Option<PathBuf>,
    /// Directory for run records and the session report.
    pub output_dir: Option<PathBuf>,
    /// Hypothesis log persisted across sessions.
    pub store_path: Option<PathBuf>,
    /// Use the built-in fallback pool when generation fails.
    pub use_fallbacks: bool,
    /// Seed for file sampling; random when unset.
    pub seed: Option<u64>,
    pub batch: BatchConfig,
    pub retry: RetryPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("./data"),
            iterations: 10,
            prompt_samples: 5,
            history_len: 5,
            max_proposal_attempts: 3,
            validation_sample: 10,
            ground_truth: None,
            output_dir: None,
            store_path: None,
            use_fallbacks: true,
            seed: None,
            batch: BatchConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make a session meaningless or unbounded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.iterations == 0 {
            return invalid("iterations must be at least 1");
        }
        if self.batch.workers == 0 {
            return invalid("batch.workers must be at least 1");
        }
        if self.batch.watchdog_grace == 0 {
            return invalid("batch.watchdog_grace must be at least 1");
        }
        if self.batch.budget.deadline.is_zero() {
            return invalid("batch.budget.deadline must be positive");
        }
        if self.batch.budget.max_steps == 0 {
            return invalid("batch.budget.max_steps must be positive");
        }
        if self.batch.budget.memory_multiplier == 0 && self.batch.budget.min_memory == 0 {
            return invalid("batch.budget allows no memory at all");
        }
        if self.prompt_samples == 0 {
            return invalid("prompt_samples must be at least 1");
        }
        if self.max_proposal_attempts == 0 {
            return invalid("max_proposal_attempts must be at least 1");
        }
        if self.validation_sample == 0 && self.ground_truth.is_none() {
            return invalid("validation_sample must be at least 1 without ground truth");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn default_is_valid() {
        SessionConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = SessionConfig::from_toml(
            r#"
            corpus_dir = "/tmp/corpus"
            iterations = 3

            [batch]
            workers = 2

            [batch.budget]
            deadline = 75
            "#,
        )
        .unwrap();
        assert_eq!(cfg.iterations, 3);
        assert_eq!(cfg.batch.workers, 2);
        assert_eq!(cfg.batch.budget.deadline, Duration::from_millis(75));
        assert_eq!(cfg.batch.budget.max_steps, 10_000_000);
        assert_eq!(cfg.prompt_samples, 5);
    }

    #[test]
    fn rejects_zero_iterations() {
        let err = SessionConfig::from_toml("iterations = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_types() {
        let err = SessionConfig::from_toml("iterations = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SessionConfig::load(&dir.path().join("antidote.toml")).unwrap_err();
        assert!(err.to_string().contains("antidote.toml"));
    }
}
