//! # Extractor Configuration
//!
//! Explicit configuration values handed to the checkpoint, log and recovery
//! components by constructor. Nothing in this crate reads a global settings object.
//!
//! ## Sources (lowest to highest precedence)
//!
//! 1. Built-in defaults ([`ExtractorConfig::default`])
//! 2. An optional TOML file
//! 3. `EXTRACT__<SECTION>__<FIELD>` environment variables
//!
//! ```rust,no_run
//! use resumable_extract::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load(Some("extractor.toml".as_ref()))?;
//! println!("writing runs under {}", config.storage.output_dir.display());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{files, record_fields};
use crate::recovery::RecoveryDecision;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Where and how run artifacts are written
    pub storage: StorageConfig,

    /// Behaviour when an interrupted run is found
    pub recovery: RecoveryConfig,

    /// Subscriber settings used by [`crate::logging::init_structured_logging`]
    pub logging: LoggingConfig,
}

impl ExtractorConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.storage.validate()?;
        self.recovery.validate()
    }
}

/// Run directory layout and durability settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory; each run name gets its own sub-directory
    pub output_dir: PathBuf,
    pub checkpoint_file: String,
    pub log_file_prefix: String,
    pub snapshot_file_prefix: String,
    /// fsync log appends and atomic writes before returning
    pub fsync: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("extracted_data"),
            checkpoint_file: files::CHECKPOINT_FILE.to_string(),
            log_file_prefix: files::LOG_FILE_PREFIX.to_string(),
            snapshot_file_prefix: files::SNAPSHOT_FILE_PREFIX.to_string(),
            fsync: true,
        }
    }
}

impl StorageConfig {
    /// Storage rooted at `output_dir` with every other setting at its default
    pub fn with_output_dir(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "storage.output_dir",
                "",
                "output directory must not be empty",
            ));
        }

        for (field, value) in [
            ("storage.checkpoint_file", &self.checkpoint_file),
            ("storage.log_file_prefix", &self.log_file_prefix),
            ("storage.snapshot_file_prefix", &self.snapshot_file_prefix),
        ] {
            if value.is_empty() {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value.as_str(),
                    "must not be empty",
                ));
            }
            if value.contains(['/', '\\']) {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value.as_str(),
                    "must be a plain file name without path separators",
                ));
            }
        }

        if self.log_file_prefix == self.snapshot_file_prefix {
            return Err(ConfigurationError::invalid_value(
                "storage.snapshot_file_prefix",
                self.snapshot_file_prefix.as_str(),
                "must differ from storage.log_file_prefix",
            ));
        }

        Ok(())
    }
}

/// Recovery prompt and log-merge settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Ask the operator; when false `default_decision` is used without prompting
    pub interactive: bool,
    pub default_decision: RecoveryDecision,
    /// Record field naming the unit a record belongs to
    pub unit_field: String,
    /// Record field carrying a precomputed content hash, if the extractor sets one
    pub hash_field: String,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            interactive: true,
            default_decision: RecoveryDecision::Continue,
            unit_field: record_fields::DEFAULT_UNIT_FIELD.to_string(),
            hash_field: record_fields::DEFAULT_HASH_FIELD.to_string(),
        }
    }
}

impl RecoveryConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.unit_field.is_empty() {
            return Err(ConfigurationError::invalid_value(
                "recovery.unit_field",
                "",
                "must name a record field",
            ));
        }
        if self.hash_field.is_empty() {
            return Err(ConfigurationError::invalid_value(
                "recovery.hash_field",
                "",
                "must name a record field",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Explicit filter directive; falls back to the environment default when unset
    pub level: Option<String>,
    pub directory: PathBuf,
    /// Also write JSON logs to a file under `directory`
    pub file_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            directory: PathBuf::from("logs"),
            file_output: true,
        }
    }
}
