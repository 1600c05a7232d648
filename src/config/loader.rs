//! Configuration Loader
//!
//! Layers serialized defaults, an optional TOML file and environment overrides with
//! the `config` crate, then validates the merged result.

use super::error::{ConfigResult, ConfigurationError};
use super::ExtractorConfig;
use crate::constants::ENV_PREFIX;
use config::{Config, Environment, File, FileFormat};
use std::path::Path;
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from defaults, `path` (if given) and the process environment
    pub fn load(path: Option<&Path>) -> ConfigResult<ExtractorConfig> {
        Self::load_with_environment(path, Environment::with_prefix(ENV_PREFIX))
    }

    /// Load configuration with an explicit environment source.
    /// Useful for tests that must not depend on the process environment.
    pub fn load_with_environment(
        path: Option<&Path>,
        environment: Environment,
    ) -> ConfigResult<ExtractorConfig> {
        let mut builder =
            Config::builder().add_source(Config::try_from(&ExtractorConfig::default())?);

        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigurationError::file_read_error(
                    path.display().to_string(),
                    "not a readable file",
                ));
            }
            debug!(path = %path.display(), "Loading extractor configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        let config: ExtractorConfig = builder
            .add_source(
                environment
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;

        debug!(
            output_dir = %config.storage.output_dir.display(),
            interactive = config.recovery.interactive,
            fsync = config.storage.fsync,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Parse configuration from an in-memory TOML document layered over the defaults
    pub fn from_toml_str(contents: &str) -> ConfigResult<ExtractorConfig> {
        let config: ExtractorConfig = Config::builder()
            .add_source(Config::try_from(&ExtractorConfig::default())?)
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
