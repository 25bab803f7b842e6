//! Configuration loading via `ortho-config`.
//!
//! The core APIs take their polling parameters explicitly; only the binary
//! reads them from layered configuration.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::convergence::PollSettings;
use crate::orchestrator::ReleasePolicy;

/// Orchestration settings merged from defaults, `quiesce.toml` and
/// environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "QUIESCE",
    discovery(
        app_name = "quiesce",
        env_var = "QUIESCE_CONFIG_PATH",
        config_file_name = "quiesce.toml",
        dotfile_name = ".quiesce.toml",
        project_file_name = "quiesce.toml"
    )
)]
pub struct OrchestrationConfig {
    /// Seconds between convergence probes.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
    /// Consecutive target observations required before a wait succeeds.
    #[ortho_config(default = 1)]
    pub continuous_target_occurrence: u32,
    /// Upper bound for one whole operation, restoration included.
    #[ortho_config(default = 1800)]
    pub operation_timeout_secs: u64,
    /// Upper bound for confirming a single issued command.
    #[ortho_config(default = 600)]
    pub command_timeout_secs: u64,
    /// Release the per-target lock before the mutation when no transition was
    /// needed.
    #[ortho_config(default = false)]
    pub release_when_satisfied: bool,
}

impl OrchestrationConfig {
    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("quiesce")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Rejects zero intervals, counts, and timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_positive(self.poll_interval_secs, "poll_interval_secs")?;
        Self::require_positive(
            u64::from(self.continuous_target_occurrence),
            "continuous_target_occurrence",
        )?;
        Self::require_positive(self.operation_timeout_secs, "operation_timeout_secs")?;
        Self::require_positive(self.command_timeout_secs, "command_timeout_secs")?;
        Ok(())
    }

    fn require_positive(value: u64, field: &str) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::Invalid(format!(
                "{field} must be greater than zero: set QUIESCE_{} or add {field} to quiesce.toml",
                field.to_uppercase()
            )));
        }
        Ok(())
    }

    /// Polling parameters for convergence waits.
    #[must_use]
    pub const fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.poll_interval_secs),
            continuous_target_occurrence: self.continuous_target_occurrence,
        }
    }

    /// Deadline budget for one operation.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Deadline budget for confirming one command.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Lock release policy selected by `release_when_satisfied`.
    #[must_use]
    pub const fn release_policy(&self) -> ReleasePolicy {
        if self.release_when_satisfied {
            ReleasePolicy::ReleaseWhenSatisfied
        } else {
            ReleasePolicy::HoldThroughRestore
        }
    }
}

/// Scaleway credentials derived from environment variables and
/// configuration files.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "SCW")]
pub struct ScalewayConfig {
    /// Secret key used for authentication. This value is required.
    pub secret_key: String,
    /// Zone used when a target omits one. Defaults to `fr-par-1`.
    #[ortho_config(default = "fr-par-1".to_owned())]
    pub default_zone: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
    section: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
        section: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
            section,
        }
    }
}

impl ScalewayConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to [{}] in quiesce.toml",
                metadata.description, metadata.env_var, metadata.toml_key, metadata.section
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("quiesce")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.secret_key,
            &FieldMetadata::new(
                "Scaleway API secret key",
                "SCW_SECRET_KEY",
                "secret_key",
                "scaleway",
            ),
        )?;
        Self::require_field(
            &self.default_zone,
            &FieldMetadata::new(
                "availability zone",
                "SCW_DEFAULT_ZONE",
                "default_zone",
                "scaleway",
            ),
        )?;
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a field holds a value outside its accepted range.
    #[error("invalid configuration value: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
