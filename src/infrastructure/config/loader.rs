//! Hierarchical configuration loading (`spec.md` §6, SPEC_FULL.md §6).
//!
//! Grounded on the teacher's `infrastructure/config/loader.rs`: same
//! Figment precedence chain, same "validate once after extraction" shape.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

#[derive(Error, Debug)]
pub enum ConfigValidationError {
    #[error("concurrency.global_ceiling must be at least 1")]
    InvalidCeiling,

    #[error("rate_limit.per_op[{0:?}].per_minute must be positive")]
    InvalidRateLimit(crate::domain::models::OpKind),

    #[error("rate_limit.burst_cap must be at least 1")]
    InvalidBurstCap,

    #[error("retry.max_attempts cannot be 0")]
    InvalidMaxAttempts,

    #[error("retry.backoff_base_secs ({0}) must be less than retry.backoff_cap_secs ({1})")]
    InvalidBackoff(u64, u64),

    #[error("logging.level must be one of trace,debug,info,warn,error, got '{0}'")]
    InvalidLogLevel(String),

    #[error("logging.format must be one of json,pretty, got '{0}'")]
    InvalidLogFormat(String),

    #[error("persistence.pipeline_state_path cannot be empty")]
    EmptyPipelineStatePath,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (`Config::default`)
    /// 2. `.agent-forge/config.yaml` (project config)
    /// 3. `.agent-forge/local.yaml` (optional local overrides)
    /// 4. `AGENT_FORGE_`-prefixed environment variables (highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".agent-forge/config.yaml"))
            .merge(Yaml::file(".agent-forge/local.yaml"))
            .merge(Env::prefixed("AGENT_FORGE_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<(), ConfigValidationError> {
        if config.concurrency.global_ceiling == 0 {
            return Err(ConfigValidationError::InvalidCeiling);
        }
        for (op_kind, limits) in &config.rate_limit.per_op {
            if limits.per_minute == 0 {
                return Err(ConfigValidationError::InvalidRateLimit(*op_kind));
            }
        }
        if config.rate_limit.burst_cap == 0 {
            return Err(ConfigValidationError::InvalidBurstCap);
        }
        if config.retry.max_attempts == 0 {
            return Err(ConfigValidationError::InvalidMaxAttempts);
        }
        if config.retry.backoff_base_secs >= config.retry.backoff_cap_secs {
            return Err(ConfigValidationError::InvalidBackoff(
                config.retry.backoff_base_secs,
                config.retry.backoff_cap_secs,
            ));
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigValidationError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigValidationError::InvalidLogFormat(config.logging.format.clone()));
        }
        if config.persistence.pipeline_state_path.is_empty() {
            return Err(ConfigValidationError::EmptyPipelineStatePath);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = Config::default();
        ConfigLoader::validate(&config).expect("defaults must validate");
    }

    #[test]
    fn rejects_zero_ceiling() {
        let mut config = Config::default();
        config.concurrency.global_ceiling = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigValidationError::InvalidCeiling)
        ));
    }

    #[test]
    fn rejects_zero_per_minute_override() {
        let mut config = Config::default();
        config.rate_limit.per_op.insert(
            crate::domain::models::OpKind::IssueComment,
            crate::domain::models::config::OpWindowLimits {
                per_minute: 0,
                ..Default::default()
            },
        );
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigValidationError::InvalidRateLimit(crate::domain::models::OpKind::IssueComment))
        ));
    }

    #[test]
    fn rejects_backoff_base_not_less_than_cap() {
        let mut config = Config::default();
        config.retry.backoff_base_secs = 600;
        config.retry.backoff_cap_secs = 600;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigValidationError::InvalidBackoff(600, 600))
        ));
    }

    #[test]
    fn rejects_bad_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigValidationError::InvalidLogLevel(_))
        ));
    }
}
