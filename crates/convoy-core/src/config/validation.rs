//! Configuration validation

use globset::Glob;
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::types::VersionMode;

use super::types::Config;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    debug!("validating configuration");
    validate_versioning(config)?;
    validate_git(config)?;
    validate_publish(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

fn validate_versioning(config: &Config) -> Result<()> {
    if config.versioning.tag_prefix.chars().any(char::is_whitespace) {
        return Err(invalid("versioning.tag_prefix", "must not contain whitespace").into());
    }

    if let Some(version) = &config.version {
        semver::Version::parse(version)
            .map_err(|e| invalid("version", format!("'{}' is not valid semver: {}", version, e)))?;
    }

    if config.versioning.mode == VersionMode::Fixed && config.version.is_none() {
        debug!("fixed mode without a recorded version; package versions will seed it");
    }

    Ok(())
}

fn validate_git(config: &Config) -> Result<()> {
    if config.git.push && config.git.remote.is_empty() {
        return Err(invalid("git.remote", "remote cannot be empty when pushing").into());
    }

    for pattern in &config.git.allow_branches {
        Glob::new(pattern).map_err(|e| invalid("git.allow_branches", e.to_string()))?;
    }

    Ok(())
}

fn validate_publish(config: &Config) -> Result<()> {
    if config.publish.concurrency == 0 {
        return Err(invalid("publish.concurrency", "must be at least 1").into());
    }

    if config.publish.dist_tag.trim().is_empty() {
        return Err(invalid("publish.dist_tag", "cannot be empty").into());
    }

    // npm refuses dist-tags that parse as versions
    if semver::Version::parse(config.publish.dist_tag.trim_start_matches('v')).is_ok() {
        return Err(invalid("publish.dist_tag", "cannot be a valid semver version").into());
    }

    for pattern in &config.publish.ignore_changes {
        Glob::new(pattern).map_err(|e| invalid("publish.ignore_changes", e.to_string()))?;
    }

    Ok(())
}
