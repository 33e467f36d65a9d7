//! Configuration validation.
//!
//! Serde handles syntax; these functions check semantics. Each returns
//! every problem it finds rather than stopping at the first one.

use std::fs;
use std::path::Path;

use crate::config::schema::{ListenerConfig, ProxyConfig, ServerConfig};

/// A single semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("max_connections must be greater than zero")]
    NoConnectionSlots,
    #[error("directory must be provided")]
    NoDirectories,
    #[error("directory does not exist: {0}")]
    MissingDirectory(String),
    #[error("can not use file as a directory: {0}")]
    NotADirectory(String),
    #[error("can't read from directory: {0}")]
    UnreadableDirectory(String),
    #[error("upstream address must be specified")]
    NoUpstream,
    #[error("upstream port must be non-zero")]
    ZeroUpstreamPort,
    #[error("relay_buffer_size must be greater than zero")]
    ZeroRelayBuffer,
}

/// Checks shared by every listening program.
pub fn validate_listener(config: &ListenerConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if config.max_connections == 0 {
        errors.push(ValidationError::NoConnectionSlots);
    }
    errors
}

/// Origin server checks: at least one readable directory.
pub fn validate_server(listener: &ListenerConfig, config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = validate_listener(listener);

    if config.directories.is_empty() {
        errors.push(ValidationError::NoDirectories);
    }
    for dir in &config.directories {
        if let Some(err) = check_directory(dir) {
            errors.push(err);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Proxy checks: an upstream must be configured.
pub fn validate_proxy(listener: &ListenerConfig, config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = validate_listener(listener);

    match config.upstream_host.as_deref() {
        Some(host) if !host.trim().is_empty() => {}
        _ => errors.push(ValidationError::NoUpstream),
    }
    if config.upstream_port == 0 {
        errors.push(ValidationError::ZeroUpstreamPort);
    }
    if config.relay_buffer_size == 0 {
        errors.push(ValidationError::ZeroRelayBuffer);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_directory(dir: &Path) -> Option<ValidationError> {
    let shown = dir.display().to_string();
    let metadata = match fs::metadata(dir) {
        Ok(metadata) => metadata,
        Err(_) => return Some(ValidationError::MissingDirectory(shown)),
    };
    if !metadata.is_dir() {
        return Some(ValidationError::NotADirectory(shown));
    }
    if fs::read_dir(dir).is_err() {
        return Some(ValidationError::UnreadableDirectory(shown));
    }
    None
}
