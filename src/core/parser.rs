//! Project file parsing and validation.
//!
//! Parses stackwright.yaml and validates structural constraints:
//! - Version must be "1.0"
//! - Prefix and stack names must be usable as logical ids / stack names
//! - Bucket stem must leave room for the environment suffix
//! - Endpoint sizing must be non-zero
//!
//! Address plans (CIDRs) are deliberately not checked; malformed ranges are
//! reported by the provisioning engine.

use super::types::*;
use crate::error::{Result, StackError};
use regex::Regex;
use std::path::Path;

/// Default project file name.
pub const PROJECT_FILE: &str = "stackwright.yaml";

/// Longest environment tag ("challenge") plus its separator.
const ENV_SUFFIX_MAX: usize = 10;

/// Provider limit on bucket names.
const BUCKET_NAME_MAX: usize = 63;

/// Maximum subnets, one per availability zone letter we hand out.
const MAX_SUBNETS: usize = 6;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a project file from disk.
pub fn parse_config_file(path: &Path) -> Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| StackError::InvalidConfig(format!("failed to read {}: {}", path.display(), e)))?;
    parse_config(&content)
}

/// Parse a project file from a string. Empty input yields the defaults.
pub fn parse_config(yaml: &str) -> Result<ProjectConfig> {
    if yaml.trim().is_empty() {
        return Ok(ProjectConfig::default());
    }
    serde_yaml_ng::from_str(yaml)
        .map_err(|e| StackError::InvalidConfig(format!("YAML parse error: {}", e)))
}

/// Load the project: an explicit path must exist; without one, the default
/// file is used when present and the built-in defaults otherwise.
pub fn load_project(file: Option<&Path>) -> Result<ProjectConfig> {
    match file {
        Some(path) => parse_config_file(path),
        None => {
            let default = Path::new(PROJECT_FILE);
            if default.exists() {
                parse_config_file(default)
            } else {
                tracing::debug!("no {} found, using built-in defaults", PROJECT_FILE);
                Ok(ProjectConfig::default())
            }
        }
    }
}

/// Load, then fail with every validation error at once.
pub fn load_and_validate(file: Option<&Path>) -> Result<ProjectConfig> {
    let config = load_project(file)?;
    let errors = validate_config(&config);
    if errors.is_empty() {
        Ok(config)
    } else {
        Err(StackError::Validation(
            errors.into_iter().map(|e| e.message).collect(),
        ))
    }
}

/// Fails closed: a pattern that does not compile matches nothing.
fn is_match(pattern: &str, value: &str) -> bool {
    match Regex::new(pattern) {
        Ok(re) => re.is_match(value),
        Err(e) => {
            tracing::error!(pattern, error = %e, "invalid built-in pattern");
            false
        }
    }
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &ProjectConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut push = |message: String| errors.push(ValidationError { message });

    if config.version != "1.0" {
        push(format!("version must be \"1.0\", got \"{}\"", config.version));
    }

    if !is_match(r"^[A-Za-z][A-Za-z0-9]*$", &config.prefix) {
        push(format!(
            "prefix '{}' must start with a letter and contain only letters and digits",
            config.prefix
        ));
    }

    if !is_match(r"^[a-z]{2}(-[a-z]+)+-[0-9]+$", &config.region) {
        push(format!("region '{}' is not a valid region name", config.region));
    }

    if !is_match(r"^[a-z0-9][a-z0-9.-]*[a-z0-9]$", &config.bucket_prefix) {
        push(format!(
            "bucket_prefix '{}' must be lowercase letters, digits, dots or hyphens",
            config.bucket_prefix
        ));
    }
    if config.bucket_prefix.len() + ENV_SUFFIX_MAX > BUCKET_NAME_MAX {
        push(format!(
            "bucket_prefix '{}' is too long: at most {} characters leave room for the environment",
            config.bucket_prefix,
            BUCKET_NAME_MAX - ENV_SUFFIX_MAX
        ));
    }

    if config.model_artifact_prefix.is_empty() || config.model_artifact_prefix.contains('/') {
        push(format!(
            "model_artifact_prefix '{}' must be a non-empty file stem",
            config.model_artifact_prefix
        ));
    }

    if config.image.trim().is_empty() {
        push("image must not be empty".to_string());
    }

    if config.instance_type.trim().is_empty() {
        push("instance_type must not be empty".to_string());
    }

    if config.instance_count == 0 {
        push("instance_count must be at least 1".to_string());
    }

    let subnets = config.network.subnet_cidrs.len();
    if subnets == 0 || subnets > MAX_SUBNETS {
        push(format!(
            "network.subnet_cidrs must list 1 to {} subnets, got {}",
            MAX_SUBNETS, subnets
        ));
    }

    for (label, name) in [
        ("stacks.foundation", &config.stacks.foundation),
        ("stacks.workload", &config.stacks.workload),
    ] {
        if !is_match(r"^[A-Za-z][A-Za-z0-9-]*$", name) {
            push(format!("{} '{}' is not a valid stack name", label, name));
        }
    }
    if config.stacks.foundation == config.stacks.workload {
        push(format!(
            "stacks.foundation and stacks.workload must differ, both are '{}'",
            config.stacks.foundation
        ));
    }

    errors
}
