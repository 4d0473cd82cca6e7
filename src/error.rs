//! Crate-wide error type.

use thiserror::Error;

/// Everything that can stop a synthesis, plan, or serve run.
#[derive(Error, Debug)]
pub enum StackError {
    #[error("The environment is invalid: '{value}'. Must be one of [{allowed}]")]
    InvalidEnvironment { value: String, allowed: String },

    #[error("missing export(s): {}", .0.join(", "))]
    MissingExport(Vec<String>),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{} validation error(s): {}", .0.len(), .0.join("; "))]
    Validation(Vec<String>),

    #[error("duplicate logical id '{0}'")]
    DuplicateResource(String),

    #[error("duplicate output id '{0}'")]
    DuplicateOutput(String),

    #[error("export '{name}' is published by both '{first}' and '{second}'")]
    DuplicateExport {
        name: String,
        first: String,
        second: String,
    },

    #[error("'{from}' references unknown resource '{target}'")]
    UnknownReference { from: String, target: String },

    #[error("dependency cycle detected involving: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("unknown stack '{0}'")]
    UnknownStack(String),

    #[error("state error: {0}")]
    State(String),

    #[error("{0} drift finding(s)")]
    Drift(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

pub type Result<T> = std::result::Result<T, StackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_export_lists_names() {
        let e = StackError::MissingExport(vec!["A-Output".into(), "B-Output".into()]);
        assert_eq!(e.to_string(), "missing export(s): A-Output, B-Output");
    }

    #[test]
    fn test_validation_counts_errors() {
        let e = StackError::Validation(vec!["one".into(), "two".into()]);
        assert_eq!(e.to_string(), "2 validation error(s): one; two");
    }

    #[test]
    fn test_duplicate_output_names_outputs() {
        let e = StackError::DuplicateOutput("UriOutput".into());
        assert_eq!(e.to_string(), "duplicate output id 'UriOutput'");
    }

    #[test]
    fn test_cycle_names_members() {
        let e = StackError::DependencyCycle(vec!["a".into(), "b".into()]);
        assert!(e.to_string().contains("a, b"));
    }
}
