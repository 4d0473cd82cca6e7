//! Environment gate: the single deployment-environment tag every stack is
//! qualified with.
//!
//! The tag comes from the `ENV` process variable (default `challenge`) or an
//! explicit override, and must be one of a fixed allow-list. Resolution
//! happens once, in [`Settings::resolve`], before anything is declared.

use super::types::ProjectConfig;
use crate::error::{Result, StackError};
use std::fmt;
use std::str::FromStr;

/// Process variable holding the environment tag.
pub const ENV_VAR: &str = "ENV";

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Environment {
    #[default]
    Challenge,
    Dev,
    Qa,
    Uat,
    Prod,
}

impl Environment {
    /// Allow-list, in declaration order.
    pub const ALL: [Environment; 5] = [
        Environment::Challenge,
        Environment::Dev,
        Environment::Qa,
        Environment::Uat,
        Environment::Prod,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Challenge => "challenge",
            Self::Dev => "dev",
            Self::Qa => "qa",
            Self::Uat => "uat",
            Self::Prod => "prod",
        }
    }

    /// Read the tag from `ENV`. Absent means the default; present but empty
    /// is rejected like any other non-member.
    pub fn from_env() -> Result<Self> {
        match std::env::var(ENV_VAR) {
            Ok(value) => value.parse(),
            Err(std::env::VarError::NotPresent) => Ok(Self::default()),
            Err(std::env::VarError::NotUnicode(raw)) => {
                Err(invalid(&raw.to_string_lossy()))
            }
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|env| env.as_str() == s)
            .ok_or_else(|| invalid(s))
    }
}

fn invalid(value: &str) -> StackError {
    StackError::InvalidEnvironment {
        value: value.to_string(),
        allowed: Environment::ALL
            .iter()
            .map(|e| e.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Resolved configuration handed by value to every stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub environment: Environment,
    pub project: ProjectConfig,
}

impl Settings {
    /// Run the environment gate and pair the result with the project config.
    /// An explicit override wins over `ENV`.
    pub fn resolve(project: ProjectConfig, env_override: Option<&str>) -> Result<Self> {
        let environment = match env_override {
            Some(value) => value.parse()?,
            None => Environment::from_env()?,
        };
        tracing::info!(environment = %environment, "resolved deployment environment");
        Ok(Self {
            environment,
            project,
        })
    }

    /// Settings for a known environment with default project values.
    pub fn for_env(environment: Environment) -> Self {
        Self {
            environment,
            project: ProjectConfig::default(),
        }
    }

    /// Human-readable notice of the resolved environment.
    pub fn notice(&self) -> String {
        format!("Deploying to environment: {}.", self.environment)
    }
}
