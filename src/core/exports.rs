//! Cross-stack export contract.
//!
//! The foundation stack publishes two named values; the workload stack
//! imports them by the exact same names. [`ExportContract`] is the only place
//! those names are spelled, [`FoundationOutputs`] is the typed handle passed
//! between stacks, and [`ExportRegistry`] is the name → value namespace the
//! provisioning engine resolves imports against.

use super::template::StackValue;
use super::types::{StateLock, Template};
use crate::error::{Result, StackError};
use indexmap::IndexMap;

/// Export names shared by producer and consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportContract {
    prefix: String,
}

impl ExportContract {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// `<prefix>-S3-URI-Output`
    pub fn storage_uri(&self) -> String {
        format!("{}-S3-URI-Output", self.prefix)
    }

    /// `<prefix>-Execution-Role-ARN-Output`
    pub fn execution_role_arn(&self) -> String {
        format!("{}-Execution-Role-ARN-Output", self.prefix)
    }

    /// Output logical id carrying the storage URI.
    pub fn storage_uri_output_id(&self) -> String {
        format!("{}S3URIOutput", self.prefix)
    }

    /// Output logical id carrying the execution role ARN.
    pub fn execution_role_arn_output_id(&self) -> String {
        format!("{}ExecutionRoleARNOutput", self.prefix)
    }

    /// Every export name the contract defines.
    pub fn names(&self) -> Vec<String> {
        vec![self.storage_uri(), self.execution_role_arn()]
    }
}

/// Values the foundation stack hands to its dependents.
#[derive(Debug, Clone, PartialEq)]
pub struct FoundationOutputs {
    pub storage_uri: StackValue,
    pub execution_role_arn: StackValue,
}

impl FoundationOutputs {
    /// Consumer-side view: both values resolved by name at provisioning time.
    pub fn imported(contract: &ExportContract) -> Self {
        Self {
            storage_uri: StackValue::Import(contract.storage_uri()),
            execution_role_arn: StackValue::Import(contract.execution_role_arn()),
        }
    }
}

/// Name → value namespace of published exports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportRegistry {
    exports: IndexMap<String, String>,
}

impl ExportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.exports.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.exports.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.exports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }

    /// Collect exports recorded in lock files.
    pub fn from_locks<'a>(locks: impl IntoIterator<Item = &'a StateLock>) -> Self {
        let mut registry = Self::new();
        for lock in locks {
            for (name, value) in &lock.exports {
                registry.insert(name.clone(), value.clone());
            }
        }
        registry
    }

    /// Collect exports declared by a template's outputs.
    pub fn from_template(template: &Template) -> Self {
        let mut registry = Self::new();
        for (name, value) in template_exports(template) {
            registry.insert(name, value);
        }
        registry
    }

    /// Fail unless every name in the contract is present.
    pub fn require(&self, contract: &ExportContract) -> Result<()> {
        let missing: Vec<String> = contract
            .names()
            .into_iter()
            .filter(|name| !self.exports.contains_key(name))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(StackError::MissingExport(missing))
        }
    }
}

/// Exported (name, value) pairs of a template. Non-literal values are kept as
/// their compact JSON form.
pub fn template_exports(template: &Template) -> Vec<(String, String)> {
    template
        .outputs
        .values()
        .filter_map(|output| {
            let export = output.export.as_ref()?;
            let value = match &output.value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((export.name.clone(), value))
        })
        .collect()
}
