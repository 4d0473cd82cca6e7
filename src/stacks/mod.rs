//! Provisioning units: the foundation stack and the workload stack that
//! hosts a model on top of it.

pub mod foundation;
pub mod workload;

pub use foundation::FoundationStack;
pub use workload::WorkloadStack;

use crate::core::types::Template;

/// A synthesized template together with the values a stack hands to its
/// dependents.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesized<T> {
    pub template: Template,
    pub outputs: T,
}
