//! stackwright: Rust-native CloudFormation synthesis.
//!
//! Two stacks, one export contract. The foundation stack publishes its
//! storage URI and execution role ARN; the workload stack imports them by
//! name. BLAKE3 lock state records every synthesis.

pub mod app;
pub mod cli;
pub mod core;
pub mod error;
pub mod serve;
pub mod stacks;
pub mod tripwire;
