//! Drift detection: compare written template files to their lock hashes.

use crate::core::types::StateLock;
use crate::tripwire::hasher;
use std::path::Path;

/// A single drift finding.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftFinding {
    pub stack: String,
    pub path: String,
    pub expected_hash: String,
    pub actual_hash: String,
    pub detail: String,
}

/// Check one file against the hash recorded at synthesis time.
pub fn check_file_drift(stack: &str, path: &str, expected_hash: &str) -> Option<DriftFinding> {
    let file_path = Path::new(path);
    if !file_path.exists() {
        return Some(DriftFinding {
            stack: stack.to_string(),
            path: path.to_string(),
            expected_hash: expected_hash.to_string(),
            actual_hash: "MISSING".to_string(),
            detail: format!("{} does not exist", path),
        });
    }

    let actual = hasher::hash_file(file_path).unwrap_or_else(|e| format!("ERROR:{}", e));
    if actual == expected_hash {
        return None;
    }
    Some(DriftFinding {
        stack: stack.to_string(),
        path: path.to_string(),
        expected_hash: expected_hash.to_string(),
        actual_hash: actual,
        detail: format!("{} edited since synthesis", path),
    })
}

/// Check the template recorded in a lock. Locks without a written template
/// have nothing to compare.
pub fn detect_drift(lock: &StateLock) -> Option<DriftFinding> {
    let template = lock.template.as_ref()?;
    check_file_drift(&lock.stack, &template.path, &template.hash)
}
