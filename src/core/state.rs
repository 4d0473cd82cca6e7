//! Lock file management: load, save (atomic), path derivation, and
//! recording a synthesized stack.

use super::exports::template_exports;
use super::types::{ResourceLock, StateLock, Template, TemplateLock};
use crate::error::{Result, StackError};
use crate::tripwire::hasher;
use std::path::{Path, PathBuf};

/// State directory of one environment.
pub fn env_state_dir(state_dir: &Path, environment: &str) -> PathBuf {
    state_dir.join(environment)
}

/// Derive the lock file path for a stack of one environment.
pub fn lock_file_path(state_dir: &Path, environment: &str, stack: &str) -> PathBuf {
    env_state_dir(state_dir, environment)
        .join(stack)
        .join("state.lock.yaml")
}

/// Load a lock file for a stack. Returns None if the file doesn't exist.
pub fn load_lock(state_dir: &Path, environment: &str, stack: &str) -> Result<Option<StateLock>> {
    let path = lock_file_path(state_dir, environment, stack);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| StackError::State(format!("cannot read {}: {}", path.display(), e)))?;
    let lock: StateLock = serde_yaml_ng::from_str(&content)
        .map_err(|e| StackError::State(format!("invalid lock file {}: {}", path.display(), e)))?;
    Ok(Some(lock))
}

/// Sorted names of the subdirectories of `dir`. A missing directory has none.
fn subdirs(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(dir)
        .map_err(|e| StackError::State(format!("cannot read state dir {}: {}", dir.display(), e)))?;

    let mut names: Vec<String> = entries
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    Ok(names)
}

/// Load every lock recorded for one environment, sorted by stack name.
pub fn load_env_locks(state_dir: &Path, environment: &str) -> Result<Vec<StateLock>> {
    let mut locks = Vec::new();
    for stack in subdirs(&env_state_dir(state_dir, environment))? {
        if let Some(lock) = load_lock(state_dir, environment, &stack)? {
            locks.push(lock);
        }
    }
    Ok(locks)
}

/// Load every lock under the state directory, sorted by environment and
/// then stack name. A missing state directory yields no locks.
pub fn load_all_locks(state_dir: &Path) -> Result<Vec<StateLock>> {
    let mut locks = Vec::new();
    for environment in subdirs(state_dir)? {
        locks.extend(load_env_locks(state_dir, &environment)?);
    }
    Ok(locks)
}

/// Save a lock file atomically (write to temp, then rename).
pub fn save_lock(state_dir: &Path, lock: &StateLock) -> Result<()> {
    let path = lock_file_path(state_dir, &lock.environment, &lock.stack);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| StackError::State(format!("cannot create dir {}: {}", parent.display(), e)))?;
    }

    let yaml = serde_yaml_ng::to_string(lock)?;

    let tmp_path = path.with_extension("lock.yaml.tmp");
    std::fs::write(&tmp_path, &yaml)
        .map_err(|e| StackError::State(format!("cannot write {}: {}", tmp_path.display(), e)))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| {
        StackError::State(format!(
            "cannot rename {} → {}: {}",
            tmp_path.display(),
            path.display(),
            e
        ))
    })?;

    tracing::debug!(
        stack = %lock.stack,
        environment = %lock.environment,
        path = %path.display(),
        "saved lock"
    );
    Ok(())
}

/// Create a new empty lock for a stack.
pub fn new_lock(stack: &str, environment: &str) -> StateLock {
    use crate::tripwire::eventlog::now_iso8601;
    StateLock {
        schema: "1.0".to_string(),
        stack: stack.to_string(),
        environment: environment.to_string(),
        generated_at: now_iso8601(),
        generator: format!("stackwright {}", env!("CARGO_PKG_VERSION")),
        blake3_version: "1.8".to_string(),
        template: None,
        resources: indexmap::IndexMap::new(),
        exports: indexmap::IndexMap::new(),
    }
}

/// Build the lock describing a synthesized template. `order` fixes the
/// resource ordering; `written` is the template file, if one was written.
/// The template path is recorded in canonical form.
pub fn lock_for_template(
    stack: &str,
    environment: &str,
    template: &Template,
    order: &[String],
    written: Option<&Path>,
) -> Result<StateLock> {
    let mut lock = new_lock(stack, environment);
    for id in order {
        if let Some(decl) = template.resources.get(id) {
            lock.resources.insert(
                id.clone(),
                ResourceLock {
                    resource_type: decl.kind,
                    hash: hasher::hash_json(decl)?,
                },
            );
        }
    }
    for (name, value) in template_exports(template) {
        lock.exports.insert(name, value);
    }
    if let Some(path) = written {
        let canonical = std::fs::canonicalize(path).map_err(|e| {
            StackError::State(format!("cannot resolve {}: {}", path.display(), e))
        })?;
        lock.template = Some(TemplateLock {
            path: canonical.display().to_string(),
            hash: hasher::hash_file(&canonical)?,
        });
    }
    Ok(lock)
}
