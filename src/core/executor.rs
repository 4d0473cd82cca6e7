//! Synthesis run: the orchestration loop behind `stackwright synth`.
//!
//! Synthesizes stacks in deployment order:
//! settings → stacks → DAG → for each stack: render → write → hash → lock → events

use super::exports::ExportRegistry;
use super::state;
use super::types::*;
use crate::app::App;
use crate::error::Result;
use crate::tripwire::{eventlog, hasher};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// On-disk template encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TemplateFormat {
    #[default]
    Json,
    Yaml,
}

impl TemplateFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

/// Render a template in the given format.
pub fn render_template(template: &Template, format: TemplateFormat) -> Result<String> {
    match format {
        TemplateFormat::Json => {
            let mut out = serde_json::to_string_pretty(template)?;
            out.push('\n');
            Ok(out)
        }
        TemplateFormat::Yaml => Ok(serde_yaml_ng::to_string(template)?),
    }
}

/// `<out_dir>/<stack>.template.<ext>`
pub fn template_path(out_dir: &Path, stack: &str, format: TemplateFormat) -> PathBuf {
    out_dir.join(format!("{}.template.{}", stack, format.extension()))
}

/// Write a rendered template, creating the output directory if needed.
pub fn write_template(
    out_dir: &Path,
    stack: &str,
    template: &Template,
    format: TemplateFormat,
) -> Result<PathBuf> {
    std::fs::create_dir_all(out_dir)?;
    let path = template_path(out_dir, stack, format);
    std::fs::write(&path, render_template(template, format)?)?;
    Ok(path)
}

/// Configuration for a synthesis run.
pub struct SynthConfig<'a> {
    pub app: &'a App,
    pub out_dir: &'a Path,
    pub state_dir: &'a Path,
    pub format: TemplateFormat,
    pub stack_filter: Option<&'a str>,
}

/// Outcome of synthesizing one stack.
#[derive(Debug, Clone)]
pub struct SynthResult {
    pub stack: String,
    pub role: StackRole,
    pub path: PathBuf,
    pub resources: usize,
    pub outputs: usize,
    pub template_hash: String,
    pub duration: Duration,
}

/// Exports recorded for this environment, used when a workload is
/// synthesized without its foundation.
pub fn recorded_exports(state_dir: &Path, environment: &str) -> Result<ExportRegistry> {
    let locks = state::load_env_locks(state_dir, environment)?;
    tracing::debug!(environment, locks = locks.len(), "loaded recorded exports");
    Ok(ExportRegistry::from_locks(&locks))
}

/// In-memory synthesis: every stack, or only the filtered one.
pub fn synthesize(
    app: &App,
    state_dir: &Path,
    stack_filter: Option<&str>,
) -> Result<Vec<SynthesizedStack>> {
    match stack_filter {
        Some(name) => {
            let environment = app.settings().environment.to_string();
            let registry = recorded_exports(state_dir, &environment)?;
            Ok(vec![app.synth_stack(name, &registry)?])
        }
        None => app.synth_all(),
    }
}

/// Execute the synthesis loop.
pub fn synth(cfg: &SynthConfig) -> Result<Vec<SynthResult>> {
    let environment = cfg.app.settings().environment.to_string();
    let run_id = eventlog::generate_run_id();
    let stacks = synthesize(cfg.app, cfg.state_dir, cfg.stack_filter)?;

    let mut results = Vec::with_capacity(stacks.len());
    for stack in &stacks {
        let start = Instant::now();
        eventlog::append_event(
            cfg.state_dir,
            &environment,
            &stack.name,
            ProvenanceEvent::SynthStarted {
                stack: stack.name.clone(),
                run_id: run_id.clone(),
                environment: environment.clone(),
                stackwright_version: env!("CARGO_PKG_VERSION").to_string(),
            },
        )?;

        let path = write_template(cfg.out_dir, &stack.name, &stack.template, cfg.format)?;
        let lock = state::lock_for_template(
            &stack.name,
            &environment,
            &stack.template,
            &stack.resource_order,
            Some(&path),
        )?;
        let template_hash = match &lock.template {
            Some(t) => t.hash.clone(),
            None => hasher::hash_file(&path)?,
        };
        state::save_lock(cfg.state_dir, &lock)?;

        eventlog::append_event(
            cfg.state_dir,
            &environment,
            &stack.name,
            ProvenanceEvent::StackSynthesized {
                stack: stack.name.clone(),
                resources: u32::try_from(stack.template.resources.len()).unwrap_or(u32::MAX),
                outputs: u32::try_from(stack.template.outputs.len()).unwrap_or(u32::MAX),
                template_hash: template_hash.clone(),
            },
        )?;

        let duration = start.elapsed();
        eventlog::append_event(
            cfg.state_dir,
            &environment,
            &stack.name,
            ProvenanceEvent::SynthCompleted {
                stack: stack.name.clone(),
                run_id: run_id.clone(),
                total_seconds: duration.as_secs_f64(),
            },
        )?;

        tracing::info!(stack = %stack.name, path = %path.display(), "wrote template");
        results.push(SynthResult {
            stack: stack.name.clone(),
            role: stack.role,
            path,
            resources: stack.template.resources.len(),
            outputs: stack.template.outputs.len(),
            template_hash,
            duration,
        });
    }

    Ok(results)
}
