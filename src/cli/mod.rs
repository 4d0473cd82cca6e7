//! CLI subcommands: init, validate, synth, plan, order, drift, status, serve.

use crate::app::App;
use crate::core::environment::Settings;
use crate::core::executor::{self, SynthConfig, TemplateFormat};
use crate::core::resolver::StackGraph;
use crate::core::{parser, planner, state, types};
use crate::error::{Result, StackError};
use crate::serve;
use crate::tripwire::{drift, eventlog};
use clap::Subcommand;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new stackwright project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate stackwright.yaml without synthesizing
    Validate {
        /// Path to stackwright.yaml (default: ./stackwright.yaml if present)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Synthesize templates and record lock state
    Synth {
        /// Path to stackwright.yaml (default: ./stackwright.yaml if present)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Deployment environment (overrides ENV)
        #[arg(short, long)]
        env: Option<String>,

        /// Synthesize a single stack
        #[arg(short, long)]
        stack: Option<String>,

        /// Template output directory
        #[arg(short, long, default_value = "cdk.out")]
        out: PathBuf,

        /// Template encoding
        #[arg(long, value_enum, default_value_t = TemplateFormat::Json)]
        format: TemplateFormat,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,
    },

    /// Show what the provisioning engine would change (diff against locks)
    Plan {
        /// Path to stackwright.yaml (default: ./stackwright.yaml if present)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Deployment environment (overrides ENV)
        #[arg(short, long)]
        env: Option<String>,

        /// Plan a single stack
        #[arg(short, long)]
        stack: Option<String>,

        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,
    },

    /// Show stack deployment order and the exports linking them
    Order {
        /// Path to stackwright.yaml (default: ./stackwright.yaml if present)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Deployment environment (overrides ENV)
        #[arg(short, long)]
        env: Option<String>,
    },

    /// Detect templates edited since synthesis (tripwire)
    Drift {
        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Exit non-zero on any drift (for CI/cron)
        #[arg(long)]
        tripwire: bool,
    },

    /// Show current state from lock files
    Status {
        /// State directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,
    },

    /// Run the stub inference server
    Serve {
        /// Bind address
        #[arg(long, default_value_t = serve::DEFAULT_ADDR.ip())]
        host: IpAddr,

        /// Bind port
        #[arg(short, long, default_value_t = serve::DEFAULT_ADDR.port())]
        port: u16,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(file.as_deref()),
        Commands::Synth {
            file,
            env,
            stack,
            out,
            format,
            state_dir,
        } => cmd_synth(
            file.as_deref(),
            env.as_deref(),
            stack.as_deref(),
            &out,
            format,
            &state_dir,
        ),
        Commands::Plan {
            file,
            env,
            stack,
            state_dir,
        } => cmd_plan(file.as_deref(), env.as_deref(), stack.as_deref(), &state_dir),
        Commands::Order { file, env } => cmd_order(file.as_deref(), env.as_deref()),
        Commands::Drift {
            state_dir,
            tripwire,
        } => cmd_drift(&state_dir, tripwire),
        Commands::Status { state_dir } => cmd_status(&state_dir),
        Commands::Serve { host, port } => cmd_serve(SocketAddr::new(host, port)),
    }
}

fn cmd_init(path: &Path) -> Result<()> {
    let config_path = path.join(parser::PROJECT_FILE);
    if config_path.exists() {
        return Err(StackError::InvalidConfig(format!(
            "{} already exists",
            config_path.display()
        )));
    }

    let state_dir = path.join("state");
    std::fs::create_dir_all(&state_dir)?;

    let template = r#"version: "1.0"
prefix: Idriss
region: eu-central-1
bucket_prefix: idriss-s3-bucket-swisscom-challenge
model_artifact_prefix: idriss-model
instance_type: ml.t2.medium
instance_count: 1

network:
  vpc_cidr: 172.30.255.0/24
  subnet_cidrs:
    - 172.30.255.0/25
    - 172.30.255.128/25

stacks:
  foundation: InfraStack
  workload: ModelStack

studio: true
public_bucket: false
"#;
    std::fs::write(&config_path, template)?;

    println!("Initialized stackwright project at {}", path.display());
    println!("  Created: {}", config_path.display());
    println!("  Created: {}/", state_dir.display());
    Ok(())
}

fn cmd_validate(file: Option<&Path>) -> Result<()> {
    let config = parser::load_project(file)?;
    let errors = parser::validate_config(&config);

    if errors.is_empty() {
        println!(
            "OK: {} ({} + {}, region {})",
            config.prefix, config.stacks.foundation, config.stacks.workload, config.region
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(StackError::Validation(
            errors.into_iter().map(|e| e.message).collect(),
        ))
    }
}

/// Load and validate the project, run the environment gate and announce it.
fn resolve_settings(file: Option<&Path>, env: Option<&str>) -> Result<Settings> {
    let project = parser::load_and_validate(file)?;
    let settings = Settings::resolve(project, env)?;
    println!("{}", settings.notice());
    Ok(settings)
}

fn cmd_synth(
    file: Option<&Path>,
    env: Option<&str>,
    stack: Option<&str>,
    out: &Path,
    format: TemplateFormat,
    state_dir: &Path,
) -> Result<()> {
    let settings = resolve_settings(file, env)?;
    let app = App::new(settings);

    let results = executor::synth(&SynthConfig {
        app: &app,
        out_dir: out,
        state_dir,
        format,
        stack_filter: stack,
    })?;

    for result in &results {
        println!(
            "{} [{}]: {} resources, {} outputs -> {} ({:.3}s)",
            result.stack,
            result.role,
            result.resources,
            result.outputs,
            result.path.display(),
            result.duration.as_secs_f64()
        );
    }
    println!();
    println!("Synthesized {} stack(s).", results.len());
    Ok(())
}

fn cmd_plan(
    file: Option<&Path>,
    env: Option<&str>,
    stack: Option<&str>,
    state_dir: &Path,
) -> Result<()> {
    let settings = resolve_settings(file, env)?;
    let plan = plan_app(&App::new(settings), state_dir, stack)?;
    print_plan(&plan);
    Ok(())
}

/// Synthesize in memory and diff against the locks of the same environment.
fn plan_app(app: &App, state_dir: &Path, stack: Option<&str>) -> Result<types::ExecutionPlan> {
    let environment = app.settings().environment.as_str();
    let stacks = executor::synthesize(app, state_dir, stack)?;

    // Load existing locks so plan shows accurate Create vs Update vs NoOp
    let locks = load_stack_locks(&stacks, state_dir, environment)?;
    planner::plan(environment, &stacks, &locks)
}

/// Load lock files for the given stacks.
fn load_stack_locks(
    stacks: &[types::SynthesizedStack],
    state_dir: &Path,
    environment: &str,
) -> Result<HashMap<String, types::StateLock>> {
    let mut locks = HashMap::new();
    for stack in stacks {
        if let Some(lock) = state::load_lock(state_dir, environment, &stack.name)? {
            locks.insert(stack.name.clone(), lock);
        }
    }
    Ok(locks)
}

fn plan_lines(plan: &types::ExecutionPlan) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Planning: {} ({} resources, order: {})",
            plan.environment,
            plan.changes.len(),
            plan.stack_order.join(" -> ")
        ),
        String::new(),
    ];

    let mut current_stack = "";
    for change in &plan.changes {
        if change.stack != current_stack {
            current_stack = change.stack.as_str();
            lines.push(format!("{}:", current_stack));
        }
        let symbol = match change.action {
            types::PlanAction::Create => "+",
            types::PlanAction::Update => "~",
            types::PlanAction::Delete => "-",
            types::PlanAction::NoOp => " ",
        };
        lines.push(format!("  {} {}", symbol, change.description));
    }

    lines.push(String::new());
    lines.push(format!(
        "Plan: {} to add, {} to change, {} to destroy, {} unchanged.",
        plan.to_create, plan.to_update, plan.to_delete, plan.unchanged
    ));
    lines
}

/// Display a plan to stdout.
fn print_plan(plan: &types::ExecutionPlan) {
    for line in plan_lines(plan) {
        println!("{}", line);
    }
}

fn cmd_order(file: Option<&Path>, env: Option<&str>) -> Result<()> {
    let settings = resolve_settings(file, env)?;
    let graph = App::new(settings).stack_graph()?;
    for line in order_lines(&graph) {
        println!("{}", line);
    }
    Ok(())
}

fn order_lines(graph: &StackGraph) -> Vec<String> {
    let mut lines: Vec<String> = graph
        .order
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{}. {}", i + 1, name))
        .collect();
    if !graph.edges.is_empty() {
        lines.push(String::new());
        lines.push("Exports:".to_string());
        for (exporter, importer, name) in &graph.edges {
            lines.push(format!("  {} -> {} ({})", exporter, importer, name));
        }
    }
    for (importer, name) in &graph.external_imports {
        lines.push(format!(
            "  ? -> {} ({}, not exported by any stack)",
            importer, name
        ));
    }
    lines
}

fn cmd_drift(state_dir: &Path, tripwire_mode: bool) -> Result<()> {
    let mut total_drift = 0;

    for lock in state::load_all_locks(state_dir)? {
        println!("Checking {} ({})...", lock.stack, lock.environment);
        match drift::detect_drift(&lock) {
            None => println!("  No drift detected."),
            Some(f) => {
                println!("  DRIFTED: {}", f.detail);
                println!("    Expected: {}", f.expected_hash);
                println!("    Actual:   {}", f.actual_hash);
                eventlog::append_event(
                    state_dir,
                    &lock.environment,
                    &lock.stack,
                    types::ProvenanceEvent::DriftDetected {
                        stack: f.stack.clone(),
                        path: f.path.clone(),
                        expected_hash: f.expected_hash.clone(),
                        actual_hash: f.actual_hash.clone(),
                    },
                )?;
                total_drift += 1;
            }
        }
    }

    if total_drift > 0 {
        println!();
        println!("Drift detected: {} template(s)", total_drift);
        if tripwire_mode {
            return Err(StackError::Drift(total_drift));
        }
    } else {
        println!("No drift detected.");
    }

    Ok(())
}

fn cmd_status(state_dir: &Path) -> Result<()> {
    for line in status_lines(&state::load_all_locks(state_dir)?) {
        println!("{}", line);
    }
    Ok(())
}

fn status_lines(locks: &[types::StateLock]) -> Vec<String> {
    if locks.is_empty() {
        return vec!["No state found. Run `stackwright synth` first.".to_string()];
    }

    let mut lines = Vec::new();
    for lock in locks {
        lines.push(format!("Stack: {} ({})", lock.stack, lock.environment));
        lines.push(format!("  Generated: {}", lock.generated_at));
        lines.push(format!("  Generator: {}", lock.generator));
        if let Some(template) = &lock.template {
            lines.push(format!("  Template:  {}", template.path));
        }
        lines.push(format!("  Resources: {}", lock.resources.len()));
        for (id, rl) in &lock.resources {
            lines.push(format!("    {}: [{}]", id, rl.resource_type));
        }
        for (name, value) in &lock.exports {
            lines.push(format!("  Export: {} = {}", name, value));
        }
        lines.push(String::new());
    }
    lines
}

fn cmd_serve(addr: SocketAddr) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve::run(addr))
}
