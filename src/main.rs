//! stackwright CLI: CloudFormation synthesis for the foundation and workload stacks.

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "stackwright",
    version,
    about = "Rust-native CloudFormation synthesis: typed cross-stack exports, BLAKE3 state, stub inference server"
)]
struct Cli {
    #[command(subcommand)]
    command: stackwright::cli::Commands,
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; command output stays on stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = stackwright::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
