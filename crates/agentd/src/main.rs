// SPDX-License-Identifier: Apache-2.0

//! Thin process entrypoint (spec SPEC_FULL §10.4): parses a config path,
//! builds every component, and runs until interrupted. Deliberately
//! minimal — it proves the wiring compiles and runs; it does not implement
//! signal handling, daemonization, or hot-reload orchestration, which are
//! external collaborators per spec.md §1.

mod wiring;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "conduit-agentd", about = "Observability collection agent")]
struct Args {
    /// Path to the agent's YAML configuration file.
    #[arg(long)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let yaml = match std::fs::read_to_string(&args.config) {
        Ok(yaml) => yaml,
        Err(error) => {
            tracing::error!(path = %args.config.display(), %error, "failed to read config file");
            return ExitCode::FAILURE;
        }
    };

    let config = match conduit_config::AgentConfig::from_yaml(&yaml) {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "failed to parse config file");
            return ExitCode::FAILURE;
        }
    };

    let errors = config.validate();
    if !errors.is_empty() {
        for error in &errors {
            tracing::error!(%error, "invalid configuration");
        }
        return ExitCode::FAILURE;
    }

    wiring::run_until_shutdown(config, shutdown_signal()).await;
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("failed to install ctrl-c handler, running without a shutdown signal");
        std::future::pending::<()>().await;
    }
}
