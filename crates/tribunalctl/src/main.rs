//! Tribunal Control - CLI for running audits
//!
//! Exit codes: 0 clean verdict, 2 verdict with evidence gaps, 1 aborted run,
//! 64 configuration error.

mod cli;
mod commands;
mod output;

use clap::Parser;
use cli::Cli;
use tracing::error;
use tracing_subscriber::EnvFilter;
use tribunal_common::AuditError;

fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<AuditError>())
        .map(AuditError::exit_code)
        .unwrap_or(1)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = commands::dispatch(cli.command, cli.config.as_deref()).await;

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            exit_code(&e)
        }
    };
    std::process::exit(code);
}
