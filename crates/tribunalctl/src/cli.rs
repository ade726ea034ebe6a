//! Command-line argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tribunal - adversarial audits of agent repositories
#[derive(Parser, Debug)]
#[command(name = "tribunalctl")]
#[command(about = "Tribunal - evidence-first audits of agent repositories", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Config file (defaults to ./tribunal.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Audit a repository and print the verdict
    Run {
        /// Local path or git URL of the repository under audit
        #[arg(long)]
        repo: String,

        /// Branch to clone for a git URL
        #[arg(long)]
        branch: Option<String>,

        /// Auxiliary document to analyse (markdown or text)
        #[arg(long)]
        doc: Option<PathBuf>,

        /// Write the markdown report here
        #[arg(long)]
        output: Option<PathBuf>,

        /// Print the full outcome as JSON instead of a summary
        #[arg(long)]
        json: bool,

        /// Print each stage as it completes
        #[arg(long)]
        trace: bool,
    },

    /// Manage configuration
    Config {
        /// Write the default config to this path
        #[arg(long)]
        init: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_arguments() {
        let cli = Cli::parse_from([
            "tribunalctl",
            "run",
            "--repo",
            "https://github.com/acme/agent.git",
            "--branch",
            "main",
            "--doc",
            "report.md",
            "--json",
        ]);
        match cli.command {
            Commands::Run { repo, branch, doc, json, trace, output } => {
                assert_eq!(repo, "https://github.com/acme/agent.git");
                assert_eq!(branch.as_deref(), Some("main"));
                assert_eq!(doc, Some(PathBuf::from("report.md")));
                assert!(json);
                assert!(!trace);
                assert!(output.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["tribunalctl", "config", "--init", "out.toml", "--config", "x.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(cli.command, Commands::Config { .. }));
    }

    #[test]
    fn test_repo_is_required() {
        assert!(Cli::try_parse_from(["tribunalctl", "run", "--doc", "a.md"]).is_err());
    }
}
