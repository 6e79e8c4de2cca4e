mod commands;
mod config;
mod replay;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{diff, review, DiffArgs, ReviewArgs};
use tracing_subscriber::EnvFilter;

/// Redline - review and apply suggested edits to structured reports
#[derive(Parser, Debug)]
#[command(name = "redline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show a reviewable diff between two text files
    Diff(DiffArgs),

    /// Propose a suggestion against a document section and optionally apply it
    Review(ReviewArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match std::env::current_dir() {
        Ok(dir) => {
            let cwd = dir.display().to_string();
            match cli.command {
                Command::Diff(args) => diff(args, &cwd),
                Command::Review(args) => review(args, &cwd).await,
            }
        }
        Err(err) => Err(anyhow::anyhow!("Cannot get current directory: {}", err)),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
