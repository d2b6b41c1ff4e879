pub mod commands;

use std::io;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use parley_core::config::{AppConfig, LogFormat};
use tracing::Level;

#[derive(Debug, Parser)]
#[command(
    name = "parley",
    about = "Parley prompt operator CLI",
    long_about = "Inspect prompt engine configuration and run typed prompts interactively.",
    after_help = "Examples:\n  parley config\n  parley ask --kind number --prompt \"How many seats?\"\n  parley ask --kind choice --prompt \"Pick a color.\" --choices \"Red|Green|Blue\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Run one prompt on the terminal and print the final outcome as JSON")]
    Ask(commands::ask::AskArgs),
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Ask(args) => {
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            commands::ask::run(args, stdin.lock(), &mut stdout)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays a clean conversation transcript plus JSON outcome.
pub(crate) fn init_logging(config: &AppConfig) {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(io::stderr);

    // A subscriber may already be installed when commands run in-process (tests).
    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
