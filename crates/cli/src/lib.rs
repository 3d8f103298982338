pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "shipbot",
    about = "Shipbot operator CLI",
    long_about = "Try the mention parser offline, run a live shipping quote, and inspect configuration.",
    after_help = "Examples:\n  shipbot parse \"2 kg from Oslo to Tokyo\"\n  shipbot quote \"3lb from New York to London\"\n  shipbot config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Parse a message into a shipping query without calling any service")]
    Parse {
        #[arg(help = "Message text, as it would appear in a mention")]
        message: String,
    },
    #[command(about = "Run the full quote pipeline against the configured services")]
    Quote {
        #[arg(help = "Message text, as it would appear in a mention")]
        message: String,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Parse { message } => commands::parse::run(&message),
        Command::Quote { message } => commands::quote::run(&message),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
