//! retrorestore — batch restoration of old photographs.
//!
//! # Usage
//!
//! ```text
//! retrorestore restore <PATH>... [--out DIR] [--json] [--max-concurrency N] [--api-key KEY]
//! retrorestore session [--out DIR] [--api-key KEY]
//! retrorestore key set|status|clear
//! retrorestore config show|init
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    config::ConfigCommand, key::KeyCommand, restore::RestoreArgs, session::SessionArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "retrorestore",
    version,
    about = "Restore old photographs with a generative image model",
    long_about = None,
)]
struct Cli {
    /// Write logs to stderr as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Restore image files and directories, then save the results.
    Restore(RestoreArgs),

    /// Interactive session: add, restore, remove and download while requests run.
    Session(SessionArgs),

    /// Manage the stored API key.
    Key {
        #[command(subcommand)]
        command: KeyCommand,
    },

    /// Show or initialize the configuration file.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    retro_runtime::init_tracing(cli.log_json);
    match cli.command {
        Commands::Restore(args) => args.run(),
        Commands::Session(args) => args.run(),
        Commands::Key { command } => commands::key::run(command),
        Commands::Config { command } => commands::config::run(command),
    }
}
