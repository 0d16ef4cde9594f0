mod cmd;
mod locate;
mod output;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, run::RunArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "poolcycle",
    about = "Stop, start, or restart application pools with bounded retries",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: nearest poolcycle.yaml above the working directory)
    #[arg(long, global = true, env = "POOLCYCLE_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log at info level instead of warn
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default poolcycle.yaml if one does not exist
    Init {
        /// Target list file to reference from the new config
        #[arg(long, value_name = "PATH")]
        targets_file: Option<PathBuf>,
    },

    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose || (cli.command.is_none() && cli.run.dry_run) {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = locate::resolve_config(cli.config.as_deref());

    let result = match cli.command {
        None => cmd::run::run(config_path.as_deref(), cli.run, cli.json),
        Some(Commands::Init { targets_file }) => {
            cmd::init::run(cli.config.as_deref(), targets_file.as_deref())
        }
        Some(Commands::Config { subcommand }) => {
            cmd::config::run(config_path.as_deref(), subcommand, cli.json)
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
