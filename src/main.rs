use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use treewatch::commands::check::CheckArgs;
use treewatch::commands::run::RunArgs;
use treewatch::error::ExitError;
use treewatch::telemetry::{self, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "treewatch",
    version,
    about = "Post build-tree and roll status changes to a chat webhook"
)]
struct Cli {
    /// Config file (default: .treewatch.toml, .treewatch.json, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, global = true, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Poll both feeds forever, announcing transitions
    Run(RunArgs),
    /// Poll both feeds once and announce their current state
    Check(CheckArgs),
    /// Print the JSON Schema for the config file
    Schema,
}

impl Commands {
    const fn name(&self) -> &'static str {
        match self {
            Self::Run(_) => "run",
            Self::Check(_) => "check",
            Self::Schema => "schema",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    telemetry::init(cli.log_format);

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let config = cli.config.as_deref();
    let result = match &cli.command {
        Commands::Run(args) => args.execute(config),
        Commands::Check(args) => args.execute(config),
        Commands::Schema => treewatch::commands::schema::run_schema(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(exit_err) = e.downcast_ref::<ExitError>() {
                eprintln!("error: {exit_err}");
                exit_err.exit_code()
            } else {
                eprintln!("error: {e:#}");
                ExitCode::FAILURE
            }
        }
    }
}
