mod ingest;
mod inspect;

use barvault_core::IngestReport;

pub use inspect::{InspectView, InstrumentBars};

use crate::cli::{Cli, Command};
use crate::config::EnvConfig;
use crate::error::CliError;

pub enum CommandOutput {
    Ingest(IngestReport),
    Inspect(InspectView),
}

pub async fn run(cli: &Cli, env: &EnvConfig) -> Result<CommandOutput, CliError> {
    match &cli.command {
        Command::Ingest(args) => ingest::run(args, env).await.map(CommandOutput::Ingest),
        Command::Inspect(args) => inspect::run(args).map(CommandOutput::Inspect),
    }
}
