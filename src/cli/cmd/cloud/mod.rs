mod server;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use super::CommandExecute;

/// Works with Cloud resources.
#[derive(Parser)]
pub(crate) struct CloudSubcommand {
    #[command(subcommand)]
    cmd: Subcommands,
}

#[derive(Subcommand)]
enum Subcommands {
    Server(server::ServerSubcommand),
}

impl CommandExecute for CloudSubcommand {
    async fn execute(self) -> color_eyre::Result<ExitCode> {
        match self.cmd {
            Subcommands::Server(server) => server.execute().await,
        }
    }
}
