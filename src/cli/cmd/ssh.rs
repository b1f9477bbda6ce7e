use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use super::{active_client, CommandExecute};
use crate::ops::ssh::{ssh, SshParams};

/// Opens an ssh session to a server, by uniq_id, hostname or IP.
#[derive(Parser)]
pub(crate) struct SshSubcommand {
    #[clap(flatten)]
    params: SshParams,

    #[clap(from_global)]
    config: Option<PathBuf>,

    #[clap(from_global)]
    with_context: Option<String>,
}

impl CommandExecute for SshSubcommand {
    async fn execute(self) -> color_eyre::Result<ExitCode> {
        let client = active_client(self.config, self.with_context.as_deref())?;
        ssh(&client, &self.params).await?;

        Ok(ExitCode::SUCCESS)
    }
}
