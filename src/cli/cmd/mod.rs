pub(crate) mod auth;
pub(crate) mod cloud;
pub(crate) mod default_flags;
pub(crate) mod plan;
pub(crate) mod ssh;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::api::LwClient;
use crate::cli::error::LwError;
use crate::context::CredentialStore;
use crate::flag_defaults::FlagDefaults;

#[allow(async_fn_in_trait)]
pub trait CommandExecute {
    async fn execute(self) -> color_eyre::Result<ExitCode>;
}

#[derive(clap::Subcommand)]
pub(crate) enum LwSubcommands {
    Auth(auth::AuthSubcommand),
    DefaultFlags(default_flags::DefaultFlagsSubcommand),
    Plan(plan::PlanSubcommand),
    Cloud(cloud::CloudSubcommand),
    Ssh(ssh::SshSubcommand),
}

impl CommandExecute for LwSubcommands {
    async fn execute(self) -> color_eyre::Result<ExitCode> {
        use LwSubcommands::*;

        match self {
            Auth(auth) => auth.execute().await,
            DefaultFlags(default_flags) => default_flags.execute().await,
            Plan(plan) => plan.execute().await,
            Cloud(cloud) => cloud.execute().await,
            Ssh(ssh) => ssh.execute().await,
        }
    }
}

pub(crate) fn print_json<T: Serialize>(value: T) -> Result<(), LwError> {
    let json = serde_json::to_string_pretty(&value)?;
    println!("{}", json);
    Ok(())
}

/// A table on a terminal, CSV otherwise, or JSON when asked.
pub(crate) fn print_rows<R: Tabled + Serialize>(rows: Vec<R>, json: bool) -> color_eyre::Result<()> {
    if json {
        print_json(&rows)?;
    } else if rows.is_empty() {
        eprintln!("No results");
    } else if std::io::stdout().is_terminal() {
        let table = Table::new(rows);
        println!("{table}");
    } else {
        write_csv(rows, std::io::stdout())?;
    }

    Ok(())
}

pub(crate) fn write_csv<R: Serialize, W: std::io::Write>(rows: Vec<R>, out: W) -> color_eyre::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

pub(crate) fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner());
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

pub(crate) fn load_credentials(path: Option<PathBuf>) -> Result<CredentialStore, LwError> {
    let path = match path {
        Some(path) => path,
        None => CredentialStore::default_path()?,
    };
    CredentialStore::load(&path)
}

pub(crate) fn load_flag_defaults(path: Option<PathBuf>) -> Result<FlagDefaults, LwError> {
    let path = match path {
        Some(path) => path,
        None => FlagDefaults::default_path()?,
    };
    FlagDefaults::load(&path)
}

/// A client for the active context, honoring a one-shot override.
pub(crate) fn active_client(
    config: Option<PathBuf>,
    with_context: Option<&str>,
) -> Result<LwClient, LwError> {
    let store = load_credentials(config)?;
    let context = store.active(with_context)?;
    tracing::debug!(context = %context.context_name, "using context");

    LwClient::new(context)
}
