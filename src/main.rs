mod api;
mod cast;
mod cli;
mod context;
mod flag_defaults;
mod ops;
mod plan;
mod shared;
mod validate;

use std::process::ExitCode;

use clap::Parser;
use owo_colors::OwoColorize;

use crate::cli::{Cli, cmd::CommandExecute, error::LwError};

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::config::HookBuilder::default()
        .issue_url(concat!(env!("CARGO_PKG_REPOSITORY"), "/issues/new"))
        .add_issue_metadata("version", env!("CARGO_PKG_VERSION"))
        .add_issue_metadata("os", std::env::consts::OS)
        .add_issue_metadata("arch", std::env::consts::ARCH)
        .issue_filter(|kind| match kind {
            color_eyre::ErrorKind::NonRecoverable(_) => true,
            color_eyre::ErrorKind::Recoverable(error) => !error.is::<LwError>(),
        })
        .install()?;

    let Cli {
        instrumentation,
        subcommand,
        ..
    } = Cli::parse();

    instrumentation.setup()?;

    match subcommand.execute().await {
        Ok(code) => Ok(code),
        Err(report) => {
            match report.downcast_ref::<LwError>() {
                Some(err) if instrumentation.verbose == 0 => {
                    eprintln!("{}", format!("{}: {err}", err.class()).red());
                    if let LwError::RemoteFault {
                        detail: Some(detail),
                        ..
                    } = err
                    {
                        eprintln!("{}", detail.red());
                    }
                }
                _ => eprintln!("{report:?}"),
            }

            Ok(ExitCode::FAILURE)
        }
    }
}
