use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use super::{active_client, load_flag_defaults, CommandExecute};
use crate::plan::{execute, Plan};

/// Runs the operations declared in a YAML plan file, in order.
///
/// Example:
///
///   cloud:
///     server:
///       create:
///         - hostname: web1.{{.env}}.example.com
///           config-id: 1090
///
/// `lw plan --file servers.yaml --var env=stg`
#[derive(Parser)]
#[command(verbatim_doc_comment)]
pub(crate) struct PlanSubcommand {
    /// The plan file.
    #[clap(long)]
    file: PathBuf,

    /// A `name=value` substitution for `{{.name}}` in the plan. Repeatable.
    #[clap(long = "var")]
    vars: Vec<String>,

    #[clap(from_global)]
    config: Option<PathBuf>,

    #[clap(from_global)]
    flag_defaults: Option<PathBuf>,

    #[clap(from_global)]
    with_context: Option<String>,
}

impl CommandExecute for PlanSubcommand {
    async fn execute(self) -> color_eyre::Result<ExitCode> {
        let plan = Plan::load(&self.file, &self.vars)?;
        if plan.is_empty() {
            eprintln!("Nothing to do in {}", self.file.display());
            return Ok(ExitCode::SUCCESS);
        }

        let client = active_client(self.config, self.with_context.as_deref())?;
        let defaults = load_flag_defaults(self.flag_defaults)?;

        execute(&client, &defaults, &plan, &mut std::io::stdout()).await?;

        Ok(ExitCode::SUCCESS)
    }
}
