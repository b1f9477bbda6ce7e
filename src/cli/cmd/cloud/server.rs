use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::api::pagination::{Pager, DEFAULT_RESULTS_PER_PAGE};
use crate::cli::cmd::{active_client, load_flag_defaults, print_json, print_rows, spinner, CommandExecute};
use crate::ops::cloud_server::{self, CloudServerCreateParams, ServerDetails, ServerRow, LIST_METHOD};

/// Creates, lists and inspects Cloud Servers.
#[derive(Parser)]
pub(super) struct ServerSubcommand {
    #[command(subcommand)]
    cmd: Subcommands,

    #[clap(from_global)]
    config: Option<PathBuf>,

    #[clap(from_global)]
    flag_defaults: Option<PathBuf>,

    #[clap(from_global)]
    with_context: Option<String>,

    #[clap(from_global)]
    json: bool,
}

#[derive(Subcommand)]
enum Subcommands {
    /// Provisions a new Cloud Server.
    Create(CloudServerCreateParams),

    /// Lists every Cloud Server on the account.
    List {
        /// Results requested per page.
        #[clap(long, default_value_t = DEFAULT_RESULTS_PER_PAGE)]
        results_per_page: u64,
    },

    /// Shows one Cloud Server.
    Details {
        #[clap(long)]
        uniq_id: String,
    },
}

impl CommandExecute for ServerSubcommand {
    async fn execute(self) -> color_eyre::Result<ExitCode> {
        use Subcommands::*;

        let client = active_client(self.config, self.with_context.as_deref())?;

        match self.cmd {
            Create(params) => {
                let defaults = load_flag_defaults(self.flag_defaults)?;
                let created = cloud_server::create(&client, &defaults, &params).await?;
                print_json(&created)?;
            }
            List { results_per_page } => {
                let pb = spinner("Fetching Cloud Servers");
                let merged = Pager::new(&client, LIST_METHOD)
                    .results_per_page(results_per_page)
                    .collect_with(|page| {
                        pb.set_message(format!("Fetched page {} of {}", page.page_num, page.page_total));
                    })
                    .await;
                pb.finish_and_clear();

                let servers: Vec<ServerDetails> = merged?.items_into()?;
                if self.json {
                    print_json(&servers)?;
                } else {
                    print_rows(servers.into_iter().map(ServerRow::from).collect(), false)?;
                }
            }
            Details { uniq_id } => {
                let server = cloud_server::details(&client, &uniq_id).await?;
                if self.json {
                    print_json(&server)?;
                } else {
                    print_rows(vec![ServerRow::from(server)], false)?;
                }
            }
        }

        Ok(ExitCode::SUCCESS)
    }
}
