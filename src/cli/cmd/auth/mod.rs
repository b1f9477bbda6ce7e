mod prompt;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use super::{load_credentials, print_rows, CommandExecute};
use crate::cli::error::LwError;
use crate::context::{AuthContext, ContextUpdate, DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};

/// Manages the API credentials lw uses.
#[derive(Parser)]
pub(crate) struct AuthSubcommand {
    #[command(subcommand)]
    cmd: Subcommands,

    #[clap(from_global)]
    config: Option<PathBuf>,

    #[clap(from_global)]
    json: bool,
}

#[derive(Subcommand)]
enum Subcommands {
    /// Interactively creates one or more contexts.
    Init,

    /// Adds a context, replacing any context with the same name.
    AddContext {
        #[clap(long)]
        context_name: String,

        #[clap(long)]
        username: String,

        #[clap(long, env = "LW_PASSWORD", hide_env_values = true)]
        password: String,

        #[clap(long, default_value = DEFAULT_API_URL)]
        api_url: String,

        /// Skip TLS certificate verification.
        #[clap(long)]
        insecure: bool,

        /// Per-request timeout in seconds.
        #[clap(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,
    },

    /// Changes fields of an existing context.
    UpdateContext {
        #[clap(long)]
        context: String,

        #[clap(long)]
        username: Option<String>,

        #[clap(long)]
        password: Option<String>,

        #[clap(long)]
        url: Option<String>,

        #[clap(long)]
        timeout: Option<u64>,

        #[clap(long, conflicts_with = "set_insecure")]
        set_secure: bool,

        #[clap(long)]
        set_insecure: bool,
    },

    /// Removes a context. The current context cannot be removed.
    RemoveContext {
        #[clap(long)]
        context: String,
    },

    /// Makes a context the current one.
    UseContext { context: String },

    /// Lists every context. Passwords are never shown.
    GetContexts,
}

#[derive(Tabled, Serialize)]
struct ContextRow {
    current: String,
    name: String,
    username: String,
    url: String,
    insecure: bool,
    timeout: u64,
}

impl ContextRow {
    fn new(context: &AuthContext, current: Option<&str>) -> Self {
        let is_current = current == Some(context.context_name.as_str());
        Self {
            current: if is_current { "*" } else { "" }.to_string(),
            name: context.context_name.clone(),
            username: context.username.clone(),
            url: context.url.clone(),
            insecure: context.insecure,
            timeout: context.timeout,
        }
    }
}

impl CommandExecute for AuthSubcommand {
    async fn execute(self) -> color_eyre::Result<ExitCode> {
        use Subcommands::*;

        let mut store = load_credentials(self.config)?;

        match self.cmd {
            Init => {
                require_terminal(std::io::stdin().is_terminal(), std::io::stdout().is_terminal())?;

                store.init_interactive(&mut prompt::InquirePrompter)?;
                eprintln!("Saved contexts to {}", store.path().display());
            }
            AddContext {
                context_name,
                username,
                password,
                api_url,
                insecure,
                timeout,
            } => {
                let context = AuthContext {
                    url: api_url,
                    insecure,
                    timeout,
                    ..AuthContext::new(context_name, username, password)
                };
                let name = context.context_name.clone();
                store.add(context)?;
                eprintln!("Added context {name}");
            }
            UpdateContext {
                context,
                username,
                password,
                url,
                timeout,
                set_secure,
                set_insecure,
            } => {
                store.update(
                    &context,
                    ContextUpdate {
                        username,
                        password,
                        url,
                        timeout,
                        set_secure,
                        set_insecure,
                    },
                )?;
                eprintln!("Updated context {context}");
            }
            RemoveContext { context } => {
                store.remove(&context)?;
                eprintln!("Removed context {context}");
            }
            UseContext { context } => {
                store.use_context(&context)?;
                eprintln!("Now using context {context}");
            }
            GetContexts => {
                let current = store.current_context();
                let rows: Vec<ContextRow> =
                    store.list().map(|c| ContextRow::new(c, current)).collect();
                print_rows(rows, self.json)?;
            }
        }

        Ok(ExitCode::SUCCESS)
    }
}

/// Onboarding prompts need a person on both ends of the terminal.
fn require_terminal(stdin_is_terminal: bool, stdout_is_terminal: bool) -> Result<(), LwError> {
    if stdin_is_terminal && stdout_is_terminal {
        Ok(())
    } else {
        Err(LwError::input(
            "auth init",
            "interactive terminal",
            "needs a terminal on stdin and stdout; use `lw auth add-context` instead",
        ))
    }
}

#[cfg(test)]
mod test {
    use super::{require_terminal, ContextRow};
    use crate::context::AuthContext;

    #[test]
    fn rows_never_carry_passwords() {
        let context = AuthContext::new("dev", "alice", "p@ss");
        let row = ContextRow::new(&context, Some("dev"));

        let json = serde_json::to_string(&row).unwrap();
        assert!(!json.contains("p@ss"));
        assert_eq!(row.current, "*");

        assert_eq!(ContextRow::new(&context, Some("prod")).current, "");
    }

    #[test]
    fn init_needs_a_terminal_on_both_ends() {
        assert!(require_terminal(true, true).is_ok());
        for (stdin, stdout) in [(false, true), (true, false), (false, false)] {
            assert_eq!(require_terminal(stdin, stdout).unwrap_err().class(), "Input");
        }
    }
}
