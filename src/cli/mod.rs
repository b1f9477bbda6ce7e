pub(crate) mod cmd;
pub(crate) mod error;
pub(crate) mod instrumentation;

use std::path::PathBuf;

/// lw: a CLI for the Liquid Web API
#[derive(clap::Parser)]
#[clap(name = "lw", version)]
pub(crate) struct Cli {
    /// Credential file. Defaults to ~/.lw.yaml.
    #[clap(global = true, long, env = "LW_CONFIG")]
    pub(crate) config: Option<PathBuf>,

    /// Default-flag file. Defaults to ~/.lw-flag-defaults.yaml.
    #[clap(global = true, long, env = "LW_FLAG_DEFAULTS")]
    pub(crate) flag_defaults: Option<PathBuf>,

    /// Use this context for this invocation only, leaving the current context as is.
    #[clap(global = true, long, env = "LW_CONTEXT")]
    pub(crate) with_context: Option<String>,

    /// Output results as JSON.
    #[clap(global = true, long, env = "LW_OUTPUT_JSON")]
    pub(crate) json: bool,

    #[clap(flatten)]
    pub(crate) instrumentation: instrumentation::Instrumentation,

    #[clap(subcommand)]
    pub(crate) subcommand: cmd::LwSubcommands,
}

#[cfg(test)]
mod test {
    use clap::{CommandFactory, Parser};

    use super::Cli;
    use crate::cli::cmd::LwSubcommands;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn use_context_takes_a_positional_name() {
        let cli = Cli::try_parse_from(["lw", "auth", "use-context", "prod"]).unwrap();
        assert!(matches!(cli.subcommand, LwSubcommands::Auth(_)));

        assert!(Cli::try_parse_from(["lw", "auth", "use-context", "--context", "prod"]).is_err());
    }

    #[test]
    fn secure_and_insecure_conflict() {
        assert!(
            Cli::try_parse_from([
                "lw",
                "auth",
                "update-context",
                "--context",
                "dev",
                "--set-secure",
                "--set-insecure",
            ])
            .is_err()
        );
    }

    #[test]
    fn global_flags_reach_subcommands() {
        let cli = Cli::try_parse_from([
            "lw",
            "cloud",
            "server",
            "list",
            "--with-context",
            "prod",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.with_context.as_deref(), Some("prod"));
        assert!(cli.json);
    }
}
