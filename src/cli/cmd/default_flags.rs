use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use super::{load_flag_defaults, print_json, CommandExecute};
use crate::cli::error::LwError;
use crate::flag_defaults::PERMITTED_FLAGS;

/// Manages fallback values for command flags.
#[derive(Parser)]
pub(crate) struct DefaultFlagsSubcommand {
    #[command(subcommand)]
    cmd: Subcommands,

    #[clap(from_global)]
    flag_defaults: Option<PathBuf>,

    #[clap(from_global)]
    json: bool,
}

#[derive(Subcommand)]
enum Subcommands {
    /// Stores a default for a flag.
    Set {
        #[clap(long)]
        flag: String,

        #[clap(long)]
        value: String,
    },

    /// Shows the default for a flag, or every default when no flag is given.
    Get {
        #[clap(long)]
        flag: Option<String>,
    },

    /// Forgets the default for a flag.
    Delete {
        #[clap(long)]
        flag: String,
    },

    /// Lists the flags that may carry a default.
    Permitted,

    /// Print a hint when a command falls back without a default.
    NagsOn,

    /// Stop printing hints about missing defaults.
    NagsOff,
}

fn scalar_text(value: &serde_yaml::Value) -> Result<String, LwError> {
    Ok(match value {
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)?.trim_end().to_string(),
    })
}

impl CommandExecute for DefaultFlagsSubcommand {
    async fn execute(self) -> color_eyre::Result<ExitCode> {
        use Subcommands::*;

        let mut defaults = load_flag_defaults(self.flag_defaults)?;

        match self.cmd {
            Set { flag, value } => {
                defaults.set(&flag, &value)?;
                eprintln!("Default for --{flag} set to {value}");
            }
            Get { flag: Some(flag) } => {
                let value = defaults.get(&flag)?;
                if self.json {
                    print_json(value)?;
                } else {
                    println!("{}", scalar_text(value)?);
                }
            }
            Get { flag: None } => {
                let all = defaults.list_all();
                if self.json {
                    print_json(&all)?;
                } else if all.is_empty() {
                    eprintln!("No defaults set");
                } else {
                    for (flag, value) in &all {
                        println!("{flag}: {}", scalar_text(value)?);
                    }
                }
            }
            Delete { flag } => {
                defaults.delete(&flag)?;
                eprintln!("Default for --{flag} deleted");
            }
            Permitted => {
                if self.json {
                    print_json(PERMITTED_FLAGS)?;
                } else {
                    for flag in PERMITTED_FLAGS {
                        println!("{flag}");
                    }
                }
            }
            NagsOn => {
                defaults.nags_on()?;
                eprintln!("Hints about missing defaults are on");
            }
            NagsOff => {
                defaults.nags_off()?;
                eprintln!("Hints about missing defaults are off");
            }
        }

        Ok(ExitCode::SUCCESS)
    }
}

#[cfg(test)]
mod test {
    use super::scalar_text;

    #[test]
    fn scalars_print_bare() {
        assert_eq!(scalar_text(&serde_yaml::Value::from(5)).unwrap(), "5");
        assert_eq!(
            scalar_text(&serde_yaml::Value::from("CENTOS_8_UNMANAGED")).unwrap(),
            "CENTOS_8_UNMANAGED"
        );
    }
}
