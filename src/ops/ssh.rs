use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::Transport;
use crate::cli::error::LwError;
use crate::validate::{validate_rules, Candidate, Rule};

pub(crate) const ASSET_DETAILS_METHOD: &str = "bleed/asset/details";

/// Parameters for an ssh session. Used both as command line flags and as an
/// entry under `ssh` in a plan.
#[derive(Clone, Debug, Deserialize, Serialize, clap::Args)]
#[serde(default, rename_all = "kebab-case")]
pub(crate) struct SshParams {
    /// uniq_id, hostname or IP address of the server.
    #[clap(long)]
    pub(crate) host: String,

    #[clap(long, default_value = "root")]
    pub(crate) user: String,

    #[clap(long, default_value_t = 22)]
    pub(crate) port: u32,

    #[clap(long)]
    pub(crate) private_key_file: Option<PathBuf>,

    /// Forward the local ssh agent.
    #[clap(long)]
    pub(crate) agent_forwarding: bool,

    /// Run this command instead of an interactive shell.
    #[clap(long)]
    pub(crate) command: Option<String>,
}

impl Default for SshParams {
    fn default() -> Self {
        Self {
            host: String::new(),
            user: String::from("root"),
            port: 22,
            private_key_file: None,
            agent_forwarding: false,
            command: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AssetAddress {
    ip: String,
}

impl SshParams {
    fn check(&self) -> Result<(), LwError> {
        validate_rules([
            (Candidate::from(&self.host), Rule::NonEmptyString),
            (Candidate::from(&self.user), Rule::NonEmptyString),
            (Candidate::from(self.port), Rule::NetworkPort),
        ])?;

        // ssh would read either of these as an option.
        for (field, value) in [("host", &self.host), ("user", &self.user)] {
            if value.starts_with('-') {
                return Err(LwError::input(
                    value.as_str(),
                    field,
                    "must not start with '-'",
                ));
            }
        }

        Ok(())
    }

    /// Arguments for the system `ssh`, connecting to `address`.
    fn ssh_args(&self, address: &str) -> Vec<String> {
        let mut args = vec![
            String::from("-p"),
            self.port.to_string(),
            String::from("-l"),
            self.user.clone(),
        ];
        if let Some(key) = &self.private_key_file {
            args.push(String::from("-i"));
            args.push(key.display().to_string());
        }
        if self.agent_forwarding {
            args.push(String::from("-A"));
        }
        args.push(String::from("--"));
        args.push(address.to_string());
        if let Some(command) = &self.command {
            args.push(command.clone());
        }
        args
    }
}

/// A `host` that looks like a uniq_id is looked up through the API; anything
/// else is handed to ssh as is.
async fn resolve_address<T: Transport>(client: &T, host: &str) -> Result<String, LwError> {
    if Rule::UniqId.check(&Candidate::from(host)).is_err() {
        return Ok(host.to_string());
    }

    let asset: AssetAddress = client
        .call_into(ASSET_DETAILS_METHOD, json!({ "uniq_id": host }))
        .await?;
    validate_rules([(Candidate::from(&asset.ip), Rule::Ip)])?;

    tracing::debug!(uniq_id = host, ip = %asset.ip, "resolved server address");
    Ok(asset.ip)
}

/// Opens an ssh session, inheriting this process's terminal.
#[tracing::instrument(skip(client))]
pub(crate) async fn ssh<T: Transport>(client: &T, params: &SshParams) -> Result<(), LwError> {
    params.check()?;
    let address = resolve_address(client, &params.host).await?;

    let status = tokio::process::Command::new("ssh")
        .args(params.ssh_args(&address))
        .status()
        .await?;

    if !status.success() {
        return Err(LwError::Subprocess {
            program: String::from("ssh"),
            status,
        });
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use serde_json::json;

    use super::{resolve_address, SshParams, ASSET_DETAILS_METHOD};
    use crate::api::test::FakeTransport;

    #[test]
    fn args_follow_flags() {
        let params = SshParams {
            host: String::from("web1.example.com"),
            port: 2222,
            private_key_file: Some(PathBuf::from("/home/me/.ssh/id_ed25519")),
            agent_forwarding: true,
            command: Some(String::from("uptime")),
            ..Default::default()
        };

        assert_eq!(
            params.ssh_args("10.1.1.1"),
            [
                "-p",
                "2222",
                "-l",
                "root",
                "-i",
                "/home/me/.ssh/id_ed25519",
                "-A",
                "--",
                "10.1.1.1",
                "uptime"
            ]
        );
    }

    #[test]
    fn bad_port_is_rejected() {
        let params = SshParams {
            host: String::from("web1.example.com"),
            port: 70000,
            ..Default::default()
        };
        assert_eq!(params.check().unwrap_err().class(), "Input");
    }

    #[test]
    fn option_like_hosts_never_reach_ssh() {
        let params = SshParams {
            host: String::from("-oProxyCommand=touch /tmp/owned"),
            ..Default::default()
        };
        assert_eq!(params.check().unwrap_err().class(), "Input");

        let params = SshParams {
            host: String::from("web1.example.com"),
            user: String::from("-oProxyCommand=true"),
            ..Default::default()
        };
        assert_eq!(params.check().unwrap_err().class(), "Input");

        let args = SshParams::default().ssh_args("-oProxyCommand=true");
        let separator = args.iter().position(|arg| arg == "--").unwrap();
        assert_eq!(args[separator + 1], "-oProxyCommand=true");
    }

    #[tokio::test]
    async fn uniq_ids_resolve_through_the_api() {
        let transport = FakeTransport::with_responses(vec![Ok(json!({ "ip": "10.2.3.4" }))]);

        assert_eq!(
            resolve_address(&transport, "ABC123").await.unwrap(),
            "10.2.3.4"
        );
        assert_eq!(
            resolve_address(&transport, "web1.example.com").await.unwrap(),
            "web1.example.com"
        );

        let calls = transport.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, ASSET_DETAILS_METHOD);
        assert_eq!(calls[0].1["uniq_id"], "ABC123");
    }
}
