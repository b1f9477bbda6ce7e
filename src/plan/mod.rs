//! Batch execution of operations declared in a YAML plan.

pub(crate) mod template;

use std::io::Write;
use std::path::Path;

use serde::Deserialize;

use crate::api::Transport;
use crate::cast::cast;
use crate::cli::error::LwError;
use crate::flag_defaults::FlagDefaults;
use crate::ops::cloud_server::{self, CloudServerCreateParams};
use crate::ops::ssh::{self, SshParams};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Plan {
    pub(crate) cloud: CloudPlan,
    pub(crate) ssh: Vec<SshParams>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CloudPlan {
    pub(crate) server: CloudServerPlan,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CloudServerPlan {
    pub(crate) create: Vec<CloudServerCreateParams>,
}

impl Plan {
    /// Reads a plan file, substituting `vars` first when any are given.
    #[tracing::instrument(skip(vars))]
    pub(crate) fn load(path: &Path, vars: &[String]) -> Result<Self, LwError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(LwError::config(path, "plan file not found"));
            }
            Err(err) => return Err(err.into()),
        };

        Self::parse(&text, vars)
    }

    pub(crate) fn parse(text: &str, vars: &[String]) -> Result<Self, LwError> {
        let text = if vars.is_empty() {
            text.to_string()
        } else {
            template::render(text, &template::parse_vars(vars)?)?
        };

        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        // Decoded loosely so quoted substitutions like `zone: "{{.zone}}"` still
        // land in numeric fields.
        let document: serde_yaml::Value = serde_yaml::from_str(&text)?;
        cast(&serde_json::to_value(document)?)
    }

    pub(crate) fn len(&self) -> usize {
        self.cloud.server.create.len() + self.ssh.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs every entry of `plan` in order, writing each result to `out`. The first
/// failure stops the run; entries already applied stay applied.
#[tracing::instrument(skip_all, fields(entries = plan.len()))]
pub(crate) async fn execute<T: Transport>(
    client: &T,
    defaults: &FlagDefaults,
    plan: &Plan,
    out: &mut impl Write,
) -> Result<(), LwError> {
    for (idx, params) in plan.cloud.server.create.iter().enumerate() {
        tracing::info!(entry = idx, hostname = %params.hostname, "cloud.server.create");
        let created = cloud_server::create(client, defaults, params).await?;
        writeln!(out, "{}", serde_json::to_string_pretty(&created)?)?;
    }

    for (idx, params) in plan.ssh.iter().enumerate() {
        tracing::info!(entry = idx, host = %params.host, "ssh");
        ssh::ssh(client, params).await?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::{execute, Plan};
    use crate::api::test::FakeTransport;
    use crate::cli::error::LwError;
    use crate::flag_defaults::FlagDefaults;
    use crate::ops::cloud_server::CREATE_METHOD;

    const TWO_SERVERS: &str = r#"
cloud:
  server:
    create:
      - hostname: web1.{{.env}}.example.com
        template: UBUNTU_2204_UNMANAGED
        config-id: 1090
        zone: 27
      - hostname: web2.{{.env}}.example.com
        template: UBUNTU_2204_UNMANAGED
        config-id: 1090
        zone: "27"
        ips: "{{.ips}}"
"#;

    fn vars() -> Vec<String> {
        vec![String::from("env=stg"), String::from("ips=2")]
    }

    fn defaults(dir: &tempfile::TempDir) -> FlagDefaults {
        FlagDefaults::load(&dir.path().join("defaults.yaml")).unwrap()
    }

    #[tokio::test]
    async fn creates_run_in_declared_order() {
        let dir = tempfile::tempdir().unwrap();
        let plan = Plan::parse(TWO_SERVERS, &vars()).unwrap();
        assert_eq!(plan.len(), 2);

        let transport = FakeTransport::with_responses(vec![
            Ok(json!({ "uniq_id": "AAA111" })),
            Ok(json!({ "uniq_id": "BBB222" })),
        ]);
        let mut out = Vec::new();
        execute(&transport, &defaults(&dir), &plan, &mut out)
            .await
            .unwrap();

        let calls = transport.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(method, _)| method == CREATE_METHOD));
        assert_eq!(calls[0].1["domain"], "web1.stg.example.com");
        assert_eq!(calls[0].1["new_ips"], 1);
        assert_eq!(calls[1].1["domain"], "web2.stg.example.com");
        assert_eq!(calls[1].1["new_ips"], 2);
        assert_eq!(calls[1].1["zone"], 27);

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.find("AAA111").unwrap() < printed.find("BBB222").unwrap());
    }

    #[tokio::test]
    async fn first_failure_stops_the_plan() {
        let dir = tempfile::tempdir().unwrap();
        let plan = Plan::parse(TWO_SERVERS, &vars()).unwrap();

        let transport = FakeTransport::with_responses(vec![Err(LwError::RemoteFault {
            class: String::from("LW::Exception::Input"),
            message: String::from("zone is full"),
            detail: None,
        })]);
        let mut out = Vec::new();
        let err = execute(&transport, &defaults(&dir), &plan, &mut out)
            .await
            .unwrap_err();

        assert_eq!(err.class(), "RemoteFault");
        assert_eq!(transport.calls.borrow().len(), 1);
        assert!(out.is_empty());
    }

    #[test]
    fn unresolved_variable_fails_before_anything_runs() {
        assert_eq!(
            Plan::parse(TWO_SERVERS, &[String::from("region=us")])
                .unwrap_err()
                .class(),
            "Input"
        );
    }

    #[test]
    fn without_vars_the_text_is_parsed_as_is() {
        let plan = Plan::parse(
            "ssh:\n  - host: web1.example.com\n    command: \"echo {{.literal}}\"\n",
            &[],
        )
        .unwrap();

        assert_eq!(plan.ssh.len(), 1);
        assert!(plan.cloud.server.create.is_empty());
        assert_eq!(plan.ssh[0].user, "root");
        assert_eq!(plan.ssh[0].port, 22);
        assert_eq!(plan.ssh[0].command.as_deref(), Some("echo {{.literal}}"));
    }

    #[test]
    fn missing_plan_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = Plan::load(&dir.path().join("absent.yaml"), &[]).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
