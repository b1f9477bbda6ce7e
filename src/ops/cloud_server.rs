use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::api::Transport;
use crate::cli::error::LwError;
use crate::flag_defaults::FlagDefaults;
use crate::validate::{validate_rules, Candidate, Rule};

pub(crate) const CREATE_METHOD: &str = "bleed/server/create";
pub(crate) const DETAILS_METHOD: &str = "bleed/storm/server/details";
pub(crate) const LIST_METHOD: &str = "bleed/storm/server/list";

const DEFAULT_SERVER_TYPE: &str = "SS.VPS";
const DEFAULT_BANDWIDTH: &str = "SS.10000";

/// Parameters for creating a cloud server. Used both as command line flags and
/// as an entry under `cloud.server.create` in a plan.
#[derive(Clone, Debug, Default, Deserialize, Serialize, clap::Args)]
#[serde(default, rename_all = "kebab-case")]
pub(crate) struct CloudServerCreateParams {
    /// Hostname (fully qualified) for the new server.
    #[clap(long)]
    pub(crate) hostname: String,

    /// Template to install. Falls back to the `template` flag default.
    #[clap(long)]
    pub(crate) template: Option<String>,

    /// Private image to install instead of a template.
    #[clap(long)]
    pub(crate) image_id: Option<i64>,

    /// Backup to restore instead of a template.
    #[clap(long)]
    pub(crate) backup_id: Option<i64>,

    /// Server type.
    #[clap(long = "type", default_value = DEFAULT_SERVER_TYPE)]
    #[serde(rename = "type")]
    pub(crate) server_type: Option<String>,

    /// Config id (size) of the server.
    #[clap(long)]
    pub(crate) config_id: i64,

    /// Zone to create the server in. Falls back to the `zone` flag default.
    #[clap(long)]
    pub(crate) zone: Option<i64>,

    /// Number of new IP addresses to assign.
    #[clap(long, default_value_t = 1)]
    #[serde(default = "one_ip")]
    pub(crate) ips: i64,

    /// IP addresses from an IP pool to assign.
    #[clap(long, value_delimiter = ',')]
    pub(crate) pool_ips: Vec<String>,

    /// Public SSH key to install for root.
    #[clap(long)]
    pub(crate) public_ssh_key: Option<String>,

    /// Root password.
    #[clap(long)]
    pub(crate) password: Option<String>,

    /// Backup plan (None, Quota or Daily).
    #[clap(long)]
    pub(crate) backup_plan: Option<String>,

    /// Quota in GB for the Quota backup plan.
    #[clap(long)]
    pub(crate) backup_plan_quota: Option<i64>,

    /// Days to keep for the Daily backup plan.
    #[clap(long)]
    pub(crate) backup_days: Option<i64>,

    /// Bandwidth package.
    #[clap(long)]
    pub(crate) bandwidth: Option<String>,

    /// Name or uniq_id of a private parent to create the server on.
    #[clap(long)]
    pub(crate) private_parent: Option<String>,
}

fn one_ip() -> i64 {
    1
}

impl CloudServerCreateParams {
    /// Fills `zone` and `template` from flag defaults and checks every field,
    /// returning the method arguments.
    fn to_args(&self, defaults: &FlagDefaults) -> Result<Value, LwError> {
        let zone = defaults.resolve("zone", self.zone)?;
        let template = match (&self.image_id, &self.backup_id) {
            (None, None) => defaults.resolve("template", self.template.clone())?,
            _ => self.template.clone(),
        };

        for (flag, missing) in [("zone", zone.is_none()), ("template", template.is_none())] {
            if missing && defaults.nags_enabled() {
                eprintln!(
                    "hint: no {flag} given; set one for next time with \
                    `lw default-flags set --flag {flag} --value <value>`"
                );
            }
        }

        let sources = [
            template.is_some(),
            self.image_id.is_some(),
            self.backup_id.is_some(),
        ];
        if sources.iter().filter(|s| **s).count() != 1 {
            return Err(LwError::input(
                format!("{template:?}/{:?}/{:?}", self.image_id, self.backup_id),
                "template|image-id|backup-id",
                "exactly one of template, image-id or backup-id is required",
            ));
        }

        let mut checks = vec![
            (Candidate::from(&self.hostname), Rule::NonEmptyString),
            (Candidate::from(self.config_id), Rule::PositiveInt),
            (Candidate::from(self.ips), Rule::PositiveInt),
        ];
        checks.extend(zone.map(|z| (Candidate::from(z), Rule::PositiveInt)));
        checks.extend(self.image_id.map(|i| (Candidate::from(i), Rule::PositiveInt)));
        checks.extend(self.backup_id.map(|i| (Candidate::from(i), Rule::PositiveInt)));
        checks.extend(self.backup_days.map(|d| (Candidate::from(d), Rule::PositiveInt)));
        checks.extend(
            self.backup_plan_quota
                .map(|q| (Candidate::from(q), Rule::PositiveInt)),
        );
        checks.extend(
            self.pool_ips
                .iter()
                .map(|ip| (Candidate::from(ip), Rule::Ip)),
        );
        checks.extend(
            self.private_parent
                .as_ref()
                .map(|p| (Candidate::from(p), Rule::NonEmptyString)),
        );
        validate_rules(checks)?;

        let mut args = Map::new();
        args.insert(String::from("domain"), json!(self.hostname));
        args.insert(
            String::from("type"),
            json!(self.server_type.as_deref().unwrap_or(DEFAULT_SERVER_TYPE)),
        );
        args.insert(String::from("config_id"), json!(self.config_id));
        args.insert(String::from("new_ips"), json!(self.ips));

        let optional = [
            ("zone", zone.map(Value::from)),
            ("template", template.map(Value::from)),
            ("image_id", self.image_id.map(Value::from)),
            ("backup_id", self.backup_id.map(Value::from)),
            ("public_ssh_key", self.public_ssh_key.clone().map(Value::from)),
            ("password", self.password.clone().map(Value::from)),
            ("parent", self.private_parent.clone().map(Value::from)),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                args.insert(String::from(key), value);
            }
        }
        if !self.pool_ips.is_empty() {
            args.insert(String::from("pool_ips"), json!(self.pool_ips));
        }

        let mut features = Map::new();
        features.insert(
            String::from("Bandwidth"),
            json!(self.bandwidth.as_deref().unwrap_or(DEFAULT_BANDWIDTH)),
        );
        if let Some(plan) = &self.backup_plan {
            let mut backup = Map::new();
            backup.insert(String::from("value"), json!(plan));
            if let Some(quota) = self.backup_plan_quota {
                backup.insert(String::from("quota"), json!(quota));
            }
            if let Some(days) = self.backup_days {
                backup.insert(String::from("num_days"), json!(days));
            }
            features.insert(String::from("LiquidWebBackupPlan"), Value::Object(backup));
        }
        args.insert(String::from("features"), Value::Object(features));

        Ok(Value::Object(args))
    }
}

/// Creates one cloud server and returns the server's record.
#[tracing::instrument(skip_all, fields(hostname = %params.hostname))]
pub(crate) async fn create<T: Transport>(
    client: &T,
    defaults: &FlagDefaults,
    params: &CloudServerCreateParams,
) -> Result<Value, LwError> {
    let args = params.to_args(defaults)?;
    let created = client.call(CREATE_METHOD, args).await?;

    let uniq_id = created.get("uniq_id").and_then(Value::as_str).unwrap_or("?");
    tracing::info!(uniq_id, "created cloud server");

    Ok(created)
}

/// The fields of a server record worth showing an operator.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub(crate) struct ServerDetails {
    pub(crate) uniq_id: String,
    pub(crate) domain: String,
    pub(crate) ip: String,
    pub(crate) zone: ZoneSummary,
    pub(crate) config_id: u64,
    pub(crate) template: String,
    pub(crate) memory: u64,
    pub(crate) vcpu: u64,
    pub(crate) diskspace: u64,
    pub(crate) status: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub(crate) struct ZoneSummary {
    pub(crate) id: u64,
    pub(crate) name: String,
}

impl std::fmt::Display for ZoneSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{} ({})", self.name, self.id)
        }
    }
}

/// One flat line of a server listing; the zone is collapsed to its display
/// form so the row also serializes as CSV.
#[derive(Debug, Serialize, tabled::Tabled)]
pub(crate) struct ServerRow {
    pub(crate) uniq_id: String,
    pub(crate) domain: String,
    pub(crate) ip: String,
    pub(crate) zone: String,
    pub(crate) config_id: u64,
    pub(crate) template: String,
    pub(crate) memory: u64,
    pub(crate) vcpu: u64,
    pub(crate) diskspace: u64,
    pub(crate) status: String,
}

impl From<ServerDetails> for ServerRow {
    fn from(server: ServerDetails) -> Self {
        Self {
            zone: server.zone.to_string(),
            uniq_id: server.uniq_id,
            domain: server.domain,
            ip: server.ip,
            config_id: server.config_id,
            template: server.template,
            memory: server.memory,
            vcpu: server.vcpu,
            diskspace: server.diskspace,
            status: server.status,
        }
    }
}

#[tracing::instrument(skip(client))]
pub(crate) async fn details<T: Transport>(client: &T, uniq_id: &str) -> Result<ServerDetails, LwError> {
    validate_rules([(Candidate::from(uniq_id), Rule::UniqId)])?;

    client
        .call_into(DETAILS_METHOD, json!({ "uniq_id": uniq_id }))
        .await
}
