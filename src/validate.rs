//! Named input rules shared by every command that takes operator input.
//!
//! A rule is looked up by its catalog name, checked against the kind of the
//! candidate it was handed, and then run. The first failing pair ends the batch.

use std::fmt::Display;
use std::net::IpAddr;
use std::str::FromStr;

use once_cell::sync::Lazy;

use crate::cli::error::LwError;

static HTTP_CODE_RANGE_ENTRY: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"^(?<start>\d{3})(?:-(?<end>\d{3}))?$").unwrap());

pub(crate) const LOAD_BALANCER_STRATEGIES: &[&str] = &["roundrobin", "connections", "cells"];
pub(crate) const LOAD_BALANCER_HEALTH_CHECK_PROTOCOLS: &[&str] = &["tcp", "http"];
pub(crate) const PROVIDER_API_HOST_SUFFIX: &str = "liquidweb.com";

/// A value handed to the validator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Candidate {
    Text(String),
    Int(i64),
}

impl Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Candidate::Text(s) => write!(f, "{s}"),
            Candidate::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Candidate {
    fn from(value: &str) -> Self {
        Candidate::Text(value.to_string())
    }
}

impl From<String> for Candidate {
    fn from(value: String) -> Self {
        Candidate::Text(value)
    }
}

impl From<&String> for Candidate {
    fn from(value: &String) -> Self {
        Candidate::Text(value.clone())
    }
}

impl From<i64> for Candidate {
    fn from(value: i64) -> Self {
        Candidate::Int(value)
    }
}

impl From<i32> for Candidate {
    fn from(value: i32) -> Self {
        Candidate::Int(value.into())
    }
}

impl From<u32> for Candidate {
    fn from(value: u32) -> Self {
        Candidate::Int(value.into())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Kind {
    Text,
    Int,
}

impl Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::Text => write!(f, "text"),
            Kind::Int => write!(f, "integer"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Rule {
    UniqId,
    Ip,
    IpOrCidr,
    HttpsLiquidwebUrl,
    PositiveInt,
    PositiveInt64,
    NonEmptyString,
    NetworkPort,
    NetworkPortPair,
    LoadBalancerStrategy,
    LoadBalancerHealthCheckProtocol,
    LoadBalancerHttpCodeRange,
}

/// Every rule the validator knows about, by the name callers use for it.
/// Adding a variant here is all it takes for `Rule::from_str` to find it.
pub(crate) const CATALOG: &[(&str, Rule)] = &[
    ("UniqId", Rule::UniqId),
    ("IP", Rule::Ip),
    ("IpOrCidr", Rule::IpOrCidr),
    ("HttpsLiquidwebUrl", Rule::HttpsLiquidwebUrl),
    ("PositiveInt", Rule::PositiveInt),
    ("PositiveInt64", Rule::PositiveInt64),
    ("NonEmptyString", Rule::NonEmptyString),
    ("NetworkPort", Rule::NetworkPort),
    ("NetworkPortPair", Rule::NetworkPortPair),
    ("LoadBalancerStrategy", Rule::LoadBalancerStrategy),
    (
        "LoadBalancerHealthCheckProtocol",
        Rule::LoadBalancerHealthCheckProtocol,
    ),
    ("LoadBalancerHttpCodeRange", Rule::LoadBalancerHttpCodeRange),
];

impl FromStr for Rule {
    type Err = LwError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        CATALOG
            .iter()
            .find(|(catalog_name, _)| *catalog_name == name)
            .map(|(_, rule)| *rule)
            .ok_or_else(|| LwError::input("", name, "unknown rule"))
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = CATALOG
            .iter()
            .find(|(_, rule)| rule == self)
            .map(|(name, _)| *name)
            .unwrap_or("?");
        write!(f, "{name}")
    }
}

impl Rule {
    pub(crate) fn kind(&self) -> Kind {
        match self {
            Rule::PositiveInt | Rule::PositiveInt64 | Rule::NetworkPort => Kind::Int,
            _ => Kind::Text,
        }
    }

    /// Runs the rule against `candidate`, reporting the kind mismatch or the
    /// predicate's complaint.
    pub(crate) fn check(&self, candidate: &Candidate) -> Result<(), LwError> {
        let fail = |reason: String| LwError::input(candidate.to_string(), self.to_string(), reason);

        let outcome = match (self.kind(), candidate) {
            (Kind::Text, Candidate::Text(s)) => self.check_text(s),
            (Kind::Int, Candidate::Int(i)) => self.check_int(*i),
            (expected, _) => Err(format!("expected a {expected} value")),
        };

        outcome.map_err(fail)
    }

    fn check_int(&self, value: i64) -> Result<(), String> {
        match self {
            Rule::PositiveInt | Rule::PositiveInt64 => {
                if value < 0 {
                    return Err(String::from("must be a non-negative integer"));
                }
            }
            Rule::NetworkPort => network_port(value)?,
            _ => unreachable!("integer kind is limited to integer rules"),
        }

        Ok(())
    }

    fn check_text(&self, value: &str) -> Result<(), String> {
        match self {
            Rule::UniqId => {
                if value.chars().count() != 6 {
                    return Err(String::from("must be exactly 6 characters"));
                }
                if value.to_uppercase() != value {
                    return Err(String::from("must be all uppercase"));
                }
            }
            Rule::Ip => {
                IpAddr::from_str(value).map_err(|_| String::from("not a valid IP address"))?;
            }
            Rule::IpOrCidr => ip_or_cidr(value)?,
            Rule::HttpsLiquidwebUrl => https_provider_url(value)?,
            Rule::NonEmptyString => {
                if value.is_empty() {
                    return Err(String::from("must not be empty"));
                }
            }
            Rule::NetworkPortPair => {
                let Some((src, dst)) = value.split_once(':') else {
                    return Err(String::from("must be of the form src:dst"));
                };
                for side in [src, dst] {
                    let port = side
                        .parse::<i64>()
                        .map_err(|_| format!("port {side:?} is not an integer"))?;
                    network_port(port)?;
                }
            }
            Rule::LoadBalancerStrategy => {
                if !LOAD_BALANCER_STRATEGIES.contains(&value) {
                    return Err(format!(
                        "must be one of {}",
                        LOAD_BALANCER_STRATEGIES.join(", ")
                    ));
                }
            }
            Rule::LoadBalancerHealthCheckProtocol => {
                if !LOAD_BALANCER_HEALTH_CHECK_PROTOCOLS.contains(&value) {
                    return Err(format!(
                        "must be one of {}",
                        LOAD_BALANCER_HEALTH_CHECK_PROTOCOLS.join(", ")
                    ));
                }
            }
            Rule::LoadBalancerHttpCodeRange => http_code_range(value)?,
            _ => unreachable!("text kind is limited to text rules"),
        }

        Ok(())
    }
}

fn network_port(value: i64) -> Result<(), String> {
    if !(1..=65535).contains(&value) {
        return Err(String::from("must be between 1 and 65535"));
    }

    Ok(())
}

fn ip_or_cidr(value: &str) -> Result<(), String> {
    let Some((addr, prefix)) = value.split_once('/') else {
        return IpAddr::from_str(value)
            .map(|_| ())
            .map_err(|_| String::from("not a valid IP address or CIDR"));
    };

    let addr = IpAddr::from_str(addr).map_err(|_| format!("{addr:?} is not a valid IP address"))?;
    let max_prefix = if addr.is_ipv4() { 32 } else { 128 };
    match prefix.parse::<u8>() {
        Ok(bits) if bits <= max_prefix => Ok(()),
        _ => Err(format!("prefix length must be between 0 and {max_prefix}")),
    }
}

fn https_provider_url(value: &str) -> Result<(), String> {
    if !value.starts_with("https://") {
        return Err(String::from("must start with https://"));
    }

    let parsed = url::Url::parse(value).map_err(|e| e.to_string())?;
    let host = parsed
        .host_str()
        .ok_or_else(|| String::from("has no host"))?;

    if host == PROVIDER_API_HOST_SUFFIX || host.ends_with(&format!(".{PROVIDER_API_HOST_SUFFIX}")) {
        Ok(())
    } else {
        Err(format!("host {host} is not a {PROVIDER_API_HOST_SUFFIX} host"))
    }
}

fn http_code_range(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(String::from("must not be empty"));
    }

    for entry in value.split(',') {
        let entry = entry.trim();
        let captures = HTTP_CODE_RANGE_ENTRY
            .captures(entry)
            .ok_or_else(|| format!("{entry:?} is not of the form n or n-m"))?;

        let start: u16 = captures["start"]
            .parse()
            .map_err(|_| format!("{entry:?} is not a number"))?;
        let end: u16 = match captures.name("end") {
            Some(end) => end
                .as_str()
                .parse()
                .map_err(|_| format!("{entry:?} is not a number"))?,
            None => start,
        };

        if !(100..=599).contains(&start) || !(100..=599).contains(&end) {
            return Err(format!("{entry:?} is outside 100-599"));
        }
        if start > end {
            return Err(format!("{entry:?} has its bounds reversed"));
        }
    }

    Ok(())
}

/// Validates every `(candidate, rule name)` pair, stopping at the first failure.
pub(crate) fn validate<'a, I, C>(pairs: I) -> Result<(), LwError>
where
    I: IntoIterator<Item = (C, &'a str)>,
    C: Into<Candidate>,
{
    for (candidate, rule_name) in pairs {
        let candidate = candidate.into();
        let rule = rule_name.parse::<Rule>().map_err(|_| {
            LwError::input(candidate.to_string(), rule_name, "unknown rule")
        })?;

        tracing::trace!(%candidate, %rule, "validating");
        rule.check(&candidate)?;
    }

    Ok(())
}

/// Like [`validate`], for callers that already hold typed rules.
pub(crate) fn validate_rules<I>(pairs: I) -> Result<(), LwError>
where
    I: IntoIterator<Item = (Candidate, Rule)>,
{
    pairs
        .into_iter()
        .try_for_each(|(candidate, rule)| rule.check(&candidate))
}
