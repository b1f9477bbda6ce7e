//! Per-operator fallback values for a small set of command flags.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::cast::cast;
use crate::cli::error::LwError;
use crate::shared::{lookup, lookup_mut, read_yaml_document, write_yaml_document};

pub(crate) const FLAG_DEFAULTS_FILE_NAME: &str = ".lw-flag-defaults.yaml";

/// Flags that may carry a default.
pub(crate) const PERMITTED_FLAGS: &[&str] = &["zone", "template"];

const DEFAULTS_KEYS: &[&str] = &["liquidweb", "flags", "defaults"];
const NAGS_KEYS: &[&str] = &["liquidweb", "flags", "nags"];

pub(crate) struct FlagDefaults {
    path: PathBuf,
    document: serde_yaml::Value,
}

fn permitted(flag: &str) -> Result<(), LwError> {
    if PERMITTED_FLAGS.contains(&flag) {
        Ok(())
    } else {
        Err(LwError::Forbidden(flag.to_string()))
    }
}

impl FlagDefaults {
    pub(crate) fn default_path() -> Result<PathBuf, LwError> {
        crate::shared::home_file(FLAG_DEFAULTS_FILE_NAME)
    }

    #[tracing::instrument]
    pub(crate) fn load(path: &Path) -> Result<Self, LwError> {
        Ok(Self {
            path: path.to_path_buf(),
            document: read_yaml_document(path)?,
        })
    }

    pub(crate) fn get(&self, flag: &str) -> Result<&serde_yaml::Value, LwError> {
        permitted(flag)?;

        match lookup(&self.document, DEFAULTS_KEYS).and_then(|defaults| defaults.get(flag)) {
            Some(serde_yaml::Value::Null) | None => Err(LwError::NotFound(flag.to_string())),
            Some(value) => Ok(value),
        }
    }

    /// Reads a default, coercing the stored scalar into `T`.
    pub(crate) fn get_as<T: DeserializeOwned>(&self, flag: &str) -> Result<T, LwError> {
        let value = serde_json::to_value(self.get(flag)?)?;
        cast(&value)
    }

    /// `explicit` if the operator passed one, otherwise the stored default.
    pub(crate) fn resolve<T: DeserializeOwned>(
        &self,
        flag: &str,
        explicit: Option<T>,
    ) -> Result<Option<T>, LwError> {
        if explicit.is_some() {
            return Ok(explicit);
        }

        match self.get_as(flag) {
            Ok(value) => {
                tracing::debug!(flag, "using flag default");
                Ok(Some(value))
            }
            Err(LwError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Stores `raw` as a YAML scalar, so `5` is kept as a number and
    /// `CENTOS_8_UNMANAGED` as a string.
    #[tracing::instrument(skip(self))]
    pub(crate) fn set(&mut self, flag: &str, raw: &str) -> Result<(), LwError> {
        permitted(flag)?;

        let value: serde_yaml::Value = serde_yaml::from_str(raw)
            .unwrap_or_else(|_| serde_yaml::Value::String(raw.to_string()));
        match value {
            serde_yaml::Value::Null => {
                return Err(LwError::input(raw, "default value", "must not be empty"));
            }
            serde_yaml::Value::Mapping(_)
            | serde_yaml::Value::Sequence(_)
            | serde_yaml::Value::Tagged(_) => {
                return Err(LwError::input(raw, "default value", "must be a single scalar"));
            }
            _ => {}
        }

        let mut keys = DEFAULTS_KEYS.to_vec();
        keys.push(flag);
        *lookup_mut(&mut self.document, &keys) = value;
        write_yaml_document(&self.path, &self.document)
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn delete(&mut self, flag: &str) -> Result<(), LwError> {
        self.get(flag)?;

        if let serde_yaml::Value::Mapping(defaults) = lookup_mut(&mut self.document, DEFAULTS_KEYS)
        {
            defaults.remove(flag);
        }

        write_yaml_document(&self.path, &self.document)
    }

    /// Every stored default, whether or not it is still permitted.
    pub(crate) fn list_all(&self) -> BTreeMap<String, serde_yaml::Value> {
        lookup(&self.document, DEFAULTS_KEYS)
            .and_then(serde_yaml::Value::as_mapping)
            .map(|defaults| {
                defaults
                    .iter()
                    .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.clone())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether consumers should hint about unset defaults. On unless turned off.
    pub(crate) fn nags_enabled(&self) -> bool {
        lookup(&self.document, NAGS_KEYS)
            .and_then(serde_yaml::Value::as_bool)
            .unwrap_or(true)
    }

    pub(crate) fn nags_on(&mut self) -> Result<(), LwError> {
        self.set_nags(true)
    }

    pub(crate) fn nags_off(&mut self) -> Result<(), LwError> {
        self.set_nags(false)
    }

    fn set_nags(&mut self, enabled: bool) -> Result<(), LwError> {
        *lookup_mut(&mut self.document, NAGS_KEYS) = serde_yaml::Value::Bool(enabled);
        write_yaml_document(&self.path, &self.document)
    }
}
