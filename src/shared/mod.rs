use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::cli::error::LwError;

/// Resolves `~/<file_name>`.
pub(crate) fn home_file(file_name: &str) -> Result<PathBuf, LwError> {
    let home = dirs::home_dir()
        .ok_or_else(|| LwError::config(file_name, "cannot determine the home directory"))?;

    Ok(home.join(file_name))
}

/// Reads a YAML document, treating a missing or empty file as an empty mapping.
pub(crate) fn read_yaml_document(path: &Path) -> Result<serde_yaml::Value, LwError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(LwError::config(path, format!("cannot read: {e}"))),
    };

    if contents.trim().is_empty() {
        return Ok(serde_yaml::Value::Mapping(Default::default()));
    }

    let document: serde_yaml::Value = serde_yaml::from_str(&contents)
        .map_err(|e| LwError::config(path, format!("not valid YAML: {e}")))?;

    match document {
        serde_yaml::Value::Mapping(_) => Ok(document),
        serde_yaml::Value::Null => Ok(serde_yaml::Value::Mapping(Default::default())),
        _ => Err(LwError::config(path, "top level is not a mapping")),
    }
}

/// Serializes `document` next to `path` and renames it into place, so readers
/// only ever see the old or the new contents. The file ends up mode 0600.
#[tracing::instrument(skip(document))]
pub(crate) fn write_yaml_document(path: &Path, document: &serde_yaml::Value) -> Result<(), LwError> {
    let contents = serde_yaml::to_string(document)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    // NamedTempFile is created 0600 on unix.
    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(contents.as_bytes())?;
    staged.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(staged.path(), std::fs::Permissions::from_mode(0o600))?;
    }

    staged.persist(path).map_err(|e| LwError::Filesystem(e.error))?;
    tracing::debug!("wrote {}", path.display());

    Ok(())
}

/// Walks `keys` down from `document`, returning `None` at the first absent key.
pub(crate) fn lookup<'a>(
    document: &'a serde_yaml::Value,
    keys: &[&str],
) -> Option<&'a serde_yaml::Value> {
    keys.iter().try_fold(document, |node, key| node.get(*key))
}

/// Walks `keys` down from `document`, creating empty mappings along the way.
/// A non-mapping value in the way is replaced.
pub(crate) fn lookup_mut<'a>(
    document: &'a mut serde_yaml::Value,
    keys: &[&str],
) -> &'a mut serde_yaml::Value {
    keys.iter().fold(document, |node, key| {
        if !node.is_mapping() {
            *node = serde_yaml::Value::Mapping(Default::default());
        }
        let serde_yaml::Value::Mapping(map) = node else {
            unreachable!("node was just made a mapping")
        };
        map.entry(serde_yaml::Value::String(key.to_string()))
            .or_insert_with(|| serde_yaml::Value::Mapping(Default::default()))
    })
}
