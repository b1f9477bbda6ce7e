use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub(crate) enum LwError {
    #[error("invalid input {value:?} for rule {rule}: {reason}")]
    Input {
        value: String,
        rule: String,
        reason: String,
    },

    #[error("configuration error in {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("no current context is set; run `lw auth init` or `lw auth use-context <name>`")]
    NoCurrentContext,

    #[error("transport error calling {method}: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("call to {method} timed out after {seconds}s")]
    Timeout { method: String, seconds: u64 },

    #[error("{method} returned an unexpected response (HTTP {status})")]
    MalformedResponse { method: String, status: u16 },

    #[error("remote fault {class}: {message}")]
    RemoteFault {
        class: String,
        message: String,
        detail: Option<String>,
    },

    #[error("cannot decode {path}: expected {expected}, {reason}")]
    DecodeMismatch {
        path: String,
        expected: String,
        reason: String,
    },

    #[error("flag {0:?} is not permitted to have a default")]
    Forbidden(String),

    #[error("no default is set for flag {0:?}")]
    NotFound(String),

    #[error("{program} exited with {status}")]
    Subprocess {
        program: String,
        status: std::process::ExitStatus,
    },

    #[error("file error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("interactive prompt error: {0}")]
    Interactive(#[from] inquire::InquireError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("template error: {0}")]
    Render(#[from] handlebars::RenderError),
}

impl LwError {
    pub(crate) fn input(
        value: impl Into<String>,
        rule: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Input {
            value: value.into(),
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// The error's class in the user-facing taxonomy.
    pub(crate) fn class(&self) -> &'static str {
        match self {
            LwError::Input { .. } => "Input",
            LwError::Config { .. } | LwError::Yaml(_) | LwError::Filesystem(_) => "Config",
            LwError::NoCurrentContext => "NoCurrentContext",
            LwError::Transport { .. }
            | LwError::Timeout { .. }
            | LwError::MalformedResponse { .. }
            | LwError::Subprocess { .. } => "Transport",
            LwError::RemoteFault { .. } => "RemoteFault",
            LwError::DecodeMismatch { .. } | LwError::Json(_) => "DecodeMismatch",
            LwError::Forbidden(_) => "Forbidden",
            LwError::NotFound(_) => "NotFound",
            LwError::Interactive(_) | LwError::Render(_) => "Input",
        }
    }
}
