//! Named API credentials and the pointer to the one in use.
//!
//! The store lives under `liquidweb.api` in the credential file. Anything else
//! in that file is carried through untouched when the store is saved.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cli::error::LwError;
use crate::shared::{lookup, lookup_mut, read_yaml_document, write_yaml_document};
use crate::validate::{validate, Candidate};

pub(crate) const CREDENTIAL_FILE_NAME: &str = ".lw.yaml";
pub(crate) const DEFAULT_API_URL: &str = "https://api.liquidweb.com";
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;

const CONTEXTS_KEYS: &[&str] = &["liquidweb", "api", "contexts"];
const CURRENT_CONTEXT_KEYS: &[&str] = &["liquidweb", "api", "current_context"];

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AuthContext {
    #[serde(rename = "contextname")]
    pub(crate) context_name: String,
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) url: String,
    #[serde(default)]
    pub(crate) insecure: bool,
    #[serde(default = "default_timeout")]
    pub(crate) timeout: u64,

    #[serde(flatten)]
    pub(crate) extra: BTreeMap<String, serde_yaml::Value>,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("context_name", &self.context_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("url", &self.url)
            .field("insecure", &self.insecure)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AuthContext {
    pub(crate) fn new(
        context_name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            context_name: context_name.into(),
            username: username.into(),
            password: password.into(),
            url: String::from(DEFAULT_API_URL),
            insecure: false,
            timeout: DEFAULT_TIMEOUT_SECS,
            extra: BTreeMap::new(),
        }
    }

    /// Checks the invariants every stored context must hold.
    pub(crate) fn check(&self) -> Result<(), LwError> {
        validate([
            (Candidate::from(&self.context_name), "NonEmptyString"),
            (Candidate::from(&self.username), "NonEmptyString"),
        ])?;

        let url = url::Url::parse(&self.url)
            .map_err(|e| LwError::input(&self.url, "https url", e.to_string()))?;
        if url.scheme() != "https" {
            return Err(LwError::input(&self.url, "https url", "must use https"));
        }

        if self.timeout < 1 {
            return Err(LwError::input(
                self.timeout.to_string(),
                "timeout",
                "must be at least 1 second",
            ));
        }

        Ok(())
    }
}

/// Changes requested by `update-context`. `None` leaves a field alone.
#[derive(Debug, Default)]
pub(crate) struct ContextUpdate {
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) url: Option<String>,
    pub(crate) timeout: Option<u64>,
    pub(crate) set_secure: bool,
    pub(crate) set_insecure: bool,
}

impl ContextUpdate {
    fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.password.is_none()
            && self.url.is_none()
            && self.timeout.is_none()
            && !self.set_secure
            && !self.set_insecure
    }
}

/// Interactive input used by onboarding.
pub(crate) trait Prompter {
    fn text(&mut self, message: &str, default: Option<&str>) -> Result<String, LwError>;
    fn password(&mut self, message: &str) -> Result<String, LwError>;
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool, LwError>;
    fn notify(&mut self, message: &str);
}

pub(crate) struct CredentialStore {
    path: PathBuf,
    document: serde_yaml::Value,
    contexts: BTreeMap<String, AuthContext>,
    current_context: String,
}

impl CredentialStore {
    pub(crate) fn default_path() -> Result<PathBuf, LwError> {
        crate::shared::home_file(CREDENTIAL_FILE_NAME)
    }

    #[tracing::instrument]
    pub(crate) fn load(path: &Path) -> Result<Self, LwError> {
        let document = read_yaml_document(path)?;

        let contexts = match lookup(&document, CONTEXTS_KEYS) {
            Some(serde_yaml::Value::Null) | None => BTreeMap::new(),
            Some(contexts) => serde_yaml::from_value(contexts.clone())
                .map_err(|e| LwError::config(path, format!("malformed contexts: {e}")))?,
        };

        let current_context = match lookup(&document, CURRENT_CONTEXT_KEYS) {
            Some(serde_yaml::Value::String(name)) => name.clone(),
            Some(serde_yaml::Value::Null) | None => String::new(),
            Some(_) => {
                return Err(LwError::config(path, "current_context is not a string"));
            }
        };

        tracing::debug!(
            contexts = contexts.len(),
            current_context = %current_context,
            "loaded credential store"
        );

        Ok(Self {
            path: path.to_path_buf(),
            document,
            contexts,
            current_context,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn current_context(&self) -> Option<&str> {
        if self.current_context.is_empty() {
            None
        } else {
            Some(&self.current_context)
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&AuthContext> {
        self.contexts.get(name)
    }

    pub(crate) fn list(&self) -> impl Iterator<Item = &AuthContext> {
        self.contexts.values()
    }

    /// The context API calls should use: `name_override` when given,
    /// otherwise the current context.
    pub(crate) fn active(&self, name_override: Option<&str>) -> Result<&AuthContext, LwError> {
        let name = match name_override {
            Some(name) => name,
            None => self.current_context().ok_or(LwError::NoCurrentContext)?,
        };

        let context = self.contexts.get(name).ok_or_else(|| {
            LwError::config(&self.path, format!("context {name:?} does not exist"))
        })?;

        // The file may have been edited by hand since the context was added.
        context
            .check()
            .map_err(|e| LwError::config(&self.path, format!("context {name:?} is invalid: {e}")))?;

        Ok(context)
    }

    #[tracing::instrument(skip_all, fields(context = %context.context_name))]
    pub(crate) fn add(&mut self, context: AuthContext) -> Result<(), LwError> {
        context.check()?;

        if self.contexts.contains_key(&context.context_name) {
            tracing::debug!("replacing existing context");
        }
        self.contexts.insert(context.context_name.clone(), context);

        self.save()
    }

    #[tracing::instrument(skip(self, update))]
    pub(crate) fn update(&mut self, name: &str, update: ContextUpdate) -> Result<(), LwError> {
        if update.is_empty() {
            return Err(LwError::input(
                name,
                "update-context",
                "at least one field to change is required",
            ));
        }
        if update.set_secure && update.set_insecure {
            return Err(LwError::input(
                name,
                "update-context",
                "set-secure and set-insecure are mutually exclusive",
            ));
        }

        let existing = self
            .contexts
            .get(name)
            .ok_or_else(|| LwError::input(name, "update-context", "no such context"))?;

        let mut updated = existing.clone();
        if let Some(username) = update.username {
            updated.username = username;
        }
        if let Some(password) = update.password {
            updated.password = password;
        }
        if let Some(url) = update.url {
            updated.url = url;
        }
        if let Some(timeout) = update.timeout {
            updated.timeout = timeout;
        }
        if update.set_secure {
            updated.insecure = false;
        }
        if update.set_insecure {
            updated.insecure = true;
        }
        updated.check()?;

        self.contexts.insert(name.to_string(), updated);

        self.save()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn remove(&mut self, name: &str) -> Result<(), LwError> {
        if self.current_context() == Some(name) {
            return Err(LwError::input(
                name,
                "remove-context",
                "cannot remove the current context; use-context another one first",
            ));
        }
        if self.contexts.remove(name).is_none() {
            return Err(LwError::input(name, "remove-context", "no such context"));
        }

        self.save()
    }

    #[tracing::instrument(skip(self))]
    pub(crate) fn use_context(&mut self, name: &str) -> Result<(), LwError> {
        if !self.contexts.contains_key(name) {
            return Err(LwError::input(name, "use-context", "no such context"));
        }
        self.current_context = name.to_string();

        self.save()
    }

    /// Walks the operator through creating one or more contexts, then saves
    /// them all at once.
    pub(crate) fn init_interactive(&mut self, prompter: &mut impl Prompter) -> Result<(), LwError> {
        loop {
            let context_name = prompt_valid(prompter, |p| {
                let name = p.text("Name this context:", None)?;
                validate([(name.as_str(), "NonEmptyString")])?;
                Ok(name)
            })?;
            if self.contexts.contains_key(&context_name) {
                prompter.notify(&format!("context {context_name} exists and will be replaced"));
            }

            let username = prompt_valid(prompter, |p| {
                let username = p.text("Username:", None)?;
                validate([(username.as_str(), "NonEmptyString")])?;
                Ok(username)
            })?;
            let password = prompter.password("Password:")?;

            let url = prompt_valid(prompter, |p| {
                let url = p.text("API URL:", Some(DEFAULT_API_URL))?;
                validate([(url.as_str(), "HttpsLiquidwebUrl")])?;
                Ok(url)
            })?;
            let insecure = prompter.confirm("Skip TLS certificate verification?", false)?;

            let timeout = prompt_valid(prompter, |p| {
                let raw = p.text("Timeout (seconds):", Some(&DEFAULT_TIMEOUT_SECS.to_string()))?;
                let timeout = raw
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|t| *t >= 1)
                    .ok_or_else(|| LwError::input(&raw, "timeout", "must be a whole number of seconds, at least 1"))?;
                Ok(timeout)
            })?;

            let make_current = prompter.confirm("Make this the current context?", true)?;

            let context = AuthContext {
                url,
                insecure,
                timeout,
                ..AuthContext::new(&context_name, username, password)
            };
            context.check()?;
            self.contexts.insert(context_name.clone(), context);
            if make_current {
                self.current_context = context_name;
            }

            if !prompter.confirm("Add another context?", false)? {
                break;
            }
        }

        self.save()
    }

    fn save(&mut self) -> Result<(), LwError> {
        *lookup_mut(&mut self.document, CONTEXTS_KEYS) =
            serde_yaml::to_value(&self.contexts)?;
        *lookup_mut(&mut self.document, CURRENT_CONTEXT_KEYS) =
            serde_yaml::Value::String(self.current_context.clone());

        write_yaml_document(&self.path, &self.document)
    }
}

/// Re-asks until `ask` produces a value that passes its own checks.
/// Prompt failures (e.g. an interrupted terminal) are returned immediately.
fn prompt_valid<P, T, F>(prompter: &mut P, mut ask: F) -> Result<T, LwError>
where
    P: Prompter,
    F: FnMut(&mut P) -> Result<T, LwError>,
{
    loop {
        match ask(prompter) {
            Ok(value) => return Ok(value),
            Err(err @ LwError::Input { .. }) => prompter.notify(&err.to_string()),
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::collections::VecDeque;

    use super::{AuthContext, ContextUpdate, CredentialStore, Prompter};
    use crate::cli::error::LwError;

    /// Answers prompts from a fixed script. Empty text answers take the default.
    pub(crate) struct ScriptedPrompter {
        pub(crate) answers: VecDeque<&'static str>,
        pub(crate) notices: Vec<String>,
    }

    impl ScriptedPrompter {
        pub(crate) fn new(answers: &[&'static str]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                notices: Vec::new(),
            }
        }

        fn next(&mut self) -> Result<&'static str, LwError> {
            self.answers.pop_front().ok_or(LwError::Interactive(
                inquire::InquireError::OperationInterrupted,
            ))
        }
    }

    impl Prompter for ScriptedPrompter {
        fn text(&mut self, _message: &str, default: Option<&str>) -> Result<String, LwError> {
            let answer = self.next()?;
            match (answer, default) {
                ("", Some(default)) => Ok(default.to_string()),
                (answer, _) => Ok(answer.to_string()),
            }
        }

        fn password(&mut self, _message: &str) -> Result<String, LwError> {
            self.next().map(String::from)
        }

        fn confirm(&mut self, _message: &str, default: bool) -> Result<bool, LwError> {
            match self.next()? {
                "" => Ok(default),
                answer => Ok(matches!(answer, "y" | "yes")),
            }
        }

        fn notify(&mut self, message: &str) {
            self.notices.push(message.to_string());
        }
    }

    fn store_in(dir: &tempfile::TempDir) -> CredentialStore {
        CredentialStore::load(&dir.path().join(".lw.yaml")).unwrap()
    }

    #[test]
    fn onboarding_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        // name, user, password, url, insecure, timeout, make current, another
        let mut prompter =
            ScriptedPrompter::new(&["dev", "alice", "p@ss", "", "no", "", "yes", "no"]);
        store.init_interactive(&mut prompter).unwrap();

        let reloaded = CredentialStore::load(store.path()).unwrap();
        assert_eq!(reloaded.current_context(), Some("dev"));
        let dev = reloaded.get("dev").unwrap();
        assert_eq!(dev.username, "alice");
        assert_eq!(dev.password, "p@ss");
        assert_eq!(dev.url, "https://api.liquidweb.com");
        assert_eq!(dev.timeout, 30);
        assert!(!dev.insecure);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn onboarding_reprompts_bad_answers() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        let mut prompter = ScriptedPrompter::new(&[
            "",
            "dev",
            "alice",
            "p@ss",
            "http://api.liquidweb.com",
            "",
            "",
            "zero",
            "0",
            "45",
            "",
            "",
        ]);
        store.init_interactive(&mut prompter).unwrap();

        assert_eq!(prompter.notices.len(), 4);
        assert_eq!(store.get("dev").unwrap().timeout, 45);
        assert_eq!(store.current_context(), Some("dev"));
    }

    #[test]
    fn interrupted_onboarding_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        let mut prompter = ScriptedPrompter::new(&["dev", "alice"]);
        assert!(store.init_interactive(&mut prompter).is_err());
        assert!(!store.path().exists());
    }

    #[test]
    fn add_use_and_refuse_to_remove_current() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.add(AuthContext::new("dev", "alice", "p@ss")).unwrap();
        store.use_context("dev").unwrap();

        store
            .add(AuthContext {
                timeout: 60,
                ..AuthContext::new("prod", "bob", "x")
            })
            .unwrap();
        store.use_context("prod").unwrap();
        assert_eq!(store.current_context(), Some("prod"));

        let before = std::fs::read(store.path()).unwrap();
        let err = store.remove("prod").unwrap_err();
        assert_eq!(err.class(), "Input");
        assert_eq!(std::fs::read(store.path()).unwrap(), before);

        store.remove("dev").unwrap();
        let reloaded = CredentialStore::load(store.path()).unwrap();
        assert!(reloaded.get("dev").is_none());
        assert_eq!(reloaded.get("prod").unwrap().timeout, 60);
        assert_eq!(reloaded.current_context(), Some("prod"));
    }

    #[test]
    fn use_and_remove_unknown_contexts_fail() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        assert_eq!(store.use_context("ghost").unwrap_err().class(), "Input");
        assert_eq!(store.remove("ghost").unwrap_err().class(), "Input");
        assert!(!store.path().exists());
    }

    #[test]
    fn update_rules() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.add(AuthContext::new("dev", "alice", "p@ss")).unwrap();

        assert!(store.update("dev", ContextUpdate::default()).is_err());
        assert!(
            store
                .update(
                    "dev",
                    ContextUpdate {
                        set_secure: true,
                        set_insecure: true,
                        ..Default::default()
                    }
                )
                .is_err()
        );
        assert!(
            store
                .update(
                    "dev",
                    ContextUpdate {
                        url: Some(String::from("http://api.liquidweb.com")),
                        ..Default::default()
                    }
                )
                .is_err()
        );

        store
            .update(
                "dev",
                ContextUpdate {
                    password: Some(String::from("new")),
                    timeout: Some(90),
                    set_insecure: true,
                    ..Default::default()
                },
            )
            .unwrap();

        let reloaded = CredentialStore::load(store.path()).unwrap();
        let dev = reloaded.get("dev").unwrap();
        assert_eq!(dev.password, "new");
        assert_eq!(dev.timeout, 90);
        assert!(dev.insecure);
        assert_eq!(dev.username, "alice");
    }

    #[test]
    fn add_rejects_non_https_and_zero_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        let plain_http = AuthContext {
            url: String::from("http://api.liquidweb.com"),
            insecure: true,
            ..AuthContext::new("dev", "alice", "p@ss")
        };
        assert!(store.add(plain_http).is_err());

        let zero_timeout = AuthContext {
            timeout: 0,
            ..AuthContext::new("dev", "alice", "p@ss")
        };
        assert!(store.add(zero_timeout).is_err());
        assert!(!store.path().exists());
    }

    #[test]
    fn active_context_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        assert!(matches!(store.active(None), Err(LwError::NoCurrentContext)));

        store.add(AuthContext::new("dev", "alice", "p@ss")).unwrap();
        store.add(AuthContext::new("prod", "bob", "x")).unwrap();
        store.use_context("dev").unwrap();

        assert_eq!(store.active(None).unwrap().username, "alice");
        assert_eq!(store.active(Some("prod")).unwrap().username, "bob");
        assert_eq!(store.active(Some("ghost")).unwrap_err().class(), "Config");
    }

    #[test]
    fn dangling_current_context_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".lw.yaml");
        std::fs::write(
            &path,
            "liquidweb:\n  api:\n    current_context: gone\n    contexts: {}\n",
        )
        .unwrap();

        let store = CredentialStore::load(&path).unwrap();
        assert_eq!(store.active(None).unwrap_err().class(), "Config");
    }

    #[test]
    fn hand_edited_contexts_are_checked_before_use() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".lw.yaml");
        std::fs::write(
            &path,
            "\
liquidweb:
  api:
    current_context: plain
    contexts:
      plain:
        contextname: plain
        username: alice
        password: p@ss
        url: http://api.liquidweb.com
        timeout: 30
      hasty:
        contextname: hasty
        username: alice
        password: p@ss
        url: https://api.liquidweb.com
        timeout: 0
",
        )
        .unwrap();

        let store = CredentialStore::load(&path).unwrap();
        assert_eq!(store.active(None).unwrap_err().class(), "Config");
        assert_eq!(store.active(Some("hasty")).unwrap_err().class(), "Config");
        assert_eq!(store.list().count(), 2);
    }

    #[test]
    fn unknown_keys_survive_a_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".lw.yaml");
        std::fs::write(
            &path,
            "\
liquidweb:
  api:
    color: always
    current_context: dev
    contexts:
      dev:
        contextname: dev
        username: alice
        password: p@ss
        url: https://api.liquidweb.com
        insecure: false
        timeout: 30
        region: us-central
",
        )
        .unwrap();

        let mut store = CredentialStore::load(&path).unwrap();
        store.add(AuthContext::new("prod", "bob", "x")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("color: always"));
        assert!(contents.contains("region: us-central"));
        assert!(contents.contains("contextname: prod"));
    }
}
