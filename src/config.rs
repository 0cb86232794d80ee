use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::InkError;
use crate::provider::{Credential, PollPolicy};

pub const DEFAULT_API_BASE: &str = "https://api.replicate.com/v1";
pub const PRIMARY_MODEL: &str = "bytedance/seedream-4";
pub const FALLBACK_MODEL: &str = "google/nano-banana";
pub const CRITIQUE_MODEL: &str = "meta/meta-llama-3-8b-instruct";
pub const TOKEN_ENV: &str = "REPLICATE_API_TOKEN";

/// Name of the persisted token file, and of the key the original storage used.
pub const TOKEN_STORAGE_KEY: &str = "replicate_api_token";

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Everything the orchestrator needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub credential: Option<Credential>,
    pub primary_model: String,
    pub fallback_model: String,
    pub critique_model: String,
    pub generation_poll: PollPolicy,
    pub critique_poll: PollPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            credential: None,
            primary_model: PRIMARY_MODEL.to_string(),
            fallback_model: FALLBACK_MODEL.to_string(),
            critique_model: CRITIQUE_MODEL.to_string(),
            generation_poll: PollPolicy::generation(),
            critique_poll: PollPolicy::critique(),
        }
    }
}

impl Config {
    /// Reads overrides from the environment (call `dotenv` first) and
    /// resolves the credential through `store`.
    pub fn from_env(store: &CredentialStore) -> Self {
        let mut config = Self {
            credential: store.resolve(),
            ..Self::default()
        };
        if let Some(base) = non_empty_env("REPLICATE_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(model) = non_empty_env("INKSIGHT_PRIMARY_MODEL") {
            config.primary_model = model;
        }
        if let Some(model) = non_empty_env("INKSIGHT_FALLBACK_MODEL") {
            config.fallback_model = model;
        }
        if let Some(model) = non_empty_env("INKSIGHT_CRITIQUE_MODEL") {
            config.critique_model = model;
        }
        if let Some(raw) = non_empty_env("INKSIGHT_MAX_POLL_ATTEMPTS") {
            match raw.parse::<u32>() {
                Ok(0) => {
                    config.generation_poll.max_attempts = None;
                    config.critique_poll.max_attempts = None;
                }
                Ok(n) => {
                    config.generation_poll.max_attempts = Some(n);
                    config.critique_poll.max_attempts = Some(n);
                }
                Err(_) => warn!("⚠️ Ignoring INKSIGHT_MAX_POLL_ATTEMPTS={raw}: not a number"),
            }
        }
        config
    }

    pub fn with_credential(mut self, token: &str) -> Self {
        self.credential = Credential::new(token);
        self
    }

    pub fn is_configured(&self) -> bool {
        self.credential.is_some()
    }
}

/// Token persisted on local disk, checked before the environment.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `INKSIGHT_TOKEN_FILE`, else `~/.config/inksight/replicate_api_token`.
    pub fn default_location() -> Self {
        if let Some(path) = non_empty_env("INKSIGHT_TOKEN_FILE") {
            return Self::new(path);
        }
        let home = non_empty_env("HOME").or_else(|| non_empty_env("USERPROFILE")).unwrap_or_else(|| ".".into());
        Self::new(Path::new(&home).join(".config").join("inksight").join(TOKEN_STORAGE_KEY))
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn load(&self) -> Option<Credential> {
        fs::read_to_string(&self.path).ok().and_then(Credential::new)
    }

    pub fn save(&self, token: &str) -> Result<Credential, InkError> {
        let credential = Credential::new(token)
            .ok_or_else(|| InkError::InvalidRequest("token must not be empty".into()))?;
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| InkError::CredentialStore(e.to_string()))?;
        }
        fs::write(&self.path, credential.expose()).map_err(|e| InkError::CredentialStore(e.to_string()))?;
        info!("🔑 Saved API token {} to {}", credential.masked(), self.path.display());
        Ok(credential)
    }

    pub fn clear(&self) -> Result<(), InkError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(InkError::CredentialStore(e.to_string())),
        }
    }

    /// Persisted token, then runtime environment, then the value baked in at build time.
    pub fn resolve(&self) -> Option<Credential> {
        self.load()
            .or_else(|| non_empty_env(TOKEN_ENV).and_then(Credential::new))
            .or_else(|| option_env!("REPLICATE_API_TOKEN").and_then(Credential::new))
    }

    pub fn is_configured(&self) -> bool {
        self.resolve().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn persisted_token_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("nested").join(TOKEN_STORAGE_KEY));
        assert_eq!(store.load(), None);

        store.save("  r8_secret\n").unwrap();
        assert_eq!(store.load().unwrap().expose(), "r8_secret");
        assert_eq!(store.resolve().unwrap().expose(), "r8_secret");

        store.clear().unwrap();
        assert_eq!(store.load(), None);
        store.clear().unwrap();
    }

    #[test]
    fn blank_tokens_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join(TOKEN_STORAGE_KEY));
        assert!(matches!(store.save("   "), Err(InkError::InvalidRequest(_))));
    }

    #[test]
    fn defaults_match_provider_catalogue() {
        let config = Config::default().with_credential("r8_x");
        assert!(config.is_configured());
        assert_eq!(config.primary_model, PRIMARY_MODEL);
        assert_eq!(config.fallback_model, FALLBACK_MODEL);
        assert_eq!(config.generation_poll.interval.as_millis(), 1500);
        assert_eq!(config.critique_poll.interval.as_millis(), 500);
        assert!(!Config::default().is_configured());
    }
}
