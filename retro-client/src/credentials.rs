//! API credential sources.
//!
//! A [`CredentialSource`] answers "is a key selected?" and can run a
//! selection step. The stored key file lives next to the config:
//! `~/.retrorestore/credentials` (mode 0600).

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use retro_core::config;

use crate::error::{io_err, ClientError};

/// Environment variables consulted by [`EnvCredentials`], in order.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// An API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Trimmed key, or `None` when blank.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// The currently selected key, if any.
    async fn selected(&self) -> Option<ApiKey>;

    /// Run the selection flow. Success means the flow ran, not that a key exists.
    async fn select(&self) -> Result<(), ClientError>;
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Reads the key from `GEMINI_API_KEY`, then `API_KEY`. Selection is a no-op.
#[derive(Debug, Default, Clone)]
pub struct EnvCredentials;

#[async_trait]
impl CredentialSource for EnvCredentials {
    async fn selected(&self) -> Option<ApiKey> {
        API_KEY_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok().and_then(ApiKey::new))
    }

    async fn select(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Static
// ---------------------------------------------------------------------------

/// A fixed key (or none). Used for `--api-key` and in tests.
#[derive(Debug, Clone)]
pub struct StaticCredentials(Option<ApiKey>);

impl StaticCredentials {
    pub fn new(key: ApiKey) -> Self {
        Self(Some(key))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn selected(&self) -> Option<ApiKey> {
        self.0.clone()
    }

    async fn select(&self) -> Result<(), ClientError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File
// ---------------------------------------------------------------------------

type Prompt = Arc<dyn Fn() -> std::io::Result<String> + Send + Sync>;

/// Key persisted in `<home>/.retrorestore/credentials`.
///
/// Selection runs the interactive prompt and stores whatever it returns.
pub struct FileCredentials {
    home: PathBuf,
    prompt: Option<Prompt>,
}

impl FileCredentials {
    pub fn at(home: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
            prompt: None,
        }
    }

    pub fn with_prompt(
        mut self,
        prompt: impl Fn() -> std::io::Result<String> + Send + Sync + 'static,
    ) -> Self {
        self.prompt = Some(Arc::new(prompt));
        self
    }

    pub fn path(&self) -> PathBuf {
        credentials_path_at(&self.home)
    }

    pub fn load(&self) -> Result<Option<ApiKey>, ClientError> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        Ok(ApiKey::new(contents))
    }

    /// Atomic write: `.tmp` sibling → `chmod 0600` → `rename`.
    pub fn store(&self, key: &ApiKey) -> Result<PathBuf, ClientError> {
        config::ensure_root_dir_at(&self.home)?;
        let path = self.path();
        let tmp = path.with_file_name("credentials.tmp");
        std::fs::write(&tmp, key.expose()).map_err(|e| io_err(&tmp, e))?;
        config::set_file_permissions(&tmp)?;
        std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
        Ok(path)
    }

    /// Remove the stored key. Returns whether a key file existed.
    pub fn clear(&self) -> Result<bool, ClientError> {
        let path = self.path();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(io_err(&path, err)),
        }
    }
}

#[async_trait]
impl CredentialSource for FileCredentials {
    async fn selected(&self) -> Option<ApiKey> {
        match self.load() {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(error = %err, "could not read stored API key");
                None
            }
        }
    }

    async fn select(&self) -> Result<(), ClientError> {
        let Some(prompt) = self.prompt.as_ref() else {
            return Ok(());
        };
        let raw = prompt().map_err(|e| io_err("<prompt>", e))?;
        if let Some(key) = ApiKey::new(raw) {
            let path = self.store(&key)?;
            tracing::info!(path = %path.display(), "API key stored");
        }
        Ok(())
    }
}

/// `<home>/.retrorestore/credentials`: pure, no I/O.
pub fn credentials_path_at(home: &Path) -> PathBuf {
    config::root_dir_at(home).join("credentials")
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Tries each source in order.
pub struct ChainCredentials {
    sources: Vec<Arc<dyn CredentialSource>>,
}

impl ChainCredentials {
    pub fn new(sources: Vec<Arc<dyn CredentialSource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl CredentialSource for ChainCredentials {
    async fn selected(&self) -> Option<ApiKey> {
        for source in &self.sources {
            if let Some(key) = source.selected().await {
                return Some(key);
            }
        }
        None
    }

    /// Runs each source's selection until one of them yields a key.
    async fn select(&self) -> Result<(), ClientError> {
        for source in &self.sources {
            source.select().await?;
            if source.selected().await.is_some() {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("  secret-value \n").expect("key");
        assert_eq!(key.expose(), "secret-value");
        assert_eq!(format!("{key:?}"), "ApiKey(***)");
        assert!(ApiKey::new("   ").is_none());
    }

    #[tokio::test]
    async fn file_select_runs_prompt_and_persists() {
        let home = TempDir::new().expect("home");
        let creds = FileCredentials::at(home.path()).with_prompt(|| Ok("k-123\n".to_string()));
        assert!(creds.selected().await.is_none());

        creds.select().await.expect("select");
        assert_eq!(creds.selected().await.map(|k| k.expose().to_string()).as_deref(), Some("k-123"));
        assert!(!creds.path().with_file_name("credentials.tmp").exists());
    }

    #[tokio::test]
    async fn blank_prompt_answer_selects_nothing() {
        let home = TempDir::new().expect("home");
        let creds = FileCredentials::at(home.path()).with_prompt(|| Ok(String::new()));
        creds.select().await.expect("select");
        assert!(creds.selected().await.is_none());
        assert!(!creds.clear().expect("clear"));
    }

    #[tokio::test]
    async fn chain_prefers_first_source_with_a_key() {
        let chain = ChainCredentials::new(vec![
            Arc::new(StaticCredentials::none()),
            Arc::new(StaticCredentials::new(ApiKey::new("second").unwrap())),
        ]);
        assert_eq!(chain.selected().await.unwrap().expose(), "second");
    }

    #[tokio::test]
    async fn chain_select_reaches_file_prompt() {
        let home = TempDir::new().expect("home");
        let chain = ChainCredentials::new(vec![
            Arc::new(StaticCredentials::none()),
            Arc::new(FileCredentials::at(home.path()).with_prompt(|| Ok("from-prompt".into()))),
        ]);
        chain.select().await.expect("select");
        assert_eq!(chain.selected().await.unwrap().expose(), "from-prompt");
    }
}
