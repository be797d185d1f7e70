pub mod config;
pub mod key;
pub mod restore;
pub mod session;

use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use retro_client::{
    ApiKey, ChainCredentials, CredentialSource, EnvCredentials, FileCredentials, GeminiClient,
    GeminiConfig, StaticCredentials,
};
use retro_core::RestoreConfig;
use retro_runtime::Orchestrator;

/// Single-threaded runtime: restores interleave cooperatively on this thread.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

/// Read one line from stdin after printing `message` to stderr.
pub fn prompt_line(message: &str) -> std::io::Result<String> {
    eprint!("{message}");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// `--api-key` wins; otherwise the environment, then the stored key file.
/// With `prompt` set the file source asks on stdin when selection is needed.
pub fn credentials(
    home: &Path,
    api_key: Option<&str>,
    prompt: bool,
) -> Result<Arc<dyn CredentialSource>> {
    if let Some(raw) = api_key {
        let key = ApiKey::new(raw).context("--api-key must not be blank")?;
        return Ok(Arc::new(StaticCredentials::new(key)));
    }
    let mut file = FileCredentials::at(home);
    if prompt {
        file = file.with_prompt(|| prompt_line("Gemini API key: "));
    }
    Ok(Arc::new(ChainCredentials::new(vec![
        Arc::new(EnvCredentials),
        Arc::new(file),
    ])))
}

/// Build the orchestrator shared by `restore` and `session`.
pub fn orchestrator(
    config: &RestoreConfig,
    credentials: Arc<dyn CredentialSource>,
    max_concurrency: Option<usize>,
) -> Result<Orchestrator> {
    let client = GeminiClient::new(GeminiConfig::from(config), credentials.clone())
        .context("failed to build HTTP client")?;
    Ok(Orchestrator::new(Arc::new(client))
        .with_credentials(credentials)
        .with_max_concurrency(max_concurrency.or(config.max_concurrency)))
}

/// Config file values with environment overrides applied.
pub fn load_config(home: &Path) -> Result<RestoreConfig> {
    Ok(retro_core::config::load_at(home)
        .context("failed to load config")?
        .with_env_overrides())
}

pub fn home() -> Result<std::path::PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}
