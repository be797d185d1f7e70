//! User configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.retrorestore/
//!   config.yaml     (mode 0600)
//!   credentials     (mode 0600, written by retro-client)
//! ```
//!
//! Every function has two forms: `fn_at(home: &Path, …)` with an explicit
//! home (used by tests with `TempDir`) and `fn(…)` which derives home from
//! `dirs::home_dir()` and delegates to `_at`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_SIZE: &str = "2K";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_OUTPUT_DIR: &str = "restored";

pub const ENV_MODEL: &str = "RETRORESTORE_MODEL";
pub const ENV_ENDPOINT: &str = "RETRORESTORE_ENDPOINT";

/// Restoration settings read from `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    pub model: String,
    pub endpoint: String,
    /// Output size hint passed to the model.
    pub image_size: String,
    pub timeout_secs: u64,
    /// Cap on simultaneous requests; `None` dispatches a whole batch at once.
    pub max_concurrency: Option<usize>,
    pub output_dir: Option<PathBuf>,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            image_size: DEFAULT_IMAGE_SIZE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_concurrency: None,
            output_dir: None,
        }
    }
}

impl RestoreConfig {
    /// Directory downloads go to when no `--out` is given.
    pub fn output_dir_or_default(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
    }

    /// Overlay `RETRORESTORE_MODEL` and `RETRORESTORE_ENDPOINT` from the environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |var| lookup(var).filter(|v: &String| !v.trim().is_empty());
        if let Some(model) = non_blank(ENV_MODEL) {
            self.model = model;
        }
        if let Some(endpoint) = non_blank(ENV_ENDPOINT) {
            self.endpoint = endpoint;
        }
        self
    }
}

/// `<home>/.retrorestore/`
pub fn root_dir_at(home: &Path) -> PathBuf {
    home.join(".retrorestore")
}

/// `<home>/.retrorestore/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    root_dir_at(home).join("config.yaml")
}

/// Create `<home>/.retrorestore/` (mode `0700`) if absent.
pub fn ensure_root_dir_at(home: &Path) -> Result<PathBuf, ConfigError> {
    let dir = root_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

/// Load the config, falling back to defaults when the file does not exist.
pub fn load_at(home: &Path) -> Result<RestoreConfig, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(RestoreConfig::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    if contents.trim().is_empty() {
        return Ok(RestoreConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<RestoreConfig, ConfigError> {
    load_at(&home()?)
}

/// Atomically save the config: serialize → `.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &RestoreConfig) -> Result<PathBuf, ConfigError> {
    ensure_root_dir_at(home)?;
    let path = config_path_at(home);
    let tmp = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp, yaml)?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, &path)?;
    Ok(path)
}

/// `save_at` convenience wrapper.
pub fn save(config: &RestoreConfig) -> Result<PathBuf, ConfigError> {
    save_at(&home()?, config)
}

pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
pub fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
pub fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let home = TempDir::new().expect("tempdir");
        let config = load_at(home.path()).expect("load");
        assert_eq!(config, RestoreConfig::default());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_concurrency, None);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let home = TempDir::new().expect("tempdir");
        let config = RestoreConfig {
            max_concurrency: Some(2),
            output_dir: Some(PathBuf::from("/tmp/out")),
            ..RestoreConfig::default()
        };
        let path = save_at(home.path(), &config).expect("save");
        assert!(path.ends_with(".retrorestore/config.yaml"));
        assert!(!path.with_file_name("config.yaml.tmp").exists());
        assert_eq!(load_at(home.path()).expect("load"), config);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let home = TempDir::new().expect("tempdir");
        ensure_root_dir_at(home.path()).expect("mkdir");
        std::fs::write(config_path_at(home.path()), "max_concurrency: 3\n").expect("write");
        let config = load_at(home.path()).expect("load");
        assert_eq!(config.max_concurrency, Some(3));
        assert_eq!(config.image_size, DEFAULT_IMAGE_SIZE);
    }

    #[test]
    fn output_dir_falls_back() {
        assert_eq!(
            RestoreConfig::default().output_dir_or_default(),
            PathBuf::from(DEFAULT_OUTPUT_DIR)
        );
    }

    #[test]
    fn env_overrides_replace_model_and_endpoint() {
        let config = RestoreConfig::default().with_overrides(|var| match var {
            ENV_MODEL => Some("other-model".to_string()),
            ENV_ENDPOINT => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(config.model, "other-model");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn home_not_found_error_message() {
        assert!(ConfigError::HomeNotFound.to_string().contains("home directory"));
    }
}
