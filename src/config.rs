// src/config.rs

//! Configuration file
//!
//! ```toml
//! concurrency = 32
//! lock_stale_secs = 600
//! context_lines = 3
//! protected_paths = ["CLAUDE.md", "memory/"]
//! settings_file = "settings.json"
//! state_dir = ".kitsync"
//! ```
//!
//! Every key is optional. The file is looked up at `--config`, then
//! `$KITSYNC_CONFIG`, then `<config dir>/kitsync/config.toml`.

use crate::filesystem::sanitize_path;
use crate::hunk::DEFAULT_CONTEXT_LINES;
use crate::lock::DEFAULT_STALE_AFTER;
use crate::parallel::default_concurrency;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "KITSYNC_CONFIG";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Maximum concurrent file operations
    pub concurrency: usize,
    /// Seconds after which a contended lock is reported as stale
    pub lock_stale_secs: u64,
    /// Context lines around each hunk
    pub context_lines: usize,
    /// Relative path prefixes whose user edits are never merged
    pub protected_paths: Vec<String>,
    /// Settings document, relative to the install target
    pub settings_file: String,
    /// Engine state directory, relative to the install target
    pub state_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            lock_stale_secs: DEFAULT_STALE_AFTER.as_secs(),
            context_lines: DEFAULT_CONTEXT_LINES,
            protected_paths: Vec::new(),
            settings_file: "settings.json".to_string(),
            state_dir: ".kitsync".to_string(),
        }
    }
}

impl Config {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file; a missing file gives the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => {
                debug!("Loading configuration from {}", path.display());
                Self::from_toml_str(&content).map_err(|e| match e {
                    Error::ConfigError(msg) => {
                        Error::ConfigError(format!("{}: {}", path.display(), msg))
                    }
                    other => other,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(Error::ConfigError(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Resolve and load the configuration
    ///
    /// An explicitly given path must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit
            && !path.exists()
        {
            return Err(Error::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        match resolve_path(explicit, std::env::var_os(CONFIG_ENV_VAR)) {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Check values that parse but cannot be used
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::ConfigError("concurrency must be at least 1".to_string()));
        }
        sanitize_path(&self.settings_file)
            .map_err(|e| Error::ConfigError(format!("settings_file: {}", e)))?;
        sanitize_path(&self.state_dir)
            .map_err(|e| Error::ConfigError(format!("state_dir: {}", e)))?;
        for prefix in &self.protected_paths {
            sanitize_path(prefix)
                .map_err(|e| Error::ConfigError(format!("protected_paths: {}", e)))?;
        }
        Ok(())
    }

    pub fn lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.lock_stale_secs)
    }
}

/// Default config location under the platform config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("kitsync").join("config.toml"))
}

/// Pick the config path: explicit, then environment, then default
pub fn resolve_path(explicit: Option<&Path>, env_value: Option<OsString>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| env_value.filter(|v| !v.is_empty()).map(PathBuf::from))
        .or_else(default_config_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml_str(
            r#"
            concurrency = 4
            protected_paths = ["CLAUDE.md", "memory/"]
            "#,
        )
        .unwrap();

        assert_eq!(config.concurrency, 4);
        assert_eq!(config.protected_paths, vec!["CLAUDE.md", "memory/"]);
        assert_eq!(config.lock_stale_secs, 300);
        assert_eq!(config.settings_file, "settings.json");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Config::from_toml_str("concurrency = \"many\""),
            Err(Error::ConfigError(_))
        ));
        assert!(Config::from_toml_str("concurrency = 0").is_err());
        assert!(Config::from_toml_str("state_dir = \"../outside\"").is_err());
        assert!(Config::from_toml_str("unknown_key = 1").is_err());
    }

    #[test]
    fn test_load_from_missing_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_explicit_missing_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.toml");
        assert!(matches!(Config::load(Some(&missing)), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_load_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "context_lines = 5\nlock_stale_secs = 60\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.context_lines, 5);
        assert_eq!(config.lock_stale_after(), Duration::from_secs(60));
    }

    #[test]
    fn test_malformed_file_names_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "concurrency = [").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_resolve_path_order() {
        let explicit = PathBuf::from("/etc/kitsync.toml");
        assert_eq!(
            resolve_path(Some(&explicit), Some(OsString::from("/env.toml"))),
            Some(explicit)
        );
        assert_eq!(
            resolve_path(None, Some(OsString::from("/env.toml"))),
            Some(PathBuf::from("/env.toml"))
        );
        assert_eq!(resolve_path(None, Some(OsString::new())), default_config_path());
    }
}
