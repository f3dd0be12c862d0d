//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/lore/config.toml)
//! 3. Environment variables (LORE_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable prefix
const ENV_PREFIX: &str = "LORE";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the local working copy of the knowledge store
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Version-control remote URL (optional until `init`)
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Seconds to wait for the store lock before giving up
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            remote_url: None,
            lock_timeout_secs: default_lock_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (LORE_DATA_DIR, LORE_REMOTE_URL, LORE_LOCK_TIMEOUT_SECS)
    /// 2. Config file (~/.config/lore/config.toml or LORE_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // LORE_DATA_DIR
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // LORE_REMOTE_URL
        if let Ok(val) = std::env::var(format!("{}_REMOTE_URL", ENV_PREFIX)) {
            self.remote_url = if val.is_empty() { None } else { Some(val) };
        }

        // LORE_LOCK_TIMEOUT_SECS (unparseable values keep the previous setting)
        if let Ok(val) = std::env::var(format!("{}_LOCK_TIMEOUT_SECS", ENV_PREFIX)) {
            self.lock_timeout_secs = val.parse().unwrap_or(self.lock_timeout_secs);
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with LORE_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lore")
            .join("config.toml")
    }

    /// Get the directory that holds per-project documents
    pub fn projects_dir(&self) -> PathBuf {
        self.data_dir.join("projects")
    }

    /// Get the path of the store lock marker
    ///
    /// The marker lives under `.git/` so that staging the working copy can
    /// never pick it up.
    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join(".git").join("lore.lock")
    }

    /// Get the path to the store metadata file
    pub fn store_meta_path(&self) -> PathBuf {
        self.data_dir.join(".lore.toml")
    }

    /// Lock acquisition timeout as a [`Duration`]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lore")
        .join("store")
}

/// Get the default lock timeout in seconds
fn default_lock_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap();
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            // Clear all the vars
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "LORE_DATA_DIR",
        "LORE_REMOTE_URL",
        "LORE_LOCK_TIMEOUT_SECS",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.remote_url.is_none());
        assert_eq!(config.lock_timeout_secs, 30);
        assert!(config.data_dir.ends_with("lore/store"));
    }

    #[test]
    fn test_file_paths() {
        let config = Config::default();

        assert!(config.projects_dir().ends_with("projects"));
        assert!(config.lock_path().ends_with(".git/lore.lock"));
        assert!(config.store_meta_path().ends_with(".lore.toml"));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("LORE_DATA_DIR", "/tmp/lore-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/lore-test"));
    }

    #[test]
    fn test_env_override_remote_url() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        assert!(config.remote_url.is_none());

        env::set_var("LORE_REMOTE_URL", "git@example.com:team/lore.git");
        config.apply_env_overrides();
        assert_eq!(
            config.remote_url,
            Some("git@example.com:team/lore.git".to_string())
        );

        // Empty string clears it
        env::set_var("LORE_REMOTE_URL", "");
        config.apply_env_overrides();
        assert!(config.remote_url.is_none());
    }

    #[test]
    fn test_env_override_lock_timeout() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("LORE_LOCK_TIMEOUT_SECS", "5");
        config.apply_env_overrides();
        assert_eq!(config.lock_timeout_secs, 5);
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));

        // Garbage keeps the previous value
        env::set_var("LORE_LOCK_TIMEOUT_SECS", "soon");
        config.apply_env_overrides();
        assert_eq!(config.lock_timeout_secs, 5);
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            data_dir: PathBuf::from("/data/lore"),
            remote_url: Some("https://example.com/team/lore.git".to_string()),
            lock_timeout_secs: 10,
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("remote_url"));
        assert!(toml_str.contains("lock_timeout_secs"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.remote_url, config.remote_url);
        assert_eq!(parsed.lock_timeout_secs, config.lock_timeout_secs);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            remote_url = "https://example.com/lore.git"
            lock_timeout_secs = 15
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(
            config.remote_url,
            Some("https://example.com/lore.git".to_string())
        );
        assert_eq!(config.lock_timeout_secs, 15);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        // Should return defaults when file doesn't exist
        assert!(config.remote_url.is_none());
        assert_eq!(config.lock_timeout_secs, 30);
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);

        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let config = Config {
            data_dir: PathBuf::from("/data/lore"),
            remote_url: Some("https://example.com/lore.git".to_string()),
            lock_timeout_secs: 45,
        };
        config.save_to_path(&path).unwrap();

        let reloaded = Config::load_from_path(&path).unwrap();
        assert_eq!(reloaded.data_dir, config.data_dir);
        assert_eq!(reloaded.remote_url, config.remote_url);
        assert_eq!(reloaded.lock_timeout_secs, 45);
    }
}
