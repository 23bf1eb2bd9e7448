//! Configuration management for crawlgov using the prefer crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::governance::WaitConfig;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "crawlgov.db";

/// Default port for `crawlgov serve`.
pub const DEFAULT_PORT: u16 = 8002;

/// Default retry budget for TEMP_FAIL URLs.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default snapshot subdirectory name.
const FILES_SUBDIR: &str = "files";

/// Environment overrides, applied after the config file.
const ENV_DATA_DIR: &str = "CRAWLGOV_DATA_DIR";
const ENV_FILES_DIR: &str = "CRAWLGOV_FILES_DIR";

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename inside `data_dir`.
    pub database_filename: String,
    /// Root of the snapshot storage sink.
    pub files_dir: PathBuf,
    /// Host the HTTP server binds to.
    pub host: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Retry budget used when a caller does not pass one.
    pub max_retries: u32,
    /// Granularity of interruptible waits.
    pub wait_slice: Duration,
    /// Poll interval while paused.
    pub pause_poll: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        // Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("crawlgov");

        let wait = WaitConfig::default();
        Self {
            files_dir: data_dir.join(FILES_SUBDIR),
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            max_retries: DEFAULT_MAX_RETRIES,
            wait_slice: wait.slice,
            pause_poll: wait.pause_poll,
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            files_dir: data_dir.join(FILES_SUBDIR),
            data_dir,
            ..Default::default()
        }
    }

    /// Full path to the governance database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    pub fn wait_config(&self) -> WaitConfig {
        WaitConfig {
            slice: self.wait_slice,
            pause_poll: self.pause_poll,
        }
    }

    /// Ensure the data and snapshot directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [&self.data_dir, &self.files_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!("Failed to create directory {}: {}", dir.display(), e),
                )
            })?;
        }
        Ok(())
    }

    /// Apply `CRAWLGOV_DATA_DIR` / `CRAWLGOV_FILES_DIR`.
    fn apply_env(&mut self) {
        if let Some(dir) = env_path(ENV_DATA_DIR) {
            tracing::debug!("Using {} from environment: {}", ENV_DATA_DIR, dir.display());
            self.files_dir = dir.join(FILES_SUBDIR);
            self.data_dir = dir;
        }
        if let Some(dir) = env_path(ENV_FILES_DIR) {
            tracing::debug!("Using {} from environment: {}", ENV_FILES_DIR, dir.display());
            self.files_dir = dir;
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, prefer::FromValue)]
pub struct Config {
    /// Data directory path.
    #[prefer(default)]
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "target")]
    pub data_dir: Option<String>,
    /// Database filename.
    #[prefer(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Snapshot directory (defaults to `<data_dir>/files`).
    #[prefer(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_dir: Option<String>,
    #[prefer(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[prefer(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[prefer(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Wait slice in milliseconds.
    #[prefer(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_slice_ms: Option<u64>,
    /// Pause poll interval in milliseconds.
    #[prefer(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_poll_ms: Option<u64>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    #[prefer(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer for discovery.
    ///
    /// Falls back to defaults when no file is found or it fails to parse.
    pub async fn load() -> Self {
        match prefer::load("crawlgov").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await.unwrap_or_else(|e| {
                    tracing::warn!("{}", e);
                    Self::default()
                }),
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path, parsed by extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory of the config file, used to resolve relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let path = match path_str.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(path_str)),
            None => PathBuf::from(path_str),
        };

        if path.is_absolute() {
            path
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
            settings.files_dir = settings.data_dir.join(FILES_SUBDIR);
        }
        if let Some(ref files_dir) = self.files_dir {
            settings.files_dir = self.resolve_path(files_dir, base_dir);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref host) = self.host {
            settings.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(max_retries) = self.max_retries {
            settings.max_retries = max_retries;
        }
        if let Some(ms) = self.wait_slice_ms.filter(|ms| *ms > 0) {
            settings.wait_slice = Duration::from_millis(ms);
        }
        if let Some(ms) = self.pause_poll_ms.filter(|ms| *ms > 0) {
            settings.pause_poll = Duration::from_millis(ms);
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Data directory or database file (`--target`).
    pub target: Option<PathBuf>,
}

/// Turn a `--target` value into a data directory and optional database filename.
///
/// A path ending in `.db`/`.sqlite`/`.sqlite3` names the database itself.
fn resolve_target(path: &Path) -> (PathBuf, Option<String>) {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };

    let is_db_file = path
        .extension()
        .is_some_and(|ext| ext == "db" || ext == "sqlite" || ext == "sqlite3");

    if is_db_file {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string);
        let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        (dir, filename)
    } else {
        (path, None)
    }
}

/// Load settings with explicit options.
///
/// Precedence, lowest first: defaults, config file, environment, CLI flags.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await.unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            Config::default()
        }),
        None => Config::load().await,
    };

    let mut settings = Settings::default();
    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    config.apply_to_settings(&mut settings, &base_dir);
    settings.apply_env();

    if let Some(ref target) = options.target {
        let (data_dir, filename) = resolve_target(target);
        settings.files_dir = data_dir.join(FILES_SUBDIR);
        settings.data_dir = data_dir;
        if let Some(filename) = filename {
            settings.database_filename = filename;
        }
    }

    (settings, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::with_data_dir(PathBuf::from("/srv/crawl"));
        assert_eq!(settings.database_path(), PathBuf::from("/srv/crawl/crawlgov.db"));
        assert_eq!(settings.files_dir, PathBuf::from("/srv/crawl/files"));
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.wait_slice, Duration::from_millis(100));
        assert_eq!(settings.pause_poll, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_load_toml_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("crawlgov.toml");
        std::fs::write(
            &path,
            "data_dir = \"state\"\nport = 9100\nmax_retries = 5\nwait_slice_ms = 20\n",
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, &config.base_dir().unwrap());

        assert_eq!(settings.data_dir, dir.path().join("state"));
        assert_eq!(settings.files_dir, dir.path().join("state/files"));
        assert_eq!(settings.port, 9100);
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.wait_slice, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_load_yaml_and_json() {
        let dir = tempdir().unwrap();

        let yaml = dir.path().join("crawlgov.yaml");
        std::fs::write(&yaml, "target: /var/lib/crawlgov\npause_poll_ms: 250\n").unwrap();
        let config = Config::load_from_path(&yaml).await.unwrap();
        assert_eq!(config.data_dir.as_deref(), Some("/var/lib/crawlgov"));
        assert_eq!(config.pause_poll_ms, Some(250));

        let json = dir.path().join("crawlgov.json");
        std::fs::write(&json, r#"{"files_dir": "/tmp/snapshots", "host": "0.0.0.0"}"#).unwrap();
        let config = Config::load_from_path(&json).await.unwrap();
        assert_eq!(config.files_dir.as_deref(), Some("/tmp/snapshots"));
        assert_eq!(config.host.as_deref(), Some("0.0.0.0"));
    }

    #[tokio::test]
    async fn test_load_invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("crawlgov.toml");
        std::fs::write(&path, "port = \"not a number\"").unwrap();
        assert!(Config::load_from_path(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_target_flag_accepts_db_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("empty.json");
        std::fs::write(&config_path, "{}").unwrap();

        let (settings, _) = load_settings_with_options(LoadOptions {
            config_path: Some(config_path),
            target: Some(dir.path().join("fleet.sqlite")),
        })
        .await;

        assert_eq!(settings.data_dir, dir.path());
        assert_eq!(settings.database_filename, "fleet.sqlite");
        assert_eq!(settings.database_path(), dir.path().join("fleet.sqlite"));
    }

    #[test]
    fn test_zero_wait_values_are_ignored() {
        let config = Config {
            wait_slice_ms: Some(0),
            pause_poll_ms: Some(0),
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, Path::new("/"));
        assert_eq!(settings.wait_config(), WaitConfig::default());
    }
}
