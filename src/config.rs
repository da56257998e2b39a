//! Configuration management for memoirist.
//!
//! Settings resolve in layers: built-in defaults, then an optional config
//! file (TOML or JSON), then environment variables, then command-line
//! flags. The polling and fallback policy is deliberately not part of the
//! configuration surface; those live as constants in the orchestrator.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Subdirectory for biography metadata, documents, and thumbnails.
pub const BIOGRAPHIES_SUBDIR: &str = "Biographies";

/// Subdirectory for annotation session records.
pub const ANNOTATIONS_SUBDIR: &str = "annotations";

/// Default base URL of the generation service, `/api` prefix included.
pub const DEFAULT_REMOTE_URL: &str = "http://localhost:8000/api";

/// Default request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 30;

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Directory for biography artifacts.
    pub biographies_dir: PathBuf,
    /// Directory for annotation sessions.
    pub annotations_dir: PathBuf,
    /// Base URL of the remote generation service.
    pub remote_base_url: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// User agent for HTTP requests.
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        // Default to ~/Documents/memoirist/ for user data
        // Falls back gracefully: Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("memoirist");

        Self {
            biographies_dir: data_dir.join(BIOGRAPHIES_SUBDIR),
            annotations_dir: data_dir.join(ANNOTATIONS_SUBDIR),
            data_dir,
            remote_base_url: DEFAULT_REMOTE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: format!("memoirist/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            biographies_dir: data_dir.join(BIOGRAPHIES_SUBDIR),
            annotations_dir: data_dir.join(ANNOTATIONS_SUBDIR),
            data_dir,
            ..Default::default()
        }
    }

    /// Point the settings at a new data directory, rebuilding derived paths.
    pub fn set_data_dir(&mut self, data_dir: PathBuf) {
        self.biographies_dir = data_dir.join(BIOGRAPHIES_SUBDIR);
        self.annotations_dir = data_dir.join(ANNOTATIONS_SUBDIR);
        self.data_dir = data_dir;
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for (dir, label) in [
            (&self.data_dir, "data directory"),
            (&self.biographies_dir, "biographies directory"),
            (&self.annotations_dir, "annotations directory"),
        ] {
            fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!("Failed to create {} '{}': {}", label, dir.display(), e),
                )
            })?;
        }
        Ok(())
    }
}

/// Remote service section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteSection {
    /// Base URL of the remote generation service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    /// User agent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Remote service settings.
    #[serde(default)]
    pub remote: RemoteSection,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    /// Supports TOML and JSON based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

        let mut config: Config = match ext {
            "json" => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
            _ => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    /// `base_dir` is used to resolve relative paths.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.set_data_dir(self.resolve_path(data_dir, base_dir));
        }
        if let Some(ref base_url) = self.remote.base_url {
            settings.remote_base_url = base_url.clone();
        }
        if let Some(timeout) = self.remote.request_timeout_secs {
            settings.request_timeout = timeout;
        }
        if let Some(ref user_agent) = self.remote.user_agent {
            settings.user_agent = user_agent.clone();
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Data directory override (--data-dir flag).
    pub data_dir: Option<PathBuf>,
}

/// Look for a config file next to the data directory or in the CWD.
/// Checks memoirist.{ext} and config.{ext} for supported formats.
fn find_config_file(data_dir: &Path) -> Option<PathBuf> {
    let extensions = ["toml", "json"];
    let basenames = ["memoirist", "config"];

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    for dir in [data_dir, cwd.as_path()] {
        for basename in basenames {
            for ext in extensions {
                let path = dir.join(format!("{}.{}", basename, ext));
                if path.exists() {
                    return Some(path);
                }
            }
        }
    }
    None
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let mut settings = Settings::default();

    let search_dir = options
        .data_dir
        .clone()
        .unwrap_or_else(|| settings.data_dir.clone());

    let config = if let Some(ref config_path) = options.config_path {
        Config::load_from_path(config_path)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Ignoring config file: {}", e);
                Config::default()
            })
    } else if let Some(found) = find_config_file(&search_dir) {
        tracing::debug!("Found config file: {}", found.display());
        Config::load_from_path(&found).await.unwrap_or_else(|e| {
            tracing::warn!("Ignoring config file: {}", e);
            Config::default()
        })
    } else {
        Config::default()
    };

    // Determine base directory for resolving relative paths
    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    config.apply_to_settings(&mut settings, &base_dir);

    // --data-dir flag takes precedence over the config file
    if let Some(data_dir) = options.data_dir {
        settings.set_data_dir(data_dir);
    }

    // MEMOIRIST_REMOTE_URL environment variable takes highest precedence
    if let Some(url) = std::env::var("MEMOIRIST_REMOTE_URL")
        .ok()
        .filter(|s| !s.is_empty())
    {
        tracing::debug!("Using MEMOIRIST_REMOTE_URL from environment: {}", url);
        settings.remote_base_url = url;
    }

    (settings, config)
}
