//! VersionWatch configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::notify::UpdatePrompt;
use crate::source::{FileVersionSource, HttpVersionSource, VersionSource};
use crate::watcher::WatcherConfig;

/// Main VersionWatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Watcher configuration
    pub watcher: WatcherConfig,

    /// Version marker source configuration
    pub source: SourceConfig,

    /// Update prompt wording
    pub prompt: PromptConfig,

    /// Command run after the user confirms an update
    #[serde(rename = "reload-command")]
    pub reload_command: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .versionwatch.yml
        let local_config = PathBuf::from(".versionwatch.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/versionwatch/versionwatch.yml
        if let Some(user_config) = Self::user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Peek at the configured log level before logging is initialized.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(path) => path.clone(),
            None => {
                let local = PathBuf::from(".versionwatch.yml");
                if local.exists() {
                    local
                } else {
                    Self::user_config_path()?
                }
            }
        };

        let content = fs::read_to_string(path).ok()?;
        let config: Self = serde_yaml::from_str(&content).ok()?;
        config.log_level
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("versionwatch").join("versionwatch.yml"))
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Version marker source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Source kind ("http" or "file")
    pub kind: String,

    /// Base URL of the deployed static assets (http kind)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Name of the version marker file under the base URL
    #[serde(rename = "version-file")]
    pub version_file: String,

    /// Path to a local marker file (file kind)
    #[serde(rename = "marker-path")]
    pub marker_path: PathBuf,

    /// Request timeout in milliseconds (http kind)
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: "http".to_string(),
            base_url: "http://127.0.0.1:8080/static".to_string(),
            version_file: "build-hash.txt".to_string(),
            marker_path: PathBuf::from("build-hash.txt"),
            timeout_ms: 10_000,
        }
    }
}

impl SourceConfig {
    /// Get the request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Build the configured version source
    pub fn build(&self) -> Result<Arc<dyn VersionSource>> {
        match self.kind.as_str() {
            "http" => {
                let source = HttpVersionSource::new(&self.base_url, &self.version_file, self.timeout())
                    .context("Failed to build HTTP version source")?;
                Ok(Arc::new(source))
            }
            "file" => Ok(Arc::new(FileVersionSource::new(&self.marker_path))),
            other => Err(eyre::eyre!("Unknown source kind: {}. Use: http or file", other)),
        }
    }
}

/// Update prompt wording
///
/// Plain configurable strings; hooking these up to a translation catalog is
/// the embedder's business.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub title: String,

    pub body: String,

    #[serde(rename = "confirm-label")]
    pub confirm_label: String,

    #[serde(rename = "cancel-label")]
    pub cancel_label: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            title: "New version available".to_string(),
            body: "A new build was deployed. Refresh to pick up the new features; \
                   staying on the current build may hit unknown errors."
                .to_string(),
            confirm_label: "Refresh now".to_string(),
            cancel_label: "Not yet".to_string(),
        }
    }
}

impl PromptConfig {
    /// Build the prompt value handed to the notifier
    pub fn to_prompt(&self) -> UpdatePrompt {
        UpdatePrompt {
            title: self.title.clone(),
            body: self.body.clone(),
            confirm_label: self.confirm_label.clone(),
            cancel_label: self.cancel_label.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.source.kind, "http");
        assert_eq!(config.source.version_file, "build-hash.txt");
        assert_eq!(config.watcher.poll_interval_ms, 300_000);
        assert!(config.reload_command.is_none());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
watcher:
  poll-interval-ms: 60000
  max-checks: 50
  channel-name: my-app

source:
  kind: file
  marker-path: /srv/app/build-hash.txt

prompt:
  title: "Update ready"
  confirm-label: "Restart"

reload-command: "systemctl --user restart my-app"
log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.watcher.poll_interval_ms, 60_000);
        assert_eq!(config.watcher.max_checks, 50);
        assert_eq!(config.watcher.channel_name, "my-app");
        assert_eq!(config.source.kind, "file");
        assert_eq!(config.source.marker_path, PathBuf::from("/srv/app/build-hash.txt"));
        assert_eq!(config.prompt.title, "Update ready");
        assert_eq!(config.prompt.confirm_label, "Restart");
        assert_eq!(config.reload_command.as_deref(), Some("systemctl --user restart my-app"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
source:
  base-url: https://app.example.com/static
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // Specified value
        assert_eq!(config.source.base_url, "https://app.example.com/static");

        // Defaults for unspecified
        assert_eq!(config.source.kind, "http");
        assert_eq!(config.watcher.max_checks, -1);
        assert_eq!(config.prompt.confirm_label, "Refresh now");
    }

    #[test]
    fn test_build_file_source() {
        let config = SourceConfig {
            kind: "file".to_string(),
            ..Default::default()
        };
        assert!(config.build().is_ok());
    }

    #[test]
    fn test_build_unknown_source_kind_fails() {
        let config = SourceConfig {
            kind: "carrier-pigeon".to_string(),
            ..Default::default()
        };
        assert!(config.build().is_err());
    }

    #[test]
    fn test_prompt_config_to_prompt() {
        let config = PromptConfig::default();
        let prompt = config.to_prompt();
        assert_eq!(prompt.title, "New version available");
        assert_eq!(prompt.cancel_label, "Not yet");
    }
}
