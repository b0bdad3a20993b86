//! icinga2rt configuration file handling
//!
//! Loads and writes the YAML configuration file (default
//! `<config dir>/icinga2rt/config.yaml`).

use crate::event::State;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Icinga2 API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcingaConfig {
    /// API endpoint, e.g. `https://monitoring.example.com:5665`
    pub url: String,

    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,

    /// Connection attempts before giving up
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Event queue name
    #[serde(default = "default_queue_name")]
    pub queue: String,

    /// Event filter expression
    #[serde(default)]
    pub filter: String,
}

fn default_retries() -> u32 {
    5
}

fn default_queue_name() -> String {
    crate::stream::DEFAULT_QUEUE.to_string()
}

impl Default for IcingaConfig {
    fn default() -> Self {
        Self {
            url: "https://monitoring.example.com:5665".to_string(),
            user: "root".to_string(),
            password: "secret".to_string(),
            insecure: true,
            retries: default_retries(),
            queue: default_queue_name(),
            filter: String::new(),
        }
    }
}

/// Request Tracker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtConfig {
    /// RT base URL, e.g. `https://support.example.com`
    pub url: String,

    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub insecure: bool,
}

impl Default for RtConfig {
    fn default() -> Self {
        Self {
            url: "https://support.example.com".to_string(),
            user: "apiuser".to_string(),
            password: "secret".to_string(),
            insecure: true,
        }
    }
}

/// Event cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Path to SQLite database file
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,

    /// Enable WAL journal mode
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

fn default_cache_path() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("/var/lib"));
    path.push("icinga2rt");
    path.push("cache.db");
    path
}

fn default_true() -> bool {
    true
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            wal_mode: true,
        }
    }
}

/// Ticket behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketConfig {
    /// States that may touch tickets at all
    #[serde(with = "crate::event::state_names", default = "default_permit")]
    pub permit: Vec<State>,

    /// Owner value RT uses for unassigned tickets
    #[serde(default = "default_nobody")]
    pub nobody: String,

    /// Queue new tickets are created in
    #[serde(default = "default_ticket_queue")]
    pub queue: String,
}

fn default_permit() -> Vec<State> {
    State::ALL.to_vec()
}

fn default_nobody() -> String {
    rt::DEFAULT_NOBODY.to_string()
}

fn default_ticket_queue() -> String {
    "general".to_string()
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            permit: default_permit(),
            nobody: default_nobody(),
            queue: default_ticket_queue(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Tracing filter directive used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log every received notification
    #[serde(default)]
    pub debug_events: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            debug_events: false,
        }
    }
}

/// icinga2rt configuration
///
/// Without an `rt` section tickets go to the in-memory ticket system, which
/// is useful for watching what the daemon would do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icinga2RtConfig {
    pub icinga: IcingaConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rt: Option<RtConfig>,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub ticket: TicketConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Icinga2RtConfig {
    /// Configuration written by `example-config`
    pub fn example() -> Self {
        Self {
            icinga: IcingaConfig::default(),
            rt: Some(RtConfig::default()),
            cache: CacheSettings::default(),
            ticket: TicketConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Load configuration from the default path
    pub fn load_default() -> Result<Self> {
        Self::load(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::Icinga2RtError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading icinga2rt configuration");

        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            icinga = %config.icinga.url,
            rt = config.rt.as_ref().map(|r| r.url.as_str()).unwrap_or("in-memory"),
            cache = %config.cache.path.display(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving icinga2rt configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (`<config dir>/icinga2rt/config.yaml`)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("/etc"));
        path.push("icinga2rt");
        path.push("config.yaml");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    const MINIMAL: &str = r#"
icinga:
  url: https://icinga.local:5665
  user: api
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config: Icinga2RtConfig = serde_yaml::from_str(MINIMAL).unwrap();

        assert_eq!(config.icinga.retries, 5);
        assert_eq!(config.icinga.queue, "icinga2rt");
        assert!(config.rt.is_none());
        assert_eq!(config.ticket.permit, State::ALL.to_vec());
        assert_eq!(config.ticket.nobody, "Nobody");
        assert_eq!(config.ticket.queue, "general");
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.debug_events);
        assert!(config.cache.wal_mode);
    }

    #[test]
    fn test_permit_by_name() {
        let yaml = format!("{}ticket:\n  permit: [Critical, Unknown]\n", MINIMAL);
        let config: Icinga2RtConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.ticket.permit, vec![State::Critical, State::Unknown]);
    }

    #[test]
    fn test_save_and_load() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        let config = Icinga2RtConfig::example();
        config.save(path).unwrap();

        let loaded = Icinga2RtConfig::load(path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.yaml");

        Icinga2RtConfig::example().save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_example_serialization() {
        let yaml = serde_yaml::to_string(&Icinga2RtConfig::example()).unwrap();
        assert!(yaml.contains("icinga:"));
        assert!(yaml.contains("rt:"));
        assert!(yaml.contains("nobody: Nobody"));
        assert!(yaml.contains("- Warning"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Icinga2RtConfig::load("/nonexistent/config.yaml");
        assert!(matches!(result, Err(crate::Icinga2RtError::Config(_))));
    }

    #[test]
    fn test_default_path() {
        assert!(Icinga2RtConfig::default_path().ends_with("icinga2rt/config.yaml"));
    }
}
