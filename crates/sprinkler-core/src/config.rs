use crate::error::{Result, SprinklerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// DocumentConfig
// ---------------------------------------------------------------------------

/// Where the on/off document lives and how often it is checked for changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentConfig {
    #[serde(default = "default_document_path")]
    pub path: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_document_path() -> PathBuf {
    PathBuf::from("sprinkler/main.json")
}

fn default_poll_interval_ms() -> u64 {
    800
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            path: default_document_path(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl DocumentConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// AuditConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Directory backing the blob store.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
    /// Blob key the audit trail is appended to.
    #[serde(default = "default_audit_key")]
    pub key: String,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("bucket")
}

fn default_audit_key() -> String {
    "sprinkler_event.txt".to_string()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
            key: default_audit_key(),
        }
    }
}

// ---------------------------------------------------------------------------
// OutputConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_gpio_root")]
    pub gpio_root: PathBuf,
    /// Log relay commands instead of touching the GPIO line.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_gpio_root() -> PathBuf {
    PathBuf::from("/sys/class/gpio")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            gpio_root: default_gpio_root(),
            dry_run: false,
        }
    }
}

// ---------------------------------------------------------------------------
// LogConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Append log output here (no ANSI colours) instead of writing to stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub document: DocumentConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    pub fn validate(&self) -> Result<()> {
        if self.document.poll_interval_ms == 0 {
            return Err(SprinklerError::Config(
                "document.poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.audit.key.trim().is_empty() {
            return Err(SprinklerError::Config("audit.key must not be empty".into()));
        }
        if self
            .log
            .file
            .as_ref()
            .is_some_and(|f| f.as_os_str().is_empty())
        {
            return Err(SprinklerError::Config("log.file must not be empty".into()));
        }
        Ok(())
    }
}
