// Runtime configuration: where tasks live and how they are shown

use crate::backend::{Backend, FileBackend, MemoryBackend, SqliteBackend};
use crate::codec::DEFAULT_KEY;
use crate::filter::FilterMode;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const APP_DIR: &str = "taskboard";
const CONFIG_FILE: &str = "config.yaml";
const DB_FILE: &str = "taskboard.db";

/// Storage backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    File,
    Sqlite,
    Memory,
}

/// Settings read from `config.yaml`; every field is optional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the task data
    pub data_dir: PathBuf,
    pub backend: BackendKind,
    /// Storage key the collection is kept under
    pub key: String,
    /// Filter used by `list` when none is given
    pub default_filter: FilterMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: BackendKind::default(),
            key: DEFAULT_KEY.to_string(),
            default_filter: FilterMode::default(),
        }
    }
}

/// `<platform data dir>/taskboard`, falling back to `./.taskboard`
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".taskboard"))
}

/// `<platform config dir>/taskboard/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}

impl Config {
    /// Load settings
    ///
    /// An explicit `path` must exist. Without one the default location is
    /// tried and its absence means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => {
                    debug!("No config file, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_yaml(&content).with_context(|| format!("Invalid config {}", path.display()))?;
        info!(path = ?path, "Loaded config");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        crate::backend::validate_key(&config.key)?;
        Ok(config)
    }

    /// Open the configured backend
    pub fn open_backend(&self) -> Result<Box<dyn Backend>> {
        debug!(backend = ?self.backend, data_dir = ?self.data_dir, "Opening backend");
        let backend: Box<dyn Backend> = match self.backend {
            BackendKind::File => Box::new(FileBackend::open(&self.data_dir)?),
            BackendKind::Sqlite => Box::new(SqliteBackend::open(self.data_dir.join(DB_FILE))?),
            BackendKind::Memory => Box::new(MemoryBackend::new()),
        };
        Ok(backend)
    }
}
