use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use webdaw_core::{Encoding, PersistenceOptions};

const DEFAULT_DEBOUNCE_MS: u64 = 1500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the project database. Defaults to the user data dir.
    pub store_dir: Option<PathBuf>,
    pub autosave_debounce_ms: u64,
    pub encoding: Encoding,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_dir: None,
            autosave_debounce_ms: DEFAULT_DEBOUNCE_MS,
            encoding: Encoding::Json,
        }
    }
}

impl Config {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("webdaw").join("config.toml"))
    }

    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                log::warn!("ignoring invalid config {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// The effective configuration as it would be written to disk.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Where the store lives, falling back to the platform data directory.
    pub fn resolve_store_dir(&self) -> Option<PathBuf> {
        self.store_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|p| p.join("webdaw")))
    }

    pub fn persistence_options(&self) -> PersistenceOptions {
        PersistenceOptions {
            debounce_ms: self.autosave_debounce_ms,
            encoding: self.encoding,
        }
    }
}
