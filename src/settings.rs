use crate::backends::EngineSettings;
use crate::config_loader::AppConfig;
use crate::error::Result;
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const SETTINGS_FILE: &str = "settings.json";
const FAVORITES_FILE: &str = "favorites.json";

/// Engine id -> last used settings. Engines without an entry use defaults.
pub type SettingsDocument = BTreeMap<String, EngineSettings>;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Favorite {
    pub name: String,
    pub engine: String,
    #[serde(default)]
    pub settings: EngineSettings,
}

/// settings.json and favorites.json under one directory. Reads never fail:
/// a missing or unreadable file is the same as an empty one.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    dir: PathBuf,
}

impl SettingsStore {
    pub fn new(config: &AppConfig) -> Self {
        Self::at(&config.config_dir)
    }

    pub fn at(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    pub fn favorites_path(&self) -> PathBuf {
        self.dir.join(FAVORITES_FILE)
    }

    pub fn load_settings(&self) -> SettingsDocument {
        read_json(&self.settings_path()).unwrap_or_default()
    }

    pub fn save_settings(&self, settings: &SettingsDocument) -> Result<()> {
        self.write_json(&self.settings_path(), settings)
    }

    /// Entries that don't parse (hand edits gone wrong) are skipped
    /// individually rather than discarding the whole list.
    pub fn load_favorites(&self) -> Vec<Favorite> {
        let entries: Vec<Value> = read_json(&self.favorites_path()).unwrap_or_default();
        entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(favorite) => Some(favorite),
                Err(e) => {
                    warn!("Skipping malformed favorite: {}", e);
                    None
                }
            })
            .collect()
    }

    pub fn save_favorites(&self, favorites: &[Favorite]) -> Result<()> {
        self.write_json(&self.favorites_path(), &favorites)
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(value)?;
        fs::write(path, content)?;
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Could not read {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring malformed {}: {}", path.display(), e);
            None
        }
    }
}
