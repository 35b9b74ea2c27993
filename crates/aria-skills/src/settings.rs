//! Per-skill settings persistence.
//!
//! Each skill instance owns a [`SkillSettings`]: a flat JSON object stored as
//! `settings.json` under the skill's root directory. The dispatch wrapper
//! flushes settings after every successful handler invocation via
//! [`store_if_changed`](SkillSettings::store_if_changed); the flush is
//! idempotent, so handlers that touched nothing cost a single flag check.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// File name used inside a skill's root directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Errors that can occur while persisting settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Reading or writing the settings file failed.
    #[error("settings I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The settings content could not be (de)serialized.
    #[error("settings serialization failed: {0}")]
    Format(#[from] serde_json::Error),
}

#[derive(Default)]
struct SettingsState {
    values: Map<String, Value>,
    dirty: bool,
}

/// A skill's persistent key/value settings.
///
/// Thread-safe; all methods take `&self`.
pub struct SkillSettings {
    /// `None` for memory-only settings (skills without a root directory).
    path: Option<PathBuf>,
    state: Mutex<SettingsState>,
}

impl SkillSettings {
    /// Loads settings from `<dir>/settings.json`.
    ///
    /// A missing file yields empty settings; an unreadable or malformed file
    /// is logged and treated as empty rather than failing the skill load.
    pub fn load(dir: impl AsRef<Path>) -> Self {
        let path = dir.as_ref().join(SETTINGS_FILE);
        let values = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Map<String, Value>>(&bytes) {
                Ok(values) => values,
                Err(error) => {
                    warn!(path = %path.display(), %error, "Malformed settings file, starting empty");
                    Map::new()
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(error) => {
                warn!(path = %path.display(), %error, "Could not read settings file, starting empty");
                Map::new()
            }
        };

        Self {
            path: Some(path),
            state: Mutex::new(SettingsState {
                values,
                dirty: false,
            }),
        }
    }

    /// Creates settings that are never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(SettingsState::default()),
        }
    }

    /// Returns the value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.lock().values.get(key).cloned()
    }

    /// Stores `value` under `key`, marking the settings dirty if it changed.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        let mut state = self.state.lock();
        let key = key.into();
        if state.values.get(&key) != Some(&value) {
            state.values.insert(key, value);
            state.dirty = true;
        }
    }

    /// Removes `key`, returning the previous value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut state = self.state.lock();
        let previous = state.values.remove(key);
        if previous.is_some() {
            state.dirty = true;
        }
        previous
    }

    /// Whether there are unpersisted changes.
    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Writes the settings to disk unconditionally.
    ///
    /// Memory-only settings clear their dirty flag and return `Ok`.
    pub fn store(&self) -> Result<(), SettingsError> {
        let mut state = self.state.lock();
        if let Some(path) = &self.path {
            let bytes = serde_json::to_vec_pretty(&state.values)?;
            fs::write(path, bytes)?;
            debug!(path = %path.display(), "Stored skill settings");
        }
        state.dirty = false;
        Ok(())
    }

    /// Writes the settings to disk only if they changed since the last store.
    pub fn store_if_changed(&self) -> Result<(), SettingsError> {
        if self.is_dirty() {
            self.store()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("aria-settings-{tag}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn set_marks_dirty_only_on_change() {
        let settings = SkillSettings::in_memory();
        assert!(!settings.is_dirty());

        settings.set("unit", json!("celsius"));
        assert!(settings.is_dirty());

        settings.store().unwrap();
        assert!(!settings.is_dirty());

        // Same value again: nothing to persist.
        settings.set("unit", json!("celsius"));
        assert!(!settings.is_dirty());
    }

    #[test]
    fn store_round_trips_through_the_file() {
        let dir = temp_dir("roundtrip");
        let settings = SkillSettings::load(&dir);
        settings.set("unit", json!("celsius"));
        settings.store_if_changed().unwrap();

        let reloaded = SkillSettings::load(&dir);
        assert_eq!(reloaded.get("unit"), Some(json!("celsius")));
        assert!(!reloaded.is_dirty());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = temp_dir("missing");
        let settings = SkillSettings::load(dir.join("no-such-subdir"));
        assert_eq!(settings.get("anything"), None);
        fs::remove_dir_all(&dir).ok();
    }
}
