use std::path::PathBuf;
use std::sync::RwLock;

use forge_common::ForgeError;
use serde::{Deserialize, Serialize};

/// Single JSON object at `<configDir>/settings.json`, narrowed to the
/// fields spec.md names plus an open `extra` escape hatch, matching the
/// teacher's `#[serde(default)]`-everywhere discipline so an older
/// settings file on disk never fails to parse against a newer schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub custom_ignore_rules: Vec<String>,
    #[serde(default)]
    pub custom_prompt_rules: Vec<String>,
    #[serde(default)]
    pub selected_provider: Option<String>,
    #[serde(default)]
    pub selected_models: Vec<String>,
    #[serde(flatten, default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Settings {
    fn load_from(path: &std::path::Path) -> Result<Self, ForgeError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ForgeError::Other(e.into()))?;
        serde_json::from_str(&content).map_err(|e| ForgeError::Parse(e.to_string()))
    }

    fn write_to(&self, path: &std::path::Path) -> Result<(), ForgeError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ForgeError::Other(e.into()))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| ForgeError::Parse(e.to_string()))?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(|e| ForgeError::Other(e.into()))?;
        std::fs::rename(&tmp_path, path).map_err(|e| ForgeError::Other(e.into()))?;
        Ok(())
    }
}

/// In-memory copy of `Settings` behind a reader/writer lock so reads never
/// block on each other, with writes serialized through the same lock and
/// flushed to disk atomically (temp file + rename) on every change.
pub struct SettingsStore {
    path: PathBuf,
    cached: RwLock<Settings>,
}

impl SettingsStore {
    pub fn load(config_dir: impl Into<PathBuf>) -> Result<Self, ForgeError> {
        let path = config_dir.into().join("settings.json");
        let cached = Settings::load_from(&path)?;
        Ok(SettingsStore { path, cached: RwLock::new(cached) })
    }

    pub fn get(&self) -> Settings {
        self.cached.read().expect("settings lock poisoned").clone()
    }

    /// Applies `mutate` to a copy of the cached settings, then persists and
    /// swaps it in — readers never observe a partially-written value.
    pub fn update(&self, mutate: impl FnOnce(&mut Settings)) -> Result<Settings, ForgeError> {
        let mut guard = self.cached.write().expect("settings lock poisoned");
        let mut next = guard.clone();
        mutate(&mut next);
        next.write_to(&self.path)?;
        *guard = next.clone();
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(dir.path()).unwrap();
        store.update(|s| s.selected_provider = Some("openai".into())).unwrap();

        let reloaded = SettingsStore::load(dir.path()).unwrap();
        assert_eq!(reloaded.get().selected_provider, Some("openai".to_string()));
    }

    #[test]
    fn unknown_fields_are_preserved_via_extra() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.json"), r#"{"futureField": 42}"#).unwrap();

        let store = SettingsStore::load(dir.path()).unwrap();
        assert_eq!(store.get().extra.get("futureField").and_then(|v| v.as_i64()), Some(42));
    }
}
