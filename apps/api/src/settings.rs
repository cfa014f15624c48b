//! Runtime-updatable credential settings.
//!
//! Credentials load from a JSON file layered over env-derived defaults.
//! Updates build a new immutable `Arc<Settings>` snapshot and persist the
//! full document — callers hold the `SettingsStore` and read a snapshot
//! per request, so no component observes a half-applied update.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One immutable snapshot of credential settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub ats_api_key: String,
    pub ats_on_behalf_of: String,
    pub anthropic_api_key: String,
}

/// Partial update accepted by the settings endpoint. Absent fields keep
/// their current value.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsPatch {
    pub ats_api_key: Option<String>,
    pub ats_on_behalf_of: Option<String>,
    pub anthropic_api_key: Option<String>,
}

pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<Arc<Settings>>,
}

impl SettingsStore {
    /// Loads the settings file if present, falling back to `defaults`.
    /// A corrupt file is logged and ignored — it will be overwritten on the
    /// next update.
    pub fn load(path: PathBuf, defaults: Settings) -> Self {
        let settings = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Settings>(&raw) {
                Ok(s) => {
                    info!("Loaded settings from {}", path.display());
                    s
                }
                Err(e) => {
                    warn!("Settings file {} is corrupt ({e}); using defaults", path.display());
                    defaults
                }
            },
            Err(_) => defaults,
        };

        SettingsStore {
            path,
            current: RwLock::new(Arc::new(settings)),
        }
    }

    /// Current immutable snapshot. Cheap to call per request.
    pub fn snapshot(&self) -> Arc<Settings> {
        self.current.read().unwrap().clone()
    }

    /// Applies a patch, persists the new document, and swaps in the new
    /// snapshot. Returns the snapshot now in effect.
    pub fn update(&self, patch: SettingsPatch) -> Result<Arc<Settings>> {
        let mut guard = self.current.write().unwrap();
        let mut next = (**guard).clone();
        if let Some(v) = patch.ats_api_key {
            next.ats_api_key = v;
        }
        if let Some(v) = patch.ats_on_behalf_of {
            next.ats_on_behalf_of = v;
        }
        if let Some(v) = patch.anthropic_api_key {
            next.anthropic_api_key = v;
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating settings dir {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(&next)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("writing settings file {}", self.path.display()))?;

        let next = Arc::new(next);
        *guard = next.clone();
        info!("Settings updated");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Settings {
        Settings {
            ats_api_key: "env-ats".to_string(),
            ats_on_behalf_of: "1".to_string(),
            anthropic_api_key: "env-llm".to_string(),
        }
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(dir.path().join("settings.json"), defaults());
        assert_eq!(store.snapshot().ats_api_key, "env-ats");
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = SettingsStore::load(path, defaults());
        assert_eq!(store.snapshot().anthropic_api_key, "env-llm");
    }

    #[test]
    fn test_update_persists_and_swaps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::load(path.clone(), defaults());

        let before = store.snapshot();
        let after = store
            .update(SettingsPatch {
                ats_api_key: Some("rotated".to_string()),
                ..Default::default()
            })
            .unwrap();

        // Old snapshot is untouched; new one carries the patch.
        assert_eq!(before.ats_api_key, "env-ats");
        assert_eq!(after.ats_api_key, "rotated");
        assert_eq!(after.anthropic_api_key, "env-llm");
        assert_eq!(store.snapshot().ats_api_key, "rotated");

        // Reloading from disk sees the persisted document.
        let reloaded = SettingsStore::load(path, defaults());
        assert_eq!(reloaded.snapshot().ats_api_key, "rotated");
    }
}
