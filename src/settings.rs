use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::registrar::RegistrarSettings;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AppSettings {
    registrar: RegistrarSettings,
    /// Stop normally leaves the registrar session logged in so the next
    /// start is fast; set true to log out on stop instead.
    #[serde(default)]
    close_session_on_stop: bool,
}

/// Process-level settings persisted as settings.json. A missing file yields
/// defaults and is written back so there is something to edit.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AppSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            let defaults = AppSettings::default();
            let serialized = serde_json::to_string_pretty(&defaults)?;
            fs::write(&path, serialized)
                .with_context(|| format!("Failed to write settings to {}", path.display()))?;
            defaults
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn registrar(&self) -> RegistrarSettings {
        self.data.read().unwrap().registrar.clone()
    }

    pub fn close_session_on_stop(&self) -> bool {
        self.data.read().unwrap().close_session_on_stop
    }

    #[allow(dead_code)]
    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: AppSettings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap();
        *guard = data;
        Ok(())
    }
}
