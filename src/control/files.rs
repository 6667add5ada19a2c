use std::fs;
use std::path::{Path, PathBuf};

use log::{error, warn};

use super::ControlChannel;
use crate::models::{EngineConfig, EnginePhase, EngineStatus};

const STATUS_FILE: &str = "monitor_status.json";
const CONFIG_FILE: &str = "monitor_config.json";
const STOP_FILE: &str = "monitor_stop.signal";

/// File-backed control protocol shared with the external controller process.
/// The status file is replaced atomically (write-then-rename) so a reader
/// never observes a partial snapshot.
pub struct FileControlChannel {
    status_path: PathBuf,
    config_path: PathBuf,
    stop_path: PathBuf,
}

impl FileControlChannel {
    pub fn new(dir: &Path) -> Self {
        Self {
            status_path: dir.join(STATUS_FILE),
            config_path: dir.join(CONFIG_FILE),
            stop_path: dir.join(STOP_FILE),
        }
    }

    pub fn status_path(&self) -> &Path {
        &self.status_path
    }

    /// Controller side: write the config the engine will pick up on its next
    /// iteration boundary.
    pub fn write_config(&self, config: &EngineConfig) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(config)?;
        write_atomic(&self.config_path, &serialized)
    }

    /// Controller side: ask the engine to stop. Drop a marker; the engine
    /// deletes it when observed.
    pub fn request_stop(&self) -> anyhow::Result<()> {
        fs::write(&self.stop_path, "stop")?;
        Ok(())
    }

    /// Controller side: read the engine's latest snapshot, if any.
    pub fn read_status(&self) -> Option<EngineStatus> {
        let contents = fs::read_to_string(&self.status_path).ok()?;
        serde_json::from_str(&contents).ok()
    }
}

fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl ControlChannel for FileControlChannel {
    fn read_config(&self) -> EngineConfig {
        match fs::read_to_string(&self.config_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => config,
                Err(err) => {
                    warn!("Unreadable monitor config, using defaults: {err}");
                    EngineConfig::default()
                }
            },
            Err(_) => EngineConfig::default(),
        }
    }

    fn take_stop_signal(&self) -> bool {
        if !self.stop_path.exists() {
            return false;
        }
        if let Err(err) = fs::remove_file(&self.stop_path) {
            // Leaving the marker behind would re-trigger the stop forever.
            error!("Failed to consume stop signal: {err}");
        }
        true
    }

    fn publish_status(&self, phase: EnginePhase, message: &str) {
        let status = EngineStatus::now(phase, message);
        let serialized = match serde_json::to_string(&status) {
            Ok(json) => json,
            Err(err) => {
                error!("Failed to serialize status: {err}");
                return;
            }
        };
        if let Err(err) = write_atomic(&self.status_path, &serialized) {
            error!("Failed to write status file: {err}");
        }
    }
}
