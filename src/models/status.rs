use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fallback poll interval when the config file is missing or unreadable.
pub const DEFAULT_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnginePhase {
    Starting,
    Running,
    Restarting,
    Error,
    Stopped,
}

impl EnginePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnginePhase::Starting => "starting",
            EnginePhase::Running => "running",
            EnginePhase::Restarting => "restarting",
            EnginePhase::Error => "error",
            EnginePhase::Stopped => "stopped",
        }
    }
}

/// The single "now" snapshot the engine exposes to the external controller.
/// Overwritten in place on every update; it is state, not history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub running: bool,
    pub status: EnginePhase,
    pub message: String,
    pub last_update: DateTime<Utc>,
}

impl EngineStatus {
    pub fn now(phase: EnginePhase, message: impl Into<String>) -> Self {
        Self {
            running: phase == EnginePhase::Running,
            status: phase,
            message: message.into(),
            last_update: Utc::now(),
        }
    }
}

/// Externally editable engine configuration, re-read every iteration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EngineConfig {
    pub interval: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL_SECS,
        }
    }
}
