mod files;
mod memory;

pub use files::FileControlChannel;
pub use memory::MemoryControlChannel;

use crate::models::{EngineConfig, EnginePhase};

/// The engine's only boundary to the external controller. Implementations
/// must never fail the engine: bad config falls back to defaults and status
/// publication errors are logged, not propagated.
pub trait ControlChannel: Send + Sync {
    /// Current configuration; returns defaults if unavailable.
    fn read_config(&self) -> EngineConfig;

    /// Observe and consume a pending stop request. Consumption is
    /// single-shot: after returning true once, the request is gone.
    fn take_stop_signal(&self) -> bool;

    /// Overwrite the status snapshot with the current phase and message.
    fn publish_status(&self, phase: EnginePhase, message: &str);
}
