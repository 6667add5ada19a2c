use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::ControlChannel;
use crate::models::{EngineConfig, EnginePhase};

/// In-memory control channel for deterministic engine tests: no filesystem,
/// same semantics as the file adapter (single-consumption stop, overwrite
/// status — though every published phase is kept so tests can assert on the
/// transition sequence).
#[derive(Default)]
pub struct MemoryControlChannel {
    config: Mutex<EngineConfig>,
    stop: AtomicBool,
    published: Mutex<Vec<(EnginePhase, String)>>,
}

impl MemoryControlChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_config(&self, config: EngineConfig) {
        *self.config.lock().unwrap() = config;
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_pending(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Every (phase, message) pair published, oldest first.
    pub fn published(&self) -> Vec<(EnginePhase, String)> {
        self.published.lock().unwrap().clone()
    }

    pub fn phases(&self) -> Vec<EnginePhase> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(phase, _)| *phase)
            .collect()
    }

    pub fn last_phase(&self) -> Option<EnginePhase> {
        self.published.lock().unwrap().last().map(|(p, _)| *p)
    }
}

impl ControlChannel for MemoryControlChannel {
    fn read_config(&self) -> EngineConfig {
        *self.config.lock().unwrap()
    }

    fn take_stop_signal(&self) -> bool {
        self.stop.swap(false, Ordering::SeqCst)
    }

    fn publish_status(&self, phase: EnginePhase, message: &str) {
        self.published
            .lock()
            .unwrap()
            .push((phase, message.to_string()));
    }
}
