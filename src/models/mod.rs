mod course;
mod search;
mod status;

pub use course::WatchedCourse;
pub use search::{SearchResult, Section};
pub use status::{EngineConfig, EnginePhase, EngineStatus, DEFAULT_INTERVAL_SECS};
