pub mod control;
pub mod db;
pub mod engine;
pub mod models;
pub mod notify;
pub mod registrar;
pub mod settings;

pub use control::{ControlChannel, FileControlChannel, MemoryControlChannel};
pub use db::Database;
pub use engine::{Engine, EngineExit, EngineTuning};
pub use models::{EngineConfig, EnginePhase, EngineStatus, SearchResult, Section, WatchedCourse};
