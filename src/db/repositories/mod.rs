pub mod checks;
pub mod courses;
pub mod notifications;
pub mod sound_log;
pub mod stats;
