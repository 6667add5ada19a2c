mod check;
mod scheduler;
mod session;

pub use check::{CheckExecutor, CheckOutcome};
pub use scheduler::{Engine, EngineExit, EngineTuning};
pub use session::{SessionError, SessionManager};
