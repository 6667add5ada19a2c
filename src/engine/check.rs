use anyhow::Result;
use chrono::Utc;

use crate::db::Database;
use crate::models::{SearchResult, WatchedCourse};
use crate::registrar::Registrar;

/// Classified result of one availability check. `NothingUsable` and `Failed`
/// are transient per-item failures; neither invalidates the session by
/// itself — that call belongs to the scheduler's failure streak.
#[derive(Debug)]
pub enum CheckOutcome {
    Available(SearchResult),
    NoSeats(SearchResult),
    NothingUsable,
    Failed(String),
}

impl CheckOutcome {
    /// True for outcomes that prove the session still works.
    pub fn is_success(&self) -> bool {
        matches!(self, CheckOutcome::Available(_) | CheckOutcome::NoSeats(_))
    }
}

/// Runs a single course check and records its history entry. The history row
/// is written on every successful search, before any notification policy is
/// evaluated, so the seat timeline is complete even when no alert fires.
pub struct CheckExecutor {
    db: Database,
}

impl CheckExecutor {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// An `Err` here is a course-store failure; registrar problems are
    /// folded into the outcome instead.
    pub async fn check(
        &self,
        registrar: &dyn Registrar,
        course: &WatchedCourse,
    ) -> Result<CheckOutcome> {
        match registrar.search(&course.subject, &course.course_num).await {
            Ok(Some(result)) => {
                self.db
                    .record_check(course.id, result.total_available, Utc::now())
                    .await?;

                if result.has_availability {
                    Ok(CheckOutcome::Available(result))
                } else {
                    Ok(CheckOutcome::NoSeats(result))
                }
            }
            Ok(None) => Ok(CheckOutcome::NothingUsable),
            Err(err) => Ok(CheckOutcome::Failed(err.to_string())),
        }
    }
}
