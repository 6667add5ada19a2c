use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One watched course: a (subject, course number, recipient email) tuple the
/// engine checks each cycle. Owned by the course store; the engine re-reads
/// the active set every iteration and never caches it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchedCourse {
    pub id: i64,
    pub subject: String,
    pub course_num: String,
    pub email: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl WatchedCourse {
    /// Display label like "CSE 101".
    pub fn label(&self) -> String {
        format!("{} {}", self.subject, self.course_num)
    }
}
