use anyhow::Result;
use chrono::{Duration, Utc};

use crate::db::Database;

/// Per-course cooldown for the sound channel. Sound is disruptive and local,
/// so it fires at most once per window; email is the authoritative channel
/// and is deliberately not throttled here.
#[derive(Clone)]
pub struct SoundThrottle {
    db: Database,
    window: Duration,
}

impl SoundThrottle {
    pub const DEFAULT_WINDOW_MINUTES: i64 = 60;

    pub fn new(db: Database) -> Self {
        Self::with_window(db, Duration::minutes(Self::DEFAULT_WINDOW_MINUTES))
    }

    pub fn with_window(db: Database, window: Duration) -> Self {
        Self { db, window }
    }

    pub async fn should_sound(&self, course_id: i64) -> Result<bool> {
        let played = self
            .db
            .sound_played_within(course_id, self.window, Utc::now())
            .await?;
        Ok(!played)
    }

    pub async fn mark_sound(&self, course_id: i64) -> Result<()> {
        self.db.record_sound(course_id, Utc::now()).await
    }
}
