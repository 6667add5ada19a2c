use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::params;

use crate::db::Database;

impl Database {
    /// Append a sound-played marker. The log is append-only; the cooldown
    /// query looks for any row inside the window rather than a single
    /// last-played timestamp, so the firing history stays auditable.
    pub async fn record_sound(&self, course_id: i64, played_at: DateTime<Utc>) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sound_played (course_id, played_at) VALUES (?1, ?2)",
                params![course_id, played_at.to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    /// True if a sound fired for this course within `window` of `now`.
    /// RFC 3339 timestamps in UTC compare correctly as strings.
    pub async fn sound_played_within(
        &self,
        course_id: i64,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let cutoff = (now - window).to_rfc3339();
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sound_played WHERE course_id = ?1 AND played_at > ?2",
                params![course_id, cutoff],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }
}
