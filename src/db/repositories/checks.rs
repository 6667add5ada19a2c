use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::db::{
    helpers::{parse_datetime, to_i64, to_u32},
    Database,
};

/// One seat-count observation for a course.
#[derive(Debug, Clone)]
pub struct CheckRecord {
    pub course_id: i64,
    pub available_seats: u32,
    pub checked_at: DateTime<Utc>,
}

impl Database {
    pub async fn record_check(
        &self,
        course_id: i64,
        available_seats: u32,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO checks (course_id, available_seats, checked_at)
                 VALUES (?1, ?2, ?3)",
                params![course_id, to_i64(available_seats), checked_at.to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn recent_checks(&self, course_id: i64, limit: u32) -> Result<Vec<CheckRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT course_id, available_seats, checked_at
                 FROM checks
                 WHERE course_id = ?1
                 ORDER BY checked_at DESC
                 LIMIT ?2",
            )?;

            let mut rows = stmt.query(params![course_id, to_i64(limit)])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                let checked_at: String = row.get(2)?;
                records.push(CheckRecord {
                    course_id: row.get(0)?,
                    available_seats: to_u32(row.get(1)?, "available_seats")?,
                    checked_at: parse_datetime(&checked_at, "checked_at")?,
                });
            }
            Ok(records)
        })
        .await
    }
}
