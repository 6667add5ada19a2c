use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::db::{
    helpers::{parse_datetime, to_i64, to_u32},
    Database,
};

/// A sent notification joined with its course, for status displays.
#[derive(Debug, Clone)]
pub struct NotificationSummary {
    pub subject: String,
    pub course_num: String,
    pub available_seats: u32,
    pub total_seats: u32,
    pub sent_at: DateTime<Utc>,
}

impl Database {
    /// Record a successfully delivered email. Callers must only invoke this
    /// when the transport confirmed the send.
    pub async fn record_notification(
        &self,
        course_id: i64,
        available_seats: u32,
        total_seats: u32,
        sent_at: DateTime<Utc>,
    ) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO notifications (course_id, available_seats, total_seats, sent_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    course_id,
                    to_i64(available_seats),
                    to_i64(total_seats),
                    sent_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn recent_notifications(&self, limit: u32) -> Result<Vec<NotificationSummary>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT c.subject, c.course_num, n.available_seats, n.total_seats, n.sent_at
                 FROM notifications n
                 JOIN courses c ON c.id = n.course_id
                 ORDER BY n.sent_at DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![to_i64(limit)])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                let sent_at: String = row.get(4)?;
                records.push(NotificationSummary {
                    subject: row.get(0)?,
                    course_num: row.get(1)?,
                    available_seats: to_u32(row.get(2)?, "available_seats")?,
                    total_seats: to_u32(row.get(3)?, "total_seats")?,
                    sent_at: parse_datetime(&sent_at, "sent_at")?,
                });
            }
            Ok(records)
        })
        .await
    }

    pub async fn count_notifications(&self, course_id: i64) -> Result<u32> {
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE course_id = ?1",
                params![course_id],
                |row| row.get(0),
            )?;
            to_u32(count, "notification count")
        })
        .await
    }
}
