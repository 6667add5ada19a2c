use anyhow::Result;
use rusqlite::params;
use serde::Serialize;

use crate::db::{helpers::to_u32, Database};

/// Aggregate counters for the controller's overview display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub active_courses: u32,
    pub total_checks: u32,
    pub total_notifications: u32,
}

impl Database {
    pub async fn stats(&self) -> Result<StoreStats> {
        self.execute(|conn| {
            let active_courses: i64 = conn.query_row(
                "SELECT COUNT(*) FROM courses WHERE active = 1",
                params![],
                |row| row.get(0),
            )?;
            let total_checks: i64 =
                conn.query_row("SELECT COUNT(*) FROM checks", params![], |row| row.get(0))?;
            let total_notifications: i64 =
                conn.query_row("SELECT COUNT(*) FROM notifications", params![], |row| {
                    row.get(0)
                })?;

            Ok(StoreStats {
                active_courses: to_u32(active_courses, "active_courses")?,
                total_checks: to_u32(total_checks, "total_checks")?,
                total_notifications: to_u32(total_notifications, "total_notifications")?,
            })
        })
        .await
    }
}
