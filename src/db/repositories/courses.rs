use anyhow::{bail, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{helpers::parse_datetime, Database};
use crate::models::WatchedCourse;

fn row_to_course(row: &Row) -> Result<WatchedCourse> {
    let created_at: String = row.get("created_at")?;
    let active: i64 = row.get("active")?;

    Ok(WatchedCourse {
        id: row.get("id")?,
        subject: row.get("subject")?,
        course_num: row.get("course_num")?,
        email: row.get("email")?,
        active: active != 0,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    /// Add a course to the watch list. Duplicate (subject, number, email)
    /// tuples are rejected so one opening cannot alert the same person twice.
    pub async fn insert_course(
        &self,
        subject: &str,
        course_num: &str,
        email: &str,
    ) -> Result<WatchedCourse> {
        let subject = subject.trim().to_uppercase();
        let course_num = course_num.trim().to_string();
        let email = email.trim().to_string();

        self.execute(move |conn| {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM courses WHERE subject = ?1 AND course_num = ?2 AND email = ?3",
                    params![subject, course_num, email],
                    |row| row.get(0),
                )
                .optional()?;

            if existing.is_some() {
                bail!("{subject} {course_num} is already watched for {email}");
            }

            let created_at = Utc::now();
            conn.execute(
                "INSERT INTO courses (subject, course_num, email, active, created_at)
                 VALUES (?1, ?2, ?3, 1, ?4)",
                params![subject, course_num, email, created_at.to_rfc3339()],
            )?;

            Ok(WatchedCourse {
                id: conn.last_insert_rowid(),
                subject,
                course_num,
                email,
                active: true,
                created_at,
            })
        })
        .await
    }

    pub async fn get_course(&self, course_id: i64) -> Result<Option<WatchedCourse>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, subject, course_num, email, active, created_at
                 FROM courses WHERE id = ?1",
            )?;

            let mut rows = stmt.query(params![course_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_course(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn list_courses(&self) -> Result<Vec<WatchedCourse>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, subject, course_num, email, active, created_at
                 FROM courses ORDER BY created_at DESC",
            )?;

            let mut rows = stmt.query([])?;
            let mut courses = Vec::new();
            while let Some(row) = rows.next()? {
                courses.push(row_to_course(row)?);
            }
            Ok(courses)
        })
        .await
    }

    /// The set the scheduler actually checks. Re-queried every cycle because
    /// the controller may add or deactivate courses while the engine runs.
    pub async fn list_active_courses(&self) -> Result<Vec<WatchedCourse>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, subject, course_num, email, active, created_at
                 FROM courses WHERE active = 1 ORDER BY id",
            )?;

            let mut rows = stmt.query([])?;
            let mut courses = Vec::new();
            while let Some(row) = rows.next()? {
                courses.push(row_to_course(row)?);
            }
            Ok(courses)
        })
        .await
    }

    pub async fn set_course_active(&self, course_id: i64, active: bool) -> Result<()> {
        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE courses SET active = ?1 WHERE id = ?2",
                params![active as i64, course_id],
            )?;
            if changed == 0 {
                bail!("no course with id {course_id}");
            }
            Ok(())
        })
        .await
    }

    /// Removes the course and, via foreign keys, its checks, notifications
    /// and sound log rows.
    pub async fn delete_course(&self, course_id: i64) -> Result<()> {
        self.execute(move |conn| {
            let changed = conn.execute("DELETE FROM courses WHERE id = ?1", params![course_id])?;
            if changed == 0 {
                bail!("no course with id {course_id}");
            }
            Ok(())
        })
        .await
    }
}
