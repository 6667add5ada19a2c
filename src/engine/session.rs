use std::time::Duration;

use log::{info, warn};
use thiserror::Error;

use crate::db::Database;
use crate::registrar::Registrar;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Login never produced a verified session. Fatal: the caller must not
    /// keep retrying on its own.
    #[error("login attempts exhausted after {0} tries")]
    AttemptsExhausted(u32),
    /// The course store failed while verifying; unrelated to the site.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Owns the authenticated registrar session and the retry policy around
/// establishing it. A login only counts as a success once it has been
/// verified with a real search; the site happily reports a logged-in page
/// while serving a session that cannot search.
pub struct SessionManager {
    registrar: Box<dyn Registrar>,
    has_session: bool,
    max_attempts: u32,
    retry_pause: Duration,
    close_pause: Duration,
}

impl SessionManager {
    pub fn new(
        registrar: Box<dyn Registrar>,
        max_attempts: u32,
        retry_pause: Duration,
        close_pause: Duration,
    ) -> Self {
        Self {
            registrar,
            has_session: false,
            max_attempts,
            retry_pause,
            close_pause,
        }
    }

    /// The live session, for running checks against.
    pub fn registrar(&self) -> &dyn Registrar {
        self.registrar.as_ref()
    }

    /// Establish a verified session, retrying up to the attempt limit. Any
    /// prior session is released before each retry. Verification runs one
    /// real search against the first active course; with no watched courses
    /// a bare successful login is accepted, there is nothing to test with.
    pub async fn acquire(&mut self, db: &Database) -> Result<(), SessionError> {
        for attempt in 1..=self.max_attempts {
            info!("Login attempt {attempt}/{}", self.max_attempts);

            if self.has_session {
                info!("Closing previous session before retrying");
                self.release().await;
                tokio::time::sleep(self.close_pause).await;
            }

            match self.registrar.login().await {
                Ok(()) => {
                    self.has_session = true;

                    let courses = db.list_active_courses().await?;
                    let Some(course) = courses.first() else {
                        info!("Login successful (no courses to verify against yet)");
                        return Ok(());
                    };

                    match self
                        .registrar
                        .search(&course.subject, &course.course_num)
                        .await
                    {
                        Ok(Some(_)) => {
                            info!("Login successful and verified");
                            return Ok(());
                        }
                        Ok(None) => {
                            warn!("Login appeared to work but verification search found nothing");
                        }
                        Err(err) => {
                            warn!("Verification search failed: {err}");
                        }
                    }
                }
                Err(err) => {
                    warn!("Login attempt {attempt} failed: {err}");
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.retry_pause).await;
            }
        }

        Err(SessionError::AttemptsExhausted(self.max_attempts))
    }

    /// Close the current session, if any.
    pub async fn release(&mut self) {
        if self.has_session {
            self.registrar.close().await;
            self.has_session = false;
        }
    }
}
