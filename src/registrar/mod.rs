use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use thiserror::Error;

use crate::models::SearchResult;

mod http;

pub use http::{HttpRegistrar, RegistrarSettings};

/// How a registrar call failed, from the engine's point of view. Only `Auth`
/// can end the process (after login retries are exhausted); everything else
/// is absorbed by the scheduler's per-item and per-batch handling.
#[derive(Debug, Error)]
pub enum RegistrarError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("registrar request failed: {0}")]
    Transient(String),
    #[error("registrar call timed out after {0:?}")]
    Timeout(Duration),
}

/// The opaque scraping capability. A logged-in implementation *is* the
/// session: `login` establishes it, `search` uses it, `close` discards it.
/// The site may silently invalidate the session at any time; `search` then
/// typically returns `Ok(None)` rather than an error.
#[async_trait]
pub trait Registrar: Send + Sync {
    async fn login(&mut self) -> Result<(), RegistrarError>;

    /// One availability lookup. `Ok(None)` means the page yielded nothing
    /// usable, which the engine treats as a transient per-item failure.
    async fn search(
        &self,
        subject: &str,
        course_num: &str,
    ) -> Result<Option<SearchResult>, RegistrarError>;

    async fn close(&mut self);
}

const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(45);

/// Wraps every registrar call in a deadline so a hung login or search cannot
/// stall the whole scheduler. Timeouts surface as `RegistrarError::Timeout`
/// and flow through the same transient-failure paths as any other error.
pub struct TimedRegistrar<R> {
    inner: R,
    login_timeout: Duration,
    search_timeout: Duration,
}

impl<R: Registrar> TimedRegistrar<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
        }
    }

    pub fn with_timeouts(inner: R, login_timeout: Duration, search_timeout: Duration) -> Self {
        Self {
            inner,
            login_timeout,
            search_timeout,
        }
    }
}

#[async_trait]
impl<R: Registrar> Registrar for TimedRegistrar<R> {
    async fn login(&mut self) -> Result<(), RegistrarError> {
        let deadline = self.login_timeout;
        match tokio::time::timeout(deadline, self.inner.login()).await {
            Ok(result) => result,
            Err(_) => {
                warn!("login timed out after {deadline:?}");
                Err(RegistrarError::Timeout(deadline))
            }
        }
    }

    async fn search(
        &self,
        subject: &str,
        course_num: &str,
    ) -> Result<Option<SearchResult>, RegistrarError> {
        let deadline = self.search_timeout;
        match tokio::time::timeout(deadline, self.inner.search(subject, course_num)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("search for {subject} {course_num} timed out after {deadline:?}");
                Err(RegistrarError::Timeout(deadline))
            }
        }
    }

    async fn close(&mut self) {
        self.inner.close().await;
    }
}
