use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{Registrar, RegistrarError};
use crate::models::{SearchResult, Section};

/// Connection details for the registration site, loaded from settings.json.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrarSettings {
    pub login_url: String,
    pub search_url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
struct SectionPayload {
    available: u32,
    total: u32,
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    sections: Vec<SectionPayload>,
}

/// HTTP adapter for the registration site. The cookie jar carries the
/// authenticated session; dropping the client discards it.
pub struct HttpRegistrar {
    client: reqwest::Client,
    settings: RegistrarSettings,
    logged_in: bool,
}

impl HttpRegistrar {
    pub fn new(settings: RegistrarSettings) -> Result<Self, RegistrarError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| RegistrarError::Transient(format!("http client build failed: {err}")))?;

        Ok(Self {
            client,
            settings,
            logged_in: false,
        })
    }
}

#[async_trait]
impl Registrar for HttpRegistrar {
    async fn login(&mut self) -> Result<(), RegistrarError> {
        if self.settings.login_url.is_empty() {
            return Err(RegistrarError::Auth(
                "no login URL configured in settings.json".into(),
            ));
        }

        let response = self
            .client
            .post(&self.settings.login_url)
            .form(&[
                ("username", self.settings.username.as_str()),
                ("password", self.settings.password.as_str()),
            ])
            .send()
            .await
            .map_err(|err| RegistrarError::Transient(format!("login request failed: {err}")))?;

        match response.status() {
            status if status.is_success() => {
                self.logged_in = true;
                info!("registrar login succeeded");
                Ok(())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RegistrarError::Auth(
                format!("login rejected with {}", response.status()),
            )),
            status => Err(RegistrarError::Transient(format!(
                "login returned unexpected status {status}"
            ))),
        }
    }

    async fn search(
        &self,
        subject: &str,
        course_num: &str,
    ) -> Result<Option<SearchResult>, RegistrarError> {
        if !self.logged_in {
            return Err(RegistrarError::Transient("not logged in".into()));
        }

        let response = self
            .client
            .get(&self.settings.search_url)
            .query(&[("subject", subject), ("courseNum", course_num)])
            .send()
            .await
            .map_err(|err| RegistrarError::Transient(format!("search request failed: {err}")))?;

        // An expired session usually shows up as a login redirect or a
        // denial, not an explicit signal. Report nothing usable and let the
        // scheduler's failure streak decide when to restart.
        if !response.status().is_success() {
            warn!(
                "search for {subject} {course_num} returned {}",
                response.status()
            );
            return Ok(None);
        }

        match response.json::<SearchPayload>().await {
            Ok(payload) => {
                if payload.sections.is_empty() {
                    return Ok(None);
                }
                let sections = payload
                    .sections
                    .into_iter()
                    .map(|s| Section {
                        available: s.available,
                        total: s.total,
                    })
                    .collect();
                Ok(Some(SearchResult::from_sections(sections)))
            }
            Err(err) => {
                warn!("search for {subject} {course_num} returned unparseable body: {err}");
                Ok(None)
            }
        }
    }

    async fn close(&mut self) {
        self.logged_in = false;
    }
}
