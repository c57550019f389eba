//! Media-library glue: a thin Plex-compatible HTTP client used to verify
//! connectivity, enumerate library sections, and trigger rescans after
//! downloads land.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::common::config::LibrarySettings;

const TOKEN_HEADER: &str = "X-Plex-Token";

#[derive(Debug)]
pub enum LibraryError {
    Upstream(reqwest::Error),
    UnknownSection(String),
}

impl fmt::Display for LibraryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryError::Upstream(err) => write!(f, "cannot reach media library: {err}"),
            LibraryError::UnknownSection(name) => write!(f, "no library section named {name}"),
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<reqwest::Error> for LibraryError {
    fn from(err: reqwest::Error) -> Self {
        LibraryError::Upstream(err)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LibrarySection {
    pub key: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
}

pub struct LibraryClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl LibraryClient {
    /// `None` when no token is configured — the library endpoints then
    /// answer 503 instead of proxying to nowhere.
    pub fn new(settings: LibrarySettings) -> Result<Option<Self>> {
        if settings.token.is_empty() {
            return Ok(None);
        }
        // Self-hosted servers routinely run with self-signed certificates.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build media-library client")?;
        Ok(Some(Self {
            http,
            base_url: settings.url.trim_end_matches('/').to_string(),
            token: settings.token,
        }))
    }

    /// Connectivity check: the sections listing must be reachable.
    pub async fn health(&self) -> Result<(), LibraryError> {
        self.sections().await.map(|_| ())
    }

    pub async fn sections(&self) -> Result<Vec<LibrarySection>, LibraryError> {
        let body: Value = self
            .http
            .get(format!("{}/library/sections", self.base_url))
            .header(TOKEN_HEADER, &self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let sections = body["MediaContainer"]["Directory"]
            .as_array()
            .map(|directories| {
                directories
                    .iter()
                    .map(|directory| LibrarySection {
                        key: json_string(&directory["key"]),
                        title: json_string(&directory["title"]),
                        kind: json_string(&directory["type"]),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(sections)
    }

    /// Trigger a rescan of the section with the given title.
    pub async fn refresh(&self, name: &str) -> Result<(), LibraryError> {
        let section = self
            .sections()
            .await?
            .into_iter()
            .find(|section| section.title == name)
            .ok_or_else(|| LibraryError::UnknownSection(name.to_string()))?;

        self.http
            .get(format!(
                "{}/library/sections/{}/refresh",
                self.base_url, section.key
            ))
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?
            .error_for_status()?;

        info!(section = %name, "library refresh started");
        Ok(())
    }
}

/// Section keys arrive as strings or numbers depending on server version.
fn json_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
