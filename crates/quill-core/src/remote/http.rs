//! HTTP client for the remote notes API.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use super::{RemoteError, RemoteFilter, RemoteNotes, RemoteResult};
use crate::error::{Error, Result};
use crate::models::{NoteId, NoteRecord};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// [`RemoteNotes`] over the notes HTTP API
#[derive(Clone)]
pub struct HttpNoteRemote {
    base_url: String,
    client: reqwest::Client,
}

impl HttpNoteRemote {
    /// Create a client for `base_url` (e.g. `https://api.example.com`).
    ///
    /// `timeout` bounds every request; the queue applies its own timeout on
    /// top so a hung transmission is always abandoned.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn notes_url(&self) -> String {
        format!("{}/notes", self.base_url)
    }

    fn note_url(&self, id: &NoteId) -> String {
        format!("{}/notes/{id}", self.base_url)
    }

    async fn fail(response: reqwest::Response) -> RemoteError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        classify_status(status, &body)
    }
}

impl std::fmt::Debug for HttpNoteRemote {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpNoteRemote")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transient(error.to_string())
    }
}

impl RemoteNotes for HttpNoteRemote {
    fn list(
        &self,
        filter: &RemoteFilter,
    ) -> impl Future<Output = RemoteResult<Vec<NoteRecord>>> + Send {
        let request = self
            .client
            .get(self.notes_url())
            .query(&filter.query_pairs())
            .header("Accept", "application/json");
        async move {
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(Self::fail(response).await);
            }
            let records = response.json::<Vec<NoteRecord>>().await?;
            Ok(records.into_iter().map(NoteRecord::normalized).collect())
        }
    }

    fn upsert(&self, record: &NoteRecord) -> impl Future<Output = RemoteResult<()>> + Send {
        let request = self.client.put(self.note_url(&record.id)).json(record);
        async move {
            let response = request.send().await?;
            if response.status().is_success() {
                return Ok(());
            }
            // A 404 on an upsert means the route is wrong, not that the note is gone
            match Self::fail(response).await {
                RemoteError::NotFound => Err(RemoteError::Rejected {
                    status: StatusCode::NOT_FOUND.as_u16(),
                    message: "upsert endpoint not found".to_string(),
                }),
                other => Err(other),
            }
        }
    }

    fn delete(&self, id: &NoteId) -> impl Future<Output = RemoteResult<()>> + Send {
        let request = self.client.delete(self.note_url(id));
        async move {
            let response = request.send().await?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(Self::fail(response).await)
            }
        }
    }

    fn probe(&self) -> impl Future<Output = bool> + Send {
        let request = self
            .client
            .get(format!("{}/healthz", self.base_url))
            .timeout(PROBE_TIMEOUT);
        async move {
            match request.send().await {
                Ok(response) => response.status().is_success(),
                Err(error) => {
                    tracing::debug!("Remote probe failed: {error}");
                    false
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Map a non-success status onto the error taxonomy
fn classify_status(status: StatusCode, body: &str) -> RemoteError {
    if status == StatusCode::NOT_FOUND {
        return RemoteError::NotFound;
    }

    let message = parse_error_message(body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        RemoteError::Transient(format!("{message} ({})", status.as_u16()))
    } else {
        RemoteError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

fn parse_error_message(body: &str) -> Option<String> {
    if let Ok(payload) = serde_json::from_str::<RemoteErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return Some(message.trim().to_string());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let url = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Config("remote URL must not be empty".to_string()))?;
    if is_http_url(&url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(Error::Config(
            "remote URL must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url(String::new()).is_err());
        assert!(normalize_base_url("api.example.com".to_string()).is_err());
        assert_eq!(
            normalize_base_url(" https://api.example.com/ ".to_string()).unwrap(),
            "https://api.example.com"
        );
    }

    #[test]
    fn note_urls_use_the_id() {
        let remote = HttpNoteRemote::new("http://localhost:8787/", Duration::from_secs(1)).unwrap();
        let id = NoteId::new();
        assert_eq!(remote.notes_url(), "http://localhost:8787/notes");
        assert_eq!(remote.note_url(&id), format!("http://localhost:8787/notes/{id}"));
    }

    #[test]
    fn classify_status_follows_taxonomy() {
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, ""),
            RemoteError::NotFound
        );
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(classify_status(StatusCode::REQUEST_TIMEOUT, "").is_transient());

        assert_eq!(
            classify_status(
                StatusCode::UNPROCESSABLE_ENTITY,
                r#"{"error":"title too long"}"#
            ),
            RemoteError::Rejected {
                status: 422,
                message: "title too long".to_string()
            }
        );
        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST, ""),
            RemoteError::Rejected {
                status: 400,
                message: "HTTP 400".to_string()
            }
        );
    }

    #[test]
    fn debug_omits_client_internals() {
        let remote = HttpNoteRemote::new("https://api.example.com", Duration::from_secs(1)).unwrap();
        let debug = format!("{remote:?}");
        assert!(debug.contains("https://api.example.com"));
    }

    #[tokio::test]
    async fn probe_reports_unreachable_host() {
        // Port 9 (discard) on localhost is closed in test environments
        let remote = HttpNoteRemote::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(!remote.probe().await);
    }
}
