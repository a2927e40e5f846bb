//! HTTP client for the remote media server.
//!
//! One `reqwest::Client` with a shared cookie store carries the session; all
//! callers run on background worker threads and report back over channels.

mod types;

pub use types::{
    Envelope, FileEntry, FilePage, GalleryQuery, LoginRequest, RenameRequest, SortOrder,
    TypeFilter, UsageStats,
};

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use thiserror::Error;

use crate::utils::filename::encode_filename;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Applied to short JSON calls only; uploads and media fetches may
/// legitimately run longer than any fixed budget.
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Upload bodies are streamed in chunks this size so byte progress can be
/// observed as the transfer advances.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server rejected the request ({status}): {message}")]
    Server { status: StatusCode, message: String },
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl ApiError {
    /// The decoded server-side failure message, when there is one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Server { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Probe whether the cookie session is still valid.
    pub async fn me(&self) -> Result<(), ApiError> {
        let resp = self
            .http
            .get(self.url("/auth/me"))
            .timeout(CALL_TIMEOUT)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let resp = self
            .http
            .post(self.url("/auth/login"))
            .timeout(CALL_TIMEOUT)
            .json(&LoginRequest { username, password })
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        let resp = self
            .http
            .get(self.url("/auth/logout"))
            .timeout(CALL_TIMEOUT)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    /// Fetch one gallery page.
    pub async fn list_files(&self, query: &GalleryQuery) -> Result<FilePage, ApiError> {
        let resp = self
            .http
            .get(self.url("/files"))
            .timeout(CALL_TIMEOUT)
            .query(&[
                ("limit", query.limit.to_string()),
                ("page", query.page.to_string()),
                ("sort", query.sort.as_str().to_string()),
                ("type", query.kind.as_str().to_string()),
                ("search", query.search.clone()),
            ])
            .send()
            .await?;

        let envelope: Envelope<FilePage> = check(resp).await?.json().await?;
        envelope
            .data
            .ok_or_else(|| ApiError::Decode("listing response carried no data".into()))
    }

    pub async fn usage(&self) -> Result<UsageStats, ApiError> {
        let resp = self
            .http
            .get(self.url("/stats/usage"))
            .timeout(CALL_TIMEOUT)
            .send()
            .await?;

        let envelope: Envelope<UsageStats> = check(resp).await?.json().await?;
        envelope
            .data
            .ok_or_else(|| ApiError::Decode("usage response carried no data".into()))
    }

    pub async fn rename_file(&self, id: i64, new_name: &str) -> Result<(), ApiError> {
        let resp = self
            .http
            .put(self.url(&format!("/files/{id}")))
            .timeout(CALL_TIMEOUT)
            .json(&RenameRequest { new_name })
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    pub async fn delete_file(&self, id: i64) -> Result<(), ApiError> {
        let resp = self
            .http
            .delete(self.url(&format!("/files/{id}")))
            .timeout(CALL_TIMEOUT)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    /// Absolute URL of a stored file's raw bytes.
    pub fn static_url(&self, file_path: &str) -> String {
        self.url(&format!("/static{file_path}"))
    }

    /// Fetch a stored file's raw bytes (lightbox media).
    pub async fn fetch_static(&self, file_path: &str) -> Result<Vec<u8>, ApiError> {
        let resp = self.http.get(self.static_url(file_path)).send().await?;
        let resp = check(resp).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    /// Upload one file's bytes, reporting the percentage sent so far through
    /// `on_progress` as the body streams out. 100 means the byte stream has
    /// been handed to the transport in full, not that the server is done.
    pub async fn upload_file(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
        mut on_progress: impl FnMut(u8) + Send + Sync + 'static,
    ) -> Result<(), ApiError> {
        let total = bytes.len().max(1);
        let chunks: Vec<Vec<u8>> = bytes
            .chunks(UPLOAD_CHUNK_SIZE)
            .map(|chunk| chunk.to_vec())
            .collect();

        let mut sent = 0usize;
        let body_stream = futures::stream::iter(chunks).map(move |chunk| {
            sent += chunk.len();
            on_progress(((sent * 100) / total).min(100) as u8);
            Ok::<_, std::convert::Infallible>(chunk)
        });

        let resp = self
            .http
            .post(self.url("/files/upload"))
            .query(&[("filename", encode_filename(file_name))])
            .header(CONTENT_TYPE, content_type)
            .body(reqwest::Body::wrap_stream(body_stream))
            .send()
            .await?;

        check(resp).await?;
        Ok(())
    }
}

/// Turn a non-success response into `ApiError::Server`, decoding the
/// envelope message when the body carries one.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let message = resp
        .json::<Envelope<serde_json::Value>>()
        .await
        .map(|envelope| envelope.message)
        .unwrap_or_default();

    Err(ApiError::Server { status, message })
}
