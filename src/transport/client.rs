//! HTTP seam used by the transports, the poller and the descriptor request
//!
//! [`UploadClient`] is the only way the crate talks to the network. The
//! default implementation is [`HttpClient`] over `reqwest`; tests swap in
//! scripted fakes.

use crate::callback::ByteProgress;
use crate::error::{Result, UploadError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::io::ReaderStream;

/// Body slice size used to emit byte-sent events
pub const PROGRESS_SLICE_SIZE: usize = 64 * 1024;

/// Status, ETag and body of a finished HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// ETag header with surrounding quotes removed
    pub etag: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            etag: None,
            body: body.into(),
        }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(normalize_etag(&etag.into()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            UploadError::protocol(format!("undecodable response body (HTTP {}): {}", self.status, e))
        })
    }
}

/// Strip the quotes S3-style providers put around ETags
pub fn normalize_etag(raw: &str) -> String {
    raw.trim().replace('"', "")
}

/// Where a form upload's file bytes come from
#[derive(Debug, Clone)]
pub enum UploadBody {
    Bytes(Bytes),
    /// Streamed from disk while the request is sent
    File { path: PathBuf, len: u64 },
}

impl UploadBody {
    pub fn len(&self) -> u64 {
        match self {
            UploadBody::Bytes(bytes) => bytes.len() as u64,
            UploadBody::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Bytes> for UploadBody {
    fn from(bytes: Bytes) -> Self {
        UploadBody::Bytes(bytes)
    }
}

/// A multipart/form-data POST carrying policy fields and the file body
#[derive(Debug, Clone)]
pub struct FormUpload {
    pub url: String,
    /// Policy fields, sent before the file part
    pub fields: Vec<(String, String)>,
    pub file_field: String,
    pub file_name: String,
    pub content_type: String,
    pub body: UploadBody,
}

/// A raw PUT of one chunk to its presigned URL
#[derive(Debug, Clone)]
pub struct PartUpload {
    pub url: String,
    pub part_number: u32,
    pub content_type: String,
    pub content_disposition: Option<String>,
    pub body: Bytes,
}

/// Network operations needed by the upload engine
#[async_trait]
pub trait UploadClient: Send + Sync {
    /// POST a form upload, reporting cumulative body bytes sent
    async fn post_form(&self, form: FormUpload, progress: ByteProgress) -> Result<HttpResponse>;

    /// PUT one chunk, reporting cumulative body bytes sent
    async fn put_part(&self, part: PartUpload, progress: ByteProgress) -> Result<HttpResponse>;

    /// POST a JSON document
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse>;

    /// GET a JSON document with an `authorization` header
    async fn get_json(&self, url: &str, authorization: &str) -> Result<HttpResponse>;
}

/// `reqwest`-backed [`UploadClient`]
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    /// Create a client whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("presigned-upload/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UploadError::config_error(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { inner })
    }

    /// Wrap an existing `reqwest` client
    pub fn from_reqwest(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    async fn finish(response: reqwest::Response) -> Result<HttpResponse> {
        let status = response.status().as_u16();
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(normalize_etag);
        let body = response.text().await?;

        log::debug!("HTTP {} ({} byte body)", status, body.len());
        Ok(HttpResponse { status, etag, body })
    }
}

/// Stream `body` in fixed slices, reporting the running total as each slice
/// is handed to the connection.
fn progress_body(body: Bytes, progress: ByteProgress) -> reqwest::Body {
    let slices: Vec<Bytes> = (0..body.len())
        .step_by(PROGRESS_SLICE_SIZE)
        .map(|start| body.slice(start..(start + PROGRESS_SLICE_SIZE).min(body.len())))
        .collect();

    let mut sent = 0u64;
    let stream = stream::iter(slices).map(move |slice| {
        sent += slice.len() as u64;
        progress(sent);
        Ok::<Bytes, std::io::Error>(slice)
    });
    reqwest::Body::wrap_stream(stream)
}

/// Stream a file from disk in fixed slices, reporting the running total
async fn file_progress_body(path: &Path, progress: ByteProgress) -> Result<reqwest::Body> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| UploadError::io(path.display().to_string(), e.to_string()))?;

    let mut sent = 0u64;
    let stream = ReaderStream::with_capacity(file, PROGRESS_SLICE_SIZE).map(move |chunk| {
        if let Ok(slice) = &chunk {
            sent += slice.len() as u64;
            progress(sent);
        }
        chunk
    });
    Ok(reqwest::Body::wrap_stream(stream))
}

#[async_trait]
impl UploadClient for HttpClient {
    async fn post_form(&self, form: FormUpload, progress: ByteProgress) -> Result<HttpResponse> {
        let length = form.body.len();
        log::debug!("POST {} ({} form fields, {} bytes)", form.url, form.fields.len(), length);

        let body = match &form.body {
            UploadBody::Bytes(bytes) => progress_body(bytes.clone(), progress),
            UploadBody::File { path, .. } => file_progress_body(path, progress).await?,
        };
        let file_part = reqwest::multipart::Part::stream_with_length(body, length)
            .file_name(form.file_name)
            .mime_str(&form.content_type)
            .map_err(|e| UploadError::invalid_parameter("content_type", e.to_string()))?;

        let mut multipart = reqwest::multipart::Form::new();
        for (name, value) in form.fields {
            multipart = multipart.text(name, value);
        }
        multipart = multipart.part(form.file_field, file_part);

        let response = self.inner.post(&form.url).multipart(multipart).send().await?;
        Self::finish(response).await
    }

    async fn put_part(&self, part: PartUpload, progress: ByteProgress) -> Result<HttpResponse> {
        log::debug!("PUT part {} to {} ({} bytes)", part.part_number, part.url, part.body.len());

        let mut request = self
            .inner
            .put(&part.url)
            .header(CONTENT_TYPE, part.content_type)
            .header(CONTENT_LENGTH, part.body.len());
        if let Some(disposition) = part.content_disposition {
            request = request.header(CONTENT_DISPOSITION, disposition);
        }

        let response = request.body(progress_body(part.body, progress)).send().await?;
        Self::finish(response).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse> {
        log::debug!("POST {}", url);
        let response = self.inner.post(url).json(body).send().await?;
        Self::finish(response).await
    }

    async fn get_json(&self, url: &str, authorization: &str) -> Result<HttpResponse> {
        log::debug!("GET {}", url);
        let response = self
            .inner
            .get(url)
            .header(AUTHORIZATION, authorization)
            .send()
            .await?;
        Self::finish(response).await
    }
}
