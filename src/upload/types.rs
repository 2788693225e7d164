use crate::callback::{ProgressCallback, UploadBeginCallback, UploadProgress};
use crate::descriptor::PresignedDescriptor;
use crate::error::{Result, UploadError};
use crate::types::{FileKey, UploadFile};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One file paired with the descriptor it was matched to
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub file: UploadFile,
    pub descriptor: PresignedDescriptor,
}

impl UploadTask {
    /// Pair a file with its descriptor, checking the chunk plan against the
    /// file size
    pub fn new(file: UploadFile, descriptor: PresignedDescriptor) -> Result<Self> {
        descriptor.validate_for_size(file.size)?;
        Ok(Self { file, descriptor })
    }

    pub fn file_name(&self) -> &str {
        &self.file.name
    }

    pub fn key(&self) -> &FileKey {
        self.descriptor.key()
    }

    pub fn content_type(&self) -> &str {
        &self.file.content_type
    }

    /// Identifier echoed by the server, falling back to the caller's own
    pub fn custom_id(&self) -> Option<&str> {
        self.descriptor
            .base
            .custom_id
            .as_deref()
            .or(self.file.custom_id.as_deref())
    }
}

/// Per-call options for a batch upload
#[derive(Clone, Default)]
pub struct UploadOptions {
    pub on_progress: Option<ProgressCallback>,
    pub on_upload_begin: Option<UploadBeginCallback>,
    /// Cancelling this token aborts the whole batch
    pub cancellation: CancellationToken,
    /// Route input sent along with the descriptor request
    pub input: Option<Value>,
}

impl std::fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOptions")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_upload_begin", &self.on_upload_begin.is_some())
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("input", &self.input)
            .finish()
    }
}

impl UploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(UploadProgress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn on_upload_begin<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_upload_begin = Some(Arc::new(callback));
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }
}

/// Final record of one uploaded file
///
/// `T` is the payload returned by the server's processing callback. The
/// untyped surface keeps it as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileResult<T = Value> {
    pub name: String,
    pub size: u64,
    pub key: FileKey,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    pub file_type: String,
    pub server_data: T,
    pub uploaded_at: DateTime<Utc>,
}

/// Result of a typed endpoint upload
pub type TypedUploadResult<T> = UploadFileResult<T>;

impl UploadFileResult<Value> {
    pub(crate) fn from_task(task: UploadTask, server_data: Value) -> Self {
        let custom_id = task.custom_id().map(str::to_string);
        let UploadTask { file, descriptor } = task;
        Self {
            name: file.name,
            size: file.size,
            key: descriptor.base.key,
            url: descriptor.base.file_url,
            custom_id,
            file_type: descriptor.base.file_type,
            server_data,
            uploaded_at: Utc::now(),
        }
    }

    /// Decode the server payload into `T`
    pub fn decode_server_data<T: DeserializeOwned>(self) -> Result<UploadFileResult<T>> {
        let server_data = serde_json::from_value(self.server_data).map_err(|e| {
            UploadError::protocol(format!("unexpected server data for {}: {}", self.name, e))
        })?;
        Ok(UploadFileResult {
            name: self.name,
            size: self.size,
            key: self.key,
            url: self.url,
            custom_id: self.custom_id,
            file_type: self.file_type,
            server_data,
            uploaded_at: self.uploaded_at,
        })
    }
}

/// A server route that files can be uploaded to, with its input and
/// callback payload types
pub trait Endpoint {
    /// Route slug on the server
    const SLUG: &'static str;

    /// Input sent with the descriptor request
    type Input: Serialize;

    /// Payload returned by the route's processing callback
    type ServerData: DeserializeOwned;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::decode_descriptor;
    use serde_json::json;

    fn descriptor(custom_id: Option<&str>) -> PresignedDescriptor {
        decode_descriptor(&json!({
            "key": "k1",
            "fileName": "a.txt",
            "fileUrl": "https://cdn.example.com/f/k1",
            "pollingJwt": "jwt",
            "pollingUrl": "https://api.example.com/poll/k1",
            "contentDisposition": "inline",
            "customId": custom_id,
            "fileType": "text",
            "urls": ["u1", "u2"],
            "uploadId": "up",
            "chunkSize": 4,
            "chunkCount": 2
        }))
        .unwrap()
    }

    #[test]
    fn test_upload_task_checks_size() {
        let file = UploadFile::from_bytes("a.txt", vec![1u8; 6]);
        assert!(UploadTask::new(file, descriptor(None)).is_ok());

        let file = UploadFile::from_bytes("a.txt", vec![1u8; 9]);
        assert!(matches!(
            UploadTask::new(file, descriptor(None)),
            Err(UploadError::Protocol { .. })
        ));
    }

    #[test]
    fn test_custom_id_precedence() {
        let file = UploadFile::from_bytes("a.txt", vec![1u8; 6]).with_custom_id("mine");
        let task = UploadTask::new(file.clone(), descriptor(None)).unwrap();
        assert_eq!(task.custom_id(), Some("mine"));

        let task = UploadTask::new(file, descriptor(Some("server"))).unwrap();
        assert_eq!(task.custom_id(), Some("server"));
    }

    #[test]
    fn test_upload_options() {
        let token = CancellationToken::new();
        let options = UploadOptions::new()
            .on_progress(|_| {})
            .cancellation(token.clone())
            .input(json!({"album": 3}));

        assert!(options.on_progress.is_some());
        assert!(options.on_upload_begin.is_none());
        assert_eq!(options.input, Some(json!({"album": 3})));
        token.cancel();
        assert!(options.cancellation.is_cancelled());
    }

    #[test]
    fn test_decode_server_data() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Uploaded {
            uploaded_by: String,
        }

        let file = UploadFile::from_bytes("a.txt", vec![1u8; 6]);
        let task = UploadTask::new(file, descriptor(None)).unwrap();
        let result = UploadFileResult::from_task(task, json!({"uploaded_by": "u-1"}));
        assert_eq!(result.url, "https://cdn.example.com/f/k1");

        let typed: TypedUploadResult<Uploaded> = result.clone().decode_server_data().unwrap();
        assert_eq!(typed.server_data.uploaded_by, "u-1");
        assert_eq!(typed.key, result.key);

        assert!(matches!(
            result.decode_server_data::<u32>(),
            Err(UploadError::Protocol { .. })
        ));
    }
}
