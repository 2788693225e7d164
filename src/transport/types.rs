use crate::types::FileKey;
use serde::{Deserialize, Serialize};

/// ETag of one successfully uploaded part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkResult {
    pub part_number: u32,
    pub etag: String,
}

/// Wire form of a [`ChunkResult`] inside the completion notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtagEntry {
    pub tag: String,
    pub part_number: u32,
}

impl From<&ChunkResult> for EtagEntry {
    fn from(chunk: &ChunkResult) -> Self {
        Self {
            tag: chunk.etag.clone(),
            part_number: chunk.part_number,
        }
    }
}

/// Sent once all parts of a multipart upload succeeded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartCompletion {
    pub file_key: FileKey,
    pub upload_id: String,
    /// Sorted by ascending part number
    pub etags: Vec<EtagEntry>,
}

/// Best-effort notice that a transfer failed so the server can release the
/// reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureNotification {
    pub file_key: FileKey,
    pub upload_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_provider_error: Option<String>,
    pub file_name: String,
}
