//! Byte transfer to the storage provider
//!
//! Two interchangeable strategies: one form POST of the whole file, or a
//! chunked upload where every part goes to its own presigned URL followed by a
//! completion notification. Neither retries; a failed transfer fails the file.

pub mod client;
pub mod multi_part;
pub mod single_part;
pub mod types;

pub use client::{FormUpload, HttpClient, HttpResponse, PartUpload, UploadBody, UploadClient};
pub use multi_part::upload_multi_part;
pub use single_part::upload_single_part;
pub use types::{ChunkResult, EtagEntry, FailureNotification, MultipartCompletion};

use crate::error::{Result, TransportStage, UploadError};

/// Attach file and stage context to a client-level failure
pub(crate) fn transfer_error(file_name: &str, stage: TransportStage, err: UploadError) -> UploadError {
    match err {
        UploadError::Network { message } => UploadError::transport(file_name, stage, None, message),
        other => other,
    }
}

/// Any non-2xx response is a transport failure carrying the status
pub(crate) fn check_status(
    file_name: &str,
    stage: TransportStage,
    response: &HttpResponse,
) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    Err(UploadError::transport(
        file_name,
        stage,
        Some(response.status),
        format!("storage responded with HTTP {}: {}", response.status, response.body.trim()),
    ))
}
