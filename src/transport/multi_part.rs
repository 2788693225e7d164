//! Chunked upload to per-part presigned URLs

use crate::callback::ProgressReporter;
use crate::descriptor::{ChunkRange, MultiPartPlan};
use crate::error::{Result, TransportStage, UploadError};
use crate::transport::client::{PartUpload, UploadClient};
use crate::transport::types::{ChunkResult, EtagEntry, MultipartCompletion};
use crate::transport::{check_status, transfer_error};
use crate::upload::types::UploadTask;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;

/// Build a `Content-Disposition` header value for `file_name`
pub fn content_disposition_header(disposition: &str, file_name: &str) -> String {
    let encoded = urlencoding::encode(file_name);
    format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        disposition, encoded, encoded
    )
}

/// Upload every chunk, then tell the server which ETags make up the object
///
/// Up to `concurrency` parts are in flight at once. The first failed part
/// fails the whole transfer and drops the parts still running; parts already
/// sent are left for the storage provider to expire. Returned chunk results
/// are sorted by part number.
pub async fn upload_multi_part<C>(
    client: &C,
    task: &UploadTask,
    plan: &MultiPartPlan,
    reporter: &Arc<ProgressReporter>,
    concurrency: usize,
    complete_url: &str,
) -> Result<Vec<ChunkResult>>
where
    C: UploadClient + ?Sized,
{
    let file_name = task.file_name();
    let disposition =
        content_disposition_header(&task.descriptor.base.content_disposition, file_name);
    let ranges = plan.chunk_ranges(task.file.size);

    log::debug!(
        "{}: uploading {} parts of {} bytes ({} at a time)",
        file_name,
        ranges.len(),
        plan.chunk_size,
        concurrency.max(1)
    );

    let mut chunks: Vec<ChunkResult> = stream::iter(ranges)
        .map(|range| upload_part(client, task, plan, range, reporter, &disposition))
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await?;

    chunks.sort_by_key(|c| c.part_number);
    if chunks.len() as u64 != plan.chunk_count {
        return Err(UploadError::internal(format!(
            "{}: collected {} parts, expected {}",
            file_name,
            chunks.len(),
            plan.chunk_count
        )));
    }
    reporter.finish();

    let completion = MultipartCompletion {
        file_key: task.key().clone(),
        upload_id: plan.upload_id.clone(),
        etags: chunks.iter().map(EtagEntry::from).collect(),
    };
    let response = client
        .post_json(complete_url, &serde_json::to_value(&completion)?)
        .await
        .map_err(|e| transfer_error(file_name, TransportStage::MultipartComplete, e))?;
    check_status(file_name, TransportStage::MultipartComplete, &response)?;

    log::debug!("{}: multipart upload {} completed", file_name, plan.upload_id);
    Ok(chunks)
}

async fn upload_part<C>(
    client: &C,
    task: &UploadTask,
    plan: &MultiPartPlan,
    range: ChunkRange,
    reporter: &Arc<ProgressReporter>,
    disposition: &str,
) -> Result<ChunkResult>
where
    C: UploadClient + ?Sized,
{
    let file_name = task.file_name();
    let stage = TransportStage::Part(range.part_number);

    let url = plan.urls.get(range.index()).ok_or_else(|| {
        UploadError::protocol(format!("{}: no URL for part {}", file_name, range.part_number))
    })?;
    let body = task.file.read_range(range.offset, range.length).await?;

    let part = PartUpload {
        url: url.clone(),
        part_number: range.part_number,
        content_type: task.content_type().to_string(),
        content_disposition: Some(disposition.to_string()),
        body,
    };

    let response = client
        .put_part(part, reporter.part_counter(range.index()))
        .await
        .map_err(|e| transfer_error(file_name, stage, e))?;
    check_status(file_name, stage, &response)?;

    let etag = response
        .etag
        .filter(|tag| !tag.is_empty())
        .ok_or_else(|| {
            UploadError::transport(
                file_name,
                stage,
                Some(response.status),
                "storage response carried no ETag",
            )
        })?;

    reporter.complete_part(range.index(), range.length);
    Ok(ChunkResult {
        part_number: range.part_number,
        etag,
    })
}
