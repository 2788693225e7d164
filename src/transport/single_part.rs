//! Single-request presigned POST

use crate::callback::ProgressReporter;
use crate::descriptor::SinglePartPlan;
use crate::error::{Result, TransportStage};
use crate::transport::client::{FormUpload, UploadBody, UploadClient};
use crate::types::FileContent;
use crate::transport::{check_status, transfer_error};
use crate::upload::types::UploadTask;
use std::sync::Arc;

/// Form field carrying the file body. Always the last part of the form.
pub const FILE_FIELD: &str = "file";

/// Upload the whole file in one multipart/form-data POST
///
/// The policy fields from the descriptor go first, then the file body.
/// Progress is forwarded as the body is streamed. Any non-2xx status or
/// network fault is a transport error; nothing is retried here.
pub async fn upload_single_part<C>(
    client: &C,
    task: &UploadTask,
    plan: &SinglePartPlan,
    reporter: &Arc<ProgressReporter>,
) -> Result<()>
where
    C: UploadClient + ?Sized,
{
    let file_name = task.file_name();
    let body = match &task.file.content {
        FileContent::Memory(bytes) => UploadBody::Bytes(bytes.clone()),
        FileContent::Path(path) => UploadBody::File {
            path: path.clone(),
            len: task.file.size,
        },
    };

    let form = FormUpload {
        url: plan.url.clone(),
        fields: plan
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        file_field: FILE_FIELD.to_string(),
        file_name: file_name.to_string(),
        content_type: task.content_type().to_string(),
        body,
    };

    let response = client
        .post_form(form, reporter.part_counter(0))
        .await
        .map_err(|e| transfer_error(file_name, TransportStage::SinglePart, e))?;
    check_status(file_name, TransportStage::SinglePart, &response)?;

    reporter.finish();
    log::debug!("{} uploaded in a single request", file_name);
    Ok(())
}
