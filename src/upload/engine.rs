//! Batch orchestration
//!
//! A batch runs in two phases. First every file's bytes are transferred,
//! then every file is polled for server-side completion. A failure in the
//! transfer phase cancels the other transfers and no file is ever polled.
//! A failure while polling cancels the remaining pollers. Either way the
//! batch fails as a whole with one error.

use crate::callback::ProgressReporter;
use crate::config::UploaderConfig;
use crate::descriptor::{decode_descriptors, PresignedDescriptor, RouteActions, UploadPlan};
use crate::error::{Result, UploadError};
use crate::poller::{poll_for_completion, BackoffPolicy, PollOutcome};
use crate::transport::{upload_multi_part, upload_single_part, FailureNotification, UploadClient};
use crate::types::UploadFile;
use crate::upload::types::{UploadFileResult, UploadOptions, UploadTask};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Drives transports and pollers for a batch of files
pub struct UploadEngine<C: UploadClient + ?Sized> {
    client: Arc<C>,
    config: UploaderConfig,
}

impl<C: UploadClient + ?Sized> Clone for UploadEngine<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            config: self.config.clone(),
        }
    }
}

impl<C: UploadClient + ?Sized> std::fmt::Debug for UploadEngine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Pair every file with the first unused descriptor carrying its name
pub fn match_descriptors(
    files: Vec<UploadFile>,
    descriptors: Vec<PresignedDescriptor>,
) -> Result<Vec<UploadTask>> {
    let mut available: Vec<Option<PresignedDescriptor>> =
        descriptors.into_iter().map(Some).collect();

    let tasks = files
        .into_iter()
        .map(|file| {
            let descriptor = available
                .iter_mut()
                .find(|slot| {
                    slot.as_ref()
                        .is_some_and(|d| d.file_name() == file.name)
                })
                .and_then(Option::take)
                .ok_or_else(|| UploadError::not_found(&file.name))?;
            UploadTask::new(file, descriptor)
        })
        .collect::<Result<Vec<_>>>()?;

    let unused = available.iter().filter(|slot| slot.is_some()).count();
    if unused > 0 {
        log::debug!("{} descriptor(s) left without a matching file", unused);
    }
    Ok(tasks)
}

/// Pick the error a failed batch reports: the first file in submission
/// order that failed for a reason other than cancellation.
fn batch_error<T>(outcomes: Vec<(usize, Result<T>)>) -> Option<UploadError> {
    let mut errors: Vec<(usize, UploadError)> = outcomes
        .into_iter()
        .filter_map(|(index, outcome)| outcome.err().map(|e| (index, e)))
        .collect();
    if errors.is_empty() {
        return None;
    }

    errors.sort_by_key(|(index, _)| *index);
    let position = errors
        .iter()
        .position(|(_, e)| !e.is_cancelled())
        .unwrap_or(0);
    Some(errors.swap_remove(position).1)
}

impl<C: UploadClient + ?Sized> UploadEngine<C> {
    pub fn new(client: Arc<C>, config: UploaderConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Upload `files` using the raw `descriptors` issued for them
    ///
    /// Every descriptor is decoded before anything is sent; one bad
    /// descriptor or one file without a descriptor fails the call. On
    /// success the results are in the same order as `files`.
    pub async fn upload(
        &self,
        route: &RouteActions,
        files: Vec<UploadFile>,
        descriptors: &[Value],
        options: &UploadOptions,
    ) -> Result<Vec<UploadFileResult>> {
        let result = self.run(route, files, descriptors, options).await;
        if let Err(err) = &result {
            match err.file_name() {
                Some(file) => log::error!(
                    "Upload to {} failed at {} for {}: {}",
                    route.slug(),
                    err.stage(),
                    file,
                    err
                ),
                None => log::error!("Upload to {} failed at {}: {}", route.slug(), err.stage(), err),
            }
        }
        result
    }

    async fn run(
        &self,
        route: &RouteActions,
        files: Vec<UploadFile>,
        descriptors: &[Value],
        options: &UploadOptions,
    ) -> Result<Vec<UploadFileResult>> {
        let descriptors = decode_descriptors(descriptors)?;
        let tasks = match_descriptors(files, descriptors)?;

        let total: u64 = tasks.iter().map(|t| t.file.size).sum();
        log::info!(
            "Uploading {} file(s) ({}) to {}",
            tasks.len(),
            bytesize::ByteSize::b(total),
            route.slug()
        );

        let cancel = options.cancellation.child_token();
        let concurrency = self.config.effective_file_concurrency().max(1);

        let transfers: Vec<(usize, Result<()>)> = {
            let cancel = &cancel;
            let tasks = &tasks;
            stream::iter(0..tasks.len())
                .map(|index| {
                    let task = &tasks[index];
                    async move { (index, self.transfer(route, task, options, cancel).await) }
                })
                .buffer_unordered(concurrency)
                .collect()
                .await
        };
        if let Some(err) = batch_error(transfers) {
            return Err(err);
        }

        let policy = self.config.backoff_policy();
        let mut polls: Vec<(usize, Result<PollOutcome>)> = {
            let cancel = &cancel;
            let policy = &policy;
            let tasks = &tasks;
            stream::iter(0..tasks.len())
                .map(|index| {
                    let task = &tasks[index];
                    async move {
                        let outcome = self.await_completion(task, policy, cancel).await;
                        if matches!(&outcome, Err(e) if !e.is_cancelled()) {
                            cancel.cancel();
                        }
                        (index, outcome)
                    }
                })
                .buffer_unordered(concurrency)
                .collect()
                .await
        };

        if polls.iter().any(|(_, outcome)| outcome.is_err()) {
            return Err(batch_error(polls).unwrap_or(UploadError::Cancelled));
        }

        polls.sort_by_key(|(index, _)| *index);
        let results = tasks
            .into_iter()
            .zip(polls)
            .map(|(task, (_, outcome))| {
                outcome.map(|outcome| UploadFileResult::from_task(task, outcome.server_data))
            })
            .collect::<Result<Vec<_>>>()?;

        log::info!("Uploaded {} file(s) to {}", results.len(), route.slug());
        Ok(results)
    }

    /// Transfer one file's bytes. A failure cancels the rest of the batch
    /// and is reported to the server.
    async fn transfer(
        &self,
        route: &RouteActions,
        task: &UploadTask,
        options: &UploadOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        if let Some(begin) = &options.on_upload_begin {
            begin(task.file_name());
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(UploadError::Cancelled),
            result = self.run_transport(route, task, options) => result,
        };

        if let Err(err) = &result {
            if !err.is_cancelled() {
                cancel.cancel();
                self.notify_failure(route, task, err).await;
            }
        }
        result
    }

    async fn run_transport(
        &self,
        route: &RouteActions,
        task: &UploadTask,
        options: &UploadOptions,
    ) -> Result<()> {
        log::info!("Uploading {} ({})", task.file_name(), task.file.size_string());

        match &task.descriptor.plan {
            UploadPlan::SinglePart(plan) => {
                let reporter = Arc::new(ProgressReporter::single(
                    task.file_name(),
                    task.file.size,
                    options.on_progress.clone(),
                ));
                upload_single_part(&*self.client, task, plan, &reporter).await
            }
            UploadPlan::MultiPart(plan) => {
                let reporter = Arc::new(ProgressReporter::chunked(
                    task.file_name(),
                    task.file.size,
                    plan.chunk_count as usize,
                    options.on_progress.clone(),
                ));
                upload_multi_part(
                    &*self.client,
                    task,
                    plan,
                    &reporter,
                    self.config.effective_chunk_concurrency(),
                    &route.multipart_complete_url(),
                )
                .await
                .map(|chunks| {
                    log::debug!("{}: {} parts acknowledged", task.file_name(), chunks.len());
                })
            }
        }
    }

    async fn await_completion(
        &self,
        task: &UploadTask,
        policy: &BackoffPolicy,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome> {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        let base = &task.descriptor.base;
        poll_for_completion(
            &*self.client,
            task.file_name(),
            &base.polling_url,
            &base.polling_jwt,
            policy,
            cancel,
        )
        .await
    }

    /// Best effort; a failed notice is logged and otherwise ignored
    async fn notify_failure(&self, route: &RouteActions, task: &UploadTask, err: &UploadError) {
        let notice = FailureNotification {
            file_key: task.key().clone(),
            upload_id: task.descriptor.upload_id().map(str::to_string),
            storage_provider_error: Some(err.to_string()),
            file_name: task.file_name().to_string(),
        };

        let body = match serde_json::to_value(&notice) {
            Ok(body) => body,
            Err(e) => {
                log::warn!("Could not encode failure notice for {}: {}", task.file_name(), e);
                return;
            }
        };

        match self.client.post_json(&route.failure_url(), &body).await {
            Ok(response) if response.is_success() => {
                log::debug!("Failure notice sent for {}", task.file_name());
            }
            Ok(response) => log::warn!(
                "Failure notice for {} rejected with HTTP {}",
                task.file_name(),
                response.status
            ),
            Err(e) => log::warn!("Failure notice for {} not delivered: {}", task.file_name(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::decode_descriptor;
    use crate::error::TransportStage;
    use serde_json::json;

    fn single(name: &str) -> PresignedDescriptor {
        decode_descriptor(&json!({
            "key": format!("key-{}", name),
            "fileName": name,
            "fileUrl": "https://cdn.example.com/f",
            "pollingJwt": "jwt",
            "pollingUrl": "https://api.example.com/poll",
            "contentDisposition": "inline",
            "customId": null,
            "fileType": "blob",
            "url": "https://bucket.example.com",
            "fields": {}
        }))
        .unwrap()
    }

    #[test]
    fn test_match_by_name() {
        let files = vec![
            UploadFile::from_bytes("b.txt", "b"),
            UploadFile::from_bytes("a.txt", "a"),
            UploadFile::from_bytes("a.txt", "aa"),
        ];
        let descriptors = vec![single("a.txt"), single("b.txt"), single("a.txt")];
        let tasks = match_descriptors(files, descriptors).unwrap();
        let names: Vec<&str> = tasks.iter().map(|t| t.descriptor.file_name()).collect();
        assert_eq!(names, vec!["b.txt", "a.txt", "a.txt"]);
    }

    #[test]
    fn test_missing_descriptor() {
        let files = vec![UploadFile::from_bytes("c.txt", "c")];
        let err = match_descriptors(files, vec![single("a.txt")]).unwrap_err();
        assert_eq!(err, UploadError::not_found("c.txt"));
    }

    #[test]
    fn test_batch_error_prefers_submission_order() {
        let outcomes: Vec<(usize, Result<()>)> = vec![
            (2, Err(UploadError::transport("c", TransportStage::SinglePart, Some(500), "x"))),
            (0, Err(UploadError::Cancelled)),
            (1, Err(UploadError::poll_timeout("b", 10))),
            (3, Ok(())),
        ];
        assert_eq!(batch_error(outcomes), Some(UploadError::poll_timeout("b", 10)));

        let cancelled: Vec<(usize, Result<()>)> = vec![(0, Err(UploadError::Cancelled)), (1, Ok(()))];
        assert_eq!(batch_error(cancelled), Some(UploadError::Cancelled));

        let fine: Vec<(usize, Result<()>)> = vec![(0, Ok(()))];
        assert_eq!(batch_error(fine), None);
    }
}
