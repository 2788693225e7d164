//! The polling loop

use crate::error::{Result, UploadError};
use crate::poller::backoff::BackoffPolicy;
use crate::poller::types::{CompletionState, PollResponse};
use crate::transport::client::UploadClient;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Result of a successful poll
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    /// Payload returned by the server's processing callback
    pub server_data: Value,
    pub attempts: u32,
    pub elapsed: Duration,
}

async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(UploadError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Poll `polling_url` until the server reports `done`
///
/// "still waiting" answers are retried on the policy's schedule. A non-2xx
/// status, an undecodable body or an unknown status is a protocol error and
/// ends polling at once. When the next wait would cross `max_elapsed`, the
/// poll fails with a timeout without issuing another request.
pub async fn poll_for_completion<C>(
    client: &C,
    file_name: &str,
    polling_url: &str,
    polling_jwt: &str,
    policy: &BackoffPolicy,
    cancel: &CancellationToken,
) -> Result<PollOutcome>
where
    C: UploadClient + ?Sized,
{
    let started = Instant::now();
    sleep_or_cancel(policy.initial_delay, cancel).await?;

    let mut schedule = policy.schedule();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            response = client.get_json(polling_url, polling_jwt) => response?,
        };

        if !response.is_success() {
            return Err(UploadError::protocol(format!(
                "polling {} failed with HTTP {}: {}",
                file_name,
                response.status,
                response.body.trim()
            )));
        }

        match CompletionState::from(response.json::<PollResponse>()?) {
            CompletionState::Done(server_data) => {
                let elapsed = started.elapsed();
                log::debug!(
                    "{}: server processing done after {} polls ({:?})",
                    file_name,
                    attempts,
                    elapsed
                );
                return Ok(PollOutcome {
                    server_data,
                    attempts,
                    elapsed,
                });
            }
            CompletionState::InProgress => {}
        }

        let delay = schedule.next().unwrap_or(policy.spaced_interval);
        let elapsed = started.elapsed();
        if elapsed + delay > policy.max_elapsed {
            log::warn!(
                "{}: giving up after {} polls in {:?}",
                file_name,
                attempts,
                elapsed
            );
            return Err(UploadError::poll_timeout(file_name, elapsed.as_millis() as u64));
        }

        log::trace!("{}: still waiting, next poll in {:?}", file_name, delay);
        sleep_or_cancel(delay, cancel).await?;
    }
}
