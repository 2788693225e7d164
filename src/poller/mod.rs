//! Completion polling
//!
//! After the bytes are stored the server runs its own processing callback.
//! The poller asks the polling endpoint until that callback has finished,
//! backing off between attempts and giving up after a fixed ceiling.

pub mod backoff;
pub mod operations;
pub mod types;

pub use backoff::{BackoffPolicy, BackoffSchedule};
pub use operations::{poll_for_completion, PollOutcome};
pub use types::{CompletionState, PollResponse};
