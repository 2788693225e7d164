//! Progress and lifecycle callbacks
//!
//! Transports report raw byte counts per request; the [`ProgressReporter`]
//! folds them into a per-file cumulative count and forwards it to the caller's
//! callback. Delivered counts for one file never go backwards, even when the
//! chunks of a multipart upload finish out of order.

use std::sync::{Arc, Mutex, MutexGuard};

/// Progress of one file, as delivered to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct UploadProgress {
    pub file_name: String,
    /// Cumulative bytes sent for this file
    pub bytes_uploaded: u64,
    pub total_bytes: u64,
    /// Bytes added since the previous event for this file
    pub delta: u64,
    /// Fraction in `0.0..=1.0`
    pub percentage: f64,
    pub parts_completed: Option<usize>,
    pub total_parts: Option<usize>,
}

impl UploadProgress {
    pub fn new(file_name: impl Into<String>, bytes_uploaded: u64, total_bytes: u64) -> Self {
        let percentage = if total_bytes > 0 {
            bytes_uploaded as f64 / total_bytes as f64
        } else {
            1.0
        };

        Self {
            file_name: file_name.into(),
            bytes_uploaded,
            total_bytes,
            delta: 0,
            percentage: percentage.min(1.0),
            parts_completed: None,
            total_parts: None,
        }
    }
}

/// Caller callback receiving progress events. May be invoked concurrently for
/// different files.
pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Caller callback invoked with the file name right before its transfer starts
pub type UploadBeginCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Raw byte counter handed to a single HTTP request. Receives the cumulative
/// number of body bytes sent by that request.
pub type ByteProgress = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Debug, Default)]
struct ReporterState {
    part_bytes: Vec<u64>,
    parts_done: Vec<bool>,
    reported: u64,
    emitted: bool,
}

/// Per-file progress aggregation
pub struct ProgressReporter {
    file_name: String,
    total_bytes: u64,
    chunked: bool,
    callback: Option<ProgressCallback>,
    state: Mutex<ReporterState>,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("file_name", &self.file_name)
            .field("total_bytes", &self.total_bytes)
            .field("chunked", &self.chunked)
            .field("callback", &self.callback.is_some())
            .field("reported", &self.reported_bytes())
            .finish()
    }
}

impl ProgressReporter {
    /// Reporter for a transfer made of a single request
    pub fn single(
        file_name: impl Into<String>,
        total_bytes: u64,
        callback: Option<ProgressCallback>,
    ) -> Self {
        Self::with_parts(file_name.into(), total_bytes, 1, false, callback)
    }

    /// Reporter for a transfer split into `parts` independent requests
    pub fn chunked(
        file_name: impl Into<String>,
        total_bytes: u64,
        parts: usize,
        callback: Option<ProgressCallback>,
    ) -> Self {
        Self::with_parts(file_name.into(), total_bytes, parts.max(1), true, callback)
    }

    fn with_parts(
        file_name: String,
        total_bytes: u64,
        parts: usize,
        chunked: bool,
        callback: Option<ProgressCallback>,
    ) -> Self {
        Self {
            file_name,
            total_bytes,
            chunked,
            callback,
            state: Mutex::new(ReporterState {
                part_bytes: vec![0; parts],
                parts_done: vec![false; parts],
                ..ReporterState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ReporterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record that the request for `part_index` has sent `sent` bytes so far.
    pub fn record(&self, part_index: usize, sent: u64) {
        let mut state = self.lock();
        if let Some(bytes) = state.part_bytes.get_mut(part_index) {
            *bytes = (*bytes).max(sent);
        }
        self.emit(&mut state, false);
    }

    /// Mark a part as fully sent
    pub fn complete_part(&self, part_index: usize, part_len: u64) {
        let mut state = self.lock();
        if let Some(bytes) = state.part_bytes.get_mut(part_index) {
            *bytes = (*bytes).max(part_len);
        }
        if let Some(done) = state.parts_done.get_mut(part_index) {
            *done = true;
        }
        self.emit(&mut state, false);
    }

    /// Report the whole file as sent. Always delivers a final event unless one
    /// at `total_bytes` has already gone out.
    pub fn finish(&self) {
        let mut state = self.lock();
        for done in state.parts_done.iter_mut() {
            *done = true;
        }
        self.emit(&mut state, true);
    }

    /// Bytes delivered to the callback so far
    pub fn reported_bytes(&self) -> u64 {
        self.lock().reported
    }

    fn emit(&self, state: &mut ReporterState, force_final: bool) {
        let sum: u64 = state.part_bytes.iter().sum();
        let cumulative = sum.min(self.total_bytes);

        let advanced = cumulative > state.reported;
        let needs_final = force_final && (!state.emitted || state.reported < self.total_bytes);
        if !advanced && !needs_final {
            return;
        }

        let cumulative = if force_final { self.total_bytes } else { cumulative };
        let delta = cumulative - state.reported;
        state.reported = cumulative;
        state.emitted = true;

        if let Some(callback) = &self.callback {
            let mut progress = UploadProgress::new(self.file_name.clone(), cumulative, self.total_bytes);
            progress.delta = delta;
            if self.chunked {
                progress.parts_completed = Some(state.parts_done.iter().filter(|d| **d).count());
                progress.total_parts = Some(state.parts_done.len());
            }
            // Called under the lock so events for one file stay ordered.
            callback(progress);
        }
    }

    /// Byte counter for the request uploading `part_index`
    pub fn part_counter(self: &Arc<Self>, part_index: usize) -> ByteProgress {
        let reporter = Arc::clone(self);
        Arc::new(move |sent| reporter.record(part_index, sent))
    }
}
