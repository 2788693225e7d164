//! Uploader configuration

use crate::error::{Result, UploadError};
use crate::poller::BackoffPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_FILE_CONCURRENCY: usize = 6;
pub const DEFAULT_CHUNK_CONCURRENCY: usize = 4;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Log level for the uploader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
            LogLevel::Off => write!(f, "off"),
        }
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Off => log::LevelFilter::Off,
        }
    }
}

/// Completion polling timings, all in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Wait before the first poll (default: 500)
    #[serde(rename = "initial-delay-ms", skip_serializing_if = "Option::is_none")]
    pub initial_delay_ms: Option<u64>,

    /// First retry wait (default: 10)
    #[serde(rename = "base-delay-ms", skip_serializing_if = "Option::is_none")]
    pub base_delay_ms: Option<u64>,

    /// Growth factor between retry waits (default: 4)
    #[serde(rename = "factor", skip_serializing_if = "Option::is_none")]
    pub factor: Option<u32>,

    /// Number of growing waits before switching to the spaced interval (default: 4)
    #[serde(rename = "growth-steps", skip_serializing_if = "Option::is_none")]
    pub growth_steps: Option<u32>,

    /// Constant wait after the growth steps (default: 1000)
    #[serde(rename = "spaced-interval-ms", skip_serializing_if = "Option::is_none")]
    pub spaced_interval_ms: Option<u64>,

    /// Ceiling on total polling time (default: 60000)
    #[serde(rename = "max-elapsed-ms", skip_serializing_if = "Option::is_none")]
    pub max_elapsed_ms: Option<u64>,
}

impl PollConfig {
    /// Resolve into a backoff policy, filling unset values with defaults
    pub fn policy(&self) -> BackoffPolicy {
        let defaults = BackoffPolicy::default();
        let millis = |value: Option<u64>, default: Duration| {
            value.map(Duration::from_millis).unwrap_or(default)
        };

        BackoffPolicy {
            initial_delay: millis(self.initial_delay_ms, defaults.initial_delay),
            base_delay: millis(self.base_delay_ms, defaults.base_delay),
            factor: self.factor.unwrap_or(defaults.factor),
            growth_steps: self.growth_steps.unwrap_or(defaults.growth_steps),
            spaced_interval: millis(self.spaced_interval_ms, defaults.spaced_interval),
            max_elapsed: millis(self.max_elapsed_ms, defaults.max_elapsed),
        }
    }
}

/// Configuration for an uploader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploaderConfig {
    /// Route handler URL; descriptor requests and notifications go here
    #[serde(rename = "server-url")]
    pub server_url: String,

    /// Files transferred or polled at once (default: 6)
    #[serde(rename = "file-concurrency", skip_serializing_if = "Option::is_none")]
    pub file_concurrency: Option<usize>,

    /// Parts of one multipart file in flight at once (default: 4)
    #[serde(rename = "chunk-concurrency", skip_serializing_if = "Option::is_none")]
    pub chunk_concurrency: Option<usize>,

    /// Per-request timeout in seconds (default: 300)
    #[serde(rename = "request-timeout-secs", skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Log level (default: info)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,

    #[serde(default)]
    pub poll: PollConfig,
}

impl UploaderConfig {
    /// Create a configuration for `server_url` with every other value unset
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            file_concurrency: None,
            chunk_concurrency: None,
            request_timeout_secs: None,
            log_level: None,
            poll: PollConfig::default(),
        }
    }

    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    pub fn file_concurrency(mut self, n: usize) -> Self {
        self.file_concurrency = Some(n);
        self
    }

    pub fn chunk_concurrency(mut self, n: usize) -> Self {
        self.chunk_concurrency = Some(n);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn effective_file_concurrency(&self) -> usize {
        self.file_concurrency.unwrap_or(DEFAULT_FILE_CONCURRENCY)
    }

    pub fn effective_chunk_concurrency(&self) -> usize {
        self.chunk_concurrency.unwrap_or(DEFAULT_CHUNK_CONCURRENCY)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn effective_log_level(&self) -> LogLevel {
        self.log_level.unwrap_or_default()
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        self.poll.policy()
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(UploadError::invalid_parameter(
                "server-url",
                "Server URL must not be empty",
            ));
        }

        if reqwest::Url::parse(&self.server_url).is_err() {
            return Err(UploadError::invalid_parameter(
                "server-url",
                format!("Not a valid URL: {}", self.server_url),
            ));
        }

        if self.file_concurrency == Some(0) {
            return Err(UploadError::invalid_parameter(
                "file-concurrency",
                "File concurrency must be greater than 0",
            ));
        }

        if self.chunk_concurrency == Some(0) {
            return Err(UploadError::invalid_parameter(
                "chunk-concurrency",
                "Chunk concurrency must be greater than 0",
            ));
        }

        if self.request_timeout_secs == Some(0) {
            return Err(UploadError::invalid_parameter(
                "request-timeout-secs",
                "Timeout must be greater than 0",
            ));
        }

        let policy = self.backoff_policy();
        if policy.factor == 0 {
            return Err(UploadError::invalid_parameter(
                "poll.factor",
                "Backoff factor must be greater than 0",
            ));
        }
        if policy.base_delay.is_zero() {
            return Err(UploadError::invalid_parameter(
                "poll.base-delay-ms",
                "Base delay must be greater than 0",
            ));
        }
        if policy.spaced_interval.is_zero() {
            return Err(UploadError::invalid_parameter(
                "poll.spaced-interval-ms",
                "Spaced interval must be greater than 0",
            ));
        }
        if policy.max_elapsed.is_zero() {
            return Err(UploadError::invalid_parameter(
                "poll.max-elapsed-ms",
                "Polling ceiling must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Convert the configuration to a JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| UploadError::config_error(format!("Failed to serialize config: {}", e)))
    }

    /// Create a configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| UploadError::config_error(format!("Invalid config: {}", e)))
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| UploadError::io(path.display().to_string(), e.to_string()))?;
        Self::from_json(&contents)
    }
}
