//! Batch uploads
//!
//! This module pairs files with their presigned descriptors, drives the byte
//! transfer and completion polling for each, and aggregates the outcome.

pub mod engine;
pub mod operations;
pub mod types;

pub use engine::{match_descriptors, UploadEngine};
pub use operations::Uploader;
pub use types::{Endpoint, TypedUploadResult, UploadFileResult, UploadOptions, UploadTask};
