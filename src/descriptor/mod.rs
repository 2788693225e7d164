//! Presigned upload descriptors
//!
//! The server hands out one descriptor per file. A descriptor is either a
//! single-part POST policy or a multipart plan with one URL per chunk. This
//! module decodes and validates them and requests them from the server.

pub mod request;
pub mod types;
pub mod validation;

pub use request::{request_descriptors, DescriptorRequest, FileRouteInfo, RouteActions};
pub use types::{
    ChunkRange, DescriptorBase, MultiPartPlan, PresignedDescriptor, SinglePartPlan, UploadPlan,
};
pub use validation::{decode_descriptor, decode_descriptors, expected_chunk_count};
