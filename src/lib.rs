pub mod callback;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod poller;
pub mod transport;
pub mod types;
pub mod upload;

pub use callback::{ProgressCallback, ProgressReporter, UploadBeginCallback, UploadProgress};

pub use config::{LogLevel, PollConfig, UploaderConfig};

pub use descriptor::{
    decode_descriptor, decode_descriptors, request_descriptors, MultiPartPlan,
    PresignedDescriptor, RouteActions, SinglePartPlan, UploadPlan,
};

pub use error::{Result, TransportStage, UploadError};

pub use poller::{poll_for_completion, BackoffPolicy, CompletionState, PollOutcome};

pub use transport::{
    upload_multi_part, upload_single_part, ChunkResult, HttpClient, HttpResponse, UploadClient,
};

pub use types::{FileKey, UploadFile};

pub use upload::{
    Endpoint, TypedUploadResult, UploadEngine, UploadFileResult, UploadOptions, UploadTask,
    Uploader,
};
