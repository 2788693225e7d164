//! Route action URLs and the descriptor issuance request

use crate::error::{Result, UploadError};
use crate::transport::client::UploadClient;
use crate::types::UploadFile;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Action URLs of one upload route on the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteActions {
    server_url: Url,
    slug: String,
}

impl RouteActions {
    pub fn new(server_url: &str, slug: impl Into<String>) -> Result<Self> {
        let server_url = Url::parse(server_url).map_err(|e| {
            UploadError::config_error(format!("Invalid server URL {}: {}", server_url, e))
        })?;
        let slug = slug.into();
        if slug.trim().is_empty() {
            return Err(UploadError::invalid_parameter(
                "endpoint",
                "Endpoint slug must not be empty",
            ));
        }
        Ok(Self { server_url, slug })
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    fn action_url(&self, action: &str) -> String {
        let mut url = self.server_url.clone();
        url.query_pairs_mut()
            .append_pair("actionType", action)
            .append_pair("slug", &self.slug);
        url.to_string()
    }

    /// Where descriptors are requested
    pub fn upload_url(&self) -> String {
        self.action_url("upload")
    }

    /// Where the multipart completion notification goes
    pub fn multipart_complete_url(&self) -> String {
        self.action_url("multipart-complete")
    }

    /// Where failure notifications go
    pub fn failure_url(&self) -> String {
        self.action_url("failure")
    }
}

/// File metadata sent when asking for descriptors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRouteInfo {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub file_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
}

impl From<&UploadFile> for FileRouteInfo {
    fn from(file: &UploadFile) -> Self {
        Self {
            name: file.name.clone(),
            size: file.size,
            file_type: file.content_type.clone(),
            custom_id: file.custom_id.clone(),
        }
    }
}

/// Body of the descriptor issuance request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorRequest {
    pub files: Vec<FileRouteInfo>,
    pub input: Value,
}

impl DescriptorRequest {
    pub fn new(files: &[UploadFile], input: Option<&Value>) -> Self {
        Self {
            files: files.iter().map(FileRouteInfo::from).collect(),
            input: input.cloned().unwrap_or(Value::Null),
        }
    }
}

/// Ask the route for one presigned descriptor per file
///
/// Returns the raw descriptor objects; decoding is left to
/// [`decode_descriptors`](crate::descriptor::decode_descriptors).
pub async fn request_descriptors<C>(
    client: &C,
    route: &RouteActions,
    files: &[UploadFile],
    input: Option<&Value>,
) -> Result<Vec<Value>>
where
    C: UploadClient + ?Sized,
{
    let request = DescriptorRequest::new(files, input);
    log::info!(
        "Requesting {} descriptor(s) from route {}",
        request.files.len(),
        route.slug()
    );

    let response = client
        .post_json(&route.upload_url(), &serde_json::to_value(&request)?)
        .await?;
    if !response.is_success() {
        return Err(UploadError::protocol(format!(
            "descriptor request for {} failed with HTTP {}: {}",
            route.slug(),
            response.status,
            response.body.trim()
        )));
    }

    match response.json::<Value>()? {
        Value::Array(descriptors) => Ok(descriptors),
        other => Err(UploadError::protocol(format!(
            "descriptor response for {} is not an array: {}",
            route.slug(),
            other
        ))),
    }
}
