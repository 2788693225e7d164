//! Caller-facing upload entry points

use crate::config::UploaderConfig;
use crate::descriptor::{request_descriptors, RouteActions};
use crate::error::{Result, UploadError};
use crate::transport::{HttpClient, UploadClient};
use crate::types::UploadFile;
use crate::upload::engine::UploadEngine;
use crate::upload::types::{Endpoint, TypedUploadResult, UploadFileResult, UploadOptions};
use std::sync::Arc;

/// Uploads files to the routes of one server
///
/// # Example
///
/// ```no_run
/// use presigned_upload::{UploadFile, UploadOptions, Uploader, UploaderConfig};
///
/// # async fn run() -> presigned_upload::Result<()> {
/// let uploader = Uploader::new(UploaderConfig::new("https://example.com/api/upload"))?;
/// let files = vec![UploadFile::from_path("photo.png").await?];
/// let results = uploader
///     .upload_files("imageUploader", files, UploadOptions::new())
///     .await?;
/// println!("{}", results[0].url);
/// # Ok(())
/// # }
/// ```
pub struct Uploader<C: UploadClient + ?Sized = HttpClient> {
    engine: UploadEngine<C>,
}

impl<C: UploadClient + ?Sized> Clone for Uploader<C> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<C: UploadClient + ?Sized> std::fmt::Debug for Uploader<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field("engine", &self.engine)
            .finish()
    }
}

impl Uploader<HttpClient> {
    /// Create an uploader talking HTTP through `reqwest`
    pub fn new(config: UploaderConfig) -> Result<Self> {
        config.validate()?;
        let client = HttpClient::new(config.request_timeout())?;
        Ok(Self::with_client(config, Arc::new(client)))
    }
}

impl<C: UploadClient + ?Sized> Uploader<C> {
    /// Create an uploader over any [`UploadClient`]
    pub fn with_client(config: UploaderConfig, client: Arc<C>) -> Self {
        Self {
            engine: UploadEngine::new(client, config),
        }
    }

    pub fn config(&self) -> &UploaderConfig {
        self.engine.config()
    }

    pub fn engine(&self) -> &UploadEngine<C> {
        &self.engine
    }

    /// Request descriptors for `files` from `endpoint` and upload them
    pub async fn upload_files(
        &self,
        endpoint: &str,
        files: Vec<UploadFile>,
        options: UploadOptions,
    ) -> Result<Vec<UploadFileResult>> {
        if files.is_empty() {
            return Err(UploadError::invalid_parameter(
                "files",
                "At least one file is required",
            ));
        }

        let route = RouteActions::new(&self.config().server_url, endpoint)?;
        let client = self.engine.client();

        let descriptors = tokio::select! {
            biased;
            _ = options.cancellation.cancelled() => Err(UploadError::Cancelled),
            descriptors = request_descriptors(&**client, &route, &files, options.input.as_ref()) => descriptors,
        };
        let descriptors = descriptors.inspect_err(|e| {
            log::error!("Descriptor request to {} failed: {}", route.slug(), e);
        })?;

        self.engine.upload(&route, files, &descriptors, &options).await
    }

    /// Upload to a typed endpoint, decoding each server payload into
    /// `E::ServerData`
    pub async fn upload<E: Endpoint>(
        &self,
        files: Vec<UploadFile>,
        input: &E::Input,
        options: UploadOptions,
    ) -> Result<Vec<TypedUploadResult<E::ServerData>>> {
        let input = serde_json::to_value(input)
            .map_err(|e| UploadError::invalid_parameter("input", e.to_string()))?;

        self.upload_files(E::SLUG, files, options.input(input))
            .await?
            .into_iter()
            .map(|result| result.decode_server_data())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uploader_rejects_bad_config() {
        assert!(Uploader::new(UploaderConfig::new("nope")).is_err());

        let uploader = Uploader::new(UploaderConfig::new("https://example.com/api/upload")).unwrap();
        assert_eq!(uploader.config().server_url, "https://example.com/api/upload");
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let uploader = Uploader::new(UploaderConfig::new("https://example.com")).unwrap();
        let err = uploader
            .upload_files("route", Vec::new(), UploadOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidParameter { .. }));
    }
}
