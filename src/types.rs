//! File handles and storage key types

use crate::error::{Result, UploadError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Content type used when the caller does not supply one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Storage key assigned to a file by the presigned-descriptor issuer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileKey(String);

impl FileKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key and returns the inner String
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for FileKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for FileKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<FileKey> for String {
    fn from(key: FileKey) -> Self {
        key.0
    }
}

/// Where the bytes of an [`UploadFile`] live
#[derive(Debug, Clone)]
pub enum FileContent {
    /// Content already held in memory
    Memory(Bytes),
    /// Content read lazily from disk
    Path(PathBuf),
}

/// A local file to upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// File name, used to match the file with its presigned descriptor
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// MIME type sent with chunk uploads
    pub content_type: String,
    /// Caller-chosen identifier echoed back in the result
    pub custom_id: Option<String>,
    pub content: FileContent,
}

impl UploadFile {
    /// Create a file from in-memory bytes
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            custom_id: None,
            content: FileContent::Memory(data),
        }
    }

    /// Create a file backed by a path on disk
    ///
    /// The name is the final path component and the size is taken from the
    /// file's metadata.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| UploadError::io(path.display().to_string(), e.to_string()))?;

        if !metadata.is_file() {
            return Err(UploadError::invalid_parameter(
                "path",
                format!("Not a regular file: {}", path.display()),
            ));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                UploadError::invalid_parameter(
                    "path",
                    format!("Path has no valid file name: {}", path.display()),
                )
            })?
            .to_string();

        Ok(Self {
            name,
            size: metadata.len(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            custom_id: None,
            content: FileContent::Path(path.to_path_buf()),
        })
    }

    pub fn with_custom_id(mut self, custom_id: impl Into<String>) -> Self {
        self.custom_id = Some(custom_id.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Get a human-readable size string
    pub fn size_string(&self) -> String {
        bytesize::ByteSize::b(self.size).to_string()
    }

    /// Read the whole file
    pub async fn read_all(&self) -> Result<Bytes> {
        self.read_range(0, self.size).await
    }

    /// Read `length` bytes starting at `offset`
    pub async fn read_range(&self, offset: u64, length: u64) -> Result<Bytes> {
        let end = offset.checked_add(length).filter(|end| *end <= self.size);
        let Some(end) = end else {
            return Err(UploadError::invalid_parameter(
                "range",
                format!(
                    "Range {}+{} is outside {} ({} bytes)",
                    offset, length, self.name, self.size
                ),
            ));
        };

        match &self.content {
            FileContent::Memory(data) => {
                if end > data.len() as u64 {
                    return Err(UploadError::io(
                        self.name.clone(),
                        "in-memory content is shorter than the declared size",
                    ));
                }
                Ok(data.slice(offset as usize..end as usize))
            }
            FileContent::Path(path) => {
                let io_err = |e: std::io::Error| UploadError::io(path.display().to_string(), e.to_string());

                let mut file = tokio::fs::File::open(path).await.map_err(io_err)?;
                file.seek(SeekFrom::Start(offset)).await.map_err(io_err)?;

                let mut buffer = vec![0u8; length as usize];
                file.read_exact(&mut buffer).await.map_err(io_err)?;
                Ok(Bytes::from(buffer))
            }
        }
    }
}
