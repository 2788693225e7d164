use crate::types::FileKey;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Fields shared by both descriptor shapes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorBase {
    pub key: FileKey,
    pub file_name: String,
    /// Public URL of the object once stored
    pub file_url: String,
    /// Bearer token for the polling endpoint
    pub polling_jwt: String,
    pub polling_url: String,
    pub content_disposition: String,
    #[serde(default)]
    pub custom_id: Option<String>,
    pub file_type: String,
}

/// One POST of the whole file under a signed policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinglePartPlan {
    pub url: String,
    pub fields: BTreeMap<String, String>,
}

/// Chunked upload, one presigned URL per part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiPartPlan {
    pub urls: Vec<String>,
    pub upload_id: String,
    pub chunk_size: u64,
    pub chunk_count: u64,
}

/// A contiguous byte range of a file uploaded as one part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    /// 1-based part number
    pub part_number: u32,
    pub offset: u64,
    pub length: u64,
}

impl ChunkRange {
    /// Position of this part in the plan's URL list
    pub fn index(&self) -> usize {
        (self.part_number - 1) as usize
    }
}

impl MultiPartPlan {
    /// Split a file of `file_size` bytes into `chunk_count` ranges of
    /// `chunk_size` bytes. The last range may be shorter.
    pub fn chunk_ranges(&self, file_size: u64) -> Vec<ChunkRange> {
        (0..self.chunk_count)
            .map(|i| {
                let offset = i * self.chunk_size;
                let length = self.chunk_size.min(file_size.saturating_sub(offset));
                ChunkRange {
                    part_number: (i + 1) as u32,
                    offset,
                    length,
                }
            })
            .collect()
    }
}

/// How the bytes of one file travel to storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UploadPlan {
    SinglePart(SinglePartPlan),
    MultiPart(MultiPartPlan),
}

/// A validated, server-issued upload descriptor for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresignedDescriptor {
    #[serde(flatten)]
    pub base: DescriptorBase,
    #[serde(flatten)]
    pub plan: UploadPlan,
}

impl PresignedDescriptor {
    pub fn file_name(&self) -> &str {
        &self.base.file_name
    }

    pub fn key(&self) -> &FileKey {
        &self.base.key
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self.plan, UploadPlan::MultiPart(_))
    }

    /// The multipart upload session id, if any
    pub fn upload_id(&self) -> Option<&str> {
        match &self.plan {
            UploadPlan::MultiPart(plan) => Some(&plan.upload_id),
            UploadPlan::SinglePart(_) => None,
        }
    }
}

impl<'de> Deserialize<'de> for PresignedDescriptor {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        super::validation::decode_descriptor(&value).map_err(serde::de::Error::custom)
    }
}
