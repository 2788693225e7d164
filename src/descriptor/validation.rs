//! Descriptor decoding
//!
//! Raw JSON from the issuance endpoint is checked against the two known
//! shapes. Anything else is a protocol error; nothing here is retried.

use crate::descriptor::types::{
    DescriptorBase, MultiPartPlan, PresignedDescriptor, SinglePartPlan, UploadPlan,
};
use crate::error::{Result, UploadError};
use serde::Deserialize;
use serde_json::Value;

/// Number of parts needed for `file_size` bytes in chunks of `chunk_size`
pub fn expected_chunk_count(file_size: u64, chunk_size: u64) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    file_size.div_ceil(chunk_size)
}

fn describe(value: &Value) -> String {
    value
        .get("fileName")
        .and_then(Value::as_str)
        .map(|name| format!("descriptor for {}", name))
        .unwrap_or_else(|| "descriptor".to_string())
}

/// Decode one descriptor object
pub fn decode_descriptor(value: &Value) -> Result<PresignedDescriptor> {
    let Some(object) = value.as_object() else {
        return Err(UploadError::protocol("descriptor is not a JSON object"));
    };
    let what = describe(value);

    let base = DescriptorBase::deserialize(value)
        .map_err(|e| UploadError::protocol(format!("{}: {}", what, e)))?;

    let plan = if object.contains_key("urls") || object.contains_key("uploadId") {
        let plan = MultiPartPlan::deserialize(value)
            .map_err(|e| UploadError::protocol(format!("{} (multipart): {}", what, e)))?;

        if plan.chunk_size == 0 {
            return Err(UploadError::protocol(format!(
                "{}: chunkSize must be greater than 0",
                what
            )));
        }
        if plan.urls.len() as u64 != plan.chunk_count {
            return Err(UploadError::protocol(format!(
                "{}: {} part URLs for chunkCount {}",
                what,
                plan.urls.len(),
                plan.chunk_count
            )));
        }
        UploadPlan::MultiPart(plan)
    } else if object.contains_key("url") && object.contains_key("fields") {
        let plan = SinglePartPlan::deserialize(value)
            .map_err(|e| UploadError::protocol(format!("{} (single-part): {}", what, e)))?;
        UploadPlan::SinglePart(plan)
    } else {
        return Err(UploadError::protocol(format!(
            "{}: unrecognized shape, expected `url` + `fields` or `urls` + `uploadId`",
            what
        )));
    };

    Ok(PresignedDescriptor { base, plan })
}

/// Decode the issuance response. One bad descriptor fails the whole list.
pub fn decode_descriptors(values: &[Value]) -> Result<Vec<PresignedDescriptor>> {
    values.iter().map(decode_descriptor).collect()
}

impl PresignedDescriptor {
    /// Check the descriptor against the size of the file it was matched to
    pub fn validate_for_size(&self, file_size: u64) -> Result<()> {
        if let UploadPlan::MultiPart(plan) = &self.plan {
            let expected = expected_chunk_count(file_size, plan.chunk_size);
            if plan.chunk_count != expected {
                return Err(UploadError::protocol(format!(
                    "descriptor for {}: chunkCount {} does not match {} parts for {} bytes in {}-byte chunks",
                    self.base.file_name, plan.chunk_count, expected, file_size, plan.chunk_size
                )));
            }
        }
        Ok(())
    }
}
