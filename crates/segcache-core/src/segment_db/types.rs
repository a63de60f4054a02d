//! Types used by the segment database.

/// Stable identifier of one logical remote resource.
pub type ResourceId = String;

/// File name for the bytes of `resource_id` stored at `start_offset`.
///
/// The format is `<uniqueID>_<startOffset>` and must not change: existing
/// cache directories are looked up by it.
pub fn storage_key(resource_id: &str, start_offset: u64) -> String {
    format!("{}_{}", resource_id, start_offset)
}

/// A contiguous cached byte range `[start_offset, start_offset + length)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub resource_id: ResourceId,
    pub start_offset: u64,
    pub length: u64,
    pub storage_key: String,
    /// Unix milliseconds of the last save (logical clock; strictly increasing per store).
    pub updated_at: i64,
}

impl Segment {
    /// New segment with its storage key derived from resource and offset.
    pub fn new(resource_id: impl Into<ResourceId>, start_offset: u64, length: u64) -> Self {
        let resource_id = resource_id.into();
        let storage_key = storage_key(&resource_id, start_offset);
        Self {
            resource_id,
            start_offset,
            length,
            storage_key,
            updated_at: 0,
        }
    }

    /// Exclusive end offset.
    pub fn end_offset(&self) -> u64 {
        self.start_offset.saturating_add(self.length)
    }
}
