use time::OffsetDateTime;

/// Hub-level metadata, queried on demand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubRuntimeInfo {
    pub path: String,
    pub created_at: OffsetDateTime,
    pub partition_ids: Vec<String>,
}

impl HubRuntimeInfo {
    pub fn partition_count(&self) -> usize {
        self.partition_ids.len()
    }
}

/// Snapshot of one partition's bookkeeping. Never cached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionRuntimeInfo {
    pub partition_id: String,
    pub beginning_sequence_number: i64,
    pub last_sequence_number: i64,
    /// Service-defined encoding, kept as text.
    pub last_enqueued_offset: String,
    pub last_enqueued_time_utc: OffsetDateTime,
}

/// A received event. Only `data` is printed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub partition_id: String,
    pub data: Vec<u8>,
    pub sequence_number: i64,
    pub offset: Option<i64>,
}
