use anyhow::{Context, Result};
use std::path::PathBuf;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::UtcOffset;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::hub::EventHub;
use crate::model::PartitionRuntimeInfo;

const SEPARATOR: char = '|';

const DATE_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const FRACTION: &[BorrowedFormatItem<'static>] = format_description!(".[subsecond digits:1+]");

/// One line of the offset log:
/// `partitionID|beginningSequenceNumber|lastSequenceNumber|lastEnqueuedOffset|lastEnqueuedTimeUtc`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OffsetRecord(pub PartitionRuntimeInfo);

impl OffsetRecord {
    /// Renders the record without its trailing newline.
    pub fn to_line(&self) -> Result<String> {
        let info = &self.0;
        Ok(format!(
            "{id}{sep}{begin}{sep}{last}{sep}{offset}{sep}{enqueued}",
            id = info.partition_id,
            begin = info.beginning_sequence_number,
            last = info.last_sequence_number,
            offset = info.last_enqueued_offset,
            enqueued = enqueued_time(info)?,
            sep = SEPARATOR,
        ))
    }
}

/// `2024-03-05 14:07:09.5 +0000 UTC`: fraction only when non-zero, trailing zeros trimmed.
fn enqueued_time(info: &PartitionRuntimeInfo) -> Result<String> {
    let context = || format!("Failed to format enqueued time for partition {}", info.partition_id);
    let utc = info
        .last_enqueued_time_utc
        .checked_to_offset(UtcOffset::UTC)
        .with_context(context)?;
    let mut rendered = utc.format(DATE_TIME).with_context(context)?;
    if utc.nanosecond() != 0 {
        rendered.push_str(&utc.format(FRACTION).with_context(context)?);
    }
    rendered.push_str(" +0000 UTC");
    Ok(rendered)
}

/// Appends the current partition bookkeeping to a flat file.
///
/// Records only ever accumulate: nothing is read back, deduplicated or
/// rolled back.
#[derive(Clone, Debug)]
pub struct OffsetSnapshotWriter {
    path: PathBuf,
}

impl OffsetSnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Writes one record per partition and returns how many were written.
    ///
    /// Stops at the first failure; lines already appended stay in the file.
    pub async fn write_snapshot(&self, hub: &dyn EventHub) -> Result<usize> {
        let info = hub.runtime_information().await?;

        let mut written = 0;
        for partition_id in &info.partition_ids {
            let partition = hub.partition_information(partition_id).await?;
            self.append(&OffsetRecord(partition)).await?;
            written += 1;
        }

        info!("Saved {} partition offsets to {}", written, self.path.display());
        Ok(written)
    }

    async fn append(&self, record: &OffsetRecord) -> Result<()> {
        let line = record.to_line()? + "\n";
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}
