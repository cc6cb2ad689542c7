use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::hub::EventHub;
use crate::model::Event;

/// Registers one receiver per partition, each pushing its events to `sink`.
///
/// Receivers keep running after this returns, until `cancel` fires. The first
/// registration error aborts the remaining partitions.
pub async fn listen(
    hub: &dyn EventHub,
    sink: &mpsc::Sender<Event>,
    cancel: &CancellationToken,
) -> Result<Vec<JoinHandle<()>>> {
    let info = hub.runtime_information().await?;
    info!("Found {} partitions: {:?}", info.partition_count(), info.partition_ids);

    let mut handles = Vec::with_capacity(info.partition_count());
    for partition_id in &info.partition_ids {
        info!("start receiving messages for partition {}", partition_id);
        let handle = hub
            .receive(partition_id, sink.clone(), cancel.child_token())
            .await?;
        handles.push(handle);
    }

    Ok(handles)
}
