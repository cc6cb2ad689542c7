use anyhow::Result;
use std::fmt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::model::{Event, HubRuntimeInfo, PartitionRuntimeInfo};

/// Operations consumed from the event hub service.
#[async_trait::async_trait]
pub trait EventHub: Send + Sync {
    async fn runtime_information(&self) -> Result<HubRuntimeInfo>;

    async fn partition_information(&self, partition_id: &str) -> Result<PartitionRuntimeInfo>;

    /// Starts receiving on `partition_id`.
    ///
    /// Resolves once the receiver is connected. From then on every event is pushed to
    /// `sink` until `cancel` fires or the service ends the stream.
    async fn receive(
        &self,
        partition_id: &str,
        sink: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>>;

    async fn close(&self) -> Result<()>;
}

/// Human readable description of a hub and its partitions.
#[derive(Clone, Debug)]
pub struct HubSummary {
    /// Namespace host from the connection string's `Endpoint`.
    pub host: Option<String>,
    pub hub: HubRuntimeInfo,
    pub partitions: Vec<PartitionRuntimeInfo>,
}

/// Extracts `ns.servicebus.windows.net` from `Endpoint=sb://ns.servicebus.windows.net/;...`.
pub fn namespace_host(connection_string: &str) -> Option<String> {
    connection_string
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("endpoint"))
        .map(|(_, endpoint)| {
            let endpoint = endpoint.trim();
            let endpoint = endpoint.split_once("://").map_or(endpoint, |(_, rest)| rest);
            endpoint.trim_end_matches('/').to_string()
        })
        .filter(|host| !host.is_empty())
}

pub async fn describe(hub: &dyn EventHub, connection_string: &str) -> Result<HubSummary> {
    let info = hub.runtime_information().await?;
    let mut partitions = Vec::with_capacity(info.partition_count());
    for partition_id in &info.partition_ids {
        partitions.push(hub.partition_information(partition_id).await?);
    }
    Ok(HubSummary {
        host: namespace_host(connection_string),
        hub: info,
        partitions,
    })
}

impl fmt::Display for HubSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(host) = &self.host {
            writeln!(f, "Host: {}", host)?;
        }
        writeln!(f, "Path: {}", self.hub.path)?;
        writeln!(f, "Created at: {}", self.hub.created_at)?;
        writeln!(f, "Partition Count: {}", self.hub.partition_count())?;
        writeln!(f, "Partition IDs: {:?}", self.hub.partition_ids)?;
        for p in &self.partitions {
            writeln!(f, "PartitionID: {}", p.partition_id)?;
            writeln!(f, "BeginningSequenceNumber: {}", p.beginning_sequence_number)?;
            writeln!(f, "LastSequenceNumber: {}", p.last_sequence_number)?;
            writeln!(f, "LastEnqueuedOffset: {}", p.last_enqueued_offset)?;
            writeln!(f, "LastEnqueuedTimeUtc: {}", p.last_enqueued_time_utc)?;
        }
        Ok(())
    }
}
