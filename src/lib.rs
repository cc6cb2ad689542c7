//! Event Hub listener.
//!
//! Prints the payload of every event received on any partition of an Azure
//! Event Hub and, when asked to stop, appends each partition's sequence and
//! offset bookkeeping to a flat file before closing the connection.

pub mod app;
pub mod config;
pub mod eventhub;
pub mod hub;
pub mod listener;
pub mod model;
pub mod printer;
pub mod shutdown;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod testing;

pub use self::app::{launch, run, Phase};
pub use self::config::{ListenConfig, DEFAULT_CONFIG_PATH};
pub use self::eventhub::AzureEventHub;
pub use self::hub::{describe, namespace_host, EventHub, HubSummary};
pub use self::model::{Event, HubRuntimeInfo, PartitionRuntimeInfo};
pub use self::printer::EventPrinter;
pub use self::shutdown::Shutdown;
pub use self::snapshot::{OffsetRecord, OffsetSnapshotWriter};
