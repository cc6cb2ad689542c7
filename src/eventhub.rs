use anyhow::{anyhow, Context, Result};
use azeventhubs::consumer::{
    EventHubConsumerClient, EventHubConsumerClientOptions, EventPosition, ReadEventOptions,
};
use azeventhubs::{BasicRetryPolicy, EventHubProperties, PartitionProperties};
use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::hub::EventHub;
use crate::model::{Event, HubRuntimeInfo, PartitionRuntimeInfo};

type ConsumerClient = EventHubConsumerClient<BasicRetryPolicy>;

/// [`EventHub`] backed by the Azure Event Hubs AMQP client.
///
/// A single client answers the runtime information queries. Each partition
/// receiver opens a client of its own because a partition stream holds a
/// mutable borrow of the client that produced it.
pub struct AzureEventHub {
    connection_string: String,
    consumer_group: String,
    options: EventHubConsumerClientOptions,
    client: Mutex<Option<ConsumerClient>>,
}

impl AzureEventHub {
    /// Connects using a connection string that carries its own `EntityPath`.
    pub async fn from_connection_string(
        connection_string: impl Into<String>,
        consumer_group: impl Into<String>,
    ) -> Result<Self> {
        let connection_string = connection_string.into();
        let consumer_group = consumer_group.into();
        let options = EventHubConsumerClientOptions::default();

        info!("Attempting to connect to Event Hub, consumer group {}", consumer_group);
        let client = open_client(&connection_string, &consumer_group, options.clone())
            .await
            .context("Failed to create event hub client")?;
        info!("Connected to Event Hub");

        Ok(Self {
            connection_string,
            consumer_group,
            options,
            client: Mutex::new(Some(client)),
        })
    }
}

async fn open_client(
    connection_string: &str,
    consumer_group: &str,
    options: EventHubConsumerClientOptions,
) -> Result<ConsumerClient> {
    let client: ConsumerClient = EventHubConsumerClient::new_from_connection_string(
        consumer_group.to_string(),
        connection_string.to_string(),
        None::<String>,
        options,
    )
    .await?;
    Ok(client)
}

impl From<&EventHubProperties> for HubRuntimeInfo {
    fn from(properties: &EventHubProperties) -> Self {
        HubRuntimeInfo {
            path: properties.name().to_string(),
            created_at: *properties.created_on(),
            partition_ids: properties.partition_ids().to_vec(),
        }
    }
}

impl From<&PartitionProperties> for PartitionRuntimeInfo {
    fn from(properties: &PartitionProperties) -> Self {
        PartitionRuntimeInfo {
            partition_id: properties.id().to_string(),
            beginning_sequence_number: properties.beginning_sequence_number(),
            last_sequence_number: properties.last_enqueued_sequence_number(),
            last_enqueued_offset: properties.last_enqueued_offset().to_string(),
            last_enqueued_time_utc: *properties.last_enqueued_time(),
        }
    }
}

#[async_trait::async_trait]
impl EventHub for AzureEventHub {
    async fn runtime_information(&self) -> Result<HubRuntimeInfo> {
        let mut locked_client = self.client.lock().await;
        let client = locked_client
            .as_mut()
            .ok_or_else(|| anyhow!("Client not connected"))?;

        let properties = client
            .get_event_hub_properties()
            .await
            .context("Failed to get runtime information")?;

        Ok(HubRuntimeInfo::from(&properties))
    }

    async fn partition_information(&self, partition_id: &str) -> Result<PartitionRuntimeInfo> {
        let mut locked_client = self.client.lock().await;
        let client = locked_client
            .as_mut()
            .ok_or_else(|| anyhow!("Client not connected"))?;

        let properties = client
            .get_partition_properties(partition_id)
            .await
            .with_context(|| format!("Failed to get partition information for {}", partition_id))?;

        Ok(PartitionRuntimeInfo::from(&properties))
    }

    async fn receive(
        &self,
        partition_id: &str,
        sink: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>> {
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();
        let partition_id = partition_id.to_string();
        let connection_string = self.connection_string.clone();
        let consumer_group = self.consumer_group.clone();
        let options = self.options.clone();

        let task_partition_id = partition_id.clone();
        let handle = tokio::spawn(async move {
            let partition_id = task_partition_id;
            let mut client = match open_client(&connection_string, &consumer_group, options).await {
                Ok(client) => client,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            let mut stream = match client
                .read_events_from_partition(
                    &partition_id,
                    EventPosition::earliest(),
                    ReadEventOptions::default(),
                )
                .await
            {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Receiver for partition {} cancelled", partition_id);
                        break;
                    }
                    next = stream.next() => match next {
                        Some(Ok(event_data)) => {
                            let data = match event_data.body() {
                                Ok(body) => body.to_vec(),
                                Err(e) => {
                                    error!("Failed to get event body from partition {}: {}", partition_id, e);
                                    continue;
                                }
                            };
                            let event = Event {
                                partition_id: partition_id.clone(),
                                data,
                                sequence_number: event_data.sequence_number(),
                                offset: event_data.offset(),
                            };
                            if sink.send(event).await.is_err() {
                                debug!("Event sink closed, stopping partition {}", partition_id);
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            error!("Error receiving event from partition {}: {}", partition_id, e);
                        }
                        None => {
                            info!("Stream ended for partition {}", partition_id);
                            break;
                        }
                    }
                }
            }

            if let Err(e) = stream.close().await {
                warn!("Failed to close stream for partition {}: {}", partition_id, e);
            }
            if let Err(e) = client.close().await {
                warn!("Failed to close client for partition {}: {}", partition_id, e);
            }
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(e)) => {
                Err(e.context(format!("Failed to start receiving on partition {}", partition_id)))
            }
            Err(_) => Err(anyhow!(
                "Receiver for partition {} stopped before connecting",
                partition_id
            )),
        }
    }

    async fn close(&self) -> Result<()> {
        let client = self
            .client
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow!("Client not connected"))?;
        client.close().await.context("Failed to close event hub client")?;
        info!("Closed Event Hub connection");
        Ok(())
    }
}
