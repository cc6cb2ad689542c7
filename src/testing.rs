use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};
use time::macros::datetime;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::hub::EventHub;
use crate::model::{Event, HubRuntimeInfo, PartitionRuntimeInfo};

#[derive(Default)]
struct State {
    payloads: HashMap<String, Vec<Vec<u8>>>,
    late_payloads: HashMap<String, Vec<Vec<u8>>>,
    receivers: HashMap<String, (mpsc::WeakSender<Event>, CancellationToken)>,
    failing_partition_info: HashSet<String>,
    failing_receive: HashSet<String>,
    failing_runtime_info: bool,
    failing_close: bool,
    registrations: Vec<String>,
    closes: usize,
}

/// In-memory hub. Receivers replay their scripted payloads, then idle until cancelled.
pub struct FakeHub {
    partition_ids: Vec<String>,
    state: Mutex<State>,
}

impl FakeHub {
    pub fn with_partitions(ids: &[&str]) -> Self {
        Self {
            partition_ids: ids.iter().map(|id| id.to_string()).collect(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn script(&self, partition_id: &str, payloads: &[&str]) {
        self.state.lock().unwrap().payloads.insert(
            partition_id.to_string(),
            payloads.iter().map(|p| p.as_bytes().to_vec()).collect(),
        );
    }

    /// Payloads delivered when the partition's information is next queried,
    /// provided its receiver has not been cancelled yet.
    pub fn script_late(&self, partition_id: &str, payloads: &[&str]) {
        self.state.lock().unwrap().late_payloads.insert(
            partition_id.to_string(),
            payloads.iter().map(|p| p.as_bytes().to_vec()).collect(),
        );
    }

    pub fn fail_partition_info(&self, partition_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.failing_partition_info.insert(partition_id.to_string());
    }

    pub fn fail_receive(&self, partition_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.failing_receive.insert(partition_id.to_string());
    }

    pub fn fail_runtime_info(&self) {
        self.state.lock().unwrap().failing_runtime_info = true;
    }

    pub fn fail_close(&self) {
        self.state.lock().unwrap().failing_close = true;
    }

    pub fn registrations(&self) -> Vec<String> {
        self.state.lock().unwrap().registrations.clone()
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    pub fn partition_info(partition_id: &str) -> PartitionRuntimeInfo {
        let n: i64 = partition_id.parse().unwrap_or(0);
        PartitionRuntimeInfo {
            partition_id: partition_id.to_string(),
            beginning_sequence_number: 10 + n,
            last_sequence_number: 42 + n,
            last_enqueued_offset: (1024 + n).to_string(),
            last_enqueued_time_utc: datetime!(2024-03-05 14:07:09 UTC),
        }
    }
}

#[async_trait::async_trait]
impl EventHub for FakeHub {
    async fn runtime_information(&self) -> Result<HubRuntimeInfo> {
        if self.state.lock().unwrap().failing_runtime_info {
            return Err(anyhow!("runtime information unavailable"));
        }
        Ok(HubRuntimeInfo {
            path: "fake-hub".to_string(),
            created_at: datetime!(2024-01-01 00:00:00 UTC),
            partition_ids: self.partition_ids.clone(),
        })
    }

    async fn partition_information(&self, partition_id: &str) -> Result<PartitionRuntimeInfo> {
        let mut state = self.state.lock().unwrap();
        if state.failing_partition_info.contains(partition_id) {
            return Err(anyhow!("partition {} unavailable", partition_id));
        }

        let receiver = state.receivers.get(partition_id).cloned();
        if let Some((sink, cancel)) = receiver {
            if let (Some(sink), false) = (sink.upgrade(), cancel.is_cancelled()) {
                for (i, data) in state
                    .late_payloads
                    .remove(partition_id)
                    .unwrap_or_default()
                    .into_iter()
                    .enumerate()
                {
                    let _ = sink.try_send(Event {
                        partition_id: partition_id.to_string(),
                        data,
                        sequence_number: 1000 + i as i64,
                        offset: None,
                    });
                }
            }
        }
        Ok(Self::partition_info(partition_id))
    }

    async fn receive(
        &self,
        partition_id: &str,
        sink: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>> {
        let payloads = {
            let mut state = self.state.lock().unwrap();
            if state.failing_receive.contains(partition_id) {
                return Err(anyhow!("cannot receive on partition {}", partition_id));
            }
            state.registrations.push(partition_id.to_string());
            state
                .receivers
                .insert(partition_id.to_string(), (sink.downgrade(), cancel.clone()));
            state.payloads.get(partition_id).cloned().unwrap_or_default()
        };

        let partition_id = partition_id.to_string();
        Ok(tokio::spawn(async move {
            for (i, data) in payloads.into_iter().enumerate() {
                let event = Event {
                    partition_id: partition_id.clone(),
                    data,
                    sequence_number: i as i64,
                    offset: Some(i as i64),
                };
                if sink.send(event).await.is_err() {
                    return;
                }
            }
            cancel.cancelled().await;
        }))
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_close {
            return Err(anyhow!("close failed"));
        }
        state.closes += 1;
        Ok(())
    }
}

/// `AsyncWrite` target whose contents can be inspected after the writer moved into a task.
#[derive(Clone, Default)]
pub struct SharedBuffer(std::sync::Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
