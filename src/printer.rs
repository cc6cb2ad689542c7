use anyhow::{Context, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::model::Event;

/// Writes every received payload to `writer`, one event per line.
pub struct EventPrinter<W> {
    writer: W,
}

impl EventPrinter<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> EventPrinter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes `events` on a dedicated task until every sender is dropped.
    ///
    /// The task yields the number of events printed.
    pub fn spawn(self, mut events: mpsc::Receiver<Event>) -> JoinHandle<Result<u64>> {
        let mut writer = self.writer;
        tokio::spawn(async move {
            let mut printed = 0u64;
            while let Some(event) = events.recv().await {
                let context =
                    || format!("Failed to print event from partition {}", event.partition_id);
                writer.write_all(&event.data).await.with_context(context)?;
                writer.write_all(b"\n").await.with_context(context)?;
                writer.flush().await.with_context(context)?;
                printed += 1;
            }
            debug!("Event channel closed after {} events", printed);
            Ok(printed)
        })
    }
}
