use anyhow::Result;
use std::fmt;
use std::future::Future;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::ListenConfig;
use crate::hub::{self, EventHub};
use crate::listener::listen;
use crate::printer::EventPrinter;
use crate::shutdown::Shutdown;
use crate::snapshot::OffsetSnapshotWriter;

const EVENT_BUFFER: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Listening,
    ShuttingDown,
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Starting => "starting",
            Phase::Listening => "listening",
            Phase::ShuttingDown => "shutting down",
            Phase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Listens on every partition until `shutdown` fires, then records offsets and closes the hub.
///
/// A failed snapshot is returned as an error and the hub is left open. A failed
/// close is only logged.
pub async fn run<W>(
    hub: &dyn EventHub,
    config: &ListenConfig,
    printer: EventPrinter<W>,
    shutdown: &Shutdown,
) -> Result<Phase>
where
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let mut phase = Phase::Starting;
    debug!("Phase: {}", phase);

    match hub::describe(hub, &config.conn_event_hub).await {
        Ok(summary) => debug!("Event hub details:\n{}", summary),
        Err(e) => debug!("Could not describe event hub: {:#}", e),
    }

    let (sender, receiver) = mpsc::channel(EVENT_BUFFER);
    let printing = printer.spawn(receiver);
    let cancel = shutdown.token().child_token();

    let receivers = match listen(hub, &sender, &cancel).await {
        Ok(receivers) => receivers,
        Err(e) => {
            error!("Failed to start listening: {:#}", e);
            Vec::new()
        }
    };
    drop(sender);

    phase = Phase::Listening;
    info!("Phase: {} on {} partitions", phase, receivers.len());

    shutdown.wait().await;
    phase = Phase::ShuttingDown;
    info!(".....stopping.....");
    debug!("Phase: {}", phase);

    let writer = OffsetSnapshotWriter::new(&config.log_partition);
    let snapshot = writer.write_snapshot(hub).await;
    cancel.cancel();
    snapshot?;

    if let Err(e) = hub.close().await {
        error!("Failed to close event hub: {:#}", e);
    }

    for receiver in receivers {
        if let Err(e) = receiver.await {
            error!("Receiver task error: {}", e);
        }
    }
    match printing.await {
        Ok(Ok(printed)) => debug!("Printed {} events", printed),
        Ok(Err(e)) => error!("Printer stopped: {:#}", e),
        Err(e) => error!("Printer task error: {}", e),
    }

    phase = Phase::Closed;
    info!("Phase: {}", phase);
    Ok(phase)
}

/// Loads the configuration at `config_path`, connects through `connect` and runs until shutdown.
///
/// `connect` is never called when the configuration cannot be loaded.
pub async fn launch<H, F, Fut, W>(
    config_path: impl AsRef<Path>,
    connect: F,
    printer: EventPrinter<W>,
    shutdown: &Shutdown,
) -> Result<Phase>
where
    H: EventHub,
    F: FnOnce(&ListenConfig) -> Fut,
    Fut: Future<Output = Result<H>>,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let config = ListenConfig::load(config_path).await?;
    let hub = connect(&config).await?;
    run(&hub, &config, printer, shutdown).await
}
