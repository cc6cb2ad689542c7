use anyhow::Result;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use eventhub_listen::{launch, AzureEventHub, EventPrinter, ListenConfig, Shutdown, DEFAULT_CONFIG_PATH};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn start() -> Result<()> {
    let shutdown = Shutdown::new();
    shutdown.listen_for_signals();

    launch(
        DEFAULT_CONFIG_PATH,
        |config: &ListenConfig| {
            AzureEventHub::from_connection_string(
                config.conn_event_hub.clone(),
                config.consumer_group.clone(),
            )
        },
        EventPrinter::stdout(),
        &shutdown,
    )
    .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    match start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
