//! Watch and dump commands - follow a server's document.

use std::sync::Arc;

use treesync::{
    events::EventBus,
    sync::{Client, transports::HttpTransport},
};

use crate::cli::{ConnectArgs, DumpArgs, WatchArgs};
use crate::output::{format_event, print_document};

/// Register a session against the server named in `args`.
pub async fn connect(
    args: &ConnectArgs,
    bus: Arc<EventBus>,
) -> Result<Client, Box<dyn std::error::Error>> {
    let transport = Arc::new(HttpTransport::new(&args.server)?);
    let client = Client::connect_with_bus(transport, args.client_config(), bus).await?;
    Ok(client)
}

/// Print every event until interrupted
pub async fn run(args: &WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let bus = Arc::new(EventBus::new());
    let format = args.format;
    match &args.path {
        Some(path) => {
            for topic in ["add", "remove", "content", "load"] {
                bus.subscribe(path.clone(), topic.parse()?, move |event| {
                    println!("{}", format_event(event, format));
                });
            }
        }
        None => {
            bus.observe(move |event| println!("{}", format_event(event, format)));
        }
    }

    let client = connect(&args.connect, bus).await?;
    tracing::info!(server = %args.connect.server, "watching");

    client
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}

/// Poll once and print the document
pub async fn dump(args: &DumpArgs) -> Result<(), Box<dyn std::error::Error>> {
    let client = connect(&args.connect, Arc::new(EventBus::new())).await?;
    let status = client.poll_once().await?;
    tracing::debug!(?status, "polled");

    let document = client.with_session(|s| s.snapshot());
    print_document(&document, args.format);
    Ok(())
}
