//! Inbound message broker: fans in adapter receivers and hands every message
//! to the [`Dispatcher`].
//!
//! # Ordering
//!
//! Each message is dispatched on its own task. Messages for the same
//! conversation still run one at a time because the dispatcher holds the
//! conversation lock for the whole pipeline; messages for different
//! conversations run concurrently.

use std::sync::Arc;

use dicebot_core::InboundMessage;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use crate::dispatcher::Dispatcher;

// ---------------------------------------------------------------------------
// Fan-in forwarder (one per adapter)
// ---------------------------------------------------------------------------

/// Forward messages from an adapter's receiver to the central channel.
///
/// Runs until the adapter drops its sender or the central channel closes.
pub async fn forward_inbound(
    adapter: String,
    mut rx: mpsc::Receiver<InboundMessage>,
    tx: mpsc::Sender<InboundMessage>,
) {
    while let Some(msg) = rx.recv().await {
        if tx.send(msg).await.is_err() {
            warn!(adapter = %adapter, "Central inbound channel closed, stopping forwarder");
            break;
        }
    }
    info!(adapter = %adapter, "Adapter inbound forwarder ended");
}

// ---------------------------------------------------------------------------
// Main router task
// ---------------------------------------------------------------------------

/// Run the inbound router until the channel closes or shutdown is signalled.
///
/// The select is `biased` towards shutdown, so messages still buffered when
/// the signal arrives are dropped.
pub async fn run_inbound_router(
    dispatcher: Arc<Dispatcher>,
    mut inbound_rx: mpsc::Receiver<InboundMessage>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            result = shutdown_rx.recv() => {
                // Signal, lag and a dropped sender all mean stop.
                let _ = result;
                info!("Inbound router received shutdown signal");
                break;
            }
            msg = inbound_rx.recv() => {
                if let Some(msg) = msg {
                    let dispatcher = Arc::clone(&dispatcher);
                    tokio::spawn(async move {
                        dispatcher.dispatch(msg).await;
                    });
                } else {
                    info!("Inbound channel closed, router exiting");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use dicebot_config::Config;
    use dicebot_extensions::CapabilityRegistry;
    use dicebot_test::{BOT_ID, RecordingReplySurface, echo_capability, private_message};

    fn dispatcher(surface: &RecordingReplySurface) -> Arc<Dispatcher> {
        let mut config = Config::default();
        config.dispatch.bot_id = BOT_ID.to_string();
        config.scripting.enabled = false;
        let mut registry = CapabilityRegistry::new();
        registry
            .register(echo_capability("echo", "echo").auto_activate(true).build())
            .unwrap();
        Arc::new(Dispatcher::new(&config, registry, Arc::new(surface.clone())).unwrap())
    }

    #[tokio::test]
    async fn test_router_dispatches_until_channel_closes() {
        let surface = RecordingReplySurface::new();
        let (tx, rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let router = tokio::spawn(run_inbound_router(dispatcher(&surface), rx, shutdown_rx));

        tx.send(private_message("QQ:2", ".echo hi")).await.unwrap();
        drop(tx);
        router.await.unwrap();

        for _ in 0..50 {
            if !surface.replies().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(surface.replies(), vec!["echo:echo hi".to_string()]);
    }

    #[tokio::test]
    async fn test_router_stops_on_shutdown() {
        let surface = RecordingReplySurface::new();
        let (_tx, rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let router = tokio::spawn(run_inbound_router(dispatcher(&surface), rx, shutdown_rx));
        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), router).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_forwarder_ends_when_adapter_drops() {
        let (adapter_tx, adapter_rx) = mpsc::channel(4);
        let (central_tx, mut central_rx) = mpsc::channel(4);
        let forwarder = tokio::spawn(forward_inbound("console".into(), adapter_rx, central_tx));
        adapter_tx.send(private_message("QQ:2", "hi")).await.unwrap();
        drop(adapter_tx);
        forwarder.await.unwrap();
        assert_eq!(central_rx.recv().await.unwrap().text, "hi");
    }
}
