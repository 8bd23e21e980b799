use async_trait::async_trait;
use axum::extract::ws::{Message as WsFrame, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use parley_store::MailboxStore;
use parley_types::Message;

use crate::delivery::{self, DeliveryConfig, MessageSink, SinkError};

/// Outbound half of a subscription socket. Each pending message goes out as
/// one JSON text frame.
struct WsSink {
    sender: SplitSink<WebSocket, WsFrame>,
}

#[async_trait]
impl MessageSink for WsSink {
    async fn send(&mut self, message: &Message) -> Result<(), SinkError> {
        let text = serde_json::to_string(message).map_err(|e| SinkError(e.to_string()))?;
        self.sender
            .send(WsFrame::Text(text.into()))
            .await
            .map_err(|e| SinkError(e.to_string()))
    }
}

/// Run one subscription: a delivery loop bound to `login` and this socket.
///
/// The receive half only watches for the peer going away; any close or
/// socket error cancels the delivery loop, which then ends with `Ok`.
/// Undelivered messages stay in the store either way, so a resubscribe
/// picks up where this connection left off.
pub async fn handle_subscription(
    socket: WebSocket,
    store: MailboxStore,
    cfg: DeliveryConfig,
    login: String,
) {
    info!("{} subscribed", login);

    let (sender, mut receiver) = socket.split();
    let cancel = CancellationToken::new();

    let peer_gone = cancel.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = receiver.next().await {
            if matches!(frame, WsFrame::Close(_)) {
                break;
            }
        }
        peer_gone.cancel();
    });

    let mut sink = WsSink { sender };
    let result = delivery::run(&store, &login, &mut sink, &cfg, &cancel).await;
    recv_task.abort();

    match result {
        Ok(()) => info!("{} unsubscribed", login),
        Err(e) => warn!("{} subscription aborted: {}", login, e),
    }
    let _ = sink.sender.send(WsFrame::Close(None)).await;
}
