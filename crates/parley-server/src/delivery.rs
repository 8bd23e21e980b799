use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use parley_store::{MailboxStore, StoreError};
use parley_types::Message;

/// The outbound subscription stream rejected a write.
#[derive(Debug, Error)]
#[error("subscriber stream rejected a write: {0}")]
pub struct SinkError(pub String);

/// Outbound half of one subscription. Implemented by the WebSocket
/// connection in production and by plain collectors in tests.
#[async_trait]
pub trait MessageSink: Send {
    async fn send(&mut self, message: &Message) -> Result<(), SinkError>;
}

/// Pacing knobs for one subscription. Explicit configuration, not hidden
/// constants: `poll_interval` bounds delivery latency, `send_delay` paces
/// writes inside a batch.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub poll_interval: Duration,
    pub send_delay: Duration,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("mailbox store failed during delivery: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Send(#[from] SinkError),
}

/// Drain `login`'s mailbox onto `sink`, indefinitely.
///
/// Each poll lists the pending messages and walks them in store scan order:
/// wait `send_delay`, send, then delete. The delete happens only after a
/// successful send, and a failed delete leaves the message in place, so a
/// crash anywhere in between redelivers on the next poll. At-least-once,
/// duplicates over drops.
///
/// Terminates with `Ok(())` when `cancel` fires (checked at every
/// suspension point), with `DeliveryError::Send` when the sink rejects a
/// write (remaining messages stay pending), or with `DeliveryError::Store`
/// when a poll fails.
pub async fn run<S: MessageSink>(
    store: &MailboxStore,
    login: &str,
    sink: &mut S,
    cfg: &DeliveryConfig,
    cancel: &CancellationToken,
) -> Result<(), DeliveryError> {
    loop {
        let batch = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            pending = store.messages(login) => pending?,
        };
        if !batch.is_empty() {
            debug!("{}: {} pending message(s)", login, batch.len());
        }

        for message in &batch {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(cfg.send_delay) => {}
            }
            sink.send(message).await?;
            if let Err(e) = store.delete_message(message).await {
                // Already sent; the undeleted copy goes out again next poll.
                warn!("{}: delete after send failed, message will be redelivered: {}", login, e);
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(cfg.poll_interval) => {}
        }
    }
}
