use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::batcher::AckBatcher;
use super::policy::DeliveryPolicy;
use crate::client::{Message, MessageBody, Session};
use crate::error::{Error, Result};

/// Per-message handling step shared by every consumption strategy
///
/// Cheap to clone; a push-delivery callback owns its own copy.
#[derive(Clone)]
pub struct MessageHandler {
    session: Arc<dyn Session>,
    policy: Arc<DeliveryPolicy>,
    batcher: AckBatcher,
    worker_id: usize,
}

impl MessageHandler {
    pub fn new(session: Arc<dyn Session>, policy: Arc<DeliveryPolicy>, worker_id: usize) -> Self {
        let batcher = AckBatcher::new(policy.batch_size);
        Self {
            session,
            policy,
            batcher,
            worker_id,
        }
    }

    /// Handle a message whose arrival brought the worker's count to `count`
    ///
    /// Failures are logged; the caller moves on to the next message.
    pub async fn handle(&self, message: Message, count: u64) {
        self.log_receipt(&message, count);
        pace(self.policy.per_message_sleep()).await;

        if let Err(err) = self.finalize(&message, count).await {
            warn!(worker = self.worker_id, handled = count, error = %err, "error handling message");
        }
    }

    fn log_receipt(&self, message: &Message, count: u64) {
        match &message.body {
            MessageBody::Text(text) => {
                info!(worker = self.worker_id, handled = count, "Received text message: {text}")
            }
            _ => info!(worker = self.worker_id, handled = count, "Received message: {message}"),
        }
    }

    /// Acknowledge and/or commit when `count` closes a batch
    async fn finalize(&self, message: &Message, count: u64) -> Result<()> {
        if !self.batcher.should_finalize(count) {
            return Ok(());
        }

        let handling = |source| Error::Handling {
            message_id: message.id,
            source,
        };
        if self.policy.ack_mode.is_client() {
            self.session.acknowledge(message).await.map_err(handling)?;
        }
        if self.policy.transacted {
            self.session.commit().await.map_err(handling)?;
        }
        Ok(())
    }
}

/// Pacing delay after each message
///
/// Tokio timers cannot be interrupted, so the delay always runs to completion.
pub(crate) async fn pace(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
