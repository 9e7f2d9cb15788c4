use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use super::batcher::{AckBatcher, BatchCursor};
use super::destination::DestinationHandle;
use super::handler::pace;
use super::policy::{DeliveryPolicy, PayloadShape};
use super::pool::{Worker, WorkerResult};
use super::session::{log_close, WorkerSession};
use crate::client::{MessagingClient, OutgoingMessage, Producer, Session};
use crate::error::Result;

/// Text carried by the `index`th message of a worker
pub fn message_text(index: u64, now: DateTime<Utc>) -> String {
    format!("Message {index} at {now}")
}

/// UTF-8 bytes of `text`, zero-padded up to `length`
///
/// Text longer than `length` is sent whole.
///
/// ```
/// use jms_tools::driver::padded_payload;
///
/// assert_eq!(padded_payload("abc", 5).as_ref(), b"abc\0\0");
/// assert_eq!(padded_payload("abcdef", 2).as_ref(), b"abcdef");
/// ```
pub fn padded_payload(text: &str, length: usize) -> Bytes {
    let mut buf = BytesMut::with_capacity(length.max(text.len()));
    buf.put_slice(text.as_bytes());
    if buf.len() < length {
        buf.put_bytes(0, length - buf.len());
    }
    buf.freeze()
}

/// Sends `num_messages` per worker according to a [`DeliveryPolicy`]
pub struct ProducerDriver {
    client: Arc<dyn MessagingClient>,
    policy: Arc<DeliveryPolicy>,
}

impl ProducerDriver {
    pub fn new(client: Arc<dyn MessagingClient>, policy: Arc<DeliveryPolicy>) -> Self {
        Self { client, policy }
    }

    fn payload(&self, index: u64) -> OutgoingMessage {
        let text = message_text(index, Utc::now());
        let message = match self.policy.payload {
            PayloadShape::Text => {
                info!("Sending message: {text}");
                OutgoingMessage::text(text)
            }
            PayloadShape::Bytes { length } => {
                debug!(length, "Sending bytes message: {text}");
                OutgoingMessage::bytes(padded_payload(&text, length))
            }
        };
        self.with_group(message)
    }

    fn with_group(&self, message: OutgoingMessage) -> OutgoingMessage {
        match &self.policy.message_group_id {
            Some(group_id) => message.with_group_id(group_id.clone()),
            None => message,
        }
    }

    async fn produce(&self, worker_id: usize, sent: &mut BatchCursor) -> Result<()> {
        let worker_session =
            WorkerSession::open(self.client.as_ref(), &self.policy, worker_id, false).await?;

        let outcome = self
            .produce_with(worker_session.session(), worker_id, sent)
            .await;
        worker_session.close().await;
        outcome
    }

    async fn produce_with(
        &self,
        session: &Arc<dyn Session>,
        worker_id: usize,
        sent: &mut BatchCursor,
    ) -> Result<()> {
        let handle =
            DestinationHandle::resolve(self.client.as_ref(), session.as_ref(), &self.policy)
                .await?;
        let producer = session
            .create_producer(&handle.destination, self.policy.delivery_mode())
            .await?;
        info!(
            worker = worker_id,
            destination = %handle.destination,
            delivery_mode = ?self.policy.delivery_mode(),
            "Sending {} messages",
            self.policy.num_messages
        );

        let outcome = self
            .send_all(session.as_ref(), producer.as_ref(), sent)
            .await;
        log_close(worker_id, "producer", producer.close().await);
        outcome
    }

    async fn send_all(
        &self,
        session: &dyn Session,
        producer: &dyn Producer,
        sent: &mut BatchCursor,
    ) -> Result<()> {
        let batcher = AckBatcher::new(self.policy.batch_size);
        let payload_count = if self.policy.final_control_message {
            self.policy.num_messages.saturating_sub(1)
        } else {
            self.policy.num_messages
        };

        for index in 0..payload_count {
            producer.send(self.payload(index)).await?;
            let count = sent.advance();
            pace(self.policy.per_message_sleep()).await;
            if self.policy.transacted && batcher.should_finalize(count) {
                session.commit().await?;
            }
        }

        if self.policy.final_control_message {
            producer.send(self.with_group(OutgoingMessage::control())).await?;
            sent.advance();
            info!("Sent final control message");
            if self.policy.transacted {
                session.commit().await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Worker for ProducerDriver {
    fn role(&self) -> &'static str {
        "producer"
    }

    async fn run(&self, worker_id: usize) -> WorkerResult {
        let start = Instant::now();
        let mut sent = BatchCursor::new();

        match self.produce(worker_id, &mut sent).await {
            Ok(()) => WorkerResult::completed(worker_id, sent.handled(), start.elapsed()),
            Err(err) => {
                error!(worker = worker_id, sent = sent.handled(), error = %err, "producer failed");
                WorkerResult::failed(worker_id, sent.handled(), err, start.elapsed())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_message_text() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(message_text(7, now), "Message 7 at 2024-03-01 12:00:00 UTC");
    }

    #[test]
    fn test_padded_payload_reaches_requested_length() {
        let payload = padded_payload("Message 0", 64);
        assert_eq!(payload.len(), 64);
        assert!(payload.starts_with(b"Message 0"));
        assert!(payload[9..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_padded_payload_never_truncates() {
        let payload = padded_payload("Message 10 at now", 4);
        assert_eq!(payload.as_ref(), b"Message 10 at now");
    }

    #[test]
    fn test_padded_payload_exact_length() {
        assert_eq!(padded_payload("abcd", 4).as_ref(), b"abcd");
    }
}
