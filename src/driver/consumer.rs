use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use super::batcher::BatchCursor;
use super::destination::DestinationHandle;
use super::handler::MessageHandler;
use super::policy::DeliveryPolicy;
use super::pool::{Worker, WorkerResult};
use super::session::{log_close, WorkerSession};
use super::strategy::{self, ConsumptionStrategy};
use crate::client::{MessagingClient, ReceiveTimeout, Session};
use crate::error::Result;

/// Consumes `num_messages` per worker according to a [`DeliveryPolicy`]
pub struct ConsumerDriver {
    client: Arc<dyn MessagingClient>,
    policy: Arc<DeliveryPolicy>,
}

impl ConsumerDriver {
    pub fn new(client: Arc<dyn MessagingClient>, policy: Arc<DeliveryPolicy>) -> Self {
        Self { client, policy }
    }

    async fn consume(&self, worker_id: usize, cursor: &mut BatchCursor) -> Result<()> {
        let worker_session =
            WorkerSession::open(self.client.as_ref(), &self.policy, worker_id, true).await?;

        let outcome = self
            .consume_with(worker_session.session(), worker_id, cursor)
            .await;
        worker_session.close().await;
        outcome
    }

    async fn consume_with(
        &self,
        session: &Arc<dyn Session>,
        worker_id: usize,
        cursor: &mut BatchCursor,
    ) -> Result<()> {
        let handle =
            DestinationHandle::resolve(self.client.as_ref(), session.as_ref(), &self.policy)
                .await?;
        let chosen = ConsumptionStrategy::select(&self.policy, &handle.destination);
        info!(
            worker = worker_id,
            destination = %handle,
            strategy = chosen.name(),
            "Consuming {} messages",
            self.policy.num_messages
        );

        let handler = MessageHandler::new(Arc::clone(session), Arc::clone(&self.policy), worker_id);
        let num_messages = self.policy.num_messages;

        match chosen {
            ConsumptionStrategy::BrowseOnly { pass_interval } => {
                let browser = session
                    .create_browser(&handle.destination, self.policy.selector.as_deref())
                    .await?;
                let outcome = strategy::run_browse(
                    browser.as_ref(),
                    pass_interval,
                    &handler,
                    num_messages,
                    cursor,
                )
                .await;
                log_close(worker_id, "browser", browser.close().await);
                outcome
            }
            ConsumptionStrategy::PushListener => {
                let consumer = session
                    .create_consumer(&handle.destination, handle.consumer_options(&self.policy))
                    .await?;
                let outcome =
                    strategy::run_listener(consumer.as_ref(), &handler, num_messages, cursor).await;
                log_close(worker_id, "consumer", consumer.close().await);
                outcome
            }
            ConsumptionStrategy::BlockingPoll | ConsumptionStrategy::TimedPoll(_) => {
                let timeout = match chosen {
                    ConsumptionStrategy::TimedPoll(timeout) => timeout,
                    _ => ReceiveTimeout::Indefinite,
                };
                let consumer = session
                    .create_consumer(&handle.destination, handle.consumer_options(&self.policy))
                    .await?;
                let outcome =
                    strategy::run_poll(consumer.as_ref(), timeout, &handler, num_messages, cursor)
                        .await;
                log_close(worker_id, "consumer", consumer.close().await);
                outcome
            }
        }
    }
}

#[async_trait]
impl Worker for ConsumerDriver {
    fn role(&self) -> &'static str {
        "consumer"
    }

    async fn run(&self, worker_id: usize) -> WorkerResult {
        let start = Instant::now();
        let mut cursor = BatchCursor::new();

        match self.consume(worker_id, &mut cursor).await {
            Ok(()) => {
                info!(worker = worker_id, handled = cursor.handled(), "Closing connection");
                WorkerResult::completed(worker_id, cursor.handled(), start.elapsed())
            }
            Err(err) => {
                error!(worker = worker_id, handled = cursor.handled(), error = %err, "consumer failed");
                WorkerResult::failed(worker_id, cursor.handled(), err, start.elapsed())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{AckMode, DeliveryMode, Destination, MemoryBroker, OutgoingMessage};
    use crate::driver::DestinationSpec;

    async fn preload(broker: &MemoryBroker, queue: &str, count: usize) {
        let connection = broker.connect("connectionFactory").await.unwrap();
        let session = connection
            .open_session(false, AckMode::Auto)
            .await
            .unwrap();
        let producer = session
            .create_producer(&Destination::queue(queue), DeliveryMode::NonPersistent)
            .await
            .unwrap();
        for i in 0..count {
            producer.send(OutgoingMessage::text(format!("m{i}"))).await.unwrap();
        }
        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_consumes_requested_messages() {
        let broker = MemoryBroker::new();
        preload(&broker, "Q", 4).await;
        let policy = Arc::new(DeliveryPolicy::queue("Q").with_num_messages(3));

        let driver = ConsumerDriver::new(Arc::new(broker.clone()), policy);
        let result = driver.run(0).await;

        assert!(result.is_ok());
        assert_eq!(result.handled, 3);
        assert_eq!(broker.queue_depth("Q"), 1);
        assert_eq!(broker.stats().sessions_closed, 2);
    }

    #[tokio::test]
    async fn test_missing_lookup_fails_worker() {
        let broker = MemoryBroker::new();
        let policy = Arc::new(DeliveryPolicy::new(DestinationSpec::Lookup {
            name: "jms/missing".to_string(),
        }));

        let result = ConsumerDriver::new(Arc::new(broker.clone()), policy)
            .run(0)
            .await;
        assert!(!result.is_ok());
        assert_eq!(result.handled, 0);
        assert_eq!(broker.stats().sessions_closed, 1);
    }
}
