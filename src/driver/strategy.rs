//! How a consumer worker obtains its messages
//!
//! The strategy is chosen once from the policy and the resolved destination,
//! before the first message, and never changes during the run. Every variant
//! ends when the worker has handled `num_messages` messages.

use futures::future::BoxFuture;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::batcher::{BatchCursor, ListenerCounter};
use super::handler::MessageHandler;
use super::policy::DeliveryPolicy;
use crate::client::{
    Browser, ClientError, Consumer, Destination, Message, MessageListener, ReceiveTimeout,
};
use crate::error::Result;

/// Interval at which a push-listener worker checks its counter; also the
/// browse pass interval when the receive timeout gives none
pub const LISTENER_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumptionStrategy {
    /// Receive with no timeout
    BlockingPoll,

    /// Receive with a bounded wait; an empty result is retried
    TimedPoll(ReceiveTimeout),

    /// Messages are pushed to a callback on a transport-owned task
    PushListener,

    /// Repeated non-destructive passes over a queue
    ///
    /// A message still on the queue is handled again on the next pass.
    BrowseOnly { pass_interval: Duration },
}

impl ConsumptionStrategy {
    /// Pick the strategy for a worker
    ///
    /// Browsing only applies to queues; on a topic the browser flag is ignored.
    pub fn select(policy: &DeliveryPolicy, destination: &Destination) -> Self {
        if policy.use_queue_browser && destination.is_queue() {
            let pass_interval = policy
                .receive_timeout
                .as_duration()
                .filter(|interval| !interval.is_zero())
                .unwrap_or(LISTENER_POLL_INTERVAL);
            return ConsumptionStrategy::BrowseOnly { pass_interval };
        }
        if policy.use_async_listener {
            return ConsumptionStrategy::PushListener;
        }
        match policy.receive_timeout {
            ReceiveTimeout::Indefinite => ConsumptionStrategy::BlockingPoll,
            timeout => ConsumptionStrategy::TimedPoll(timeout),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConsumptionStrategy::BlockingPoll => "blocking-poll",
            ConsumptionStrategy::TimedPoll(_) => "timed-poll",
            ConsumptionStrategy::PushListener => "push-listener",
            ConsumptionStrategy::BrowseOnly { .. } => "browse-only",
        }
    }

    pub fn uses_browser(&self) -> bool {
        matches!(self, ConsumptionStrategy::BrowseOnly { .. })
    }
}

/// Receive loop shared by the blocking and timed variants
pub async fn run_poll(
    consumer: &dyn Consumer,
    timeout: ReceiveTimeout,
    handler: &MessageHandler,
    num_messages: u64,
    cursor: &mut BatchCursor,
) -> Result<()> {
    while cursor.handled() < num_messages {
        match consumer.receive(timeout).await? {
            Some(message) => {
                let count = cursor.advance();
                handler.handle(message, count).await;
            }
            None => {
                debug!(
                    handled = cursor.handled(),
                    "Waiting to receive {num_messages} messages..."
                );
                tokio::task::yield_now().await;
            }
        }
    }
    Ok(())
}

/// Register a callback and wait until it has seen `num_messages`
///
/// Ends with a transport error if delivery stops before the target.
pub async fn run_listener(
    consumer: &dyn Consumer,
    handler: &MessageHandler,
    num_messages: u64,
    cursor: &mut BatchCursor,
) -> Result<()> {
    let counter = ListenerCounter::new();
    consumer.set_listener(listener(handler.clone(), counter.clone())).await?;

    while !counter.reached(num_messages) {
        if !consumer.is_listening() && !counter.reached(num_messages) {
            cursor.absorb(&counter);
            return Err(ClientError::Closed("message listener").into());
        }
        tokio::time::sleep(LISTENER_POLL_INTERVAL).await;
    }
    cursor.absorb(&counter);
    Ok(())
}

fn listener(handler: MessageHandler, counter: ListenerCounter) -> MessageListener {
    Arc::new(move |message: Message| -> BoxFuture<'static, ()> {
        let handler = handler.clone();
        let counter = counter.clone();
        Box::pin(async move {
            let count = counter.advance();
            handler.handle(message, count).await;
        })
    })
}

/// Browse the queue pass after pass until `num_messages` have been handled
pub async fn run_browse(
    browser: &dyn Browser,
    pass_interval: Duration,
    handler: &MessageHandler,
    num_messages: u64,
    cursor: &mut BatchCursor,
) -> Result<()> {
    while cursor.handled() < num_messages {
        let mut messages = browser.enumerate().await?;
        while let Some(message) = messages.next().await {
            let count = cursor.advance();
            handler.handle(message, count).await;
            if count >= num_messages {
                return Ok(());
            }
        }
        debug!(handled = cursor.handled(), "browse pass complete");
        tokio::time::sleep(pass_interval).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{
        AckMode, ConsumerOptions, DeliveryMode, DestinationKind, MemoryBroker, MessagingClient,
        OutgoingMessage,
    };
    use crate::error::Error;

    fn queue() -> Destination {
        Destination::new("Q", DestinationKind::Queue)
    }

    fn topic() -> Destination {
        Destination::new("T", DestinationKind::Topic)
    }

    #[test]
    fn test_select_timed_poll_by_default() {
        let policy = DeliveryPolicy::queue("Q");
        assert_eq!(
            ConsumptionStrategy::select(&policy, &queue()),
            ConsumptionStrategy::TimedPoll(ReceiveTimeout::Millis(5000))
        );
    }

    #[test]
    fn test_select_blocking_poll_for_negative_timeout() {
        let policy = DeliveryPolicy::queue("Q").with_receive_timeout_ms(-1);
        assert_eq!(
            ConsumptionStrategy::select(&policy, &queue()),
            ConsumptionStrategy::BlockingPoll
        );
    }

    #[test]
    fn test_select_no_wait_is_timed_poll() {
        let policy = DeliveryPolicy::queue("Q").with_receive_timeout_ms(0);
        assert_eq!(
            ConsumptionStrategy::select(&policy, &queue()),
            ConsumptionStrategy::TimedPoll(ReceiveTimeout::NoWait)
        );
    }

    #[test]
    fn test_select_push_listener() {
        let policy = DeliveryPolicy::topic("T").with_async_listener(true);
        assert_eq!(
            ConsumptionStrategy::select(&policy, &topic()),
            ConsumptionStrategy::PushListener
        );
    }

    #[test]
    fn test_browser_wins_on_queue() {
        let policy = DeliveryPolicy::queue("Q")
            .with_queue_browser(true)
            .with_async_listener(true)
            .with_receive_timeout_ms(250);
        assert_eq!(
            ConsumptionStrategy::select(&policy, &queue()),
            ConsumptionStrategy::BrowseOnly {
                pass_interval: Duration::from_millis(250)
            }
        );
    }

    #[test]
    fn test_browser_ignored_on_topic() {
        let policy = DeliveryPolicy::topic("T").with_queue_browser(true);
        let strategy = ConsumptionStrategy::select(&policy, &topic());
        assert!(!strategy.uses_browser());
        assert_eq!(strategy.name(), "timed-poll");
    }

    #[test]
    fn test_browse_with_no_wait_uses_poll_interval() {
        let policy = DeliveryPolicy::queue("Q")
            .with_queue_browser(true)
            .with_receive_timeout_ms(0);
        assert_eq!(
            ConsumptionStrategy::select(&policy, &queue()),
            ConsumptionStrategy::BrowseOnly {
                pass_interval: LISTENER_POLL_INTERVAL
            }
        );
    }

    #[test]
    fn test_browse_with_indefinite_timeout_uses_poll_interval() {
        let policy = DeliveryPolicy::queue("Q")
            .with_queue_browser(true)
            .with_receive_timeout_ms(-1);
        assert_eq!(
            ConsumptionStrategy::select(&policy, &queue()),
            ConsumptionStrategy::BrowseOnly {
                pass_interval: LISTENER_POLL_INTERVAL
            }
        );
    }

    #[tokio::test]
    async fn test_listener_stops_when_session_closes_underneath() {
        let broker = MemoryBroker::new();
        let connection = broker.connect("connectionFactory").await.unwrap();
        connection.start().await.unwrap();
        let session = connection.open_session(false, AckMode::Auto).await.unwrap();
        let consumer = session
            .create_consumer(&queue(), ConsumerOptions::new())
            .await
            .unwrap();
        let producer = session
            .create_producer(&queue(), DeliveryMode::NonPersistent)
            .await
            .unwrap();
        producer.send(OutgoingMessage::text("only one")).await.unwrap();

        let policy = Arc::new(DeliveryPolicy::queue("Q"));
        let handler = MessageHandler::new(Arc::clone(&session), policy, 0);
        let mut cursor = BatchCursor::new();

        let closer = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            session.close().await.unwrap();
        };
        let listening = tokio::time::timeout(
            Duration::from_secs(5),
            run_listener(consumer.as_ref(), &handler, 3, &mut cursor),
        );
        let (outcome, ()) = tokio::join!(listening, closer);

        let err = outcome.expect("listener loop should end").unwrap_err();
        assert!(matches!(err, Error::Transport(ClientError::Closed(_))));
        assert_eq!(cursor.handled(), 1);
        assert!(!consumer.is_listening());
    }
}
