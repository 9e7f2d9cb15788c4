use std::fmt;

use super::policy::{DeliveryPolicy, DestinationSpec};
use crate::client::{ConsumerOptions, Destination, MessagingClient, Session, Subscription};
use crate::error::Result;

/// Destination resolved for one worker, with the way a consumer attaches to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationHandle {
    pub destination: Destination,
    pub subscription: Subscription,
}

impl DestinationHandle {
    /// Resolve the policy's destination spec against a worker's session
    ///
    /// Durable consumers of a topic are wrapped in a named durable
    /// subscription; `durable` is ignored for queues.
    pub async fn resolve(
        client: &dyn MessagingClient,
        session: &dyn Session,
        policy: &DeliveryPolicy,
    ) -> Result<Self> {
        let destination = match &policy.destination {
            DestinationSpec::Lookup { name } => client.lookup(name).await?,
            DestinationSpec::Named { name, kind } => {
                session.resolve_destination(name, *kind).await?
            }
            DestinationSpec::Temporary { kind } => session.create_temporary(*kind).await?,
        };

        let subscription = if policy.durable && destination.is_topic() {
            Subscription::Durable {
                name: policy.subscription_name.clone(),
            }
        } else {
            Subscription::Transient
        };

        Ok(Self {
            destination,
            subscription,
        })
    }

    pub fn consumer_options(&self, policy: &DeliveryPolicy) -> ConsumerOptions {
        ConsumerOptions {
            selector: policy.selector.clone(),
            subscription: self.subscription.clone(),
        }
    }
}

impl fmt::Display for DestinationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subscription {
            Subscription::Transient => write!(f, "{}", self.destination),
            Subscription::Durable { name } => {
                write!(f, "{} (durable subscription '{}')", self.destination, name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{AckMode, Connection, DestinationKind, MemoryBroker};
    use std::sync::Arc;

    async fn open(broker: &MemoryBroker) -> (Box<dyn Connection>, Arc<dyn Session>) {
        let connection = broker.connect("connectionFactory").await.unwrap();
        let session = connection.open_session(false, AckMode::Auto).await.unwrap();
        (connection, session)
    }

    #[tokio::test]
    async fn test_named_queue() {
        let broker = MemoryBroker::new();
        let (_connection, session) = open(&broker).await;
        let policy = DeliveryPolicy::queue("ORDERS").with_durable(true);

        let handle = DestinationHandle::resolve(&broker, session.as_ref(), &policy)
            .await
            .unwrap();
        assert_eq!(handle.destination, Destination::queue("ORDERS"));
        assert_eq!(handle.subscription, Subscription::Transient);
    }

    #[tokio::test]
    async fn test_durable_topic_wraps_subscription() {
        let broker = MemoryBroker::new();
        let (_connection, session) = open(&broker).await;
        let policy = DeliveryPolicy::topic("PRICES")
            .with_durable(true)
            .with_subscription_name("prices-sub")
            .with_selector("symbol = 'ACME'");

        let handle = DestinationHandle::resolve(&broker, session.as_ref(), &policy)
            .await
            .unwrap();
        let options = handle.consumer_options(&policy);
        assert_eq!(
            options.subscription,
            Subscription::Durable {
                name: "prices-sub".to_string()
            }
        );
        assert_eq!(options.selector.as_deref(), Some("symbol = 'ACME'"));
        assert!(handle.to_string().contains("prices-sub"));
    }

    #[tokio::test]
    async fn test_temporary_destination() {
        let broker = MemoryBroker::new();
        let (_connection, session) = open(&broker).await;
        let policy = DeliveryPolicy::new(DestinationSpec::Temporary {
            kind: DestinationKind::Queue,
        });

        let handle = DestinationHandle::resolve(&broker, session.as_ref(), &policy)
            .await
            .unwrap();
        assert!(handle.destination.temporary);
        assert!(handle.destination.is_queue());
    }

    #[tokio::test]
    async fn test_lookup_destination() {
        let broker = MemoryBroker::new();
        broker.bind("jms/prices", Destination::topic("PRICES"));
        let (_connection, session) = open(&broker).await;
        let policy = DeliveryPolicy::new(DestinationSpec::Lookup {
            name: "jms/prices".to_string(),
        });

        let handle = DestinationHandle::resolve(&broker, session.as_ref(), &policy)
            .await
            .unwrap();
        assert_eq!(handle.destination, Destination::topic("PRICES"));
    }

    #[tokio::test]
    async fn test_lookup_missing_destination_fails() {
        let broker = MemoryBroker::new();
        let (_connection, session) = open(&broker).await;
        let policy = DeliveryPolicy::new(DestinationSpec::Lookup {
            name: "jms/missing".to_string(),
        });

        assert!(DestinationHandle::resolve(&broker, session.as_ref(), &policy)
            .await
            .is_err());
    }
}
