//! In-process broker implementing the messaging client capability
//!
//! - Queues are shared FIFOs with competing consumers
//! - Topics fan out at send time to every subscription whose selector matches
//! - Durable subscriptions are keyed by (client id, subscription name) and keep
//!   buffering while no subscriber is attached
//! - Transacted sessions buffer sends until commit
//! - Client-acknowledge and transacted deliveries that are still pending when
//!   the session closes are redelivered
//!
//! [`BrokerStats`] exposes counters used to verify driver behaviour.

mod connection;
mod endpoints;
mod queue;
pub mod selector;

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

use self::connection::MemoryConnection;
use self::queue::{lock, MessageQueue};
use self::selector::Selector;
use super::error::{ClientError, ClientResult};
use super::types::{Destination, DestinationKind, Message};
use super::{Connection, MessagingClient};

/// Name of the connection factory every broker starts with
pub const DEFAULT_CONNECTION_FACTORY: &str = "connectionFactory";

const DYNAMIC_QUEUES_PREFIX: &str = "dynamicQueues/";
const DYNAMIC_TOPICS_PREFIX: &str = "dynamicTopics/";

/// Snapshot of broker activity counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    pub connections_opened: u64,
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub consumers_created: u64,
    pub durable_subscribers_created: u64,
    pub browsers_created: u64,
    pub producers_created: u64,
    pub messages_sent: u64,
    pub messages_delivered: u64,
    pub acknowledgements: u64,
    pub commits: u64,
}

#[derive(Default)]
pub(crate) struct StatsCounters {
    pub connections_opened: AtomicU64,
    pub sessions_opened: AtomicU64,
    pub sessions_closed: AtomicU64,
    pub consumers_created: AtomicU64,
    pub durable_subscribers_created: AtomicU64,
    pub browsers_created: AtomicU64,
    pub producers_created: AtomicU64,
    pub messages_sent: AtomicU64,
    pub messages_delivered: AtomicU64,
    pub acknowledgements: AtomicU64,
    pub commits: AtomicU64,
}

impl StatsCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> BrokerStats {
        let read = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        BrokerStats {
            connections_opened: read(&self.connections_opened),
            sessions_opened: read(&self.sessions_opened),
            sessions_closed: read(&self.sessions_closed),
            consumers_created: read(&self.consumers_created),
            durable_subscribers_created: read(&self.durable_subscribers_created),
            browsers_created: read(&self.browsers_created),
            producers_created: read(&self.producers_created),
            messages_sent: read(&self.messages_sent),
            messages_delivered: read(&self.messages_delivered),
            acknowledgements: read(&self.acknowledgements),
            commits: read(&self.commits),
        }
    }
}

/// One topic subscription; its queue only receives messages that passed the selector
pub(crate) struct TopicSubscription {
    pub queue: Arc<MessageQueue>,
    pub selector: Option<Selector>,
    pub active: AtomicBool,
}

#[derive(Default)]
struct TopicState {
    subscriptions: HashMap<String, Arc<TopicSubscription>>,
}

/// Details of a durable subscription, as seen by tests and tooling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurableSubscriptionInfo {
    pub topic: String,
    pub selector: Option<String>,
    pub active: bool,
    pub pending: usize,
}

#[derive(Default)]
struct BrokerState {
    factories: HashSet<String>,
    bindings: HashMap<String, Destination>,
    queues: HashMap<String, Arc<MessageQueue>>,
    topics: HashMap<String, TopicState>,
    client_ids: HashSet<String>,
}

pub(crate) struct BrokerInner {
    state: Mutex<BrokerState>,
    pub stats: StatsCounters,
}

/// In-process message broker
///
/// Cloning is cheap; clones share the same broker.
///
/// # Example
///
/// ```
/// use jms_tools::client::{Destination, MemoryBroker, MessagingClient};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let broker = MemoryBroker::new();
/// broker.bind("jms/orders", Destination::queue("ORDERS"));
///
/// assert_eq!(broker.lookup("jms/orders").await?, Destination::queue("ORDERS"));
/// assert_eq!(broker.lookup("dynamicTopics/prices").await?, Destination::topic("prices"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

impl MemoryBroker {
    /// Create a broker with the default connection factory bound
    pub fn new() -> Self {
        let broker = Self {
            inner: Arc::new(BrokerInner {
                state: Mutex::new(BrokerState::default()),
                stats: StatsCounters::default(),
            }),
        };
        broker.add_connection_factory(DEFAULT_CONNECTION_FACTORY);
        broker
    }

    /// Make another connection factory name available to `connect`
    pub fn add_connection_factory(&self, name: impl Into<String>) {
        lock(&self.inner.state).factories.insert(name.into());
    }

    /// Bind a destination under a lookup name
    pub fn bind(&self, name: impl Into<String>, destination: Destination) {
        lock(&self.inner.state)
            .bindings
            .insert(name.into(), destination);
    }

    pub fn stats(&self) -> BrokerStats {
        self.inner.stats.snapshot()
    }

    /// Number of messages waiting on a queue
    pub fn queue_depth(&self, name: &str) -> usize {
        lock(&self.inner.state)
            .queues
            .get(name)
            .map_or(0, |queue| queue.len())
    }

    pub fn durable_subscription(
        &self,
        client_id: Option<&str>,
        subscription_name: &str,
    ) -> Option<DurableSubscriptionInfo> {
        let key = durable_key(client_id, subscription_name);
        let state = lock(&self.inner.state);
        state.topics.iter().find_map(|(topic, topic_state)| {
            topic_state.subscriptions.get(&key).map(|sub| DurableSubscriptionInfo {
                topic: topic.clone(),
                selector: sub.selector.as_ref().map(|s| s.source().to_string()),
                active: sub.active.load(Ordering::Acquire),
                pending: sub.queue.len(),
            })
        })
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagingClient for MemoryBroker {
    async fn connect(&self, factory: &str) -> ClientResult<Box<dyn Connection>> {
        if !lock(&self.inner.state).factories.contains(factory) {
            return Err(ClientError::NotFound(format!(
                "connection factory '{factory}'"
            )));
        }
        StatsCounters::bump(&self.inner.stats.connections_opened);
        debug!(factory, "connection opened");
        Ok(Box::new(MemoryConnection::new(Arc::clone(&self.inner))))
    }

    async fn lookup(&self, name: &str) -> ClientResult<Destination> {
        if let Some(destination) = lock(&self.inner.state).bindings.get(name) {
            return Ok(destination.clone());
        }
        if let Some(queue) = name.strip_prefix(DYNAMIC_QUEUES_PREFIX) {
            return Ok(Destination::queue(queue));
        }
        if let Some(topic) = name.strip_prefix(DYNAMIC_TOPICS_PREFIX) {
            return Ok(Destination::topic(topic));
        }
        Err(ClientError::NotFound(format!("destination '{name}'")))
    }
}

pub(crate) fn durable_key(client_id: Option<&str>, subscription_name: &str) -> String {
    format!("durable:{}:{}", client_id.unwrap_or(""), subscription_name)
}

impl BrokerInner {
    pub fn register_client_id(&self, client_id: &str) -> ClientResult<()> {
        if !lock(&self.state).client_ids.insert(client_id.to_string()) {
            return Err(ClientError::ClientIdInUse(client_id.to_string()));
        }
        Ok(())
    }

    pub fn release_client_id(&self, client_id: &str) {
        lock(&self.state).client_ids.remove(client_id);
    }

    pub fn queue(&self, name: &str) -> Arc<MessageQueue> {
        Arc::clone(
            lock(&self.state)
                .queues
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MessageQueue::new())),
        )
    }

    pub fn ensure_destination(&self, destination: &Destination) {
        let mut state = lock(&self.state);
        match destination.kind {
            DestinationKind::Queue => {
                state
                    .queues
                    .entry(destination.name.clone())
                    .or_insert_with(|| Arc::new(MessageQueue::new()));
            }
            DestinationKind::Topic => {
                state.topics.entry(destination.name.clone()).or_default();
            }
        }
    }

    pub fn create_temporary(&self, kind: DestinationKind) -> Destination {
        let destination = Destination::temporary(format!("ID:{}", Uuid::new_v4()), kind);
        self.ensure_destination(&destination);
        destination
    }

    pub fn delete_destination(&self, destination: &Destination) {
        let mut state = lock(&self.state);
        match destination.kind {
            DestinationKind::Queue => {
                state.queues.remove(&destination.name);
            }
            DestinationKind::Topic => {
                state.topics.remove(&destination.name);
            }
        }
    }

    /// Attach a subscription to a topic
    ///
    /// Durable subscriptions survive detach; re-attaching with a different
    /// selector replaces the subscription and drops what it had buffered.
    pub fn subscribe(
        &self,
        topic: &str,
        key: String,
        selector: Option<Selector>,
        durable: bool,
    ) -> ClientResult<Arc<TopicSubscription>> {
        let mut state = lock(&self.state);
        let topic_state = state.topics.entry(topic.to_string()).or_default();

        if durable {
            if let Some(existing) = topic_state.subscriptions.get(&key) {
                if existing.active.swap(true, Ordering::AcqRel) {
                    return Err(ClientError::SubscriptionInUse(key));
                }
                if existing.selector == selector {
                    return Ok(Arc::clone(existing));
                }
                existing.queue.clear();
            }
        }

        let subscription = Arc::new(TopicSubscription {
            queue: Arc::new(MessageQueue::new()),
            selector,
            active: AtomicBool::new(true),
        });
        topic_state
            .subscriptions
            .insert(key, Arc::clone(&subscription));
        Ok(subscription)
    }

    pub fn unsubscribe_transient(&self, topic: &str, key: &str) {
        if let Some(topic_state) = lock(&self.state).topics.get_mut(topic) {
            topic_state.subscriptions.remove(key);
        }
    }

    /// Route a message to its destination
    pub fn deliver(&self, message: Message) {
        match message.destination.kind {
            DestinationKind::Queue => {
                self.queue(&message.destination.name).push(message);
            }
            DestinationKind::Topic => {
                let subscriptions: Vec<_> = lock(&self.state)
                    .topics
                    .get(&message.destination.name)
                    .map(|topic| topic.subscriptions.values().cloned().collect())
                    .unwrap_or_default();

                for subscription in subscriptions {
                    let accepted = subscription
                        .selector
                        .as_ref()
                        .map_or(true, |selector| selector.matches(&message));
                    if accepted {
                        subscription.queue.push(message.clone());
                    }
                }
            }
        }
    }
}
