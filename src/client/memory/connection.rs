use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::endpoints::{ConsumerInner, MemoryBrowser, MemoryConsumer, MemoryProducer};
use super::queue::{lock, MessageQueue};
use super::selector::Selector;
use super::{durable_key, BrokerInner, StatsCounters};
use crate::client::error::{ClientError, ClientResult};
use crate::client::types::{
    AckMode, ConsumerOptions, DeliveryMode, Destination, DestinationKind, Message, Subscription,
};
use crate::client::{Browser, Connection, Consumer, Producer, Session};

/// State shared by a connection and the sessions it opened
pub(crate) struct ConnectionShared {
    pub broker: Arc<BrokerInner>,
    client_id: Mutex<Option<String>>,
    temporaries: Mutex<Vec<Destination>>,
    closed: AtomicBool,
}

impl ConnectionShared {
    pub fn client_id(&self) -> Option<String> {
        lock(&self.client_id).clone()
    }
}

pub(crate) struct MemoryConnection {
    shared: Arc<ConnectionShared>,
    started: AtomicBool,
    sessions: Mutex<Vec<Arc<MemorySession>>>,
}

impl MemoryConnection {
    pub fn new(broker: Arc<BrokerInner>) -> Self {
        Self {
            shared: Arc::new(ConnectionShared {
                broker,
                client_id: Mutex::new(None),
                temporaries: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
            started: AtomicBool::new(false),
            sessions: Mutex::new(Vec::new()),
        }
    }

    fn ensure_open(&self) -> ClientResult<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(ClientError::Closed("connection"));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn set_client_id(&self, client_id: &str) -> ClientResult<()> {
        self.ensure_open()?;
        if self.started.load(Ordering::Acquire) || !lock(&self.sessions).is_empty() {
            return Err(ClientError::IllegalState(
                "client id must be set before the connection is used".to_string(),
            ));
        }

        let mut current = lock(&self.shared.client_id);
        if let Some(previous) = current.as_deref() {
            return Err(ClientError::IllegalState(format!(
                "client id already set to '{previous}'"
            )));
        }
        self.shared.broker.register_client_id(client_id)?;
        *current = Some(client_id.to_string());
        Ok(())
    }

    async fn start(&self) -> ClientResult<()> {
        self.ensure_open()?;
        self.started.store(true, Ordering::Release);
        Ok(())
    }

    async fn open_session(
        &self,
        transacted: bool,
        ack_mode: AckMode,
    ) -> ClientResult<Arc<dyn Session>> {
        self.ensure_open()?;
        if !transacted && ack_mode == AckMode::SessionTransacted {
            return Err(ClientError::IllegalState(
                "SESSION_TRANSACTED requires a transacted session".to_string(),
            ));
        }

        let session = Arc::new(MemorySession::new(
            Arc::clone(&self.shared),
            transacted,
            ack_mode,
        ));
        lock(&self.sessions).push(Arc::clone(&session));
        StatsCounters::bump(&self.shared.broker.stats.sessions_opened);
        Ok(session)
    }

    async fn close(&self) -> ClientResult<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let sessions: Vec<_> = lock(&self.sessions).drain(..).collect();
        for session in sessions {
            session.close().await?;
        }

        let temporaries: Vec<_> = lock(&self.shared.temporaries).drain(..).collect();
        for destination in &temporaries {
            self.shared.broker.delete_destination(destination);
        }

        if let Some(client_id) = lock(&self.shared.client_id).take() {
            self.shared.broker.release_client_id(&client_id);
        }
        debug!("connection closed");
        Ok(())
    }
}

/// A delivered message that still needs an acknowledgement or commit
struct PendingDelivery {
    source: Arc<MessageQueue>,
    message: Message,
}

/// Session state reachable from the consumers it created
pub(crate) struct SessionShared {
    pub connection: Arc<ConnectionShared>,
    pub transacted: bool,
    pub ack_mode: AckMode,
    closed: AtomicBool,
    uncommitted_sends: Mutex<Vec<Message>>,
    unacknowledged: Mutex<Vec<PendingDelivery>>,
}

impl SessionShared {
    pub fn ensure_open(&self) -> ClientResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Closed("session"));
        }
        Ok(())
    }

    fn holds_deliveries(&self) -> bool {
        self.transacted || self.ack_mode.is_client()
    }

    /// Record a message handed to a consumer of this session
    pub fn delivered(&self, source: &Arc<MessageQueue>, message: &Message) {
        StatsCounters::bump(&self.connection.broker.stats.messages_delivered);
        if self.holds_deliveries() {
            lock(&self.unacknowledged).push(PendingDelivery {
                source: Arc::clone(source),
                message: message.clone(),
            });
        }
    }

    pub fn send(&self, message: Message) -> ClientResult<()> {
        self.ensure_open()?;
        StatsCounters::bump(&self.connection.broker.stats.messages_sent);
        if self.transacted {
            lock(&self.uncommitted_sends).push(message);
        } else {
            self.connection.broker.deliver(message);
        }
        Ok(())
    }

    /// Return every pending delivery to its source queue
    fn recover(&self) {
        let pending: Vec<_> = lock(&self.unacknowledged).drain(..).collect();
        let mut by_source: Vec<(Arc<MessageQueue>, Vec<Message>)> = Vec::new();
        for delivery in pending {
            match by_source
                .iter_mut()
                .find(|(queue, _)| Arc::ptr_eq(queue, &delivery.source))
            {
                Some((_, messages)) => messages.push(delivery.message),
                None => by_source.push((delivery.source, vec![delivery.message])),
            }
        }
        for (queue, messages) in by_source {
            queue.requeue_front(messages);
        }
    }
}

pub(crate) struct MemorySession {
    shared: Arc<SessionShared>,
    consumers: Mutex<Vec<Arc<ConsumerInner>>>,
}

impl MemorySession {
    fn new(connection: Arc<ConnectionShared>, transacted: bool, ack_mode: AckMode) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                connection,
                transacted,
                ack_mode,
                closed: AtomicBool::new(false),
                uncommitted_sends: Mutex::new(Vec::new()),
                unacknowledged: Mutex::new(Vec::new()),
            }),
            consumers: Mutex::new(Vec::new()),
        }
    }

    fn broker(&self) -> &BrokerInner {
        &self.shared.connection.broker
    }

    fn parse_selector(selector: Option<&str>) -> ClientResult<Option<Selector>> {
        selector.map(Selector::parse).transpose()
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn resolve_destination(
        &self,
        name: &str,
        kind: DestinationKind,
    ) -> ClientResult<Destination> {
        self.shared.ensure_open()?;
        if name.trim().is_empty() {
            return Err(ClientError::InvalidDestination(
                "destination name is empty".to_string(),
            ));
        }
        let destination = Destination::new(name, kind);
        self.broker().ensure_destination(&destination);
        Ok(destination)
    }

    async fn create_temporary(&self, kind: DestinationKind) -> ClientResult<Destination> {
        self.shared.ensure_open()?;
        let destination = self.broker().create_temporary(kind);
        lock(&self.shared.connection.temporaries).push(destination.clone());
        Ok(destination)
    }

    async fn create_consumer(
        &self,
        destination: &Destination,
        options: ConsumerOptions,
    ) -> ClientResult<Box<dyn Consumer>> {
        self.shared.ensure_open()?;
        let selector = Self::parse_selector(options.selector.as_deref())?;
        let stats = &self.broker().stats;

        let consumer = match (destination.kind, options.subscription) {
            (DestinationKind::Queue, Subscription::Durable { name }) => {
                return Err(ClientError::InvalidDestination(format!(
                    "durable subscription '{name}' requires a topic, got {destination}"
                )));
            }
            (DestinationKind::Queue, Subscription::Transient) => {
                let queue = self.broker().queue(&destination.name);
                ConsumerInner::for_queue(Arc::clone(&self.shared), queue, selector)
            }
            (DestinationKind::Topic, Subscription::Transient) => {
                let key = format!("transient:{}", uuid::Uuid::new_v4());
                let subscription =
                    self.broker()
                        .subscribe(&destination.name, key.clone(), selector, false)?;
                ConsumerInner::for_topic(
                    Arc::clone(&self.shared),
                    destination.name.clone(),
                    key,
                    subscription,
                    false,
                )
            }
            (DestinationKind::Topic, Subscription::Durable { name }) => {
                let client_id = self.shared.connection.client_id();
                let key = durable_key(client_id.as_deref(), &name);
                let subscription =
                    self.broker()
                        .subscribe(&destination.name, key.clone(), selector, true)?;
                StatsCounters::bump(&stats.durable_subscribers_created);
                ConsumerInner::for_topic(
                    Arc::clone(&self.shared),
                    destination.name.clone(),
                    key,
                    subscription,
                    true,
                )
            }
        };

        StatsCounters::bump(&stats.consumers_created);
        let consumer = Arc::new(consumer);
        lock(&self.consumers).push(Arc::clone(&consumer));
        Ok(Box::new(MemoryConsumer::new(consumer)))
    }

    async fn create_browser(
        &self,
        queue: &Destination,
        selector: Option<&str>,
    ) -> ClientResult<Box<dyn Browser>> {
        self.shared.ensure_open()?;
        if !queue.is_queue() {
            return Err(ClientError::InvalidDestination(format!(
                "browsers require a queue, got {queue}"
            )));
        }
        let selector = Self::parse_selector(selector)?;
        let source = self.broker().queue(&queue.name);
        StatsCounters::bump(&self.broker().stats.browsers_created);
        Ok(Box::new(MemoryBrowser::new(source, selector)))
    }

    async fn create_producer(
        &self,
        destination: &Destination,
        delivery_mode: DeliveryMode,
    ) -> ClientResult<Box<dyn Producer>> {
        self.shared.ensure_open()?;
        self.broker().ensure_destination(destination);
        StatsCounters::bump(&self.broker().stats.producers_created);
        Ok(Box::new(MemoryProducer::new(
            Arc::clone(&self.shared),
            destination.clone(),
            delivery_mode,
        )))
    }

    async fn acknowledge(&self, _message: &Message) -> ClientResult<()> {
        self.shared.ensure_open()?;
        StatsCounters::bump(&self.broker().stats.acknowledgements);
        if self.shared.ack_mode.is_client() && !self.shared.transacted {
            lock(&self.shared.unacknowledged).clear();
        }
        Ok(())
    }

    async fn commit(&self) -> ClientResult<()> {
        self.shared.ensure_open()?;
        if !self.shared.transacted {
            return Err(ClientError::IllegalState(
                "commit called on a non-transacted session".to_string(),
            ));
        }

        let sends: Vec<_> = lock(&self.shared.uncommitted_sends).drain(..).collect();
        for message in sends {
            self.broker().deliver(message);
        }
        lock(&self.shared.unacknowledged).clear();
        StatsCounters::bump(&self.broker().stats.commits);
        Ok(())
    }

    async fn close(&self) -> ClientResult<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let consumers: Vec<_> = lock(&self.consumers).drain(..).collect();
        for consumer in consumers {
            consumer.close();
        }

        lock(&self.shared.uncommitted_sends).clear();
        self.shared.recover();
        StatsCounters::bump(&self.broker().stats.sessions_closed);
        Ok(())
    }
}
