use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use super::connection::SessionShared;
use super::queue::{lock, MessageQueue};
use super::selector::Selector;
use super::TopicSubscription;
use crate::client::error::{ClientError, ClientResult};
use crate::client::types::{DeliveryMode, Destination, Message, OutgoingMessage, ReceiveTimeout};
use crate::client::{Browser, Consumer, MessageListener, Producer};

struct TopicBinding {
    topic: String,
    key: String,
    subscription: Arc<TopicSubscription>,
    durable: bool,
}

/// Consumer state shared between the consumer handle, its session, and a
/// listener task
pub(crate) struct ConsumerInner {
    session: Arc<SessionShared>,
    source: Arc<MessageQueue>,
    selector: Option<Selector>,
    topic: Option<TopicBinding>,
    closed: AtomicBool,
}

impl ConsumerInner {
    pub fn for_queue(
        session: Arc<SessionShared>,
        source: Arc<MessageQueue>,
        selector: Option<Selector>,
    ) -> Self {
        Self {
            session,
            source,
            selector,
            topic: None,
            closed: AtomicBool::new(false),
        }
    }

    /// Topic subscriptions filter at publish time, so no selector is kept here
    pub fn for_topic(
        session: Arc<SessionShared>,
        topic: String,
        key: String,
        subscription: Arc<TopicSubscription>,
        durable: bool,
    ) -> Self {
        Self {
            session,
            source: Arc::clone(&subscription.queue),
            selector: None,
            topic: Some(TopicBinding {
                topic,
                key,
                subscription,
                durable,
            }),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> ClientResult<()> {
        self.session.ensure_open()?;
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Closed("consumer"));
        }
        Ok(())
    }

    /// Next message, or `None` on timeout or close
    async fn next(&self, timeout: ReceiveTimeout) -> Option<Message> {
        let message = self
            .source
            .receive(self.selector.as_ref(), timeout, &self.closed)
            .await?;
        self.session.delivered(&self.source, &message);
        Some(message)
    }

    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.source.wake_all();

        if let Some(binding) = &self.topic {
            if binding.durable {
                binding.subscription.active.store(false, Ordering::Release);
            } else {
                self.session
                    .connection
                    .broker
                    .unsubscribe_transient(&binding.topic, &binding.key);
            }
        }
    }
}

pub(crate) struct MemoryConsumer {
    inner: Arc<ConsumerInner>,
    listener_task: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryConsumer {
    pub fn new(inner: Arc<ConsumerInner>) -> Self {
        Self {
            inner,
            listener_task: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Consumer for MemoryConsumer {
    async fn receive(&self, timeout: ReceiveTimeout) -> ClientResult<Option<Message>> {
        self.inner.ensure_open()?;
        if lock(&self.listener_task).is_some() {
            return Err(ClientError::IllegalState(
                "receive called on a consumer with a message listener".to_string(),
            ));
        }
        Ok(self.inner.next(timeout).await)
    }

    async fn set_listener(&self, listener: MessageListener) -> ClientResult<()> {
        self.inner.ensure_open()?;
        let mut task = lock(&self.listener_task);
        if task.is_some() {
            return Err(ClientError::IllegalState(
                "consumer already has a message listener".to_string(),
            ));
        }

        let inner = Arc::clone(&self.inner);
        *task = Some(tokio::spawn(async move {
            while let Some(message) = inner.next(ReceiveTimeout::Indefinite).await {
                listener(message).await;
            }
            trace!("listener task finished");
        }));
        Ok(())
    }

    fn is_listening(&self) -> bool {
        lock(&self.listener_task)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    async fn close(&self) -> ClientResult<()> {
        self.inner.close();
        let task = lock(&self.listener_task).take();
        if let Some(task) = task {
            // Waits for an in-flight listener callback to return.
            if let Err(err) = task.await {
                warn!(error = %err, "message listener task failed");
            }
        }
        Ok(())
    }
}

pub(crate) struct MemoryBrowser {
    source: Arc<MessageQueue>,
    selector: Option<Selector>,
    closed: AtomicBool,
}

impl MemoryBrowser {
    pub fn new(source: Arc<MessageQueue>, selector: Option<Selector>) -> Self {
        Self {
            source,
            selector,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Browser for MemoryBrowser {
    async fn enumerate(&self) -> ClientResult<BoxStream<'static, Message>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Closed("browser"));
        }
        let visible = self.source.snapshot(self.selector.as_ref());
        Ok(stream::iter(visible).boxed())
    }

    async fn close(&self) -> ClientResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

pub(crate) struct MemoryProducer {
    session: Arc<SessionShared>,
    destination: Destination,
    delivery_mode: DeliveryMode,
    closed: AtomicBool,
}

impl MemoryProducer {
    pub fn new(
        session: Arc<SessionShared>,
        destination: Destination,
        delivery_mode: DeliveryMode,
    ) -> Self {
        Self {
            session,
            destination,
            delivery_mode,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Producer for MemoryProducer {
    async fn send(&self, message: OutgoingMessage) -> ClientResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Closed("producer"));
        }
        let message = Message::from_outgoing(self.destination.clone(), message);
        trace!(
            id = %message.id,
            destination = %self.destination,
            delivery_mode = ?self.delivery_mode,
            "sending message"
        );
        self.session.send(message)
    }

    async fn close(&self) -> ClientResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
