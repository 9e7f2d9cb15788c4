//! Messaging client capability
//!
//! The drivers in [`crate::driver`] never talk to a transport directly. They
//! consume the traits in this module, which model a JMS-style client:
//!
//! - [`MessagingClient`]: entry point; connects through a named connection
//!   factory and resolves destinations by name
//! - [`Connection`]: carries the client id and opens sessions
//! - [`Session`]: resolves destinations, creates endpoints, acknowledges and commits
//! - [`Consumer`], [`Browser`], [`Producer`]: the endpoints
//!
//! [`memory::MemoryBroker`] is an in-process implementation used by the
//! bundled tools and the test suite.
//!
//! # Example
//!
//! ```
//! use jms_tools::client::{
//!     AckMode, ConsumerOptions, DeliveryMode, DestinationKind, MemoryBroker,
//!     MessagingClient, OutgoingMessage, ReceiveTimeout,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = MemoryBroker::new();
//! let connection = broker.connect("connectionFactory").await?;
//! connection.start().await?;
//!
//! let session = connection.open_session(false, AckMode::Auto).await?;
//! let queue = session.resolve_destination("orders", DestinationKind::Queue).await?;
//!
//! let producer = session.create_producer(&queue, DeliveryMode::Persistent).await?;
//! producer.send(OutgoingMessage::text("hello")).await?;
//!
//! let consumer = session.create_consumer(&queue, ConsumerOptions::new()).await?;
//! let message = consumer.receive(ReceiveTimeout::NoWait).await?;
//! assert_eq!(message.unwrap().text(), Some("hello"));
//!
//! session.close().await?;
//! connection.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod memory;
pub mod types;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use std::sync::Arc;

pub use error::{ClientError, ClientResult};
pub use memory::{BrokerStats, MemoryBroker};
pub use types::{
    AckMode, ConsumerOptions, DeliveryMode, Destination, DestinationKind, Message, MessageBody,
    OutgoingMessage, ReceiveTimeout, Subscription, GROUP_ID_PROPERTY,
};

/// Callback invoked on a transport-owned task for every pushed message
pub type MessageListener = Arc<dyn Fn(Message) -> BoxFuture<'static, ()> + Send + Sync>;

/// Entry point of a messaging client
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Open a connection through the named connection factory
    async fn connect(&self, factory: &str) -> ClientResult<Box<dyn Connection>>;

    /// Resolve a destination bound under `name` in the client's naming context
    async fn lookup(&self, name: &str) -> ClientResult<Destination>;
}

#[async_trait]
pub trait Connection: Send + Sync {
    /// Set the client id; must happen before the connection is used
    async fn set_client_id(&self, client_id: &str) -> ClientResult<()>;

    /// Start delivery of incoming messages
    async fn start(&self) -> ClientResult<()>;

    async fn open_session(&self, transacted: bool, ack_mode: AckMode)
        -> ClientResult<Arc<dyn Session>>;

    /// Close the connection and every session it opened
    async fn close(&self) -> ClientResult<()>;
}

#[async_trait]
pub trait Session: Send + Sync {
    /// Construct a named queue or topic
    async fn resolve_destination(&self, name: &str, kind: DestinationKind)
        -> ClientResult<Destination>;

    /// Create a temporary destination that lives as long as the connection
    async fn create_temporary(&self, kind: DestinationKind) -> ClientResult<Destination>;

    async fn create_consumer(
        &self,
        destination: &Destination,
        options: ConsumerOptions,
    ) -> ClientResult<Box<dyn Consumer>>;

    /// Create a non-destructive view over a queue
    async fn create_browser(
        &self,
        queue: &Destination,
        selector: Option<&str>,
    ) -> ClientResult<Box<dyn Browser>>;

    async fn create_producer(
        &self,
        destination: &Destination,
        delivery_mode: DeliveryMode,
    ) -> ClientResult<Box<dyn Producer>>;

    /// Acknowledge every message delivered by this session so far
    async fn acknowledge(&self, message: &Message) -> ClientResult<()>;

    /// Commit the current transaction
    async fn commit(&self) -> ClientResult<()>;

    async fn close(&self) -> ClientResult<()>;
}

#[async_trait]
pub trait Consumer: Send + Sync {
    /// Receive the next message; `None` when the wait elapsed without one
    async fn receive(&self, timeout: ReceiveTimeout) -> ClientResult<Option<Message>>;

    /// Switch the consumer to push delivery
    async fn set_listener(&self, listener: MessageListener) -> ClientResult<()>;

    /// Whether push delivery is still running
    ///
    /// Turns `false` once the transport stops calling the listener, for
    /// example because the session was closed underneath it.
    fn is_listening(&self) -> bool;

    async fn close(&self) -> ClientResult<()>;
}

#[async_trait]
pub trait Browser: Send + Sync {
    /// Snapshot of the messages currently visible on the queue
    async fn enumerate(&self) -> ClientResult<BoxStream<'static, Message>>;

    async fn close(&self) -> ClientResult<()>;
}

#[async_trait]
pub trait Producer: Send + Sync {
    async fn send(&self, message: OutgoingMessage) -> ClientResult<()>;

    async fn close(&self) -> ClientResult<()>;
}
