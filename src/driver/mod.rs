//! Consumer and producer drivers
//!
//! A run is described by an immutable [`DeliveryPolicy`]. [`run_consumer`]
//! and [`run_producer`] validate it, then start `num_threads` workers through
//! a [`WorkerPool`]. Each worker owns its own connection and session, so
//! workers share nothing but the policy and the client.

pub mod batcher;
pub mod consumer;
pub mod destination;
pub mod handler;
pub mod policy;
pub mod pool;
pub mod producer;
pub mod session;
pub mod strategy;

use std::sync::Arc;
use tracing::info;

pub use batcher::{should_finalize, AckBatcher, BatchCursor, ListenerCounter};
pub use consumer::ConsumerDriver;
pub use destination::DestinationHandle;
pub use handler::MessageHandler;
pub use policy::{
    DeliveryPolicy, DestinationSpec, PayloadShape, DEFAULT_CONNECTION_FACTORY,
    DEFAULT_DESTINATION_NAME, DEFAULT_RECEIVE_TIMEOUT_MS, DEFAULT_SUBSCRIPTION_NAME,
};
pub use pool::{RunReport, Worker, WorkerPool, WorkerResult};
pub use producer::{message_text, padded_payload, ProducerDriver};
pub use session::WorkerSession;
pub use strategy::ConsumptionStrategy;

use crate::client::MessagingClient;
use crate::error::Result;

/// Validate the policy and run `num_threads` consumer workers
pub async fn run_consumer(
    client: Arc<dyn MessagingClient>,
    policy: DeliveryPolicy,
) -> Result<RunReport> {
    policy.validate()?;
    info!(threads = policy.num_threads, messages = policy.num_messages, "Starting consumer");
    let pool = WorkerPool::new(policy.num_threads);
    let driver = ConsumerDriver::new(client, Arc::new(policy));
    Ok(pool.run(Arc::new(driver)).await)
}

/// Validate the policy and run `num_threads` producer workers
pub async fn run_producer(
    client: Arc<dyn MessagingClient>,
    policy: DeliveryPolicy,
) -> Result<RunReport> {
    policy.validate()?;
    info!(threads = policy.num_threads, messages = policy.num_messages, "Starting producer");
    let pool = WorkerPool::new(policy.num_threads);
    let driver = ProducerDriver::new(client, Arc::new(policy));
    Ok(pool.run(Arc::new(driver)).await)
}
