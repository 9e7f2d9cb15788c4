#![allow(dead_code)]

use jms_tools::client::{
    AckMode, ConsumerOptions, DeliveryMode, Destination, MemoryBroker, Message, MessagingClient,
    OutgoingMessage, ReceiveTimeout,
};
use std::sync::Arc;

/// Connection factory every test broker exposes
pub const FACTORY: &str = "connectionFactory";

pub fn broker() -> MemoryBroker {
    MemoryBroker::new()
}

pub fn client(broker: &MemoryBroker) -> Arc<dyn MessagingClient> {
    Arc::new(broker.clone())
}

/// Send outgoing messages through a short-lived auto-ack session
pub async fn send_all(
    broker: &MemoryBroker,
    destination: &Destination,
    messages: Vec<OutgoingMessage>,
) {
    let connection = broker.connect(FACTORY).await.unwrap();
    let session = connection.open_session(false, AckMode::Auto).await.unwrap();
    let producer = session
        .create_producer(destination, DeliveryMode::NonPersistent)
        .await
        .unwrap();
    for message in messages {
        producer.send(message).await.unwrap();
    }
    connection.close().await.unwrap();
}

/// Put `count` text messages on a queue
pub async fn preload_queue(broker: &MemoryBroker, queue: &str, count: usize) {
    let messages = (0..count)
        .map(|i| OutgoingMessage::text(format!("preloaded {i}")))
        .collect();
    send_all(broker, &Destination::queue(queue), messages).await;
}

/// Receive everything currently on a queue
pub async fn drain_queue(broker: &MemoryBroker, queue: &str) -> Vec<Message> {
    let connection = broker.connect(FACTORY).await.unwrap();
    connection.start().await.unwrap();
    let session = connection.open_session(false, AckMode::Auto).await.unwrap();
    let consumer = session
        .create_consumer(&Destination::queue(queue), ConsumerOptions::new())
        .await
        .unwrap();

    let mut messages = Vec::new();
    while let Some(message) = consumer.receive(ReceiveTimeout::NoWait).await.unwrap() {
        messages.push(message);
    }
    connection.close().await.unwrap();
    messages
}

/// Lookup name the broker resolves to a queue without a binding
pub fn dynamic_queue(name: &str) -> String {
    format!("dynamicQueues/{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_queue() {
        assert_eq!(dynamic_queue("ORDERS"), "dynamicQueues/ORDERS");
    }
}
