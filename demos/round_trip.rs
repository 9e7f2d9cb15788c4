//! Example: producer and consumer workers sharing one in-process broker
//!
//! Three consumer workers subscribe to a topic, a
//! producer publishes to the topic in committed batches, and both run
//! reports are printed.
//!
//! # Running
//!
//! ```bash
//! RUST_LOG=info cargo run --example round_trip
//! ```

use std::sync::Arc;
use std::time::Duration;

use jms_tools::client::{AckMode, MemoryBroker};
use jms_tools::{logging, run_consumer, run_producer, DeliveryPolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let broker = MemoryBroker::new();

    let consumers = DeliveryPolicy::topic("PRICES")
        .with_ack_mode(AckMode::Client)
        .with_batch_size(5)
        .with_num_threads(3)
        .with_num_messages(20)
        .with_receive_timeout_ms(250);

    let producer = DeliveryPolicy::topic("PRICES")
        .with_transacted(true)
        .with_batch_size(10)
        .with_num_messages(20)
        .with_message_group_id("demo")
        .with_final_control_message(true);

    let consuming = tokio::spawn(run_consumer(Arc::new(broker.clone()), consumers));

    // Give the subscribers time to attach before publishing.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let produced = run_producer(Arc::new(broker.clone()), producer).await?;
    let consumed = consuming.await??;

    println!("{produced}");
    println!("{consumed}");
    println!("{:#?}", broker.stats());
    Ok(())
}
