use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use jms_tools::cli::{self, ConsumerArgs};
use jms_tools::client::{MemoryBroker, MessagingClient};
use jms_tools::driver::{DeliveryPolicy, DestinationSpec};
use jms_tools::{logging, run_consumer, run_producer};

/// Consumer tool running against the in-process broker
#[derive(Debug, Parser)]
#[command(name = "consumer-tool", about, version)]
struct Cli {
    #[command(flatten)]
    args: ConsumerArgs,

    /// Publish this many messages to the destination once consumers are attached
    #[arg(long, default_value_t = 0)]
    preload_messages: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    let policy = cli::validated::<Cli>(cli.args.into_policy());
    info!("Consumer policy: {}", serde_json::to_string(&policy)?);

    let broker = MemoryBroker::new();
    let client: Arc<dyn MessagingClient> = Arc::new(broker.clone());

    let preload_task = if cli.preload_messages > 0 {
        preload(Arc::clone(&client), &policy, cli.preload_messages)
    } else {
        None
    };

    let report = run_consumer(client, policy).await?;
    if let Some(task) = preload_task {
        task.await??;
    }

    println!("{report}");
    Ok(())
}

fn preload(
    client: Arc<dyn MessagingClient>,
    policy: &DeliveryPolicy,
    num_messages: u64,
) -> Option<tokio::task::JoinHandle<jms_tools::Result<()>>> {
    let destination = match &policy.destination {
        DestinationSpec::Temporary { .. } => {
            warn!("--preload-messages ignored for a temporary destination");
            return None;
        }
        other => other.clone(),
    };
    let producer = DeliveryPolicy::new(destination)
        .with_connection_factory(policy.connection_factory.clone())
        .with_num_messages(num_messages);

    Some(tokio::spawn(async move {
        // Topic subscribers must be attached before anything is published.
        tokio::time::sleep(Duration::from_millis(100)).await;
        run_producer(client, producer).await.map(|_| ())
    }))
}
