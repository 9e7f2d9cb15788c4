use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use jms_tools::cli::{self, ProducerArgs};
use jms_tools::client::MemoryBroker;
use jms_tools::{logging, run_producer};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ProducerArgs::parse();
    logging::init();

    let policy = cli::validated::<ProducerArgs>(args.into_policy());
    info!("Producer policy: {}", serde_json::to_string(&policy)?);

    let broker = MemoryBroker::new();
    let report = run_producer(Arc::new(broker.clone()), policy).await?;

    println!("{report}");
    info!(stats = ?broker.stats(), "broker statistics");
    Ok(())
}
