use clap::{Args, Parser};

use crate::client::{AckMode, DestinationKind};
use crate::driver::{
    DeliveryPolicy, DestinationSpec, DEFAULT_CONNECTION_FACTORY, DEFAULT_DESTINATION_NAME,
    DEFAULT_RECEIVE_TIMEOUT_MS, DEFAULT_SUBSCRIPTION_NAME,
};

/// Flags shared by both tools
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// AUTO_ACKNOWLEDGE, CLIENT_ACKNOWLEDGE, DUPS_OK_ACKNOWLEDGE or SESSION_TRANSACTED
    #[arg(short = 'a', long = "acknowledgement-mode", default_value = "AUTO_ACKNOWLEDGE")]
    pub ack_mode: AckMode,

    /// Client id set on every connection
    #[arg(short = 'c', long)]
    pub client_id: Option<String>,

    /// Durable subscription (consumer) or persistent delivery (producer)
    #[arg(short = 'd', long)]
    pub durable: bool,

    /// Sleep after each message, in milliseconds
    #[arg(short = 'e', long, default_value_t = 0)]
    pub per_message_sleep_ms: u64,

    /// Connection factory to connect through
    #[arg(short = 'f', long = "connection-factory-name", default_value = DEFAULT_CONNECTION_FACTORY)]
    pub connection_factory: String,

    /// Number of concurrent workers
    #[arg(short = 'g', long, default_value_t = 1)]
    pub num_threads: u32,

    /// Resolve the destination name through the naming context
    #[arg(short = 'j', long = "jndi-lookup-destination")]
    pub lookup_destination: bool,

    /// Messages per worker
    #[arg(short = 'm', long, default_value_t = 1)]
    pub num_messages: u64,

    /// Destination name
    #[arg(short = 'n', long, default_value = DEFAULT_DESTINATION_NAME)]
    pub destination_name: String,

    /// Use a temporary destination owned by the worker's connection
    #[arg(short = 'p', long = "temporary-destination")]
    pub temporary: bool,

    /// Use a queue
    #[arg(short = 'q', long = "queue-destination", conflicts_with = "topic")]
    pub queue: bool,

    /// Use a topic
    #[arg(short = 'T', long = "topic-destination")]
    pub topic: bool,

    /// Use a transacted session
    #[arg(short = 't', long)]
    pub transacted: bool,

    /// Acknowledge or commit every N messages
    #[arg(short = 'z', long, default_value_t = 1)]
    pub batch_size: u32,
}

impl CommonArgs {
    fn destination_kind(&self, default: DestinationKind) -> DestinationKind {
        if self.queue {
            DestinationKind::Queue
        } else if self.topic {
            DestinationKind::Topic
        } else {
            default
        }
    }

    fn into_policy(self, default_kind: DestinationKind) -> DeliveryPolicy {
        let kind = self.destination_kind(default_kind);
        let destination = DestinationSpec::from_flags(
            self.destination_name,
            kind,
            self.temporary,
            self.lookup_destination,
        );

        let mut policy = DeliveryPolicy::new(destination)
            .with_ack_mode(self.ack_mode)
            .with_transacted(self.transacted)
            .with_batch_size(self.batch_size)
            .with_durable(self.durable)
            .with_connection_factory(self.connection_factory)
            .with_num_threads(self.num_threads)
            .with_num_messages(self.num_messages)
            .with_per_message_sleep_ms(self.per_message_sleep_ms);
        if let Some(client_id) = self.client_id {
            policy = policy.with_client_id(client_id);
        }
        policy
    }
}

/// Consume messages from a queue or topic
#[derive(Debug, Clone, Parser)]
#[command(name = "consumer-tool", about, version)]
pub struct ConsumerArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Browse the queue instead of consuming from it
    #[arg(short = 'b', long = "queue-browser")]
    pub queue_browser: bool,

    /// Message selector, e.g. "color = 'red'"
    #[arg(short = 'k', long = "message-selector")]
    pub selector: Option<String>,

    /// Receive timeout in milliseconds; negative blocks, 0 does not wait
    #[arg(
        short = 'r',
        long = "receive-timeout-ms",
        default_value_t = DEFAULT_RECEIVE_TIMEOUT_MS,
        allow_negative_numbers = true
    )]
    pub receive_timeout_ms: i64,

    /// Durable subscription name
    #[arg(short = 's', long, default_value = DEFAULT_SUBSCRIPTION_NAME)]
    pub subscription_name: String,

    /// Receive through a message listener
    #[arg(short = 'y', long = "async-listener")]
    pub async_listener: bool,
}

impl ConsumerArgs {
    /// Consumers default to a topic
    pub fn into_policy(self) -> DeliveryPolicy {
        let mut policy = self
            .common
            .into_policy(DestinationKind::Topic)
            .with_queue_browser(self.queue_browser)
            .with_receive_timeout_ms(self.receive_timeout_ms)
            .with_subscription_name(self.subscription_name)
            .with_async_listener(self.async_listener);
        if let Some(selector) = self.selector {
            policy = policy.with_selector(selector);
        }
        policy
    }
}

/// Send messages to a queue or topic
#[derive(Debug, Clone, Parser)]
#[command(name = "producer-tool", about, version)]
pub struct ProducerArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Send bytes messages zero-padded to this length
    #[arg(short = 'l', long = "bytes-message-length")]
    pub bytes_length: Option<usize>,

    /// Make the last message an empty control message
    #[arg(short = 'o', long)]
    pub final_control_message: bool,

    /// JMSXGroupID set on every message
    #[arg(short = 'x', long)]
    pub message_group_id: Option<String>,
}

impl ProducerArgs {
    /// Producers default to a queue
    pub fn into_policy(self) -> DeliveryPolicy {
        let mut policy = self
            .common
            .into_policy(DestinationKind::Queue)
            .with_final_control_message(self.final_control_message);
        if let Some(length) = self.bytes_length {
            policy = policy.with_bytes_length(length);
        }
        if let Some(group_id) = self.message_group_id {
            policy = policy.with_message_group_id(group_id);
        }
        policy
    }
}
