use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::client::{AckMode, DeliveryMode, DestinationKind, ReceiveTimeout};
use crate::error::{Error, Result};

pub const DEFAULT_DESTINATION_NAME: &str = "DESTINATION.123";
pub const DEFAULT_SUBSCRIPTION_NAME: &str = "Subscription123";
pub const DEFAULT_CONNECTION_FACTORY: &str = crate::client::memory::DEFAULT_CONNECTION_FACTORY;
pub const DEFAULT_RECEIVE_TIMEOUT_MS: i64 = 5000;

/// Where a worker's destination comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DestinationSpec {
    /// Resolved through the client's naming context
    Lookup { name: String },

    /// Named queue or topic constructed by the session
    Named { name: String, kind: DestinationKind },

    /// Temporary queue or topic owned by the worker's connection
    Temporary { kind: DestinationKind },
}

impl DestinationSpec {
    /// Build the spec from the destination flags
    pub fn from_flags(
        name: impl Into<String>,
        kind: DestinationKind,
        temporary: bool,
        lookup: bool,
    ) -> Self {
        match (lookup, temporary) {
            (true, _) => DestinationSpec::Lookup { name: name.into() },
            (false, true) => DestinationSpec::Temporary { kind },
            (false, false) => DestinationSpec::Named {
                name: name.into(),
                kind,
            },
        }
    }
}

/// Producer payload shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PayloadShape {
    Text,

    /// Text bytes zero-padded up to `length`
    Bytes { length: usize },
}

/// Immutable settings for one run, shared by every worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPolicy {
    pub ack_mode: AckMode,

    /// Always true when `ack_mode` is `SessionTransacted`
    pub transacted: bool,

    /// Messages between acknowledgements/commits
    pub batch_size: u32,

    pub destination: DestinationSpec,

    /// Durable topic subscription (consumer) or persistent delivery (producer)
    pub durable: bool,

    pub subscription_name: String,

    pub selector: Option<String>,

    pub connection_factory: String,

    pub client_id: Option<String>,

    pub num_threads: u32,

    /// Messages handled or sent by each worker
    pub num_messages: u64,

    pub receive_timeout: ReceiveTimeout,

    pub per_message_sleep_ms: u64,

    pub use_async_listener: bool,

    pub use_queue_browser: bool,

    pub payload: PayloadShape,

    pub message_group_id: Option<String>,

    pub final_control_message: bool,
}

impl DeliveryPolicy {
    /// Create a policy with the tool defaults for the given destination
    ///
    /// # Example
    ///
    /// ```
    /// use jms_tools::client::{AckMode, DestinationKind};
    /// use jms_tools::driver::{DeliveryPolicy, DestinationSpec};
    ///
    /// let policy = DeliveryPolicy::new(DestinationSpec::Named {
    ///     name: "ORDERS".to_string(),
    ///     kind: DestinationKind::Queue,
    /// })
    /// .with_ack_mode(AckMode::Client)
    /// .with_batch_size(10)
    /// .with_num_messages(100);
    ///
    /// assert!(policy.validate().is_ok());
    /// ```
    pub fn new(destination: DestinationSpec) -> Self {
        Self {
            ack_mode: AckMode::Auto,
            transacted: false,
            batch_size: 1,
            destination,
            durable: false,
            subscription_name: DEFAULT_SUBSCRIPTION_NAME.to_string(),
            selector: None,
            connection_factory: DEFAULT_CONNECTION_FACTORY.to_string(),
            client_id: None,
            num_threads: 1,
            num_messages: 1,
            receive_timeout: ReceiveTimeout::from_millis(DEFAULT_RECEIVE_TIMEOUT_MS),
            per_message_sleep_ms: 0,
            use_async_listener: false,
            use_queue_browser: false,
            payload: PayloadShape::Text,
            message_group_id: None,
            final_control_message: false,
        }
    }

    /// Named queue policy (builder entry point)
    pub fn queue(name: impl Into<String>) -> Self {
        Self::new(DestinationSpec::Named {
            name: name.into(),
            kind: DestinationKind::Queue,
        })
    }

    /// Named topic policy (builder entry point)
    pub fn topic(name: impl Into<String>) -> Self {
        Self::new(DestinationSpec::Named {
            name: name.into(),
            kind: DestinationKind::Topic,
        })
    }

    /// Set the acknowledgement mode; `SessionTransacted` also makes the session transacted
    pub fn with_ack_mode(mut self, ack_mode: AckMode) -> Self {
        self.ack_mode = ack_mode;
        self.transacted |= ack_mode == AckMode::SessionTransacted;
        self
    }

    pub fn with_transacted(mut self, transacted: bool) -> Self {
        self.transacted = transacted || self.ack_mode == AckMode::SessionTransacted;
        self
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    pub fn with_subscription_name(mut self, name: impl Into<String>) -> Self {
        self.subscription_name = name.into();
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_connection_factory(mut self, factory: impl Into<String>) -> Self {
        self.connection_factory = factory.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_num_threads(mut self, num_threads: u32) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_num_messages(mut self, num_messages: u64) -> Self {
        self.num_messages = num_messages;
        self
    }

    /// Negative blocks indefinitely, 0 polls without waiting
    pub fn with_receive_timeout_ms(mut self, timeout_ms: i64) -> Self {
        self.receive_timeout = ReceiveTimeout::from_millis(timeout_ms);
        self
    }

    pub fn with_per_message_sleep_ms(mut self, sleep_ms: u64) -> Self {
        self.per_message_sleep_ms = sleep_ms;
        self
    }

    pub fn with_async_listener(mut self, enabled: bool) -> Self {
        self.use_async_listener = enabled;
        self
    }

    pub fn with_queue_browser(mut self, enabled: bool) -> Self {
        self.use_queue_browser = enabled;
        self
    }

    pub fn with_bytes_length(mut self, length: usize) -> Self {
        self.payload = PayloadShape::Bytes { length };
        self
    }

    pub fn with_message_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.message_group_id = Some(group_id.into());
        self
    }

    pub fn with_final_control_message(mut self, enabled: bool) -> Self {
        self.final_control_message = enabled;
        self
    }

    pub fn per_message_sleep(&self) -> Duration {
        Duration::from_millis(self.per_message_sleep_ms)
    }

    /// Delivery mode for producers
    pub fn delivery_mode(&self) -> DeliveryMode {
        if self.durable {
            DeliveryMode::Persistent
        } else {
            DeliveryMode::NonPersistent
        }
    }

    /// Check ranges and combinations that no worker could run with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::configuration("batch size must be at least 1"));
        }
        if self.num_messages == 0 {
            return Err(Error::configuration("number of messages must be at least 1"));
        }
        if self.num_threads == 0 {
            return Err(Error::configuration("number of threads must be at least 1"));
        }
        if self.ack_mode == AckMode::SessionTransacted && !self.transacted {
            return Err(Error::configuration(
                "SESSION_TRANSACTED requires a transacted session",
            ));
        }
        if self.connection_factory.trim().is_empty() {
            return Err(Error::configuration("connection factory name is empty"));
        }
        match &self.destination {
            DestinationSpec::Lookup { name } | DestinationSpec::Named { name, .. }
                if name.trim().is_empty() =>
            {
                return Err(Error::configuration("destination name is empty"));
            }
            _ => {}
        }
        if self.durable && self.subscription_name.trim().is_empty() {
            return Err(Error::configuration(
                "durable subscriptions need a subscription name",
            ));
        }
        if matches!(self.selector.as_deref(), Some(s) if s.trim().is_empty()) {
            return Err(Error::configuration("message selector is empty"));
        }
        Ok(())
    }
}
