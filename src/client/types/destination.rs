use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Point-to-point or publish/subscribe addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    Queue,
    Topic,
}

impl DestinationKind {
    fn scheme(self) -> &'static str {
        match self {
            DestinationKind::Queue => "queue",
            DestinationKind::Topic => "topic",
        }
    }
}

/// Addressable target for messages
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub name: String,
    pub kind: DestinationKind,
    pub temporary: bool,
}

impl Destination {
    pub fn new(name: impl Into<String>, kind: DestinationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            temporary: false,
        }
    }

    pub fn temporary(name: impl Into<String>, kind: DestinationKind) -> Self {
        Self {
            name: name.into(),
            kind,
            temporary: true,
        }
    }

    pub fn queue(name: impl Into<String>) -> Self {
        Self::new(name, DestinationKind::Queue)
    }

    pub fn topic(name: impl Into<String>) -> Self {
        Self::new(name, DestinationKind::Topic)
    }

    pub fn is_queue(&self) -> bool {
        self.kind == DestinationKind::Queue
    }

    pub fn is_topic(&self) -> bool {
        self.kind == DestinationKind::Topic
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.temporary { "temp-" } else { "" };
        write!(f, "{}{}://{}", prefix, self.kind.scheme(), self.name)
    }
}

/// Session acknowledgement mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AckMode {
    #[default]
    Auto,
    Client,
    DupsOk,
    SessionTransacted,
}

impl AckMode {
    /// Whether delivered messages stay pending until explicitly acknowledged
    pub fn is_client(self) -> bool {
        self == AckMode::Client
    }
}

impl FromStr for AckMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "AUTO_ACKNOWLEDGE" | "AUTO" => Ok(AckMode::Auto),
            "CLIENT_ACKNOWLEDGE" | "CLIENT" => Ok(AckMode::Client),
            "DUPS_OK_ACKNOWLEDGE" | "DUPS_OK" => Ok(AckMode::DupsOk),
            "SESSION_TRANSACTED" | "TRANSACTED" => Ok(AckMode::SessionTransacted),
            _ => Err(format!(
                "invalid acknowledgement mode '{s}' (expected AUTO_ACKNOWLEDGE, \
                 CLIENT_ACKNOWLEDGE, DUPS_OK_ACKNOWLEDGE or SESSION_TRANSACTED)"
            )),
        }
    }
}

impl fmt::Display for AckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AckMode::Auto => "AUTO_ACKNOWLEDGE",
            AckMode::Client => "CLIENT_ACKNOWLEDGE",
            AckMode::DupsOk => "DUPS_OK_ACKNOWLEDGE",
            AckMode::SessionTransacted => "SESSION_TRANSACTED",
        };
        f.write_str(name)
    }
}

/// How long a single receive call may wait for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiveTimeout {
    /// Block until a message arrives or the consumer is closed
    Indefinite,

    /// Return immediately if nothing is available
    NoWait,

    /// Wait at most this many milliseconds
    Millis(u64),
}

impl ReceiveTimeout {
    /// Map a millisecond setting where any negative value means "block"
    pub fn from_millis(ms: i64) -> Self {
        match ms {
            ms if ms < 0 => ReceiveTimeout::Indefinite,
            0 => ReceiveTimeout::NoWait,
            ms => ReceiveTimeout::Millis(ms as u64),
        }
    }

    /// Bound for one wait, `None` when unbounded
    pub fn as_duration(self) -> Option<Duration> {
        match self {
            ReceiveTimeout::Indefinite => None,
            ReceiveTimeout::NoWait => Some(Duration::ZERO),
            ReceiveTimeout::Millis(ms) => Some(Duration::from_millis(ms)),
        }
    }
}

/// How a consumer attaches to its destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subscription {
    /// Plain consumer; topic interest ends when the consumer closes
    Transient,

    /// Named durable topic subscription
    Durable { name: String },
}

/// Options for creating a consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerOptions {
    pub selector: Option<String>,
    pub subscription: Subscription,
}

impl ConsumerOptions {
    pub fn new() -> Self {
        Self {
            selector: None,
            subscription: Subscription::Transient,
        }
    }

    /// Set the message selector (builder pattern)
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Attach through a durable subscription (builder pattern)
    pub fn durable(mut self, subscription_name: impl Into<String>) -> Self {
        self.subscription = Subscription::Durable {
            name: subscription_name.into(),
        };
        self
    }
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_mode_from_str() {
        assert_eq!("AUTO_ACKNOWLEDGE".parse::<AckMode>(), Ok(AckMode::Auto));
        assert_eq!("client_acknowledge".parse::<AckMode>(), Ok(AckMode::Client));
        assert_eq!("dups-ok".parse::<AckMode>(), Ok(AckMode::DupsOk));
        assert_eq!(
            "Session_Transacted".parse::<AckMode>(),
            Ok(AckMode::SessionTransacted)
        );
        assert!("SOMETIMES".parse::<AckMode>().is_err());
    }

    #[test]
    fn test_ack_mode_display_round_trips() {
        for mode in [
            AckMode::Auto,
            AckMode::Client,
            AckMode::DupsOk,
            AckMode::SessionTransacted,
        ] {
            assert_eq!(mode.to_string().parse::<AckMode>(), Ok(mode));
        }
    }

    #[test]
    fn test_receive_timeout_from_millis() {
        assert_eq!(ReceiveTimeout::from_millis(-1), ReceiveTimeout::Indefinite);
        assert_eq!(ReceiveTimeout::from_millis(-50), ReceiveTimeout::Indefinite);
        assert_eq!(ReceiveTimeout::from_millis(0), ReceiveTimeout::NoWait);
        assert_eq!(ReceiveTimeout::from_millis(250), ReceiveTimeout::Millis(250));
        assert_eq!(ReceiveTimeout::Indefinite.as_duration(), None);
        assert_eq!(
            ReceiveTimeout::Millis(250).as_duration(),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_destination_display() {
        assert_eq!(Destination::queue("orders").to_string(), "queue://orders");
        assert_eq!(
            Destination::temporary("abc", DestinationKind::Topic).to_string(),
            "temp-topic://abc"
        );
    }

    #[test]
    fn test_consumer_options_builder() {
        let options = ConsumerOptions::new()
            .with_selector("color = 'red'")
            .durable("sub-1");

        assert_eq!(options.selector.as_deref(), Some("color = 'red'"));
        assert_eq!(
            options.subscription,
            Subscription::Durable {
                name: "sub-1".to_string()
            }
        );
    }
}
