pub mod destination;
pub mod message;

pub use destination::{
    AckMode, ConsumerOptions, Destination, DestinationKind, ReceiveTimeout, Subscription,
};
pub use message::{DeliveryMode, Message, MessageBody, OutgoingMessage, GROUP_ID_PROPERTY};
