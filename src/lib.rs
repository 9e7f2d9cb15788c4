// Messaging client capability and the in-process broker
pub mod client;

// Consumer and producer load drivers
pub mod driver;

pub mod cli;
pub mod error;
pub mod logging;

pub use driver::{run_consumer, run_producer, DeliveryPolicy, RunReport};
pub use error::{Error, Result};
