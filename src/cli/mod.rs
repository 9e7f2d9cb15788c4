//! Command-line surface of `consumer-tool` and `producer-tool`

mod args;

pub use args::{CommonArgs, ConsumerArgs, ProducerArgs};

use clap::error::ErrorKind;
use clap::CommandFactory;

use crate::driver::DeliveryPolicy;
use crate::error::Error;

/// Validate a policy built from parsed flags
///
/// On failure the usage is printed together with the reason and the process
/// exits with clap's usage-error status.
pub fn validated<A: CommandFactory>(policy: DeliveryPolicy) -> DeliveryPolicy {
    match policy.validate() {
        Ok(()) => policy,
        Err(err) => usage_error::<A>(&err).exit(),
    }
}

/// Turn a configuration error into a clap error carrying the tool's usage
pub fn usage_error<A: CommandFactory>(err: &Error) -> clap::Error {
    A::command().error(ErrorKind::ValueValidation, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_usage_error_carries_reason() {
        let policy = ConsumerArgs::try_parse_from(["consumer-tool", "-z", "0"])
            .unwrap()
            .into_policy();
        let err = policy.validate().unwrap_err();

        let usage = usage_error::<ConsumerArgs>(&err);
        assert_eq!(usage.kind(), ErrorKind::ValueValidation);
        assert!(usage.to_string().contains("batch size"));
    }
}
