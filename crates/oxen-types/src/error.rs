//! Errors raised while parsing or validating core types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypeError {
    #[error("Unknown network '{0}'")]
    UnknownNetwork(String),

    #[error("Invalid account address: {0}")]
    InvalidAddress(String),

    #[error("Address prefix {got} does not belong to this network (expected {expected})")]
    WrongAddressPrefix { expected: u8, got: u8 },

    #[error("Invalid key bytes: {0}")]
    InvalidKey(String),

    #[error("Invalid signature bytes")]
    InvalidSignature,

    #[error("Log entry is not a known rewards-contract event")]
    UnknownLogEvent,

    #[error("Malformed log data: {0}")]
    MalformedLog(String),
}
