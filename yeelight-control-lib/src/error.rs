use std::time::Duration;

use thiserror::Error;

use crate::control_interface::DeviceError;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the discovery and command exchanges.
///
/// A device answering with an `error` object is not a failure of the exchange;
/// it is returned as data inside [`crate::control_interface::CommandResult`].
/// [`Error::Device`] only appears when a caller opts in through
/// [`crate::control_interface::CommandResult::into_result`].
#[derive(Debug, Error)]
pub enum Error {
    /// Socket setup, send, connect or read failed.
    #[error("network I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The device answered with something that is not a command reply.
    #[error("malformed reply: {0}")]
    MalformedReply(String),

    #[error("connection closed before a reply was received")]
    ConnectionClosed,

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("device reported error {}: {}", .0.code, .0.message)]
    Device(DeviceError),
}
