use crate::constants::{EOP, SOP};
use crate::session::SessionState;
use crate::transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Reasons a received buffer is not a valid packet.
///
/// Decoding never returns a partially parsed packet: any of these
/// conditions rejects the whole buffer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    #[error("Truncated packet: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Bad start of packet: expected {sop:#04x}, got {0:#04x}", sop = SOP)]
    BadStartOfPacket(u8),

    #[error("Bad end of packet: expected {eop:#04x}, got {0:#04x}", eop = EOP)]
    BadEndOfPacket(u8),

    #[error("Checksum mismatch: computed {computed:#04x}, received {received:#04x}")]
    ChecksumMismatch { computed: u8, received: u8 },
}

/// The primary error type for `bolt-lib`.
#[derive(Error, Debug)]
pub enum BoltError {
    #[error("No matching BOLT found within {0:?}. Is the robot awake and nearby?")]
    DiscoveryTimeout(Duration),

    #[error("Connection to {address} failed: {source}")]
    ConnectionFailed {
        address: String,
        #[source]
        source: TransportError,
    },

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("{operation} is not allowed while {state}")]
    IllegalState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Invalid {name}: {value} (allowed 0..={max})")]
    InvalidParameter { name: &'static str, value: u16, max: u16 },

    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("No acknowledgment for packet {sequence} within {timeout:?}")]
    CommandTimeout { sequence: u8, timeout: Duration },

    #[error("Another command is already in flight")]
    Busy,

    #[error("Sequence mismatch: sent {expected}, acknowledged {actual}")]
    SequenceMismatch { expected: u8, actual: u8 },

    #[error("Robot rejected packet {sequence} with error code {code:#04x}")]
    CommandRejected { sequence: u8, code: u8 },
}

impl BoltError {
    /// Errors caused by how the library was called. Retrying them unchanged never helps.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            BoltError::InvalidParameter { .. } | BoltError::IllegalState { .. } | BoltError::Busy
        )
    }

    /// Errors meaning the link to the robot is down or can no longer be trusted.
    ///
    /// A session that returns one of these has already closed the link.
    pub fn is_link_error(&self) -> bool {
        matches!(
            self,
            BoltError::ConnectionFailed { .. }
                | BoltError::ConnectionLost(_)
                | BoltError::CommandTimeout { .. }
                | BoltError::SequenceMismatch { .. }
                | BoltError::Framing(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BoltError>;
