use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What counts as the robot having accepted a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// Ask for a response packet and match it by sequence number.
    #[default]
    Response,
    /// A completed characteristic write is the acknowledgment. Frames are sent
    /// without the "requests response" flag.
    WriteConfirmed,
}

/// Bounded retransmission of a command whose acknowledgment timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound for opening the transport
    pub connect_timeout: Duration,
    /// Upper bound for a write plus its acknowledgment
    pub ack_timeout: Duration,
    /// Upper bound for closing the transport
    pub disconnect_timeout: Duration,
    pub ack_mode: AckMode,
    pub retry: RetryPolicy,
    /// Send `Wake` as part of `connect()`
    pub wake_on_connect: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            ack_timeout: Duration::from_secs(1),
            disconnect_timeout: Duration::from_secs(2),
            ack_mode: AckMode::default(),
            retry: RetryPolicy::default(),
            wake_on_connect: false,
        }
    }
}

impl SessionConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    pub fn with_ack_mode(mut self, ack_mode: AckMode) -> Self {
        self.ack_mode = ack_mode;
        self
    }

    pub fn with_retries(mut self, max_retries: u8) -> Self {
        self.retry = RetryPolicy { max_retries };
        self
    }

    pub fn with_wake_on_connect(mut self, wake: bool) -> Self {
        self.wake_on_connect = wake;
        self
    }
}
