//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bolt_lib::constants::{COMMAND_CHARACTERISTIC_UUID, EOP, SERVICE_UUID, SOP};
#[allow(unused_imports)]
pub use bolt_lib::packet::{self, Header, Packet, checksum};
#[allow(unused_imports)]
pub use bolt_lib::transport::mock::{AckBehavior, MockTransport};
#[allow(unused_imports)]
pub use bolt_lib::{
    AckMode, BoltError, Command, DeviceRecord, FramingError, Session, SessionConfig, SessionHandle, SessionState,
};
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use std::time::Duration;

use tracing_subscriber::EnvFilter;

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

/// Route library logs to the test output; `RUST_LOG=bolt_lib=debug` shows frames
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A robot advertising the BOLT service
#[allow(dead_code)]
pub fn bolt(address: &str, name: &str, rssi: i16) -> DeviceRecord {
    DeviceRecord::new(address, name, SERVICE_UUID, rssi)
}

/// Short timeouts so failure paths finish quickly
#[allow(dead_code)]
pub fn fast_config() -> SessionConfig {
    SessionConfig::default()
        .with_connect_timeout(Duration::from_millis(200))
        .with_ack_timeout(Duration::from_millis(50))
        .with_disconnect_timeout(Duration::from_millis(100))
}

/// Real wake frame captured from the vendor app
#[allow(dead_code)]
pub const CAPTURED_WAKE: &str = "8d381101130dff96d8";
