pub mod command;
pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod packet;
pub mod scanner;
pub mod session;
pub mod transport;


// Re-export the types most callers need
pub use command::{ApiDevice, Command, Heading, MatrixPixel, Rgb};
pub use config::{AckMode, RetryPolicy, SessionConfig};
pub use device::{DeviceAddress, DeviceRecord};
pub use error::{BoltError, FramingError, Result};
pub use packet::{Header, Packet, PacketFlags};
pub use scanner::{ScanFilter, find_closest, first_match, scan, scan_for_devices};
pub use session::{Session, SessionEvent, SessionHandle, SessionState, connect};
pub use transport::{Transport, TransportError};
