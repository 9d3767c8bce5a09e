// Protocol constants for the Sphero BOLT API

use uuid::{Uuid, uuid};

/// Start of packet marker
pub const SOP: u8 = 0x8D;

/// End of packet marker
pub const EOP: u8 = 0xD8;

/// Service advertised by every BOLT robot
pub const SERVICE_UUID: Uuid = uuid!("00010001-574F-4F20-5370-6865726F2121");

/// Characteristic all command packets are written to
pub const COMMAND_CHARACTERISTIC_UUID: Uuid = uuid!("00010002-574F-4F20-5370-6865726F2121");

/// Advertised names look like `SB-1A2B`
pub const NAME_PREFIX: &str = "SB-";

/// Number of hex digits following the name prefix
pub const NAME_SUFFIX_LEN: usize = 4;

/// Size of the fixed part of a request header: flags, device id, command id, sequence
pub const MIN_HEADER_SIZE: usize = 4;

/// SOP + checksum + EOP
pub const FRAMING_OVERHEAD: usize = 3;

/// Smallest buffer that can hold a framed packet
pub const MIN_PACKET_SIZE: usize = MIN_HEADER_SIZE + FRAMING_OVERHEAD;

/// Source id the host uses on every request
pub const SOURCE_HOST: u8 = 0x01;

/// Processor handling power and LEDs
pub const TARGET_PRIMARY: u8 = 0x11;

/// Processor handling the drive motors
pub const TARGET_SECONDARY: u8 = 0x12;

/// Largest drive speed
pub const MAX_SPEED: u16 = 255;

/// Largest heading in degrees
pub const MAX_HEADING: u16 = 359;

/// Largest colour channel value
pub const MAX_COLOR: u16 = 255;

/// LED matrix is 8x8, coordinates run 0..=7
pub const MATRIX_MAX_COORD: u16 = 7;

/// RSSI measured at one metre from the robot, used for distance estimates
pub const MEASURED_POWER_DBM: f64 = -59.0;
