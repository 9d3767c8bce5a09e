use crate::constants::{MATRIX_MAX_COORD, MAX_COLOR, MAX_HEADING, MAX_SPEED, SOURCE_HOST, TARGET_PRIMARY, TARGET_SECONDARY};
use crate::error::{BoltError, Result};
use crate::packet::{Header, Packet};
use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{FromPrimitive, IntoPrimitive};
use strum_macros::Display;

const CID_WAKE: u8 = 0x0D;
const CID_DRIVE_WITH_HEADING: u8 = 0x07;
const CID_SET_MAIN_LED: u8 = 0x07;
const CID_SET_MATRIX_PIXEL: u8 = 0x09;

const DRIVE_FLAG_REVERSE: u8 = 0x01;

/// API subsystem ("device id") a command is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive, Display)]
#[repr(u8)]
pub enum ApiDevice {
    Power = 0x13,
    Driving = 0x16,
    Led = 0x20,
    Matrix = 0x2D,

    #[num_enum(catch_all)]
    Unknown(u8),
}

fn check_range(name: &'static str, value: u16, max: u16) -> Result<u16> {
    if value > max {
        return Err(BoltError::InvalidParameter { name, value, max });
    }
    Ok(value)
}

// Only called with max <= 255
fn check_u8(name: &'static str, value: u16, max: u16) -> Result<u8> {
    let value = check_range(name, value, max)?;
    u8::try_from(value).map_err(|_| BoltError::InvalidParameter { name, value, max })
}

/// Heading in whole degrees, 0..=359.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Heading(u16);

impl Heading {
    pub fn degrees(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for Heading {
    type Error = BoltError;

    fn try_from(degrees: u16) -> Result<Self> {
        check_range("heading", degrees, MAX_HEADING).map(Heading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Build a colour from wider integers, rejecting channels above 255.
    pub fn try_new(red: u16, green: u16, blue: u16) -> Result<Self> {
        Ok(Self {
            red: check_u8("red", red, MAX_COLOR)?,
            green: check_u8("green", green, MAX_COLOR)?,
            blue: check_u8("blue", blue, MAX_COLOR)?,
        })
    }
}

/// Coordinate on the 8x8 LED matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatrixPixel {
    x: u8,
    y: u8,
}

impl MatrixPixel {
    pub fn try_new(x: u16, y: u16) -> Result<Self> {
        Ok(Self {
            x: check_u8("x", x, MATRIX_MAX_COORD)?,
            y: check_u8("y", y, MATRIX_MAX_COORD)?,
        })
    }

    pub fn x(&self) -> u8 {
        self.x
    }

    pub fn y(&self) -> u8 {
        self.y
    }
}

/// Every command the session knows how to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Command {
    Wake,
    Drive { speed: u8, heading: Heading, reverse: bool },
    SetMainLed(Rgb),
    SetMatrixLed { pixel: MatrixPixel, color: Rgb },
}

/// Addressing and payload of a command, before a sequence number is assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct WireCommand {
    pub target_id: u8,
    pub device: ApiDevice,
    pub command_id: u8,
    pub payload: Bytes,
}

impl Command {
    pub fn drive(speed: u16, heading: u16) -> Result<Self> {
        Ok(Command::Drive {
            speed: check_u8("speed", speed, MAX_SPEED)?,
            heading: Heading::try_from(heading)?,
            reverse: false,
        })
    }

    pub fn drive_reverse(speed: u16, heading: u16) -> Result<Self> {
        Ok(Command::Drive {
            speed: check_u8("speed", speed, MAX_SPEED)?,
            heading: Heading::try_from(heading)?,
            reverse: true,
        })
    }

    pub fn set_main_led(red: u16, green: u16, blue: u16) -> Result<Self> {
        Ok(Command::SetMainLed(Rgb::try_new(red, green, blue)?))
    }

    pub fn set_matrix_led(x: u16, y: u16, red: u16, green: u16, blue: u16) -> Result<Self> {
        Ok(Command::SetMatrixLed {
            pixel: MatrixPixel::try_new(x, y)?,
            color: Rgb::try_new(red, green, blue)?,
        })
    }

    pub fn to_wire(&self) -> WireCommand {
        match *self {
            Command::Wake => WireCommand {
                target_id: TARGET_PRIMARY,
                device: ApiDevice::Power,
                command_id: CID_WAKE,
                payload: Bytes::new(),
            },
            Command::Drive { speed, heading, reverse } => {
                let mut payload = BytesMut::with_capacity(4);
                payload.put_u8(speed);
                payload.put_u16(heading.degrees());
                payload.put_u8(if reverse { DRIVE_FLAG_REVERSE } else { 0 });
                WireCommand {
                    target_id: TARGET_SECONDARY,
                    device: ApiDevice::Driving,
                    command_id: CID_DRIVE_WITH_HEADING,
                    payload: payload.freeze(),
                }
            }
            Command::SetMainLed(color) => WireCommand {
                target_id: TARGET_PRIMARY,
                device: ApiDevice::Led,
                command_id: CID_SET_MAIN_LED,
                payload: Bytes::copy_from_slice(&[color.red, color.green, color.blue]),
            },
            Command::SetMatrixLed { pixel, color } => WireCommand {
                target_id: TARGET_PRIMARY,
                device: ApiDevice::Matrix,
                command_id: CID_SET_MATRIX_PIXEL,
                payload: Bytes::copy_from_slice(&[pixel.x, pixel.y, color.red, color.green, color.blue]),
            },
        }
    }

    /// Build the request packet for this command with the given sequence number.
    pub fn to_packet(&self, sequence: u8, requests_response: bool) -> Packet {
        let wire = self.to_wire();
        let header = Header::new(wire.device.into(), wire.command_id, sequence)
            .with_activity(true)
            .with_target(wire.target_id)
            .with_source(SOURCE_HOST)
            .with_requests_response(requests_response);
        Packet::new(header, wire.payload)
    }
}
