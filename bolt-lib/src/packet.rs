//! Packet framing for the BOLT command channel.
//!
//! Every frame on the wire looks like this:
//!
//! ```text
//! [SOP] [FLAGS] [TID?] [SID?] [DID] [CID] [SEQ] [ERR?] [PAYLOAD...] [CHK] [EOP]
//! ```
//!
//! The target id, source id and error code bytes are only present when the
//! matching bit is set in `FLAGS`. `CHK` covers everything between `SOP` and
//! `CHK`: the header and the payload.

use crate::constants::{EOP, FRAMING_OVERHEAD, MIN_HEADER_SIZE, MIN_PACKET_SIZE, SOP};
use crate::error::FramingError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use modular_bitfield::prelude::*;

#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketFlags {
    pub is_response: bool,
    pub requests_response: bool,
    pub requests_only_error_response: bool,
    pub is_activity: bool,
    pub has_target_id: bool,
    pub has_source_id: bool,
    #[skip]
    reserved: B2,
}

/// Header of a framed packet.
///
/// Optional fields and the flag bits announcing them are kept in sync by the
/// builder methods, so an encoded header always parses back to itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Header {
    flags: PacketFlags,
    target_id: Option<u8>,
    source_id: Option<u8>,
    device_id: u8,
    command_id: u8,
    sequence: u8,
    error_code: Option<u8>,
}

impl Header {
    pub fn new(device_id: u8, command_id: u8, sequence: u8) -> Self {
        Self {
            flags: PacketFlags::new(),
            target_id: None,
            source_id: None,
            device_id,
            command_id,
            sequence,
            error_code: None,
        }
    }

    pub fn with_target(mut self, target_id: u8) -> Self {
        self.target_id = Some(target_id);
        self.flags.set_has_target_id(true);
        self
    }

    pub fn with_source(mut self, source_id: u8) -> Self {
        self.source_id = Some(source_id);
        self.flags.set_has_source_id(true);
        self
    }

    pub fn with_sequence(mut self, sequence: u8) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_activity(mut self, activity: bool) -> Self {
        self.flags.set_is_activity(activity);
        self
    }

    pub fn with_requests_response(mut self, requests_response: bool) -> Self {
        self.flags.set_requests_response(requests_response);
        self
    }

    /// Build the header the robot answers this request with.
    pub fn to_response(&self, error_code: u8) -> Self {
        let mut flags = self.flags;
        flags.set_is_response(true);
        flags.set_requests_response(false);
        flags.set_has_target_id(self.source_id.is_some());
        flags.set_has_source_id(self.target_id.is_some());
        Self {
            flags,
            target_id: self.source_id,
            source_id: self.target_id,
            device_id: self.device_id,
            command_id: self.command_id,
            sequence: self.sequence,
            error_code: Some(error_code),
        }
    }

    pub fn flags(&self) -> PacketFlags {
        self.flags
    }

    pub fn target_id(&self) -> Option<u8> {
        self.target_id
    }

    pub fn source_id(&self) -> Option<u8> {
        self.source_id
    }

    pub fn device_id(&self) -> u8 {
        self.device_id
    }

    pub fn command_id(&self) -> u8 {
        self.command_id
    }

    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    pub fn error_code(&self) -> Option<u8> {
        self.error_code
    }

    pub fn is_response(&self) -> bool {
        self.flags.is_response()
    }

    /// Encoded size of this header in bytes
    pub fn encoded_len(&self) -> usize {
        MIN_HEADER_SIZE
            + usize::from(self.target_id.is_some())
            + usize::from(self.source_id.is_some())
            + usize::from(self.error_code.is_some())
    }

    fn put(&self, buf: &mut BytesMut) {
        buf.put_u8(self.flags.into_bytes()[0]);
        if let Some(target_id) = self.target_id {
            buf.put_u8(target_id);
        }
        if let Some(source_id) = self.source_id {
            buf.put_u8(source_id);
        }
        buf.put_u8(self.device_id);
        buf.put_u8(self.command_id);
        buf.put_u8(self.sequence);
        if let Some(error_code) = self.error_code {
            buf.put_u8(error_code);
        }
    }

    /// Parse a header from the start of `body` (the bytes between SOP and checksum).
    fn parse(mut body: &[u8]) -> Result<Self, FramingError> {
        let available = body.len();
        let flags_byte = *body.first().ok_or(FramingError::Truncated {
            expected: MIN_PACKET_SIZE,
            actual: FRAMING_OVERHEAD,
        })?;
        let flags = PacketFlags::from_bytes([flags_byte]);

        let needed = MIN_HEADER_SIZE
            + usize::from(flags.has_target_id())
            + usize::from(flags.has_source_id())
            + usize::from(flags.is_response());
        if available < needed {
            return Err(FramingError::Truncated {
                expected: needed + FRAMING_OVERHEAD,
                actual: available + FRAMING_OVERHEAD,
            });
        }

        body.advance(1);
        let target_id = flags.has_target_id().then(|| body.get_u8());
        let source_id = flags.has_source_id().then(|| body.get_u8());
        let device_id = body.get_u8();
        let command_id = body.get_u8();
        let sequence = body.get_u8();
        let error_code = flags.is_response().then(|| body.get_u8());

        Ok(Self {
            flags,
            target_id,
            source_id,
            device_id,
            command_id,
            sequence,
            error_code,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub header: Header,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(header: Header, payload: impl Into<Bytes>) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }

    pub fn sequence(&self) -> u8 {
        self.header.sequence()
    }

    /// Total size of the framed packet
    pub fn encoded_len(&self) -> usize {
        self.header.encoded_len() + self.payload.len() + FRAMING_OVERHEAD
    }
}

/// Inverted modulo-256 sum over the header and payload bytes.
pub fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// Frame `header` and `payload` into a packet ready for the command characteristic.
pub fn encode(header: &Header, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(header.encoded_len() + payload.len() + FRAMING_OVERHEAD);
    buf.put_u8(SOP);
    header.put(&mut buf);
    buf.put_slice(payload);
    let chk = checksum(&buf[1..]);
    buf.put_u8(chk);
    buf.put_u8(EOP);
    buf.freeze()
}

/// Validate framing and checksum, then split the frame into header and payload.
pub fn decode(bytes: Bytes) -> Result<Packet, FramingError> {
    let len = bytes.len();
    if len < MIN_PACKET_SIZE {
        return Err(FramingError::Truncated {
            expected: MIN_PACKET_SIZE,
            actual: len,
        });
    }
    if bytes[0] != SOP {
        return Err(FramingError::BadStartOfPacket(bytes[0]));
    }
    if bytes[len - 1] != EOP {
        return Err(FramingError::BadEndOfPacket(bytes[len - 1]));
    }

    let body = &bytes[1..len - 2];
    let received = bytes[len - 2];
    let computed = checksum(body);
    if computed != received {
        return Err(FramingError::ChecksumMismatch { computed, received });
    }

    let header = Header::parse(body)?;
    let payload = bytes.slice(1 + header.encoded_len()..len - 2);
    Ok(Packet { header, payload })
}

impl TryFrom<Bytes> for Packet {
    type Error = FramingError;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        decode(bytes)
    }
}

impl From<Packet> for Bytes {
    fn from(packet: Packet) -> Self {
        encode(&packet.header, &packet.payload)
    }
}

impl From<&Packet> for Bytes {
    fn from(packet: &Packet) -> Self {
        encode(&packet.header, &packet.payload)
    }
}
