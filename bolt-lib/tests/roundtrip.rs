//! Tests for round-trip conversion integrity

mod common;

use common::*;
use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;
use proptest::sample::Index;

fn arb_header() -> impl Strategy<Value = Header> {
    (
        any::<u8>(),
        any::<u8>(),
        any::<u8>(),
        option::of(any::<u8>()),
        option::of(any::<u8>()),
        any::<bool>(),
        any::<bool>(),
        option::of(any::<u8>()),
    )
        .prop_map(|(device, command, seq, target, source, activity, requests_response, error_code)| {
            let mut header = Header::new(device, command, seq)
                .with_activity(activity)
                .with_requests_response(requests_response);
            if let Some(target) = target {
                header = header.with_target(target);
            }
            if let Some(source) = source {
                header = header.with_source(source);
            }
            match error_code {
                Some(code) => header.to_response(code),
                None => header,
            }
        })
}

proptest! {
    #[test]
    fn decode_inverts_encode(header in arb_header(), payload in vec(any::<u8>(), 0..64)) {
        let encoded = packet::encode(&header, &payload);
        prop_assert_eq!(encoded.len(), header.encoded_len() + payload.len() + 3);

        let decoded = packet::decode(encoded).expect("encoded packet must decode");
        prop_assert_eq!(decoded.header, header);
        prop_assert_eq!(decoded.payload.as_ref(), payload.as_slice());
    }

    #[test]
    fn single_bit_flip_is_rejected(header in arb_header(), payload in vec(any::<u8>(), 0..32), bit in any::<Index>()) {
        let mut frame = packet::encode(&header, &payload).to_vec();
        let bit = bit.index(frame.len() * 8);
        frame[bit / 8] ^= 1 << (bit % 8);

        prop_assert!(packet::decode(Bytes::from(frame)).is_err());
    }
}

#[test]
fn test_roundtrip_bytes_to_packet_to_bytes() {
    // Bytes → Packet → Bytes on a real capture
    let original_bytes = hex_to_bytes(CAPTURED_WAKE);

    let packet = Packet::try_from(original_bytes.clone()).expect("Failed to parse packet");
    let roundtrip_bytes = Bytes::from(packet);

    assert_eq!(
        original_bytes.as_ref(),
        roundtrip_bytes.as_ref(),
        "Round-trip should preserve bytes exactly. Original: {:02x?}, Got: {:02x?}",
        original_bytes.as_ref(),
        roundtrip_bytes.as_ref()
    );
}

#[test]
fn test_roundtrip_every_command() {
    let commands = [
        Command::Wake,
        Command::drive(128, 90).unwrap(),
        Command::drive_reverse(255, 359).unwrap(),
        Command::set_main_led(255, 0, 0).unwrap(),
        Command::set_matrix_led(7, 0, 0, 0, 255).unwrap(),
    ];

    for (seq, command) in commands.into_iter().enumerate() {
        let seq = seq as u8;
        let packet = command.to_packet(seq, true);
        let wire = command.to_wire();

        let decoded = Packet::try_from(Bytes::from(&packet)).expect("Failed to parse command packet");
        assert_eq!(decoded, packet, "{command} did not survive a round trip");
        assert_eq!(decoded.sequence(), seq);
        assert_eq!(decoded.header.device_id(), u8::from(wire.device));
        assert_eq!(decoded.header.command_id(), wire.command_id);
        assert_eq!(decoded.header.target_id(), Some(wire.target_id));
        assert_eq!(decoded.payload, wire.payload);
    }
}
