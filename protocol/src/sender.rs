// SPDX-License-Identifier: BSD-3-Clause

//! Serializes a packet into the framed binary form handed to the transport.

use crate::checksum::checksum;
use crate::packet::{PacketFlags, PacketType, MAGIC};

/// Encodes one frame. `flags` is the caller's base flag set (e.g. `RESEND`
/// when replaying a packet); the `PAD_BYTE` bit is set automatically if
/// `payload` has odd length.
pub fn encode_frame(
    packet_type: PacketType,
    mut flags: PacketFlags,
    conn_id: u16,
    packet_id: u16,
    payload: &[u8],
) -> Vec<u8> {
    let padded = payload.len() % 2 != 0;
    if padded {
        flags |= PacketFlags::PAD_BYTE;
    }

    let mut buf = Vec::with_capacity(14 + payload.len() + usize::from(padded));
    buf.extend_from_slice(&MAGIC.to_be_bytes());
    buf.push(u8::from(packet_type));
    buf.push(flags.bits());
    buf.extend_from_slice(&conn_id.to_be_bytes());
    buf.extend_from_slice(&packet_id.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes()); // checksum placeholder
    buf.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    buf.extend_from_slice(payload);
    if padded {
        buf.push(0);
    }

    let sum = checksum(&buf);
    buf[10] = (sum >> 8) as u8;
    buf[11] = (sum & 0xff) as u8;

    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::verify;
    use crate::framer::Framer;

    #[test]
    fn round_trips_through_the_framer() {
        let frame = encode_frame(PacketType::Data, PacketFlags::empty(), 7, 42, b"abc");
        assert!(verify(&frame));

        let mut framer = Framer::new();
        let packets = framer.process(&frame);
        assert_eq!(packets.len(), 1);
        let p = &packets[0];
        assert_eq!(p.packet_type, PacketType::Data);
        assert_eq!(p.conn_id, 7);
        assert_eq!(p.packet_id, 42);
        assert_eq!(p.data, b"abc");
    }

    #[test]
    fn even_length_payload_is_not_padded() {
        let frame = encode_frame(PacketType::Data, PacketFlags::empty(), 0, 1, b"ab");
        // header(14) + payload(2), no pad byte.
        assert_eq!(frame.len(), 16);
    }

    #[test]
    fn odd_length_payload_gets_one_pad_byte() {
        let frame = encode_frame(PacketType::Data, PacketFlags::empty(), 0, 1, b"abc");
        // header(14) + payload(3) + pad(1)
        assert_eq!(frame.len(), 18);
        assert_eq!(*frame.last().unwrap(), 0);
    }

    #[test]
    fn resend_flag_is_preserved_alongside_pad_byte() {
        let frame = encode_frame(PacketType::Data, PacketFlags::RESEND, 0, 1, b"abc");
        let flags = PacketFlags::from_bits_truncate(frame[5]);
        assert!(flags.contains(PacketFlags::RESEND));
        assert!(flags.contains(PacketFlags::PAD_BYTE));
    }
}
