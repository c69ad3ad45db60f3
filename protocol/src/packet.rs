// SPDX-License-Identifier: BSD-3-Clause

//! Packet header layout and the in-memory packet types that flow between the
//! [`crate::framer::Framer`], the session layer, and the per-connection
//! handlers.

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 32-bit sentinel that prefixes every frame, big-endian on the wire.
pub const MAGIC: u32 = 0x416D_5069;

/// Size in bytes of the fixed frame header (magic through length, inclusive).
pub const HEADER_LEN: usize = 14;

bitflags! {
    /// The two flag bits carried in byte 5 of the header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PacketFlags: u8 {
        /// A single padding byte was appended after the payload to keep the
        /// frame length even (required by the checksum algorithm).
        const PAD_BYTE = 0x01;
        /// This frame is a replay of a previously-sent packet, requested via
        /// `Resend`.
        const RESEND = 0x02;
    }
}

/// Every packet type the protocol defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PacketType {
    Init = 0x00,
    Hello = 0x01,
    Shutdown = 0x02,
    Goodbye = 0x03,
    Connect = 0x10,
    Connected = 0x11,
    Disconnect = 0x12,
    Disconnected = 0x13,
    Data = 0x20,
    Resend = 0x22,
    Ping = 0x23,
    Pong = 0x24,
    Error = 0x30,
    NoHandler = 0x31,
    NoConnection = 0x32,
}

/// A fully decoded inbound frame, produced by the [`crate::framer::Framer`]
/// and consumed exactly once by the session layer or a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InPacket {
    pub packet_type: PacketType,
    pub flags: PacketFlags,
    pub conn_id: u16,
    pub packet_id: u16,
    pub data: Vec<u8>,
}

impl InPacket {
    pub fn is_resend(&self) -> bool {
        self.flags.contains(PacketFlags::RESEND)
    }
}

/// A packet queued for transmission. `packet_id` is assigned by the session
/// layer at send time, so it is `None` until then.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutPacket {
    pub conn_id: u16,
    pub packet_id: u16,
    pub packet_type: PacketType,
    pub data: Vec<u8>,
}
