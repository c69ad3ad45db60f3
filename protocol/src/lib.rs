// SPDX-License-Identifier: BSD-3-Clause

//! Wire format for the host-side companion's framed binary protocol: the packet
//! header layout, checksum, and the [`Framer`]/[`Sender`] that turn a byte stream
//! into [`InPacket`]s and back into framed bytes.

pub mod checksum;
pub mod framer;
pub mod hello;
pub mod packet;
pub mod pipe;
pub mod sender;

pub use checksum::checksum;
pub use framer::Framer;
pub use packet::{InPacket, OutPacket, PacketFlags, PacketType, HEADER_LEN, MAGIC};
pub use sender::encode_frame;

use std::fmt;

/// Errors surfaced while decoding a frame. A `Framer` never returns these to its
/// caller directly -- corrupt frames are logged and skipped -- but the type is
/// kept around for anything that wants to parse a single, already-delimited
/// frame (tests, and the `Sender`'s own round-trip checks).
#[derive(Debug)]
pub enum Error {
    /// The buffer was too short to contain a header.
    ShortHeader,
    /// The buffer did not contain enough payload bytes for the declared length.
    ShortPayload,
    /// The checksum over the frame did not verify.
    BadChecksum,
    /// The packet type byte did not match any known [`PacketType`].
    UnknownType(u8),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortHeader => write!(f, "buffer shorter than the frame header"),
            Self::ShortPayload => write!(f, "buffer shorter than the declared payload length"),
            Self::BadChecksum => write!(f, "frame checksum did not verify"),
            Self::UnknownType(b) => write!(f, "unknown packet type byte {b:#04x}"),
        }
    }
}

impl std::error::Error for Error {}
