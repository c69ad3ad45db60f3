// SPDX-License-Identifier: BSD-3-Clause

//! Scans an arbitrary byte stream for framed packets, resynchronizing on the
//! packet magic whenever the stream is corrupted or a new connection drops us
//! mid-frame.

use log::{debug, warn};

use crate::checksum;
use crate::packet::{InPacket, PacketFlags, PacketType, HEADER_LEN, MAGIC};

/// Stateful reassembler. Feed it byte buffers as they arrive from the
/// transport, in order, via [`Framer::process`].
#[derive(Debug, Default)]
pub struct Framer {
    residual: Vec<u8>,
}

impl Framer {
    pub fn new() -> Self {
        Self {
            residual: Vec::new(),
        }
    }

    /// Appends `buf` to the internal residual and extracts every complete,
    /// checksum-valid frame now available. Order is preserved. Returns an
    /// empty vector if no complete frame is available yet or none could be
    /// found.
    pub fn process(&mut self, buf: &[u8]) -> Vec<InPacket> {
        self.residual.extend_from_slice(buf);

        let mut out = Vec::new();
        let mut cursor = 0usize;

        loop {
            if self.residual.len() - cursor < HEADER_LEN {
                break;
            }

            let Some(magic_offset) = find_magic(&self.residual[cursor..]) else {
                // No magic anywhere in what's left: it's all garbage.
                self.residual.clear();
                return out;
            };
            let start = cursor + magic_offset;

            if self.residual.len() - start < HEADER_LEN {
                // Magic found, but not enough bytes for a full header yet.
                cursor = start;
                break;
            }

            let header = &self.residual[start..start + HEADER_LEN];
            let type_byte = header[4];
            let flags_bits = header[5];
            let conn_id = u16::from_be_bytes([header[6], header[7]]);
            let packet_id = u16::from_be_bytes([header[8], header[9]]);
            let length = usize::from(u16::from_be_bytes([header[12], header[13]]));

            let flags = PacketFlags::from_bits_truncate(flags_bits);
            let pad = usize::from(flags.contains(PacketFlags::PAD_BYTE));
            let frame_len = HEADER_LEN + length + pad;

            if self.residual.len() - start < frame_len {
                // Header is complete but the payload hasn't fully arrived.
                cursor = start;
                break;
            }

            let frame = &self.residual[start..start + frame_len];
            if !checksum::verify(frame) {
                warn!("dropping frame at offset {start}: checksum mismatch");
                cursor = start + frame_len;
                continue;
            }

            let packet_type = match PacketType::try_from(type_byte) {
                Ok(t) => t,
                Err(_) => {
                    warn!("dropping frame at offset {start}: unknown packet type {type_byte:#04x}");
                    cursor = start + frame_len;
                    continue;
                }
            };

            let data = frame[HEADER_LEN..HEADER_LEN + length].to_vec();
            debug!("framed {packet_type:?} conn={conn_id} packet_id={packet_id} len={length}");

            out.push(InPacket {
                packet_type,
                flags,
                conn_id,
                packet_id,
                data,
            });

            cursor = start + frame_len;
        }

        if cursor > 0 {
            self.residual.drain(0..cursor);
        }

        out
    }
}

/// Finds the byte offset of the first occurrence of [`MAGIC`] in `buf`, if any.
fn find_magic(buf: &[u8]) -> Option<usize> {
    if buf.len() < 4 {
        return None;
    }
    buf.windows(4)
        .position(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]]) == MAGIC)
}
