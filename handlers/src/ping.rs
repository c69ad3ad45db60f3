// SPDX-License-Identifier: BSD-3-Clause

//! Echoes every packet it receives back out, unchanged. The translation of
//! `pinghandler.go`.

use crossbeam_channel::Sender;
use log::debug;
use protocol::{InPacket, PacketType};
use session::{Handler, HandlerOutPacket};

#[derive(Default)]
pub struct PingHandler {
    out: Option<Sender<HandlerOutPacket>>,
}

impl PingHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Handler for PingHandler {
    fn init(&mut self, out: Sender<HandlerOutPacket>) {
        self.out = Some(out);
    }

    fn handle_packet(&mut self, packet: InPacket) {
        debug!("ping on conn {}", packet.conn_id);
        if let Some(out) = &self.out {
            let _ = out.send(HandlerOutPacket {
                packet_type: PacketType::Data,
                data: packet.data,
            });
        }
    }

    fn quit(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn echoes_the_payload_back() {
        let mut handler = PingHandler::new();
        let (tx, rx) = crossbeam_channel::unbounded();
        handler.init(tx);

        handler.handle_packet(InPacket {
            packet_type: PacketType::Ping,
            flags: protocol::PacketFlags::empty(),
            conn_id: 3,
            packet_id: 1,
            data: b"abc".to_vec(),
        });

        let reply = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(reply.packet_type, PacketType::Data);
        assert_eq!(reply.data, b"abc");
    }
}
