// SPDX-License-Identifier: BSD-3-Clause

//! Reports the current time as seconds since the AmigaOS epoch
//! (1978-01-01, local time), once, on connect. The translation of
//! `datehandler.go`.

use chrono::{Local, TimeZone};
use crossbeam_channel::Sender;
use log::info;
use protocol::{InPacket, PacketType};
use session::{Handler, HandlerOutPacket};

#[derive(Default)]
pub struct DateHandler;

impl DateHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for DateHandler {
    fn init(&mut self, out: Sender<HandlerOutPacket>) {
        let epoch = Local
            .with_ymd_and_hms(1978, 1, 1, 0, 0, 0)
            .single()
            .expect("1978-01-01 local midnight is unambiguous");
        let seconds = (Local::now() - epoch).num_seconds();

        info!("amiga time is {seconds}");

        let _ = out.send(HandlerOutPacket {
            packet_type: PacketType::Data,
            data: (seconds as u32).to_be_bytes().to_vec(),
        });
    }

    fn handle_packet(&mut self, _packet: InPacket) {}

    fn quit(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn sends_a_four_byte_payload_on_init() {
        let mut handler = DateHandler::new();
        let (tx, rx) = crossbeam_channel::unbounded();
        handler.init(tx);

        let reply = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(reply.packet_type, PacketType::Data);
        assert_eq!(reply.data.len(), 4);
    }
}
