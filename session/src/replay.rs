// SPDX-License-Identifier: BSD-3-Clause

//! The Server's record of recently-sent packets, so a `Resend` request can
//! be answered without the handler that produced the packet being involved
//! at all.

use std::collections::VecDeque;

use protocol::OutPacket;

pub struct ReplayRing {
    capacity: usize,
    entries: VecDeque<OutPacket>,
}

impl ReplayRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, packet: OutPacket) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(packet);
    }

    pub fn find(&self, packet_id: u16) -> Option<&OutPacket> {
        self.entries.iter().find(|p| p.packet_id == packet_id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::PacketType;

    fn packet(id: u16) -> OutPacket {
        OutPacket {
            conn_id: 0,
            packet_id: id,
            packet_type: PacketType::Ping,
            data: vec![],
        }
    }

    #[test]
    fn finds_a_recently_pushed_packet() {
        let mut ring = ReplayRing::new(2);
        ring.push(packet(1));
        ring.push(packet(2));
        assert_eq!(ring.find(1).unwrap().packet_id, 1);
    }

    #[test]
    fn evicts_the_oldest_entry_once_full() {
        let mut ring = ReplayRing::new(2);
        ring.push(packet(1));
        ring.push(packet(2));
        ring.push(packet(3));
        assert!(ring.find(1).is_none());
        assert!(ring.find(2).is_some());
        assert!(ring.find(3).is_some());
    }
}
