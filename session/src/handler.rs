// SPDX-License-Identifier: BSD-3-Clause

//! The trait every per-connection service implements, and the registry
//! that maps a numeric handler id to one. The direct translation of
//! `handler.go`'s `Handler` interface and `HandlerFactory`.

use crossbeam_channel::Sender;

use protocol::{InPacket, PacketType};

/// A packet a handler wants to send, before the owning [`crate::Connection`]
/// stamps a `conn_id` onto it and the `Server` assigns a `packet_id`.
#[derive(Debug, Clone)]
pub struct HandlerOutPacket {
    pub packet_type: PacketType,
    pub data: Vec<u8>,
}

/// A per-connection service. Implementations may spawn their own worker
/// threads in `init` but must have torn them down by the time `quit`
/// returns.
pub trait Handler: Send {
    fn init(&mut self, out: Sender<HandlerOutPacket>);
    fn handle_packet(&mut self, packet: InPacket);
    fn quit(&mut self);
}

type Builder = Box<dyn Fn() -> Box<dyn Handler> + Send + Sync>;

struct HandlerDesc {
    name: String,
    builder: Builder,
}

/// Maps handler ids to constructors. Built once, handed to the `Server`,
/// and never mutated again.
#[derive(Default)]
pub struct HandlerFactory {
    handlers: std::collections::HashMap<u16, HandlerDesc>,
}

impl HandlerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        handler_id: u16,
        name: impl Into<String>,
        builder: impl Fn() -> Box<dyn Handler> + Send + Sync + 'static,
    ) {
        self.handlers.insert(
            handler_id,
            HandlerDesc {
                name: name.into(),
                builder: Box::new(builder),
            },
        );
    }

    pub fn create(&self, handler_id: u16) -> Option<Box<dyn Handler>> {
        self.handlers.get(&handler_id).map(|d| (d.builder)())
    }

    /// Handler ids and names, sorted ascending by id, as required for the
    /// `Hello` handshake payload.
    pub fn descriptions(&self) -> Vec<(u16, &str)> {
        let mut entries: Vec<(u16, &str)> = self
            .handlers
            .iter()
            .map(|(id, d)| (*id, d.name.as_str()))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }
}
