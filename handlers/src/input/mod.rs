// SPDX-License-Identifier: BSD-3-Clause

//! Translates evdev mouse and keyboard activity into the remote's input
//! event packets. Expands `inputhandler.go`'s single hardcoded
//! `/dev/input/mice` reader into device enumeration, classification, 20 ms
//! motion aggregation, and keyboard qualifier tracking.

mod device;
mod keymap;

use std::os::fd::{AsRawFd, BorrowedFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use evdev::{Device, InputEventKind, Key, RelativeAxisType};
use log::{info, warn};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use protocol::InPacket;
use session::{Handler, HandlerOutPacket};

use device::Kind;
use keymap::Qualifiers;

const AGGREGATION_TICK: Duration = Duration::from_millis(20);
const DEVICE_POLL_TIMEOUT_MS: u16 = 200;

const EVENT_MOUSE_MOVE: u16 = 1;
const EVENT_MOUSE_BUTTON: u16 = 2;
const EVENT_KEYBOARD: u16 = 4;

const BUTTON_LEFT: u16 = 0x68;
const BUTTON_MIDDLE: u16 = 0x6a;
const BUTTON_RIGHT: u16 = 0x69;
const BUTTON_RELEASE_BIT: u16 = 0x80;

enum RawEvent {
    Motion { dx: i32, dy: i32 },
    MouseButton { code: Key, pressed: bool },
    Key { code: Key, pressed: bool },
}

#[derive(Default)]
pub struct InputHandler {
    running: Option<Arc<AtomicBool>>,
    shutdown: Option<Sender<()>>,
    aggregator: Option<JoinHandle<()>>,
    device_threads: Vec<JoinHandle<()>>,
}

impl InputHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Handler for InputHandler {
    fn init(&mut self, out: Sender<HandlerOutPacket>) {
        let (raw_tx, raw_rx) = bounded::<RawEvent>(256);
        let running = Arc::new(AtomicBool::new(true));
        let mut device_threads = Vec::new();

        for (path, mut dev) in evdev::enumerate() {
            let Some(kind) = device::classify(&dev) else {
                continue;
            };
            if let Err(e) = dev.grab() {
                warn!("could not grab {}: {e}", path.display());
            }
            info!("input device {} classified as {kind:?}", path.display());

            let running = running.clone();
            let raw_tx = raw_tx.clone();
            device_threads.push(thread::spawn(move || read_device(dev, kind, running, raw_tx)));
        }

        let (shutdown_tx, shutdown_rx) = bounded(1);
        let aggregator = thread::spawn(move || aggregate(raw_rx, shutdown_rx, out));

        self.running = Some(running);
        self.shutdown = Some(shutdown_tx);
        self.aggregator = Some(aggregator);
        self.device_threads = device_threads;
    }

    fn handle_packet(&mut self, _packet: InPacket) {}

    fn quit(&mut self) {
        if let Some(running) = &self.running {
            running.store(false, Ordering::Relaxed);
        }
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(h) = self.aggregator.take() {
            let _ = h.join();
        }
        for h in self.device_threads.drain(..) {
            let _ = h.join();
        }
    }
}

fn read_device(mut dev: Device, kind: Kind, running: Arc<AtomicBool>, tx: Sender<RawEvent>) {
    let raw_fd = dev.as_raw_fd();

    while running.load(Ordering::Relaxed) {
        let borrowed = unsafe { BorrowedFd::borrow_raw(raw_fd) };
        let mut fds = [PollFd::new(borrowed, PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(DEVICE_POLL_TIMEOUT_MS)) {
            Ok(0) | Err(_) => continue,
            Ok(_) => {}
        }

        let events = match dev.fetch_events() {
            Ok(events) => events,
            Err(e) => {
                warn!("input device read failed: {e}");
                break;
            }
        };

        for ev in events {
            let raw = match (kind, ev.kind()) {
                (Kind::Mouse, InputEventKind::RelAxis(RelativeAxisType::REL_X)) => {
                    RawEvent::Motion { dx: ev.value(), dy: 0 }
                }
                (Kind::Mouse, InputEventKind::RelAxis(RelativeAxisType::REL_Y)) => {
                    RawEvent::Motion { dx: 0, dy: ev.value() }
                }
                (Kind::Mouse, InputEventKind::Key(code))
                    if matches!(code, Key::BTN_LEFT | Key::BTN_MIDDLE | Key::BTN_RIGHT) =>
                {
                    RawEvent::MouseButton {
                        code,
                        pressed: ev.value() != 0,
                    }
                }
                (Kind::Keyboard, InputEventKind::Key(code)) => RawEvent::Key {
                    code,
                    pressed: ev.value() != 0,
                },
                _ => continue,
            };
            if tx.send(raw).is_err() {
                return;
            }
        }
    }
}

fn aggregate(raw_rx: Receiver<RawEvent>, shutdown_rx: Receiver<()>, out: Sender<HandlerOutPacket>) {
    let ticker = tick(AGGREGATION_TICK);
    let mut dx: i8 = 0;
    let mut dy: i8 = 0;
    let mut qualifiers = Qualifiers::empty();

    loop {
        select! {
            recv(shutdown_rx) -> _ => return,
            recv(raw_rx) -> msg => {
                let Ok(event) = msg else { return };
                handle_raw_event(event, &mut dx, &mut dy, &mut qualifiers, &out);
            }
            recv(ticker) -> _ => {
                if dx != 0 || dy != 0 {
                    emit_motion(&out, dx, dy);
                    dx = 0;
                    dy = 0;
                }
            }
        }
    }
}

fn handle_raw_event(
    event: RawEvent,
    dx: &mut i8,
    dy: &mut i8,
    qualifiers: &mut Qualifiers,
    out: &Sender<HandlerOutPacket>,
) {
    match event {
        RawEvent::Motion { dx: ddx, dy: ddy } => {
            *dx = dx.wrapping_add(clamp_to_i8(ddx));
            *dy = dy.wrapping_add(clamp_to_i8(ddy));
        }
        RawEvent::MouseButton { code, pressed } => {
            let mut button = match code {
                Key::BTN_LEFT => BUTTON_LEFT,
                Key::BTN_MIDDLE => BUTTON_MIDDLE,
                Key::BTN_RIGHT => BUTTON_RIGHT,
                _ => return,
            };
            if !pressed {
                button |= BUTTON_RELEASE_BIT;
            }
            emit_button(out, button);
        }
        RawEvent::Key { code, pressed } => {
            if let Some(bit) = keymap::qualifier_bit(code) {
                if code == Key::KEY_CAPSLOCK {
                    if pressed {
                        qualifiers.toggle(bit);
                    }
                } else if pressed {
                    qualifiers.insert(bit);
                } else {
                    qualifiers.remove(bit);
                }
            }

            if let Some(scan) = keymap::translate(code) {
                let key_field = if pressed { scan } else { scan | keymap::RELEASE_BIT };
                let mut reported = *qualifiers;
                if keymap::reports_with_temporary_shift(code) {
                    reported |= Qualifiers::LSHIFT;
                }
                emit_key(out, key_field, reported.bits());
            }
        }
    }
}

fn clamp_to_i8(v: i32) -> i8 {
    v.clamp(i8::MIN as i32, i8::MAX as i32) as i8
}

fn emit_motion(out: &Sender<HandlerOutPacket>, dx: i8, dy: i8) {
    let mut data = EVENT_MOUSE_MOVE.to_be_bytes().to_vec();
    data.push(dx as u8);
    data.push(dy as u8);
    send(out, data);
}

fn emit_button(out: &Sender<HandlerOutPacket>, code: u16) {
    let mut data = EVENT_MOUSE_BUTTON.to_be_bytes().to_vec();
    data.extend_from_slice(&code.to_be_bytes());
    send(out, data);
}

fn emit_key(out: &Sender<HandlerOutPacket>, key: u16, qualifiers: u16) {
    let mut data = EVENT_KEYBOARD.to_be_bytes().to_vec();
    data.extend_from_slice(&key.to_be_bytes());
    data.extend_from_slice(&qualifiers.to_be_bytes());
    send(out, data);
}

fn send(out: &Sender<HandlerOutPacket>, data: Vec<u8>) {
    let _ = out.send(HandlerOutPacket {
        packet_type: protocol::PacketType::Data,
        data,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[test]
    fn motion_accumulates_and_wraps_like_an_i8() {
        let mut dx: i8 = 120;
        let mut dy: i8 = 0;
        let mut qualifiers = Qualifiers::empty();
        let (tx, _rx) = crossbeam_channel::unbounded();

        handle_raw_event(RawEvent::Motion { dx: 20, dy: 0 }, &mut dx, &mut dy, &mut qualifiers, &tx);
        assert_eq!(dx, 120i8.wrapping_add(20));
    }

    #[test]
    fn released_mouse_button_sets_the_release_bit() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut dx = 0;
        let mut dy = 0;
        let mut qualifiers = Qualifiers::empty();

        handle_raw_event(
            RawEvent::MouseButton { code: Key::BTN_LEFT, pressed: false },
            &mut dx,
            &mut dy,
            &mut qualifiers,
            &tx,
        );

        let packet = rx.recv_timeout(StdDuration::from_secs(1)).unwrap();
        let code = u16::from_be_bytes([packet.data[2], packet.data[3]]);
        assert_eq!(code, BUTTON_LEFT | BUTTON_RELEASE_BIT);
    }

    #[test]
    fn capslock_toggles_on_press_only() {
        let mut qualifiers = Qualifiers::empty();
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut dx = 0;
        let mut dy = 0;

        handle_raw_event(RawEvent::Key { code: Key::KEY_CAPSLOCK, pressed: true }, &mut dx, &mut dy, &mut qualifiers, &tx);
        assert!(qualifiers.contains(Qualifiers::CAPSLOCK));

        handle_raw_event(RawEvent::Key { code: Key::KEY_CAPSLOCK, pressed: false }, &mut dx, &mut dy, &mut qualifiers, &tx);
        assert!(qualifiers.contains(Qualifiers::CAPSLOCK));
    }

    #[test]
    fn home_key_reports_with_a_temporary_shift_bit() {
        let mut qualifiers = Qualifiers::empty();
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut dx = 0;
        let mut dy = 0;

        handle_raw_event(RawEvent::Key { code: Key::KEY_HOME, pressed: true }, &mut dx, &mut dy, &mut qualifiers, &tx);

        let packet = rx.recv_timeout(StdDuration::from_secs(1)).unwrap();
        let reported = u16::from_be_bytes([packet.data[4], packet.data[5]]);
        assert_eq!(reported & Qualifiers::LSHIFT.bits(), Qualifiers::LSHIFT.bits());
    }
}
