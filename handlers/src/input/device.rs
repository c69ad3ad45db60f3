// SPDX-License-Identifier: BSD-3-Clause

//! Classifies enumerated input devices as mice or keyboards.

use evdev::{Device, Key, RelativeAxisType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Mouse,
    Keyboard,
}

/// A device is a mouse if it reports relative X/Y motion and has both the
/// left and right mouse buttons; a keyboard if it reports key codes but
/// isn't a mouse. Anything else (touchpads exposing only absolute axes,
/// joysticks, etc.) is not classified.
pub fn classify(device: &Device) -> Option<Kind> {
    let axes = device.supported_relative_axes();
    let keys = device.supported_keys();

    let is_mouse = axes.is_some_and(|a| a.contains(RelativeAxisType::REL_X) && a.contains(RelativeAxisType::REL_Y))
        && keys.is_some_and(|k| k.contains(Key::BTN_LEFT) && k.contains(Key::BTN_RIGHT));

    if is_mouse {
        return Some(Kind::Mouse);
    }

    if keys.is_some_and(|k| k.iter().any(|key| key.code() >= Key::KEY_ESC.code())) {
        return Some(Kind::Keyboard);
    }

    None
}
