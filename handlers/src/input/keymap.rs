// SPDX-License-Identifier: BSD-3-Clause

//! Translation from Linux input key codes to the remote's raw keyboard scan
//! codes, and the persistent qualifier-mask bits those keys set.

use evdev::Key;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Qualifiers: u16 {
        const LSHIFT   = 0x0001;
        const RSHIFT   = 0x0002;
        const CAPSLOCK = 0x0004;
        const CTRL     = 0x0008;
        const LALT     = 0x0010;
        const RALT     = 0x0020;
        const LMETA    = 0x0040;
        const RMETA    = 0x0080;
    }
}

/// If a key press or release changes the qualifier mask, returns the bit it
/// affects. `CAPSLOCK` is a toggle applied only on press; the caller must
/// not clear it on release.
pub fn qualifier_bit(key: Key) -> Option<Qualifiers> {
    match key {
        Key::KEY_LEFTSHIFT => Some(Qualifiers::LSHIFT),
        Key::KEY_RIGHTSHIFT => Some(Qualifiers::RSHIFT),
        Key::KEY_LEFTCTRL | Key::KEY_RIGHTCTRL => Some(Qualifiers::CTRL),
        Key::KEY_LEFTALT => Some(Qualifiers::LALT),
        Key::KEY_RIGHTALT => Some(Qualifiers::RALT),
        Key::KEY_LEFTMETA => Some(Qualifiers::LMETA),
        Key::KEY_RIGHTMETA => Some(Qualifiers::RMETA),
        Key::KEY_CAPSLOCK => Some(Qualifiers::CAPSLOCK),
        _ => None,
    }
}

/// Cursor keys that report themselves with a temporary `LSHIFT` bit OR'd
/// into their qualifier mask, independent of the real shift state.
pub fn reports_with_temporary_shift(key: Key) -> bool {
    matches!(
        key,
        Key::KEY_HOME | Key::KEY_PAGEUP | Key::KEY_END | Key::KEY_PAGEDOWN
    )
}

/// Looks up the remote's raw scan code for a key. `None` for keys with no
/// mapping (function keys beyond the mapped range, media keys, and so on).
pub fn translate(key: Key) -> Option<u16> {
    let code = match key {
        Key::KEY_A => 0x20,
        Key::KEY_B => 0x35,
        Key::KEY_C => 0x33,
        Key::KEY_D => 0x22,
        Key::KEY_E => 0x12,
        Key::KEY_F => 0x23,
        Key::KEY_G => 0x24,
        Key::KEY_H => 0x25,
        Key::KEY_I => 0x17,
        Key::KEY_J => 0x26,
        Key::KEY_K => 0x27,
        Key::KEY_L => 0x28,
        Key::KEY_M => 0x37,
        Key::KEY_N => 0x36,
        Key::KEY_O => 0x18,
        Key::KEY_P => 0x19,
        Key::KEY_Q => 0x10,
        Key::KEY_R => 0x13,
        Key::KEY_S => 0x21,
        Key::KEY_T => 0x14,
        Key::KEY_U => 0x16,
        Key::KEY_V => 0x34,
        Key::KEY_W => 0x11,
        Key::KEY_X => 0x32,
        Key::KEY_Y => 0x15,
        Key::KEY_Z => 0x31,
        Key::KEY_0 => 0x0a,
        Key::KEY_1 => 0x01,
        Key::KEY_2 => 0x02,
        Key::KEY_3 => 0x03,
        Key::KEY_4 => 0x04,
        Key::KEY_5 => 0x05,
        Key::KEY_6 => 0x06,
        Key::KEY_7 => 0x07,
        Key::KEY_8 => 0x08,
        Key::KEY_9 => 0x09,
        Key::KEY_SPACE => 0x40,
        Key::KEY_ENTER => 0x44,
        Key::KEY_TAB => 0x42,
        Key::KEY_BACKSPACE => 0x41,
        Key::KEY_ESC => 0x45,
        Key::KEY_UP => 0x4c,
        Key::KEY_DOWN => 0x4d,
        Key::KEY_LEFT => 0x4f,
        Key::KEY_RIGHT => 0x4e,
        Key::KEY_HOME => 0x70,
        Key::KEY_END => 0x71,
        Key::KEY_PAGEUP => 0x72,
        Key::KEY_PAGEDOWN => 0x73,
        Key::KEY_DELETE => 0x46,
        Key::KEY_F1 => 0x50,
        Key::KEY_F2 => 0x51,
        Key::KEY_F3 => 0x52,
        Key::KEY_F4 => 0x53,
        Key::KEY_F5 => 0x54,
        Key::KEY_F6 => 0x55,
        Key::KEY_F7 => 0x56,
        Key::KEY_F8 => 0x57,
        Key::KEY_F9 => 0x58,
        Key::KEY_F10 => 0x59,
        Key::KEY_MINUS => 0x0b,
        Key::KEY_EQUAL => 0x0c,
        Key::KEY_LEFTBRACE => 0x1a,
        Key::KEY_RIGHTBRACE => 0x1b,
        Key::KEY_SEMICOLON => 0x29,
        Key::KEY_APOSTROPHE => 0x2a,
        Key::KEY_COMMA => 0x38,
        Key::KEY_DOT => 0x39,
        Key::KEY_SLASH => 0x3a,
        Key::KEY_GRAVE => 0x00,
        _ => return None,
    };
    Some(code)
}

/// Value a key's `key` field carries on release: the scan code OR'd with
/// this bit.
pub const RELEASE_BIT: u16 = 0x80;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_are_mapped() {
        assert_eq!(translate(Key::KEY_A), Some(0x20));
    }

    #[test]
    fn unmapped_keys_return_none() {
        assert_eq!(translate(Key::KEY_KPSLASH), None);
    }

    #[test]
    fn shift_keys_set_distinct_bits() {
        assert_eq!(qualifier_bit(Key::KEY_LEFTSHIFT), Some(Qualifiers::LSHIFT));
        assert_eq!(qualifier_bit(Key::KEY_RIGHTSHIFT), Some(Qualifiers::RSHIFT));
    }

    #[test]
    fn cursor_keys_request_temporary_shift() {
        assert!(reports_with_temporary_shift(Key::KEY_HOME));
        assert!(!reports_with_temporary_shift(Key::KEY_A));
    }
}
