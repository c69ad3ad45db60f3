// SPDX-License-Identifier: BSD-3-Clause

//! Encodes the `Hello` payload sent in response to `Init`.

/// Current protocol version advertised in `Hello`.
pub const SERVER_VERSION: u16 = 1;

/// Number of bytes reserved for each handler's zero-padded name.
const NAME_FIELD_LEN: usize = 10;

/// Encodes `u16 server_version · u16 handler_count · handler_count x (u16 id · 10
/// bytes name)`. `handlers` must already be sorted ascending by id -- the
/// session layer is responsible for that ordering.
pub fn encode_hello(handlers: &[(u16, &str)]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + handlers.len() * (2 + NAME_FIELD_LEN));
    buf.extend_from_slice(&SERVER_VERSION.to_be_bytes());
    buf.extend_from_slice(&(handlers.len() as u16).to_be_bytes());

    for (id, name) in handlers {
        buf.extend_from_slice(&id.to_be_bytes());
        let name_bytes = name.as_bytes();
        let take = name_bytes.len().min(NAME_FIELD_LEN);
        buf.extend_from_slice(&name_bytes[..take]);
        buf.resize(buf.len() + (NAME_FIELD_LEN - take), 0);
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_the_documented_handshake_payload() {
        let payload = encode_hello(&[(1, "PING"), (2, "DATE"), (3, "INPUT"), (4, "FS")]);

        let mut expected = vec![0x00, 0x01, 0x00, 0x04];
        expected.extend_from_slice(&[0x00, 0x01]);
        expected.extend_from_slice(b"PING\0\0\0\0\0\0");
        expected.extend_from_slice(&[0x00, 0x02]);
        expected.extend_from_slice(b"DATE\0\0\0\0\0\0");
        expected.extend_from_slice(&[0x00, 0x03]);
        expected.extend_from_slice(b"INPUT\0\0\0\0\0");
        expected.extend_from_slice(&[0x00, 0x04]);
        expected.extend_from_slice(b"FS\0\0\0\0\0\0\0\0");

        assert_eq!(payload, expected);
    }

    #[test]
    fn truncates_names_longer_than_the_field() {
        let payload = encode_hello(&[(9, "WAYTOOLONGNAME")]);
        assert_eq!(&payload[4..6], &[0x00, 0x09]);
        assert_eq!(&payload[6..16], b"WAYTOOLONG");
    }
}
