// SPDX-License-Identifier: BSD-3-Clause

//! Wire layout for filesystem requests and replies, the direct translation
//! of `fshandler.go`'s `FSRequest`/`FSReply`.

pub const HEADER_LEN: usize = 26;

#[derive(Debug)]
pub struct FsRequest {
    pub req_id: u32,
    pub arg1: i32,
    pub arg2: i32,
    pub arg3: i32,
    pub arg4: i32,
    pub vol_id: u16,
    pub req_type: u16,
    pub str_data: Vec<u8>,
}

impl FsRequest {
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_LEN {
            return None;
        }
        let req_id = u32::from_be_bytes(data[0..4].try_into().ok()?);
        let arg1 = i32::from_be_bytes(data[4..8].try_into().ok()?);
        let arg2 = i32::from_be_bytes(data[8..12].try_into().ok()?);
        let arg3 = i32::from_be_bytes(data[12..16].try_into().ok()?);
        let arg4 = i32::from_be_bytes(data[16..20].try_into().ok()?);
        let vol_id = u16::from_be_bytes(data[20..22].try_into().ok()?);
        let req_type = u16::from_be_bytes(data[22..24].try_into().ok()?);
        let data_len = u16::from_be_bytes(data[24..26].try_into().ok()?) as usize;
        let str_data = data.get(HEADER_LEN..HEADER_LEN + data_len)?.to_vec();

        Some(Self {
            req_id,
            arg1,
            arg2,
            arg3,
            arg4,
            vol_id,
            req_type,
            str_data,
        })
    }

    /// Reads a length-prefixed string out of `str_data` at `offset`: one
    /// byte of length followed by that many bytes of UTF-8 (best effort).
    pub fn string_at(&self, offset: i32) -> String {
        let offset = offset.max(0) as usize;
        let Some(&len) = self.str_data.get(offset) else {
            return String::new();
        };
        let start = offset + 1;
        let end = start + len as usize;
        self.str_data
            .get(start..end)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct FsReply {
    pub req_id: u32,
    pub res1: i32,
    pub res2: i32,
    pub data: Vec<u8>,
}

impl FsReply {
    pub fn new(req_id: u32, res1: i32, res2: i32) -> Self {
        Self {
            req_id,
            res1,
            res2,
            data: Vec::new(),
        }
    }

    pub fn with_data(req_id: u32, res1: i32, res2: i32, data: Vec<u8>) -> Self {
        Self { req_id, res1, res2, data }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN - 4 + self.data.len());
        out.extend_from_slice(&self.req_id.to_be_bytes());
        out.extend_from_slice(&self.res1.to_be_bytes());
        out.extend_from_slice(&self.res2.to_be_bytes());
        out.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.data);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(req_id: u32, arg1: i32, vol_id: u16, req_type: u16, str_data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&req_id.to_be_bytes());
        out.extend_from_slice(&arg1.to_be_bytes());
        out.extend_from_slice(&0i32.to_be_bytes());
        out.extend_from_slice(&0i32.to_be_bytes());
        out.extend_from_slice(&0i32.to_be_bytes());
        out.extend_from_slice(&vol_id.to_be_bytes());
        out.extend_from_slice(&req_type.to_be_bytes());
        out.extend_from_slice(&(str_data.len() as u16).to_be_bytes());
        out.extend_from_slice(str_data);
        out
    }

    #[test]
    fn parses_header_and_trailing_string_data() {
        let mut str_data = vec![5u8];
        str_data.extend_from_slice(b"hello");
        let raw = header(42, 7, 0, 8, &str_data);

        let req = FsRequest::parse(&raw).unwrap();
        assert_eq!(req.req_id, 42);
        assert_eq!(req.arg1, 7);
        assert_eq!(req.req_type, 8);
        assert_eq!(req.string_at(0), "hello");
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(FsRequest::parse(&[0u8; 10]).is_none());
    }

    #[test]
    fn reply_round_trips_through_encode() {
        let reply = FsReply::with_data(1, -2, 0, vec![1, 2, 3]);
        let encoded = reply.encode();
        assert_eq!(&encoded[0..4], &1u32.to_be_bytes());
        assert_eq!(&encoded[4..8], &(-2i32).to_be_bytes());
        assert_eq!(&encoded[12..14], &3u16.to_be_bytes());
        assert_eq!(&encoded[14..], &[1, 2, 3]);
    }
}
