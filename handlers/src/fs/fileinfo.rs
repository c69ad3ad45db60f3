// SPDX-License-Identifier: BSD-3-Clause

//! Encodes the FileInfoBlock the remote expects from EXAMINE_OBJECT,
//! EXAMINE_NEXT and INFO, mirroring `fshandler.go`'s `writeFileInfo`.

use std::fs::Metadata;
use std::path::Path;

use chrono::{Local, TimeZone, Timelike};

pub const DIR_ENTRY_FILE: i32 = -3;
pub const DIR_ENTRY_SUBDIR: i32 = 1;
pub const DIR_ENTRY_ROOT: i32 = 2;

const NAME_FIELD_LEN: usize = 108;
const MAX_NAME_LEN: usize = 30;
const COMMENT_FIELD_LEN: usize = 80;
const BLOCK_SIZE: i32 = 512;

/// `is_root` marks whether `name`/`metadata` describe a volume's root
/// directory, which the remote's DOS reports as entry type 2 rather than
/// the ordinary subdirectory type 1.
pub fn encode(disk_key: i32, name: &str, metadata: &Metadata, is_root: bool) -> Vec<u8> {
    let is_dir = metadata.is_dir();
    let entry_type = if !is_dir {
        DIR_ENTRY_FILE
    } else if is_root {
        DIR_ENTRY_ROOT
    } else {
        DIR_ENTRY_SUBDIR
    };
    let size = if is_dir { 0 } else { metadata.len() as i32 };
    let num_blocks = if is_dir { 0 } else { (size + BLOCK_SIZE - 1) / BLOCK_SIZE };
    let (days, minutes, ticks) = amiga_timestamp(metadata);

    let mut out = Vec::with_capacity(4 + 4 + NAME_FIELD_LEN + 4 + 4 + 4 + 4 + 4 + 4 + 4 + COMMENT_FIELD_LEN);
    out.extend_from_slice(&disk_key.to_be_bytes());
    out.extend_from_slice(&entry_type.to_be_bytes());
    out.extend_from_slice(&encode_name_field(name));
    out.extend_from_slice(&0i32.to_be_bytes()); // protection
    out.extend_from_slice(&entry_type.to_be_bytes());
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(&num_blocks.to_be_bytes());
    out.extend_from_slice(&days.to_be_bytes());
    out.extend_from_slice(&minutes.to_be_bytes());
    out.extend_from_slice(&ticks.to_be_bytes());
    out.extend_from_slice(&[0u8; COMMENT_FIELD_LEN]);
    out
}

fn encode_name_field(name: &str) -> [u8; NAME_FIELD_LEN] {
    let mut field = [0u8; NAME_FIELD_LEN];
    let bytes = name.as_bytes();
    let len = bytes.len().min(MAX_NAME_LEN);
    field[0] = len as u8;
    field[1..1 + len].copy_from_slice(&bytes[..len]);
    field
}

/// Days since 1978-01-01 local, minutes within the day, and 1/50s ticks
/// within the minute -- the three-word date encoding the remote's DOS
/// expects.
fn amiga_timestamp(metadata: &Metadata) -> (i32, i32, i32) {
    let modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let local = Local
        .timestamp_opt(modified, 0)
        .single()
        .unwrap_or_else(|| Local.timestamp_opt(0, 0).single().unwrap());
    let epoch = Local.with_ymd_and_hms(1978, 1, 1, 0, 0, 0).single().unwrap();

    let days = (local.date_naive() - epoch.date_naive()).num_days() as i32;
    let minutes = local.hour() as i32 * 60 + local.minute() as i32;
    let ticks = local.second() as i32 * 50;

    (days.max(0), minutes, ticks)
}

pub fn path_display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn name_field_carries_a_length_prefix() {
        let field = encode_name_field("hello.txt");
        assert_eq!(field[0], 9);
        assert_eq!(&field[1..10], b"hello.txt");
    }

    #[test]
    fn name_field_truncates_overlong_names() {
        let long = "x".repeat(200);
        let field = encode_name_field(&long);
        assert_eq!(field[0] as usize, MAX_NAME_LEN);
    }

    #[test]
    fn encodes_a_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("a.txt");
        let mut f = std::fs::File::create(&file_path).unwrap();
        f.write_all(b"12345").unwrap();
        let metadata = std::fs::metadata(&file_path).unwrap();

        let block = encode(7, "a.txt", &metadata, false);
        assert_eq!(&block[0..4], &7i32.to_be_bytes());
        assert_eq!(&block[4..8], &DIR_ENTRY_FILE.to_be_bytes());
        assert_eq!(block[8], 5);
        assert_eq!(&block[8 + NAME_FIELD_LEN..8 + NAME_FIELD_LEN], &[] as &[u8]);
    }
}
