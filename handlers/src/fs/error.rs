// SPDX-License-Identifier: BSD-3-Clause

//! Maps host I/O errors onto the remote's DOS-style error codes.

use std::io;

pub const ERROR_OBJECT_NOT_FOUND: i32 = 205;
pub const ERROR_OBJECT_IN_USE: i32 = 202;
pub const ERROR_DIR_NOT_FOUND: i32 = 204;
pub const ERROR_OBJECT_EXISTS: i32 = 203;
pub const ERROR_OBJECT_WRONG_TYPE: i32 = 212;
pub const ERROR_NO_MORE_ENTRIES: i32 = 232;
pub const ERROR_DEVICE_NOT_MOUNTED: i32 = 218;

pub fn from_io(e: &io::Error) -> i32 {
    match e.kind() {
        io::ErrorKind::NotFound => ERROR_OBJECT_NOT_FOUND,
        io::ErrorKind::PermissionDenied => ERROR_OBJECT_IN_USE,
        io::ErrorKind::AlreadyExists => ERROR_OBJECT_EXISTS,
        io::ErrorKind::NotADirectory => ERROR_DIR_NOT_FOUND,
        _ => ERROR_OBJECT_NOT_FOUND,
    }
}
