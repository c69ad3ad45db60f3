// SPDX-License-Identifier: BSD-3-Clause

//! Remote-visible locks on a resolved path. The direct translation of
//! `fshandler.go`'s `fsLock`.

use std::path::PathBuf;

pub const SHARED: i32 = -2;
pub const EXCLUSIVE: i32 = -1;

#[derive(Debug, Clone)]
pub struct Lock {
    pub id: i32,
    pub vol_id: u16,
    pub abs_path: PathBuf,
    pub mode: i32,
    /// Set by `FREE_LOCK` on a `SHARED` lock instead of removing the entry.
    /// Nothing else consults it except `create`, which still treats a
    /// freed lock as occupying its path -- preserved exactly as the
    /// original behaves, quirk and all.
    pub freed: bool,
}
