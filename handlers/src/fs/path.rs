// SPDX-License-Identifier: BSD-3-Clause

//! Turns a remote-supplied path plus an optional source lock into an
//! absolute host path, confined to the owning volume's root.

use std::path::{Path, PathBuf};

use crate::fs::lock::Lock;
use crate::fs::volume::Volume;

/// `resolve(vol, src_lock, raw_path)`. Strips any remote device prefix up
/// to and including the first `:`, then resolves the remainder relative to
/// `src_lock`'s path (or the volume root if there is none). The result
/// never escapes `vol.root`.
pub fn resolve(vol: &Volume, src_lock: Option<&Lock>, raw_path: &str) -> PathBuf {
    let after_prefix = match raw_path.find(':') {
        Some(pos) => &raw_path[pos + 1..],
        None => raw_path,
    };

    let base = match src_lock {
        Some(lock) => lock.abs_path.clone(),
        None => vol.root.clone(),
    };

    let joined = join_confined(&base, after_prefix);

    let root_str = vol.root.to_string_lossy();
    let joined_str = joined.to_string_lossy();
    if joined_str.is_empty() || joined_str == "/" || joined_str.len() < root_str.len() || !joined_str.starts_with(root_str.as_ref()) {
        vol.root.clone()
    } else {
        joined
    }
}

fn join_confined(base: &Path, extra: &str) -> PathBuf {
    let mut result = base.to_path_buf();
    for part in extra.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                result.pop();
            }
            other => result.push(other),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vol() -> Volume {
        Volume {
            id: 0,
            name: "Test".into(),
            root: PathBuf::from("/vol"),
            mounted: true,
        }
    }

    #[test]
    fn strips_device_prefix_and_joins_under_root() {
        let v = vol();
        assert_eq!(resolve(&v, None, "dh0:dir/file.txt"), PathBuf::from("/vol/dir/file.txt"));
    }

    #[test]
    fn empty_path_resolves_to_root() {
        let v = vol();
        assert_eq!(resolve(&v, None, ""), v.root);
    }

    #[test]
    fn cannot_escape_the_volume_root_via_dot_dot() {
        let v = vol();
        assert_eq!(resolve(&v, None, "../../etc/passwd"), v.root);
    }

    #[test]
    fn relative_to_a_source_lock() {
        let v = vol();
        let lock = Lock {
            id: 1,
            vol_id: 0,
            abs_path: PathBuf::from("/vol/sub"),
            mode: -2,
            freed: false,
        };
        assert_eq!(resolve(&v, Some(&lock), "child"), PathBuf::from("/vol/sub/child"));
    }
}
