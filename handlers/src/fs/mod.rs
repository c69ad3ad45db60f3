// SPDX-License-Identifier: BSD-3-Clause

//! The filesystem service. Dispatches every request type `fshandler.go`
//! implements onto the host filesystem, confined to the configured volume
//! roots.

mod error;
mod fileinfo;
mod lock;
mod path;
mod request;
mod volume;

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write as IoWrite};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};
use log::warn;

use protocol::{InPacket, PacketType};
use session::{Handler, HandlerOutPacket};

use lock::Lock;
use request::{FsReply, FsRequest};
use volume::{MountEvent, MountWatcher, Volume, VolumeTable};

const MOUNT_POLL_TICK: Duration = Duration::from_millis(500);

const LOCATE_OBJECT: u16 = 8;
const FREE_LOCK: u16 = 15;
const DELETE_OBJECT: u16 = 16;
const RENAME_OBJECT: u16 = 17;
const CREATE_DIR: u16 = 22;
const EXAMINE_OBJECT: u16 = 23;
const EXAMINE_NEXT: u16 = 24;
const DISK_INFO: u16 = 25;
const INFO: u16 = 26;
const PARENT: u16 = 29;
const SAME_LOCK: u16 = 40;
const READ: u16 = 82;
const WRITE: u16 = 87;
const FIND_UPDATE: u16 = 1004;
const FIND_INPUT: u16 = 1005;
const FIND_OUTPUT: u16 = 1006;
const END: u16 = 1007;
const SEEK: u16 = 1008;
const FH_FROM_LOCK: u16 = 1026;
const PARENT_FH: u16 = 1031;
const EXAMINE_FH: u16 = 1034;

const READ_CHUNK: usize = 512;

const MOUNT_NOTIFICATION: u32 = 0xFFFF_FFFF;
const UNMOUNT_NOTIFICATION: u32 = 0xFFFF_FFFE;

struct FileHandle {
    vol_id: u16,
    path: PathBuf,
    file: File,
}

pub struct FsHandler {
    media_root: PathBuf,
    volumes: Arc<Mutex<VolumeTable>>,
    locks: HashMap<i32, Lock>,
    files: HashMap<i32, FileHandle>,
    next_id: i32,
    out: Option<Sender<HandlerOutPacket>>,
    shutdown: Option<Sender<()>>,
    watcher: Option<std::thread::JoinHandle<()>>,
}

impl FsHandler {
    pub fn new(default_root: PathBuf, media_root: PathBuf) -> Self {
        Self {
            media_root,
            volumes: Arc::new(Mutex::new(VolumeTable::new(default_root))),
            locks: HashMap::new(),
            files: HashMap::new(),
            next_id: 1,
            out: None,
            shutdown: None,
            watcher: None,
        }
    }

    fn alloc_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn src_lock(&self, id: i32) -> Option<&Lock> {
        if id == 0 {
            None
        } else {
            self.locks.get(&id)
        }
    }

    fn volume(&self, id: u16) -> Option<Volume> {
        self.volumes.lock().unwrap().get(id).cloned()
    }

    fn dispatch(&mut self, req: &FsRequest) -> FsReply {
        let Some(vol) = self.volume(req.vol_id) else {
            return FsReply::new(req.req_id, -1, error::ERROR_DEVICE_NOT_MOUNTED);
        };

        match req.req_type {
            LOCATE_OBJECT => self.locate_object(req, &vol),
            FREE_LOCK => self.free_lock(req),
            DELETE_OBJECT => self.delete_object(req, &vol),
            RENAME_OBJECT => self.rename_object(req, &vol),
            CREATE_DIR => self.create_dir(req, &vol),
            EXAMINE_OBJECT => self.examine_object(req, &vol),
            EXAMINE_NEXT => self.examine_next(req, &vol),
            DISK_INFO | INFO => self.disk_info(req, &vol),
            PARENT => self.parent(req, &vol),
            SAME_LOCK => self.same_lock(req),
            READ => self.read(req),
            WRITE => self.write(req),
            FIND_UPDATE | FIND_INPUT | FIND_OUTPUT => self.open_file(req, &vol),
            END => self.end(req),
            SEEK => self.seek(req),
            FH_FROM_LOCK => self.fh_from_lock(req),
            PARENT_FH => self.parent_fh(req, &vol),
            EXAMINE_FH => self.examine_fh(req, &vol),
            other => {
                warn!("unhandled fs request type {other}");
                FsReply::new(req.req_id, -1, error::ERROR_OBJECT_NOT_FOUND)
            }
        }
    }

    fn locate_object(&mut self, req: &FsRequest, vol: &Volume) -> FsReply {
        let name = req.string_at(req.arg2);
        let src = self.src_lock(req.arg1).cloned();
        let abs_path = path::resolve(vol, src.as_ref(), &name);

        if !abs_path.exists() {
            return FsReply::new(req.req_id, -1, error::ERROR_OBJECT_NOT_FOUND);
        }

        let id = self.alloc_id();
        self.locks.insert(
            id,
            Lock {
                id,
                vol_id: req.vol_id,
                abs_path,
                mode: req.arg3,
                freed: false,
            },
        );
        FsReply::new(req.req_id, id, 0)
    }

    fn free_lock(&mut self, req: &FsRequest) -> FsReply {
        let id = req.arg1;
        if let Some(lock) = self.locks.get_mut(&id) {
            if lock.mode == lock::SHARED {
                lock.freed = true;
            } else {
                self.locks.remove(&id);
            }
        }
        FsReply::new(req.req_id, -1, 0)
    }

    fn delete_object(&mut self, req: &FsRequest, vol: &Volume) -> FsReply {
        let name = req.string_at(0);
        let src = self.src_lock(req.arg1).cloned();
        let abs_path = path::resolve(vol, src.as_ref(), &name);

        let result = if abs_path.is_dir() {
            std::fs::remove_dir(&abs_path)
        } else {
            std::fs::remove_file(&abs_path)
        };

        match result {
            Ok(()) => FsReply::new(req.req_id, -1, 0),
            Err(e) => FsReply::new(req.req_id, -1, error::from_io(&e)),
        }
    }

    fn rename_object(&mut self, req: &FsRequest, vol: &Volume) -> FsReply {
        let old_name = req.string_at(0);
        let new_name = req.string_at(req.arg2);
        let src = self.src_lock(req.arg1).cloned();
        let old_path = path::resolve(vol, src.as_ref(), &old_name);
        let new_path = path::resolve(vol, src.as_ref(), &new_name);

        match std::fs::rename(&old_path, &new_path) {
            Ok(()) => FsReply::new(req.req_id, -1, 0),
            Err(e) => FsReply::new(req.req_id, -1, error::from_io(&e)),
        }
    }

    fn create_dir(&mut self, req: &FsRequest, vol: &Volume) -> FsReply {
        let name = req.string_at(0);
        let src = self.src_lock(req.arg1).cloned();
        let abs_path = path::resolve(vol, src.as_ref(), &name);

        if abs_path.exists() {
            return FsReply::new(req.req_id, -1, error::ERROR_OBJECT_EXISTS);
        }

        match std::fs::create_dir(&abs_path) {
            Ok(()) => {
                let id = self.alloc_id();
                self.locks.insert(
                    id,
                    Lock {
                        id,
                        vol_id: req.vol_id,
                        abs_path,
                        mode: lock::EXCLUSIVE,
                        freed: false,
                    },
                );
                FsReply::new(req.req_id, id, 0)
            }
            Err(e) => FsReply::new(req.req_id, -1, error::from_io(&e)),
        }
    }

    fn examine_object(&mut self, req: &FsRequest, vol: &Volume) -> FsReply {
        let Some(lock) = self.locks.get(&req.arg1) else {
            return FsReply::new(req.req_id, -1, error::ERROR_OBJECT_NOT_FOUND);
        };
        let Ok(metadata) = std::fs::metadata(&lock.abs_path) else {
            return FsReply::new(req.req_id, -1, error::ERROR_OBJECT_NOT_FOUND);
        };
        let (name, is_root) = entry_name(&lock.abs_path, vol);
        let block = fileinfo::encode(0, &name, &metadata, is_root);
        FsReply::with_data(req.req_id, 0, 0, block)
    }

    /// Re-lists the lock's directory and indexes into it by `arg2` on every
    /// call; the remote drives iteration by incrementing `arg2` itself.
    fn examine_next(&mut self, req: &FsRequest, vol: &Volume) -> FsReply {
        let Some(lock) = self.locks.get(&req.arg1) else {
            return FsReply::new(req.req_id, -1, error::ERROR_OBJECT_NOT_FOUND);
        };
        let entries = list_dir(&lock.abs_path);
        let idx = req.arg2.max(0) as usize;
        let Some(entry_path) = entries.get(idx) else {
            return FsReply::new(req.req_id, -1, error::ERROR_NO_MORE_ENTRIES);
        };
        let Ok(metadata) = std::fs::metadata(entry_path) else {
            return FsReply::new(req.req_id, -1, error::ERROR_OBJECT_NOT_FOUND);
        };
        let (name, is_root) = entry_name(entry_path, vol);
        let block = fileinfo::encode(req.arg2 + 1, &name, &metadata, is_root);
        FsReply::with_data(req.req_id, 0, 0, block)
    }

    fn disk_info(&mut self, req: &FsRequest, _vol: &Volume) -> FsReply {
        // The remote only displays these figures; it never acts on them,
        // so they're fixed values rather than a real statvfs query.
        let mut data = Vec::with_capacity(8);
        data.extend_from_slice(&100_000i32.to_be_bytes());
        data.extend_from_slice(&1_000i32.to_be_bytes());
        FsReply::with_data(req.req_id, 0, 0, data)
    }

    fn parent(&mut self, req: &FsRequest, vol: &Volume) -> FsReply {
        let Some(lock) = self.locks.get(&req.arg1) else {
            return FsReply::new(req.req_id, -1, error::ERROR_OBJECT_NOT_FOUND);
        };
        let parent_path = lock
            .abs_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| vol.root.clone());
        let confined = if parent_path.starts_with(&vol.root) {
            parent_path
        } else {
            vol.root.clone()
        };
        let vol_id = lock.vol_id;

        let id = self.alloc_id();
        self.locks.insert(
            id,
            Lock {
                id,
                vol_id,
                abs_path: confined,
                mode: lock::SHARED,
                freed: false,
            },
        );
        FsReply::new(req.req_id, id, 0)
    }

    fn same_lock(&mut self, req: &FsRequest) -> FsReply {
        let a = self.locks.get(&req.arg1).map(|l| &l.abs_path);
        let b = self.locks.get(&req.arg2).map(|l| &l.abs_path);
        let same = matches!((a, b), (Some(a), Some(b)) if a == b);
        FsReply::new(req.req_id, if same { -1 } else { 0 }, 0)
    }

    fn open_file(&mut self, req: &FsRequest, vol: &Volume) -> FsReply {
        let name = req.string_at(req.arg3);
        let src = self.src_lock(req.arg2).cloned();
        let abs_path = path::resolve(vol, src.as_ref(), &name);

        if let Ok(metadata) = std::fs::metadata(&abs_path) {
            if !metadata.is_file() {
                return FsReply::new(req.req_id, 0, error::ERROR_OBJECT_WRONG_TYPE);
            }
        }

        let mut options = std::fs::OpenOptions::new();
        match req.req_type {
            FIND_INPUT => {
                options.read(true);
            }
            FIND_OUTPUT => {
                options.write(true).create(true).truncate(true);
            }
            _ => {
                options.read(true).write(true).create(true);
            }
        }

        match options.open(&abs_path) {
            Ok(file) => {
                let id = self.alloc_id();
                self.files.insert(
                    id,
                    FileHandle {
                        vol_id: req.vol_id,
                        path: abs_path,
                        file,
                    },
                );
                FsReply::new(req.req_id, -1, id)
            }
            Err(e) => FsReply::new(req.req_id, 0, error::from_io(&e)),
        }
    }

    fn end(&mut self, req: &FsRequest) -> FsReply {
        self.files.remove(&req.arg1);
        FsReply::new(req.req_id, 0, 0)
    }

    fn seek(&mut self, req: &FsRequest) -> FsReply {
        let Some(handle) = self.files.get_mut(&req.arg1) else {
            return FsReply::new(req.req_id, -1, error::ERROR_OBJECT_NOT_FOUND);
        };
        let whence = match req.arg3 {
            1 => SeekFrom::Current(req.arg2 as i64),
            2 => SeekFrom::End(req.arg2 as i64),
            _ => SeekFrom::Start(req.arg2.max(0) as u64),
        };
        match handle.file.seek(whence) {
            Ok(pos) => FsReply::new(req.req_id, pos as i32, 0),
            Err(e) => FsReply::new(req.req_id, -1, error::from_io(&e)),
        }
    }

    fn read(&mut self, req: &FsRequest) -> FsReply {
        let Some(handle) = self.files.get_mut(&req.arg1) else {
            return FsReply::new(req.req_id, -1, error::ERROR_OBJECT_NOT_FOUND);
        };
        let want = (req.arg3.max(0) as usize).min(READ_CHUNK);
        let mut buf = vec![0u8; want];
        match handle.file.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                let res2 = if n < want { -1 } else { 0 };
                FsReply::with_data(req.req_id, n as i32, res2, buf)
            }
            Err(e) => FsReply::new(req.req_id, -1, error::from_io(&e)),
        }
    }

    fn write(&mut self, req: &FsRequest) -> FsReply {
        let Some(handle) = self.files.get_mut(&req.arg1) else {
            return FsReply::new(req.req_id, -1, error::ERROR_OBJECT_NOT_FOUND);
        };
        match handle.file.write(&req.str_data) {
            Ok(n) => FsReply::new(req.req_id, n as i32, 0),
            Err(e) => FsReply::new(req.req_id, -1, error::from_io(&e)),
        }
    }

    fn fh_from_lock(&mut self, req: &FsRequest) -> FsReply {
        let Some(lock) = self.locks.get(&req.arg2) else {
            return FsReply::new(req.req_id, -1, error::ERROR_OBJECT_NOT_FOUND);
        };
        let vol_id = lock.vol_id;
        let path = lock.abs_path.clone();
        match File::open(&path) {
            Ok(file) => {
                let id = self.alloc_id();
                self.files.insert(
                    id,
                    FileHandle {
                        vol_id,
                        path,
                        file,
                    },
                );
                FsReply::new(req.req_id, id, 0)
            }
            Err(e) => FsReply::new(req.req_id, -1, error::from_io(&e)),
        }
    }

    fn parent_fh(&mut self, req: &FsRequest, vol: &Volume) -> FsReply {
        let Some(lock) = self.locks.get(&req.arg2) else {
            return FsReply::new(req.req_id, -1, error::ERROR_OBJECT_NOT_FOUND);
        };
        let parent_path = lock
            .abs_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| vol.root.clone());
        let confined = if parent_path.starts_with(&vol.root) {
            parent_path
        } else {
            vol.root.clone()
        };
        let vol_id = lock.vol_id;

        let id = self.alloc_id();
        self.locks.insert(
            id,
            Lock {
                id,
                vol_id,
                abs_path: confined,
                mode: req.arg3,
                freed: false,
            },
        );
        FsReply::new(req.req_id, id, 0)
    }

    fn examine_fh(&mut self, req: &FsRequest, vol: &Volume) -> FsReply {
        let Some(handle) = self.files.get(&req.arg1) else {
            return FsReply::new(req.req_id, -1, error::ERROR_OBJECT_NOT_FOUND);
        };
        let Ok(metadata) = handle.file.metadata() else {
            return FsReply::new(req.req_id, -1, error::ERROR_OBJECT_NOT_FOUND);
        };
        let (name, is_root) = entry_name(&handle.path, vol);
        let block = fileinfo::encode(req.arg1, &name, &metadata, is_root);
        FsReply::with_data(req.req_id, 0, 0, block)
    }
}

fn list_dir(dir: &std::path::Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| entries.flatten().map(|e| e.path()).collect())
        .unwrap_or_default();
    entries.sort();
    entries
}

/// The name and root-ness to report for `path` in a FileInfoBlock: a
/// volume's root reports the volume's own name rather than its last path
/// component.
fn entry_name(path: &std::path::Path, vol: &Volume) -> (String, bool) {
    if path == vol.root {
        (vol.name.clone(), true)
    } else {
        (fileinfo::path_display_name(path), false)
    }
}

fn send(out: &Sender<HandlerOutPacket>, data: Vec<u8>) {
    let _ = out.send(HandlerOutPacket {
        packet_type: PacketType::Data,
        data,
    });
}

fn encode_mount_notification(vol_id: u16, name: &str) -> Vec<u8> {
    let mut data = MOUNT_NOTIFICATION.to_be_bytes().to_vec();
    data.extend_from_slice(&vol_id.to_be_bytes());
    data.extend_from_slice(name.as_bytes());
    data.push(0);
    data
}

fn encode_unmount_notification(vol_id: u16) -> Vec<u8> {
    let mut data = UNMOUNT_NOTIFICATION.to_be_bytes().to_vec();
    data.extend_from_slice(&vol_id.to_be_bytes());
    data
}

impl Handler for FsHandler {
    fn init(&mut self, out: Sender<HandlerOutPacket>) {
        {
            let mut table = self.volumes.lock().unwrap();
            for event in volume::scan_existing(&self.media_root, &mut table) {
                if let MountEvent::Mounted { vol_id, name } = event {
                    send(&out, encode_mount_notification(vol_id, &name));
                }
            }
        }

        let watcher = match MountWatcher::new(&self.media_root) {
            Ok(w) => Some(w),
            Err(e) => {
                warn!("could not watch {}: {e}", self.media_root.display());
                None
            }
        };

        let (shutdown_tx, shutdown_rx) = bounded(1);
        self.shutdown = Some(shutdown_tx);
        self.out = Some(out.clone());

        if let Some(watcher) = watcher {
            let volumes = self.volumes.clone();
            self.watcher = Some(std::thread::spawn(move || {
                let ticker = tick(MOUNT_POLL_TICK);
                loop {
                    select! {
                        recv(shutdown_rx) -> _ => return,
                        recv(ticker) -> _ => {
                            let mut table = volumes.lock().unwrap();
                            for event in watcher.poll(&mut table) {
                                match event {
                                    MountEvent::Mounted { vol_id, name } => {
                                        send(&out, encode_mount_notification(vol_id, &name));
                                    }
                                    MountEvent::Unmounted { vol_id } => {
                                        send(&out, encode_unmount_notification(vol_id));
                                    }
                                }
                            }
                        }
                    }
                }
            }));
        }
    }

    fn handle_packet(&mut self, packet: InPacket) {
        let Some(req) = FsRequest::parse(&packet.data) else {
            warn!("malformed fs request, dropping");
            return;
        };
        let reply = self.dispatch(&req);
        if let Some(out) = self.out.clone() {
            send(&out, reply.encode());
        }
    }

    fn quit(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(h) = self.watcher.take() {
            let _ = h.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(root: PathBuf) -> FsHandler {
        FsHandler::new(root, PathBuf::from("/nonexistent-media-root"))
    }

    fn req(req_type: u16, arg1: i32, vol_id: u16, str_data: &[u8]) -> FsRequest {
        FsRequest {
            req_id: 1,
            arg1,
            arg2: 0,
            arg3: 0,
            arg4: 0,
            vol_id,
            req_type,
            str_data: str_data.to_vec(),
        }
    }

    fn string_field(s: &str) -> Vec<u8> {
        let mut v = vec![s.len() as u8];
        v.extend_from_slice(s.as_bytes());
        v
    }

    #[test]
    fn locate_object_fails_for_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = handler(dir.path().to_path_buf());
        let r = req(LOCATE_OBJECT, 0, 0, &string_field("missing.txt"));
        let reply = h.dispatch(&r);
        assert_eq!(reply.res2, error::ERROR_OBJECT_NOT_FOUND);
    }

    #[test]
    fn locate_object_succeeds_for_existing_path_and_free_lock_releases_it() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        let mut h = handler(dir.path().to_path_buf());

        let mut locate = req(LOCATE_OBJECT, 0, 0, &string_field("a.txt"));
        locate.arg3 = lock::EXCLUSIVE;
        let reply = h.dispatch(&locate);
        assert_eq!(reply.res2, 0);
        let lock_id = reply.res1;
        assert!(h.locks.contains_key(&lock_id));

        let free = req(FREE_LOCK, lock_id, 0, &[]);
        h.dispatch(&free);
        assert!(!h.locks.contains_key(&lock_id));
    }

    #[test]
    fn create_dir_then_examine_object_reports_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = handler(dir.path().to_path_buf());

        let create = req(CREATE_DIR, 0, 0, &string_field("sub"));
        let reply = h.dispatch(&create);
        assert_eq!(reply.res2, 0);
        let lock_id = reply.res1;

        let examine = req(EXAMINE_OBJECT, lock_id, 0, &[]);
        let reply = h.dispatch(&examine);
        assert_eq!(&reply.data[4..8], &fileinfo::DIR_ENTRY_SUBDIR.to_be_bytes());
    }

    #[test]
    fn write_then_read_round_trips_through_a_file_handle() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = handler(dir.path().to_path_buf());

        let open = req(FIND_OUTPUT, 0, 0, &string_field("out.txt"));
        let reply = h.dispatch(&open);
        assert_eq!(reply.res1, -1);
        let fh = reply.res2;

        let write = req(WRITE, fh, 0, b"hello");
        let reply = h.dispatch(&write);
        assert_eq!(reply.res1, 5);

        let mut seek = req(SEEK, fh, 0, &[]);
        seek.arg2 = 0;
        seek.arg3 = 0;
        let _ = h.dispatch(&seek);

        let mut read = req(READ, fh, 0, &[]);
        read.arg3 = 5;
        let reply = h.dispatch(&read);
        assert_eq!(reply.data, b"hello");
        assert_eq!(reply.res2, 0);
    }

    #[test]
    fn unknown_volume_reports_device_not_mounted() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = handler(dir.path().to_path_buf());
        let r = req(LOCATE_OBJECT, 0, 99, &string_field("a"));
        let reply = h.dispatch(&r);
        assert_eq!(reply.res2, error::ERROR_DEVICE_NOT_MOUNTED);
    }
}
