// SPDX-License-Identifier: BSD-3-Clause

//! Volumes exposed to the remote, and the watcher that discovers removable
//! media mounted under `/media/pi`, following `botster`'s `FileWatcher`
//! wrapping of `notify::RecommendedWatcher`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use log::warn;
use notify::{RecursiveMode, Watcher};

pub const DEFAULT_VOLUME_ID: u16 = 0;

#[derive(Debug, Clone)]
pub struct Volume {
    pub id: u16,
    pub name: String,
    pub root: PathBuf,
    pub mounted: bool,
}

pub struct VolumeTable {
    volumes: HashMap<u16, Volume>,
    next_id: u16,
}

impl VolumeTable {
    pub fn new(default_root: PathBuf) -> Self {
        let mut volumes = HashMap::new();
        volumes.insert(
            DEFAULT_VOLUME_ID,
            Volume {
                id: DEFAULT_VOLUME_ID,
                name: "AmiPiBorg".into(),
                root: default_root,
                mounted: true,
            },
        );
        Self { volumes, next_id: 1 }
    }

    pub fn get(&self, id: u16) -> Option<&Volume> {
        self.volumes.get(&id).filter(|v| v.mounted)
    }

    pub fn mount(&mut self, name: String, root: PathBuf) -> u16 {
        let id = self.next_id;
        self.next_id += 1;
        self.volumes.insert(
            id,
            Volume {
                id,
                name,
                root,
                mounted: true,
            },
        );
        id
    }

    pub fn unmount_by_root(&mut self, root: &Path) -> Option<u16> {
        let id = self
            .volumes
            .iter()
            .find(|(id, v)| **id != DEFAULT_VOLUME_ID && v.root == root)
            .map(|(id, _)| *id)?;
        if let Some(v) = self.volumes.get_mut(&id) {
            v.mounted = false;
        }
        Some(id)
    }
}

pub enum MountEvent {
    Mounted { vol_id: u16, name: String },
    Unmounted { vol_id: u16 },
}

/// Lists the immediate subdirectories of `media_root` as already-mounted
/// volumes, for volumes present at startup before the watcher is running.
pub fn scan_existing(media_root: &Path, table: &mut VolumeTable) -> Vec<MountEvent> {
    let mut events = Vec::new();
    let Ok(entries) = std::fs::read_dir(media_root) else {
        return events;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let vol_id = table.mount(name.clone(), path);
        events.push(MountEvent::Mounted { vol_id, name });
    }
    events
}

pub struct MountWatcher {
    _watcher: notify::RecommendedWatcher,
    rx: mpsc::Receiver<notify::Result<notify::Event>>,
}

impl MountWatcher {
    pub fn new(media_root: &Path) -> notify::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(media_root, RecursiveMode::NonRecursive)?;
        Ok(Self { _watcher: watcher, rx })
    }

    /// Drains buffered filesystem events, updating `table`, and returns the
    /// mount/unmount notifications the caller should forward to the remote.
    pub fn poll(&self, table: &mut VolumeTable) -> Vec<MountEvent> {
        let mut events = Vec::new();

        while let Ok(result) = self.rx.try_recv() {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    warn!("mount watcher error: {e}");
                    continue;
                }
            };

            for path in &event.paths {
                match event.kind {
                    notify::EventKind::Create(_) if path.is_dir() => {
                        if let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) {
                            let vol_id = table.mount(name.clone(), path.clone());
                            events.push(MountEvent::Mounted { vol_id, name });
                        }
                    }
                    notify::EventKind::Remove(_) => {
                        if let Some(vol_id) = table.unmount_by_root(path) {
                            events.push(MountEvent::Unmounted { vol_id });
                        }
                    }
                    _ => {}
                }
            }
        }

        events
    }
}
