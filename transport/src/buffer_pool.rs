// SPDX-License-Identifier: BSD-3-Clause

//! A bounded pool of reusable read buffers, so the serial reader thread isn't
//! allocating on every read.

use crossbeam_channel::{Receiver, Sender};

/// Size of a freshly allocated buffer when the pool is empty.
const DEFAULT_BUFFER_LEN: usize = 100;

pub struct BufferPool {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx }
    }

    /// Returns a buffer from the pool, truncated to empty, or allocates a new
    /// one if the pool is currently empty.
    pub fn alloc(&self) -> Vec<u8> {
        match self.rx.try_recv() {
            Ok(mut buf) => {
                buf.clear();
                buf.resize(DEFAULT_BUFFER_LEN, 0);
                buf
            }
            Err(_) => vec![0u8; DEFAULT_BUFFER_LEN],
        }
    }

    /// Returns a buffer to the pool for reuse. Silently dropped if the pool
    /// is already full.
    pub fn release(&self, buf: Vec<u8>) {
        let _ = self.tx.try_send(buf);
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_fresh_when_empty() {
        let pool = BufferPool::new(4);
        let buf = pool.alloc();
        assert_eq!(buf.len(), DEFAULT_BUFFER_LEN);
    }

    #[test]
    fn reuses_released_buffers() {
        let pool = BufferPool::new(4);
        let buf = pool.alloc();
        pool.release(buf);
        assert_eq!(pool.rx.len(), 1);
        let _ = pool.alloc();
        assert_eq!(pool.rx.len(), 0);
    }

    #[test]
    fn drops_buffers_past_capacity() {
        let pool = BufferPool::new(1);
        pool.release(vec![0; 10]);
        pool.release(vec![0; 10]);
        assert_eq!(pool.rx.len(), 1);
    }
}
