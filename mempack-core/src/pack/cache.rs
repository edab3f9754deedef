use std::sync::Arc;
use std::sync::Mutex;

/// Decoded-block LRU cache, sized by cumulative decoded-byte budget rather
/// than entry count: after each insert, oldest entries are evicted until the
/// running total is back under `capacity_bytes`.
pub struct BlockCache {
    inner: Mutex<Inner>,
    capacity_bytes: usize,
}

struct Inner {
    map: lru::LruCache<u32, Arc<[u8]>>,
    bytes: usize,
}

impl BlockCache {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: lru::LruCache::unbounded(),
                bytes: 0,
            }),
            capacity_bytes,
        }
    }

    /// Returns a cloned handle on hit (and promotes the entry to MRU).
    pub fn get(&self, block_id: u32) -> Option<Arc<[u8]>> {
        let mut guard = self.inner.lock().expect("block cache poisoned");
        guard.map.get(&block_id).cloned()
    }

    pub fn insert(&self, block_id: u32, data: Arc<[u8]>) {
        let mut guard = self.inner.lock().expect("block cache poisoned");
        let len = data.len();
        if let Some(old) = guard.map.put(block_id, data) {
            guard.bytes -= old.len();
        }
        guard.bytes += len;
        while guard.bytes > self.capacity_bytes {
            match guard.map.pop_lru() {
                Some((_, evicted)) => guard.bytes -= evicted.len(),
                None => break,
            }
        }
    }

    pub fn invalidate(&self, block_id: u32) {
        let mut guard = self.inner.lock().expect("block cache poisoned");
        if let Some(old) = guard.map.pop(&block_id) {
            guard.bytes -= old.len();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("block cache poisoned").map.len()
    }
}
