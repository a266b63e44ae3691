// ABOUTME: Bounded FIFO cache of pre-encoded command bytes, keyed by logical command

use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Caches already-RESP-encoded command bytes so repeated identical submissions (e.g. a
/// fixed `PING` or a frequently reused `SUBSCRIBE` pattern) skip re-encoding. Eviction
/// is a simple FIFO over insertion order, not LRU — acceptable since the taxonomy only
/// requires the cache be bounded, not optimally ranked.
pub struct CommandCache {
    entries: Mutex<CacheState>,
    capacity: usize,
}

struct CacheState {
    map: HashMap<Bytes, Bytes>,
    order: VecDeque<Bytes>,
}

impl CommandCache {
    pub fn new(capacity: usize) -> Self {
        CommandCache {
            entries: Mutex::new(CacheState { map: HashMap::new(), order: VecDeque::new() }),
            capacity,
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.entries.lock().unwrap().map.get(key).cloned()
    }

    pub fn insert(&self, key: Bytes, encoded: Bytes) {
        if self.capacity == 0 {
            return;
        }
        let mut state = self.entries.lock().unwrap();
        if state.map.contains_key(&key) {
            return;
        }
        if state.order.len() >= self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.map.remove(&oldest);
            }
        }
        state.order.push_back(key.clone());
        state.map.insert(key, encoded);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().map.len()
    }

    pub fn clear(&self) {
        let mut state = self.entries.lock().unwrap();
        state.map.clear();
        state.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_and_retrieves() {
        let cache = CommandCache::new(4);
        cache.insert(Bytes::from_static(b"GET foo"), Bytes::from_static(b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n"));
        assert!(cache.get(b"GET foo").is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let cache = CommandCache::new(2);
        cache.insert(Bytes::from_static(b"a"), Bytes::from_static(b"1"));
        cache.insert(Bytes::from_static(b"b"), Bytes::from_static(b"2"));
        cache.insert(Bytes::from_static(b"c"), Bytes::from_static(b"3"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(b"a").is_none());
        assert!(cache.get(b"c").is_some());
    }

    #[test]
    fn clear_empties_cache() {
        let cache = CommandCache::new(4);
        cache.insert(Bytes::from_static(b"a"), Bytes::from_static(b"1"));
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
