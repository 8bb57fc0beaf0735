//! Content Store
//!
//! Stores byte blobs keyed by a 16-hex-char content hash. Duplicate puts
//! are free. Large values are split into fixed-size chunks so identical
//! regions dedup across files. Total stored bytes are bounded by an
//! optional budget; least-recently-used entries are evicted when a put
//! pushes the store over it.

use std::collections::HashMap;
use std::sync::Mutex;

/// Chunk granularity for `store_chunked` (256 KiB).
pub const CHUNK_SIZE: usize = 256 * 1024;

/// Inline-vs-chunked boundary used by the VFS (1 MiB).
pub const CHUNK_THRESHOLD: usize = 1024 * 1024;

/// Default byte budget (256 MiB).
const DEFAULT_BUDGET: u64 = 256 * 1024 * 1024;

/// Reference to one stored chunk. Multiple files may share a ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRef {
    /// 16-hex-char content hash
    pub hash: String,
    /// Chunk length in bytes
    pub size: u64,
}

struct Entry {
    data: Vec<u8>,
    last_accessed: u64,
}

struct StoreInner {
    entries: HashMap<String, Entry>,
    /// Monotonic access counter backing the LRU ordering
    clock: u64,
    total_size: u64,
    budget: Option<u64>,
}

/// Deduplicating, LRU-bounded content store.
pub struct ContentStore {
    inner: Mutex<StoreInner>,
}

impl ContentStore {
    /// Create a store with the default 256 MiB budget.
    pub fn new() -> Self {
        Self::with_budget(Some(DEFAULT_BUDGET))
    }

    /// Create a store with an explicit budget. `None` means unbounded.
    pub fn with_budget(budget: Option<u64>) -> Self {
        let budget = match budget {
            Some(0) => None,
            other => other,
        };
        Self {
            inner: Mutex::new(StoreInner {
                entries: HashMap::new(),
                clock: 0,
                total_size: 0,
                budget,
            }),
        }
    }

    /// Store bytes, returning their content hash. Idempotent: putting the
    /// same bytes twice refreshes the entry without growing storage.
    pub fn put(&self, data: &[u8]) -> String {
        let hash = content_hash(data);
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let clock = inner.clock;

        if let Some(entry) = inner.entries.get_mut(&hash) {
            entry.last_accessed = clock;
            return hash;
        }

        inner.total_size += data.len() as u64;
        inner.entries.insert(
            hash.clone(),
            Entry {
                data: data.to_vec(),
                last_accessed: clock,
            },
        );
        inner.evict_over_budget();
        hash
    }

    /// Fetch a copy of the bytes for `hash`, refreshing its LRU position.
    pub fn get(&self, hash: &str) -> Option<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let clock = inner.clock;
        let entry = inner.entries.get_mut(hash)?;
        entry.last_accessed = clock;
        Some(entry.data.clone())
    }

    pub fn has(&self, hash: &str) -> bool {
        self.inner.lock().unwrap().entries.contains_key(hash)
    }

    pub fn delete(&self, hash: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.entries.remove(hash) {
            inner.total_size -= entry.data.len() as u64;
        }
    }

    /// Split `data` into CHUNK_SIZE chunks and put each one. The final
    /// chunk may be shorter. Identical chunks dedup through `put`.
    pub fn store_chunked(&self, data: &[u8]) -> Vec<ChunkRef> {
        if data.is_empty() {
            return Vec::new();
        }
        data.chunks(CHUNK_SIZE)
            .map(|chunk| ChunkRef {
                hash: self.put(chunk),
                size: chunk.len() as u64,
            })
            .collect()
    }

    /// Reassemble a chunked value. Returns `None` if any referenced chunk
    /// has been evicted.
    pub fn load_chunked(&self, refs: &[ChunkRef]) -> Option<Vec<u8>> {
        let total: u64 = refs.iter().map(|r| r.size).sum();
        let mut out = Vec::with_capacity(total as usize);
        for chunk_ref in refs {
            let chunk = self.get(&chunk_ref.hash)?;
            out.extend_from_slice(&chunk);
        }
        Some(out)
    }

    /// Release every chunk of a chunked value.
    pub fn delete_chunked(&self, refs: &[ChunkRef]) {
        for chunk_ref in refs {
            self.delete(&chunk_ref.hash);
        }
    }

    /// Number of distinct entries currently stored.
    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    /// Sum of stored entry sizes in bytes.
    pub fn total_size(&self) -> u64 {
        self.inner.lock().unwrap().total_size
    }
}

impl Default for ContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreInner {
    /// Evict least-recently-used entries until back under budget.
    fn evict_over_budget(&mut self) {
        let Some(budget) = self.budget else {
            return;
        };
        while self.total_size > budget && !self.entries.is_empty() {
            let victim = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(h, _)| h.clone());
            let Some(hash) = victim else { break };
            if let Some(entry) = self.entries.remove(&hash) {
                log::debug!(
                    "content store evicting {} ({} bytes)",
                    hash,
                    entry.data.len()
                );
                self.total_size -= entry.data.len() as u64;
            }
        }
    }
}

/// 64-bit FNV-1a over the bytes followed by the length, rendered as 16
/// lowercase hex chars. Not cryptographic; collision probability is far
/// below the load this store sees.
fn content_hash(data: &[u8]) -> String {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    for byte in (data.len() as u64).to_le_bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{:016x}", hash)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_roundtrip() {
        let store = ContentStore::new();
        let hash = store.put(b"hello world");
        assert_eq!(hash.len(), 16);
        assert_eq!(store.get(&hash), Some(b"hello world".to_vec()));
    }

    #[test]
    fn test_put_is_idempotent() {
        let store = ContentStore::new();
        let h1 = store.put(b"same bytes");
        let h2 = store.put(b"same bytes");
        assert_eq!(h1, h2);
        assert_eq!(store.count(), 1);
        assert_eq!(store.total_size(), "same bytes".len() as u64);
    }

    #[test]
    fn test_get_missing() {
        let store = ContentStore::new();
        assert_eq!(store.get("0000000000000000"), None);
        assert!(!store.has("0000000000000000"));
    }

    #[test]
    fn test_delete() {
        let store = ContentStore::new();
        let hash = store.put(b"ephemeral");
        store.delete(&hash);
        assert!(!store.has(&hash));
        assert_eq!(store.total_size(), 0);
    }

    #[test]
    fn test_chunked_roundtrip() {
        let store = ContentStore::new();
        let data: Vec<u8> = (0..CHUNK_SIZE * 2 + 100).map(|i| (i % 251) as u8).collect();
        let refs = store.store_chunked(&data);
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].size, CHUNK_SIZE as u64);
        assert_eq!(refs[2].size, 100);
        assert_eq!(store.load_chunked(&refs), Some(data));
    }

    #[test]
    fn test_chunked_dedup() {
        let store = ContentStore::new();
        // Four identical chunks store as one entry.
        let block = vec![0xAB_u8; CHUNK_SIZE];
        let mut data = Vec::new();
        for _ in 0..4 {
            data.extend_from_slice(&block);
        }
        let refs = store.store_chunked(&data);
        assert_eq!(refs.len(), 4);
        assert_eq!(store.count(), 1);
        assert_eq!(store.load_chunked(&refs), Some(data));
    }

    #[test]
    fn test_load_chunked_missing_chunk() {
        let store = ContentStore::new();
        let data = vec![1_u8; CHUNK_SIZE + 10];
        let refs = store.store_chunked(&data);
        store.delete(&refs[1].hash);
        assert_eq!(store.load_chunked(&refs), None);
    }

    #[test]
    fn test_lru_eviction() {
        let store = ContentStore::with_budget(Some(100));
        let h1 = store.put(&[1_u8; 40]);
        let h2 = store.put(&[2_u8; 40]);
        // Third put exceeds the budget; h1 is the LRU victim.
        let h3 = store.put(&[3_u8; 40]);
        assert!(!store.has(&h1));
        assert!(store.has(&h2));
        assert!(store.has(&h3));
        assert!(store.total_size() <= 100);
    }

    #[test]
    fn test_get_refreshes_lru() {
        let store = ContentStore::with_budget(Some(100));
        let h1 = store.put(&[1_u8; 40]);
        let h2 = store.put(&[2_u8; 40]);
        // Touch h1 so h2 becomes the eviction victim.
        store.get(&h1);
        store.put(&[3_u8; 40]);
        assert!(store.has(&h1));
        assert!(!store.has(&h2));
    }

    #[test]
    fn test_zero_budget_is_unbounded() {
        let store = ContentStore::with_budget(Some(0));
        for i in 0..32_u8 {
            store.put(&vec![i; 1024]);
        }
        assert_eq!(store.count(), 32);
    }

    #[test]
    fn test_empty_chunked_value() {
        let store = ContentStore::new();
        let refs = store.store_chunked(b"");
        assert!(refs.is_empty());
        assert_eq!(store.load_chunked(&refs), Some(Vec::new()));
    }
}
