//! Content-Addressed Blob Store
//!
//! Deduplicating byte storage keyed by content hash, with chunked helpers
//! for large values and an LRU eviction policy bounded by a byte budget.

pub mod store;

pub use store::{ChunkRef, ContentStore, CHUNK_SIZE, CHUNK_THRESHOLD};
