//! Per-dataset chunk cache with a coordinate index and LRU eviction.
//!
//! Reading a chunked source dataset repeatedly from a stitched read would
//! otherwise re-locate and re-decompress the same chunks. The cache keeps
//! a coordinate → location index plus an LRU of decompressed chunk bytes
//! bounded by a byte budget and a slot count. The virtual dataset engine
//! attaches one cache per resolved source dataset.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use core::cell::RefCell;

#[cfg(feature = "std")]
use std::collections::HashMap;
#[cfg(not(feature = "std"))]
use alloc::collections::BTreeMap;

/// Coordinate key for a chunk: the N-dimensional offset vector.
pub type ChunkCoord = Vec<u64>;

/// Where a chunk's bytes live in its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLocation {
    /// File address of the chunk data.
    pub address: u64,
    /// Size of the chunk data in the file (after compression).
    pub size: u32,
    /// Bitmask of filters that were NOT applied (0 = all applied).
    pub filter_mask: u32,
}

/// Default maximum bytes of decompressed chunk data to cache.
pub const DEFAULT_CACHE_BYTES: usize = 1024 * 1024; // 1 MiB

/// Default maximum number of cached decompressed chunks.
pub const DEFAULT_MAX_SLOTS: usize = 16;

struct CachedChunk {
    coord: ChunkCoord,
    data: Vec<u8>,
    /// Monotonically increasing access counter for LRU ordering.
    last_access: u64,
}

/// A per-dataset chunk cache.
///
/// Wrapped in `RefCell` internally so it can be mutated through shared
/// references (single-threaded use).
pub struct ChunkCache {
    inner: RefCell<CacheInner>,
}

struct CacheInner {
    /// Chunk coordinate → location index, populated once per dataset.
    #[cfg(feature = "std")]
    index: Option<HashMap<ChunkCoord, ChunkLocation>>,
    #[cfg(not(feature = "std"))]
    index: Option<BTreeMap<ChunkCoord, ChunkLocation>>,

    /// LRU cache of decompressed chunk data.
    slots: Vec<CachedChunk>,

    /// Current total bytes of cached decompressed data.
    current_bytes: usize,

    /// Maximum bytes of decompressed data to cache.
    max_bytes: usize,

    /// Maximum number of slots.
    max_slots: usize,

    /// Monotonic counter for LRU ordering.
    tick: u64,
}

impl ChunkCache {
    /// Create a chunk cache with default limits (1 MiB, 16 slots).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_BYTES, DEFAULT_MAX_SLOTS)
    }

    /// Create a chunk cache with a custom byte budget and slot count.
    pub fn with_capacity(max_bytes: usize, max_slots: usize) -> Self {
        Self {
            inner: RefCell::new(CacheInner {
                index: None,
                slots: Vec::with_capacity(max_slots.min(64)),
                current_bytes: 0,
                max_bytes,
                max_slots,
                tick: 0,
            }),
        }
    }

    // ----- Index operations -----

    /// Returns `true` if the chunk index has been built.
    pub fn has_index(&self) -> bool {
        self.inner.borrow().index.is_some()
    }

    /// Build the chunk index from pre-collected coordinate/location pairs.
    /// A later call on an already-populated cache is a no-op.
    pub fn populate_index(&self, chunks: &[(ChunkCoord, ChunkLocation)]) {
        let mut inner = self.inner.borrow_mut();
        if inner.index.is_some() {
            return;
        }
        #[cfg(feature = "std")]
        let mut map = HashMap::with_capacity(chunks.len());
        #[cfg(not(feature = "std"))]
        let mut map = BTreeMap::new();

        for (coord, location) in chunks {
            map.insert(coord.clone(), *location);
        }
        inner.index = Some(map);
    }

    /// Look up a chunk's location by coordinate.
    pub fn lookup_index(&self, coord: &[u64]) -> Option<ChunkLocation> {
        let inner = self.inner.borrow();
        inner.index.as_ref()?.get(coord).copied()
    }

    // ----- Decompressed data cache (LRU) -----

    /// Try to get cached decompressed data for a chunk coordinate.
    pub fn get_decompressed(&self, coord: &[u64]) -> Option<Vec<u8>> {
        let mut inner = self.inner.borrow_mut();
        inner.tick += 1;
        let tick = inner.tick;
        for slot in inner.slots.iter_mut() {
            if slot.coord.as_slice() == coord {
                slot.last_access = tick;
                return Some(slot.data.clone());
            }
        }
        None
    }

    /// Insert decompressed chunk data into the LRU cache.
    pub fn put_decompressed(&self, coord: ChunkCoord, data: Vec<u8>) {
        let mut inner = self.inner.borrow_mut();
        let data_len = data.len();

        // A chunk bigger than the whole budget is never cached.
        if data_len > inner.max_bytes {
            return;
        }

        inner.tick += 1;
        let tick = inner.tick;
        for slot in inner.slots.iter_mut() {
            if slot.coord == coord {
                slot.last_access = tick;
                return;
            }
        }

        while !inner.slots.is_empty()
            && (inner.slots.len() >= inner.max_slots
                || inner.current_bytes + data_len > inner.max_bytes)
        {
            let lru_idx = inner
                .slots
                .iter()
                .enumerate()
                .min_by_key(|(_, s)| s.last_access)
                .map(|(i, _)| i)
                .unwrap_or(0);
            let removed = inner.slots.swap_remove(lru_idx);
            inner.current_bytes -= removed.data.len();
        }

        inner.current_bytes += data_len;
        inner.slots.push(CachedChunk {
            coord,
            data,
            last_access: tick,
        });
    }

    /// Clear the entire cache (index + decompressed data).
    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.index = None;
        inner.slots.clear();
        inner.current_bytes = 0;
        inner.tick = 0;
    }

    /// Number of decompressed chunks currently cached.
    pub fn cached_chunk_count(&self) -> usize {
        self.inner.borrow().slots.len()
    }

    /// Total bytes of decompressed data currently cached.
    pub fn cached_bytes(&self) -> usize {
        self.inner.borrow().current_bytes
    }
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn location(address: u64, size: u32) -> ChunkLocation {
        ChunkLocation {
            address,
            size,
            filter_mask: 0,
        }
    }

    #[test]
    fn index_populate_and_lookup() {
        let cache = ChunkCache::new();
        cache.populate_index(&[
            (vec![0, 0], location(0x1000, 80)),
            (vec![10, 0], location(0x2000, 80)),
        ]);
        assert!(cache.has_index());

        assert_eq!(cache.lookup_index(&[0, 0]).unwrap().address, 0x1000);
        assert_eq!(cache.lookup_index(&[10, 0]).unwrap().address, 0x2000);
        assert!(cache.lookup_index(&[5, 0]).is_none());
    }

    #[test]
    fn populate_twice_keeps_first() {
        let cache = ChunkCache::new();
        cache.populate_index(&[(vec![0], location(0x1000, 8))]);
        cache.populate_index(&[(vec![0], location(0x9999, 8))]);
        assert_eq!(cache.lookup_index(&[0]).unwrap().address, 0x1000);
    }

    #[test]
    fn decompressed_cache_hit() {
        let cache = ChunkCache::new();
        cache.put_decompressed(vec![0, 0], vec![1, 2, 3, 4]);
        assert_eq!(cache.get_decompressed(&[0, 0]).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn lru_eviction_by_slots() {
        let cache = ChunkCache::with_capacity(1024 * 1024, 2);

        cache.put_decompressed(vec![0], vec![1; 10]);
        cache.put_decompressed(vec![1], vec![2; 10]);
        assert_eq!(cache.cached_chunk_count(), 2);

        // Touch slot 0 so slot 1 becomes the LRU victim.
        cache.get_decompressed(&[0]);
        cache.put_decompressed(vec![2], vec![3; 10]);

        assert_eq!(cache.cached_chunk_count(), 2);
        assert!(cache.get_decompressed(&[0]).is_some());
        assert!(cache.get_decompressed(&[1]).is_none());
        assert!(cache.get_decompressed(&[2]).is_some());
    }

    #[test]
    fn lru_eviction_by_bytes() {
        let cache = ChunkCache::with_capacity(50, 100);

        cache.put_decompressed(vec![0], vec![0; 20]);
        cache.put_decompressed(vec![1], vec![0; 20]);
        assert_eq!(cache.cached_bytes(), 40);

        cache.put_decompressed(vec![2], vec![0; 20]);
        assert!(cache.cached_bytes() <= 50);
        assert!(cache.get_decompressed(&[0]).is_none());
    }

    #[test]
    fn oversized_chunk_not_cached() {
        let cache = ChunkCache::with_capacity(10, 16);
        cache.put_decompressed(vec![0], vec![0; 100]);
        assert_eq!(cache.cached_chunk_count(), 0);
    }

    #[test]
    fn clear_resets_everything() {
        let cache = ChunkCache::new();
        cache.populate_index(&[(vec![0], location(0x1000, 80))]);
        cache.put_decompressed(vec![0], vec![1, 2, 3]);

        cache.clear();
        assert!(!cache.has_index());
        assert_eq!(cache.cached_chunk_count(), 0);
        assert_eq!(cache.cached_bytes(), 0);
    }

    #[test]
    fn duplicate_insert_is_noop() {
        let cache = ChunkCache::new();
        cache.put_decompressed(vec![0], vec![1, 2, 3]);
        cache.put_decompressed(vec![0], vec![1, 2, 3]);
        assert_eq!(cache.cached_chunk_count(), 1);
        assert_eq!(cache.cached_bytes(), 3);
    }
}
