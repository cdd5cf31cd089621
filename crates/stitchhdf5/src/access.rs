//! Dataset access properties.
//!
//! [`DatasetAccess`] bundles the per-read configuration a dataset read
//! takes: an optional shared chunk cache and an optional prefix for
//! locating the source files of a virtual dataset.

use std::path::PathBuf;
use std::rc::Rc;

use stitchhdf5_format::chunk_cache::ChunkCache;

/// Properties controlling how a dataset is accessed.
///
/// Copies share the same chunk cache; the virtual dataset engine hands
/// each resolved source dataset a copy with a cache attached.
#[derive(Clone, Default)]
pub struct DatasetAccess {
    /// Chunk cache to use for chunked reads, shared across copies.
    pub chunk_cache: Option<Rc<ChunkCache>>,
    /// Prefix tried first when resolving a virtual dataset's source files.
    ///
    /// The `HDF5_VDS_PREFIX` environment variable is not consulted here;
    /// callers populate this field themselves.
    pub external_file_prefix: Option<PathBuf>,
}

impl DatasetAccess {
    /// Create default access properties.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chunk cache.
    pub fn chunk_cache(mut self, cache: Rc<ChunkCache>) -> Self {
        self.chunk_cache = Some(cache);
        self
    }

    /// Set the prefix for resolving virtual dataset source files.
    pub fn external_file_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.external_file_prefix = Some(prefix.into());
        self
    }

    /// Copy of these properties with a freshly allocated chunk cache when
    /// none is set, so chunk reuse is per source dataset within a stream.
    pub(crate) fn or_default_chunk_cache(&self) -> Self {
        let mut access = self.clone();
        if access.chunk_cache.is_none() {
            access.chunk_cache = Some(Rc::new(ChunkCache::new()));
        }
        access
    }
}

impl std::fmt::Debug for DatasetAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetAccess")
            .field("chunk_cache", &self.chunk_cache.is_some())
            .field("external_file_prefix", &self.external_file_prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_cache() {
        let access = DatasetAccess::new();
        assert!(access.chunk_cache.is_none());
        assert!(access.external_file_prefix.is_none());
    }

    #[test]
    fn or_default_attaches_fresh_cache() {
        let access = DatasetAccess::new();
        let derived = access.or_default_chunk_cache();
        assert!(access.chunk_cache.is_none());
        assert!(derived.chunk_cache.is_some());
    }

    #[test]
    fn or_default_keeps_existing_cache() {
        let cache = Rc::new(ChunkCache::new());
        let access = DatasetAccess::new().chunk_cache(cache.clone());
        let derived = access.or_default_chunk_cache();
        assert!(Rc::ptr_eq(&cache, derived.chunk_cache.as_ref().unwrap()));
    }

    #[test]
    fn copies_share_the_cache() {
        let access = DatasetAccess::new().or_default_chunk_cache();
        let copy = access.clone();
        let (a, b) = (
            access.chunk_cache.as_ref().unwrap(),
            copy.chunk_cache.as_ref().unwrap(),
        );
        assert!(Rc::ptr_eq(a, b));
        a.put_decompressed(vec![0], vec![1, 2, 3]);
        assert_eq!(b.cached_chunk_count(), 1);
    }
}
