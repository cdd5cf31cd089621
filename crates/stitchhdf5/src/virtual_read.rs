//! Virtual dataset (VDS) read engine.
//!
//! A virtual dataset assembles its contents from selections of *source
//! datasets*, possibly living in other files. [`VirtualReadStream`] walks
//! the virtual dataspace in row-major order, segmenting the requested
//! range into runs. A run covered by a mapping entry is delegated to the
//! containing reader through [`VirtualSource::read`]; a run covered by
//! nothing yields the fill value.
//!
//! The engine deliberately knows nothing about object headers, filter
//! pipelines, or non-virtual layouts: everything it needs from the rest
//! of the reader arrives through the [`VirtualSource`] trait, threaded in
//! at construction. That keeps the dependency arrow pointing one way even
//! though a source dataset may itself be virtual and recurse.

use std::collections::HashMap;
use std::fmt;
use std::io::SeekFrom;
use std::mem;
use std::path::{Path, PathBuf};

use stitchhdf5_format::dataspace::UNLIMITED;
use stitchhdf5_format::selection::{linear_to_coords_into, LinearIndex, Selection};
use stitchhdf5_format::vds::VdsEntry;

use crate::access::DatasetAccess;
use crate::error::Error;

// ---------------------------------------------------------------------------
// VirtualSource
// ---------------------------------------------------------------------------

/// Access to source files and datasets on behalf of a virtual dataset.
///
/// The containing reader implements this once per element type it can
/// decode. [`VirtualSource::read`] may land on another virtual dataset
/// and recurse through a nested stream.
///
/// Dropping a `File` handle must release it; [`VirtualSource::close`]
/// exists so the stream can release handles explicitly and observe (and
/// discard) close-time errors.
pub trait VirtualSource<T> {
    /// Handle to an open source file.
    type File;

    /// Open a source file read-only.
    fn open_read(&mut self, path: &Path) -> Result<Self::File, Error>;

    /// Whether a candidate source path exists.
    ///
    /// Defaults to a filesystem probe; override for non-filesystem
    /// sources.
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Whether `path` names an object inside `file`.
    fn link_exists(&self, file: &Self::File, path: &str) -> bool;

    /// Dimensions of the dataset at `path` inside `file`.
    fn dataset_dims(&self, file: &Self::File, path: &str) -> Result<Vec<u64>, Error>;

    /// Folder containing `file`, used to resolve relative source names.
    /// `None` for files without a filesystem location (in-memory).
    fn folder_path(&self, file: &Self::File) -> Option<PathBuf>;

    /// Read the elements selected by `runs` from the dataset at `path`
    /// inside `file` into `dest`, decoding to `T`.
    ///
    /// Fills `dest` completely or fails; there is no partial-fill
    /// contract.
    fn read(
        &mut self,
        file: &Self::File,
        path: &str,
        runs: SourceRuns<'_>,
        dest: &mut [T],
        access: &DatasetAccess,
    ) -> Result<(), Error>;

    /// Release a file previously returned by [`VirtualSource::open_read`].
    fn close(&mut self, file: Self::File) -> Result<(), Error>;
}

// ---------------------------------------------------------------------------
// SourceRuns
// ---------------------------------------------------------------------------

/// One contiguous piece of a mapped read: `count` elements starting at
/// `coords` in the source dataspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionStep {
    /// Starting coordinates in the source dataspace.
    pub coords: Vec<u64>,
    /// Number of consecutive elements along the fastest-changing axis.
    pub count: u64,
}

/// Enumerates the source-space runs backing one stretch of the virtual
/// space.
///
/// Walks the source selection's compact enumeration from a starting
/// index, emitting one [`SelectionStep`] per run until the requested
/// number of elements is covered. The last step is truncated to the
/// remaining element count.
pub struct SourceRuns<'a> {
    selection: &'a Selection,
    dims: &'a [u64],
    next: u64,
    remaining: u64,
}

impl<'a> SourceRuns<'a> {
    pub(crate) fn new(selection: &'a Selection, dims: &'a [u64], first: u64, len: u64) -> Self {
        Self {
            selection,
            dims,
            next: first,
            remaining: len,
        }
    }

    /// Total number of elements the remaining steps will cover.
    pub fn element_count(&self) -> u64 {
        self.remaining
    }

    /// Dimensions of the source dataspace the steps index into.
    pub fn dims(&self) -> &[u64] {
        self.dims
    }
}

impl Iterator for SourceRuns<'_> {
    type Item = SelectionStep;

    fn next(&mut self) -> Option<SelectionStep> {
        if self.remaining == 0 {
            return None;
        }
        let (coords, run) = self.selection.to_coordinates(self.dims, self.next);
        let count = run.min(self.remaining);
        self.next += count;
        self.remaining -= count;
        Some(SelectionStep { coords, count })
    }
}

// ---------------------------------------------------------------------------
// Source resolution
// ---------------------------------------------------------------------------

/// Resolved source state for one mapping entry, keyed by entry position.
enum SourceSlot<F> {
    /// The entry references the virtual dataset's own file.
    Host {
        dims: Vec<u64>,
        access: DatasetAccess,
    },
    /// The stream opened this file and owns it until it closes.
    Owned {
        file: F,
        dims: Vec<u64>,
        access: DatasetAccess,
    },
}

/// Locate a source file: an absolute name is taken as-is, then the
/// configured prefix is probed, then the virtual file's own folder.
/// The first existing candidate wins; `None` leaves the region uncovered.
fn resolve_source_path(
    name: &str,
    prefix: Option<&Path>,
    folder: Option<&Path>,
    exists: impl Fn(&Path) -> bool,
) -> Option<PathBuf> {
    let name_path = Path::new(name);
    if name_path.is_absolute() && exists(name_path) {
        return Some(name_path.to_path_buf());
    }
    if let Some(prefix) = prefix {
        let candidate = prefix.join(name);
        if exists(&candidate) {
            return Some(candidate);
        }
    }
    if let Some(folder) = folder {
        let candidate = folder.join(name);
        if exists(&candidate) {
            return Some(candidate);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// VirtualReadStream
// ---------------------------------------------------------------------------

/// A single-use streaming read over a virtual dataset.
///
/// The stream keeps a linear position into the row-major enumeration of
/// the virtual dataspace. Each [`VirtualReadStream::read_virtual`] call
/// produces exactly `buffer.len()` elements at that position and
/// advances it. Source files the stream opens are released when it
/// drops; the host file is never closed.
pub struct VirtualReadStream<'a, T, S: VirtualSource<T>> {
    source: S,
    host: &'a S::File,
    entries: &'a [VdsEntry],
    virtual_dims: Vec<u64>,
    fill_value: Option<T>,
    access: DatasetAccess,
    folder: Option<PathBuf>,
    position: u64,
    slots: HashMap<usize, SourceSlot<S::File>>,
    /// Scratch for the current virtual coordinates, reused across
    /// iterations.
    coords: Vec<u64>,
}

impl<'a, T, S: VirtualSource<T>> fmt::Debug for VirtualReadStream<'a, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualReadStream")
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl<'a, T: Copy + Default, S: VirtualSource<T>> VirtualReadStream<'a, T, S> {
    /// Create a stream over `entries` for one logical read.
    ///
    /// Fails if any virtual dimension is [`UNLIMITED`]; growing virtual
    /// datasets are not supported.
    pub fn new(
        source: S,
        host: &'a S::File,
        entries: &'a [VdsEntry],
        virtual_dims: Vec<u64>,
        fill_value: Option<T>,
        access: DatasetAccess,
    ) -> Result<Self, Error> {
        if virtual_dims.iter().any(|&d| d == UNLIMITED) {
            return Err(Error::UnlimitedVirtualDataset);
        }
        let folder = source.folder_path(host);
        let rank = virtual_dims.len();
        Ok(Self {
            source,
            host,
            entries,
            virtual_dims,
            fill_value,
            access,
            folder,
            position: 0,
            slots: HashMap::new(),
            coords: vec![0; rank],
        })
    }

    /// The current linear position in the virtual enumeration.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Set the position. Only [`SeekFrom::Start`] is supported.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, Error> {
        match pos {
            SeekFrom::Start(offset) => {
                self.position = offset;
                Ok(offset)
            }
            _ => Err(Error::UnsupportedSeek),
        }
    }

    /// Fill `buffer` with the next `buffer.len()` elements of the virtual
    /// dataset and advance the position by the same amount.
    ///
    /// Coordinates covered by a mapping read from the *first* covering
    /// entry in descriptor order; everything else becomes the fill value
    /// (or `T::default()` when the dataset has none). A downstream read
    /// error aborts the call with the position at the last completed run.
    pub fn read_virtual(&mut self, buffer: &mut [T]) -> Result<(), Error> {
        self.position
            .checked_add(buffer.len() as u64)
            .ok_or(Error::PositionOverflow)?;

        let entries = self.entries;
        let mut buffer = buffer;
        while !buffer.is_empty() {
            linear_to_coords_into(&self.virtual_dims, self.position, &mut self.coords);

            // First entry covering the current coordinate wins; misses
            // contribute the distance to their next covered element so an
            // uncovered run can stop exactly where some mapping resumes.
            let mut chosen = None;
            let mut min_gap: Option<u64> = None;
            for (index, entry) in entries.iter().enumerate() {
                match entry
                    .virtual_selection
                    .to_linear_index(&self.virtual_dims, &self.coords)
                {
                    LinearIndex::Selected { index: first, run } => {
                        chosen = Some((index, first, run));
                        break;
                    }
                    LinearIndex::Gap { gap } => {
                        min_gap = Some(min_gap.map_or(gap, |g| g.min(gap)));
                    }
                    LinearIndex::End => {}
                }
            }

            let run = match chosen {
                Some((entry_index, first, max_run)) => {
                    let run = (buffer.len() as u64).min(max_run) as usize;
                    let (head, rest) = mem::take(&mut buffer).split_at_mut(run);
                    self.resolve(entry_index)?;
                    match self.slots.get(&entry_index) {
                        Some(slot) => {
                            let entry = &entries[entry_index];
                            let (file, dims, access) = match slot {
                                SourceSlot::Host { dims, access } => (self.host, dims, access),
                                SourceSlot::Owned { file, dims, access } => (file, dims, access),
                            };
                            let runs =
                                SourceRuns::new(&entry.source_selection, dims, first, run as u64);
                            self.source
                                .read(file, &entry.source_dataset, runs, head, access)?;
                        }
                        // Unresolvable source: the region reads as fill.
                        None => head.fill(self.fill_value.unwrap_or_default()),
                    }
                    buffer = rest;
                    run
                }
                None => {
                    let run = match min_gap {
                        Some(gap) => (buffer.len() as u64).min(gap) as usize,
                        None => buffer.len(),
                    };
                    let (head, rest) = mem::take(&mut buffer).split_at_mut(run);
                    head.fill(self.fill_value.unwrap_or_default());
                    buffer = rest;
                    run
                }
            };

            self.position += run as u64;
        }
        Ok(())
    }

    /// Resolve the source behind `entries[entry_index]`, memoizing on
    /// success.
    ///
    /// A missing file or missing dataset leaves the map untouched, not
    /// even negatively cached, so a source appearing between reads is
    /// picked up. A file that opens but lacks the dataset is closed
    /// before returning.
    fn resolve(&mut self, entry_index: usize) -> Result<(), Error> {
        if self.slots.contains_key(&entry_index) {
            return Ok(());
        }
        let entry = &self.entries[entry_index];

        if entry.is_self_referencing() {
            if !self.source.link_exists(self.host, &entry.source_dataset) {
                return Ok(());
            }
            let dims = self.source.dataset_dims(self.host, &entry.source_dataset)?;
            self.slots.insert(
                entry_index,
                SourceSlot::Host {
                    dims,
                    access: self.access.or_default_chunk_cache(),
                },
            );
            return Ok(());
        }

        let Some(path) = resolve_source_path(
            &entry.source_file_name,
            self.access.external_file_prefix.as_deref(),
            self.folder.as_deref(),
            |p| self.source.file_exists(p),
        ) else {
            return Ok(());
        };

        let file = self.source.open_read(&path)?;
        if !self.source.link_exists(&file, &entry.source_dataset) {
            let _ = self.source.close(file);
            return Ok(());
        }
        let dims = match self.source.dataset_dims(&file, &entry.source_dataset) {
            Ok(dims) => dims,
            Err(e) => {
                let _ = self.source.close(file);
                return Err(e);
            }
        };
        self.slots.insert(
            entry_index,
            SourceSlot::Owned {
                file,
                dims,
                access: self.access.or_default_chunk_cache(),
            },
        );
        Ok(())
    }
}

impl<T, S: VirtualSource<T>> Drop for VirtualReadStream<'_, T, S> {
    fn drop(&mut self) {
        // One bad source must not leak the others; the host handle is
        // never ours to close.
        for (_, slot) in self.slots.drain() {
            if let SourceSlot::Owned { file, .. } = slot {
                let _ = self.source.close(file);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use stitchhdf5_format::selection::HyperslabSelection;

    // ----- resolve_source_path -----

    #[test]
    fn absolute_path_taken_as_is() {
        let found = resolve_source_path("/abs/source.h5", None, None, |p| {
            p == Path::new("/abs/source.h5")
        });
        assert_eq!(found, Some(PathBuf::from("/abs/source.h5")));
    }

    #[test]
    fn prefix_probed_before_folder() {
        // The same name exists in both places; the prefix wins.
        let prefix = Path::new("/prefix");
        let folder = Path::new("/folder");
        let found = resolve_source_path("s.h5", Some(prefix), Some(folder), |_| true);
        assert_eq!(found, Some(PathBuf::from("/prefix/s.h5")));
    }

    #[test]
    fn folder_used_when_prefix_misses() {
        let prefix = Path::new("/prefix");
        let folder = Path::new("/folder");
        let found = resolve_source_path("s.h5", Some(prefix), Some(folder), |p| {
            p.starts_with("/folder")
        });
        assert_eq!(found, Some(PathBuf::from("/folder/s.h5")));
    }

    #[test]
    fn missing_everywhere_is_none() {
        let found =
            resolve_source_path("s.h5", Some(Path::new("/p")), Some(Path::new("/f")), |_| false);
        assert_eq!(found, None);
    }

    #[test]
    fn no_candidates_without_prefix_or_folder() {
        assert_eq!(resolve_source_path("s.h5", None, None, |_| true), None);
    }

    #[test]
    fn filesystem_probe_via_temp_dir() {
        let dir = std::env::temp_dir();
        let path = dir.join("stitchhdf5_resolve_probe.h5");
        std::fs::write(&path, b"x").unwrap();

        let found = resolve_source_path(
            "stitchhdf5_resolve_probe.h5",
            None,
            Some(dir.as_path()),
            |p| p.is_file(),
        );
        assert_eq!(found, Some(path.clone()));

        std::fs::remove_file(&path).ok();
    }

    // ----- SourceRuns -----

    fn strided(start: u64, stride: u64, count: u64, block: u64) -> Selection {
        Selection::Hyperslab(
            HyperslabSelection::new(vec![start], vec![stride], vec![count], vec![block]).unwrap(),
        )
    }

    #[test]
    fn source_runs_walk_blocks() {
        // Elements 0,1, 4,5, 8,9
        let sel = strided(0, 4, 3, 2);
        let dims = [10u64];
        let steps: Vec<_> = SourceRuns::new(&sel, &dims, 0, 6).collect();
        assert_eq!(
            steps,
            vec![
                SelectionStep { coords: vec![0], count: 2 },
                SelectionStep { coords: vec![4], count: 2 },
                SelectionStep { coords: vec![8], count: 2 },
            ]
        );
    }

    #[test]
    fn source_runs_start_mid_block() {
        let sel = strided(0, 4, 3, 2);
        let dims = [10u64];
        let steps: Vec<_> = SourceRuns::new(&sel, &dims, 1, 3).collect();
        assert_eq!(
            steps,
            vec![
                SelectionStep { coords: vec![1], count: 1 },
                SelectionStep { coords: vec![4], count: 2 },
            ]
        );
    }

    #[test]
    fn source_runs_truncate_last_step() {
        let sel = strided(0, 4, 3, 2);
        let dims = [10u64];
        let steps: Vec<_> = SourceRuns::new(&sel, &dims, 0, 3).collect();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1], SelectionStep { coords: vec![4], count: 1 });
    }

    #[test]
    fn source_runs_over_all_selection() {
        let dims = [2u64, 3];
        let steps: Vec<_> = SourceRuns::new(&Selection::All, &dims, 2, 4).collect();
        assert_eq!(
            steps,
            vec![
                SelectionStep { coords: vec![0, 2], count: 1 },
                SelectionStep { coords: vec![1, 0], count: 3 },
            ]
        );
    }

    #[test]
    fn source_runs_element_count_drains() {
        let sel = strided(0, 4, 3, 2);
        let dims = [10u64];
        let mut runs = SourceRuns::new(&sel, &dims, 0, 5);
        assert_eq!(runs.element_count(), 5);
        runs.next();
        assert_eq!(runs.element_count(), 3);
        assert_eq!(runs.dims(), &[10]);
    }
}
