//! Dataspace selections and the coordinate algebra behind stitched reads.
//!
//! A [`Selection`] describes which elements of a dataspace an operation
//! touches. The workhorse is the regular hyperslab: per axis, `block`
//! consecutive elements every `stride` elements, `count` times, starting
//! at `start`. The virtual dataset engine drives selections through two
//! queries:
//!
//! - [`Selection::to_linear_index`]: given dataspace coordinates, where
//!   does the element sit in the selection's gap-free (compact)
//!   enumeration, and how many selected elements follow it contiguously?
//! - [`Selection::to_coordinates`]: the inverse, from a compact position
//!   back to dataspace coordinates plus the remaining run length.
//!
//! Both are row-major with the slowest-changing axis first.

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use core::ops::Range;

use crate::error::FormatError;

// ---------------------------------------------------------------------------
// Coordinate arithmetic
// ---------------------------------------------------------------------------

/// Row-major linear index of `coords` within `dims`.
///
/// Precondition: `coords[k] < dims[k]` for every axis and the product of
/// `dims` fits in `u64`; violations are caught in debug builds.
pub fn coords_to_linear(dims: &[u64], coords: &[u64]) -> u64 {
    debug_assert_eq!(dims.len(), coords.len());
    let mut linear = 0u64;
    for (&d, &c) in dims.iter().zip(coords) {
        debug_assert!(c < d);
        linear = linear * d + c;
    }
    linear
}

/// Row-major coordinates of `index` within `dims`, written into `coords`.
///
/// The in-place form exists so per-element loops can reuse one scratch
/// buffer instead of allocating a vector per iteration.
pub fn linear_to_coords_into(dims: &[u64], mut index: u64, coords: &mut [u64]) {
    debug_assert_eq!(dims.len(), coords.len());
    for k in (0..dims.len()).rev() {
        coords[k] = index % dims[k];
        index /= dims[k];
    }
}

/// Row-major coordinates of `index` within `dims`.
pub fn linear_to_coords(dims: &[u64], index: u64) -> Vec<u64> {
    let mut coords = vec![0u64; dims.len()];
    linear_to_coords_into(dims, index, &mut coords);
    coords
}

// ---------------------------------------------------------------------------
// Forward query result
// ---------------------------------------------------------------------------

/// Answer to a forward selection query at one coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearIndex {
    /// The coordinate is selected: `index` is its position in the compact
    /// enumeration, `run` the number of selected elements from here to the
    /// end of the current block along the fastest-changing axis.
    Selected {
        /// Compact linear position.
        index: u64,
        /// Remaining run inside the current block, at least 1.
        run: u64,
    },
    /// Not selected, but a block begins `gap` elements ahead along the
    /// fastest-changing axis.
    Gap {
        /// Distance to the next selected element, at least 1.
        gap: u64,
    },
    /// Not selected and nothing ahead on the fastest-changing axis.
    End,
}

// ---------------------------------------------------------------------------
// HyperslabSelection
// ---------------------------------------------------------------------------

/// A regular hyperslab: per axis, `block` consecutive elements every
/// `stride` elements, `count` times, starting at `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperslabSelection {
    /// First selected element per axis.
    pub start: Vec<u64>,
    /// Step between block starts per axis.
    pub stride: Vec<u64>,
    /// Number of blocks per axis.
    pub count: Vec<u64>,
    /// Consecutive elements per block per axis.
    pub block: Vec<u64>,
}

impl HyperslabSelection {
    /// Create a hyperslab, validating `stride >= block >= 1` and
    /// `count >= 1` on every axis.
    ///
    /// On a single-block axis the stride never separates anything, so an
    /// undersized stride is widened to the block instead of rejected.
    pub fn new(
        start: Vec<u64>,
        mut stride: Vec<u64>,
        count: Vec<u64>,
        block: Vec<u64>,
    ) -> Result<Self, FormatError> {
        let rank = start.len();
        if rank == 0 || stride.len() != rank || count.len() != rank || block.len() != rank {
            return Err(FormatError::InvalidHyperslab);
        }
        for k in 0..rank {
            if block[k] < 1 || stride[k] < 1 || count[k] < 1 {
                return Err(FormatError::InvalidHyperslab);
            }
            if stride[k] < block[k] {
                if count[k] != 1 {
                    return Err(FormatError::InvalidHyperslab);
                }
                stride[k] = block[k];
            }
        }
        Ok(Self {
            start,
            stride,
            count,
            block,
        })
    }

    /// The number of dimensions.
    pub fn rank(&self) -> usize {
        self.start.len()
    }

    /// The gap-free shape an iterator over this selection sees:
    /// `count * block` per axis.
    pub fn compact_dims(&self) -> Vec<u64> {
        self.count
            .iter()
            .zip(&self.block)
            .map(|(&c, &b)| c * b)
            .collect()
    }

    /// Number of selected elements.
    pub fn num_elements(&self) -> u64 {
        self.count
            .iter()
            .zip(&self.block)
            .map(|(&c, &b)| c * b)
            .product()
    }

    /// Block index and offset within the stride period of coordinate `c`
    /// on axis `k`; `None` when `c` is before the axis start.
    fn axis_split(&self, k: usize, c: u64) -> Option<(u64, u64)> {
        let s = self.start[k];
        if c < s {
            return None;
        }
        let offset = c - s;
        Some((offset / self.stride[k], offset % self.stride[k]))
    }

    /// Forward query; see [`Selection::to_linear_index`].
    pub fn to_linear_index(&self, coords: &[u64]) -> LinearIndex {
        debug_assert_eq!(coords.len(), self.rank());
        let last = self.rank() - 1;

        // Any miss on a slower axis means no run along the fastest axis
        // can ever reach a selected element.
        let mut linear = 0u64;
        for k in 0..last {
            let Some((block_index, within)) = self.axis_split(k, coords[k]) else {
                return LinearIndex::End;
            };
            if block_index >= self.count[k] || within >= self.block[k] {
                return LinearIndex::End;
            }
            let compact = block_index * self.block[k] + within;
            linear = linear * (self.count[k] * self.block[k]) + compact;
        }

        let c = coords[last];
        let Some((block_index, within)) = self.axis_split(last, c) else {
            // Before the first block: the gap runs up to `start`.
            return LinearIndex::Gap {
                gap: self.start[last] - c,
            };
        };
        if block_index < self.count[last] && within < self.block[last] {
            let compact = block_index * self.block[last] + within;
            return LinearIndex::Selected {
                index: linear * (self.count[last] * self.block[last]) + compact,
                run: self.block[last] - within,
            };
        }
        if block_index + 1 < self.count[last] && within >= self.block[last] {
            // Between two blocks: the next one starts a stride after the
            // current block's origin.
            return LinearIndex::Gap {
                gap: self.stride[last] - within,
            };
        }
        LinearIndex::End
    }

    /// Reverse query; see [`Selection::to_coordinates`]. Returns the run
    /// length to the end of the block holding `index`.
    pub fn to_coordinates_into(&self, mut index: u64, coords: &mut [u64]) -> u64 {
        debug_assert_eq!(coords.len(), self.rank());
        debug_assert!(index < self.num_elements());
        let mut run = 0u64;
        for k in (0..self.rank()).rev() {
            let compact_dim = self.count[k] * self.block[k];
            let compact = index % compact_dim;
            index /= compact_dim;
            let block_index = compact / self.block[k];
            let within = compact % self.block[k];
            coords[k] = self.start[k] + block_index * self.stride[k] + within;
            if k == self.rank() - 1 {
                run = self.block[k] - within;
            }
        }
        run
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// A selection describing which elements of a dataspace to access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Select all elements of the dataspace.
    All,

    /// Select no elements.
    None,

    /// Select individual points by coordinate.
    Points(Vec<Vec<u64>>),

    /// A regular hyperslab.
    Hyperslab(HyperslabSelection),
}

impl Selection {
    /// Create a simple contiguous hyperslab from ranges (one per axis).
    ///
    /// Equivalent to a hyperslab with a single block per axis. An empty
    /// range on any axis selects nothing.
    pub fn slice(ranges: &[Range<u64>]) -> Self {
        let rank = ranges.len();
        let mut start = Vec::with_capacity(rank);
        let mut extent = Vec::with_capacity(rank);
        for r in ranges {
            if r.end <= r.start {
                return Selection::None;
            }
            start.push(r.start);
            extent.push(r.end - r.start);
        }
        match HyperslabSelection::new(start, extent.clone(), vec![1; rank], extent) {
            Ok(h) => Selection::Hyperslab(h),
            Err(_) => Selection::None,
        }
    }

    /// Number of selected elements for a given dataspace shape.
    pub fn num_elements(&self, dims: &[u64]) -> u64 {
        match self {
            Selection::All => dims.iter().product(),
            Selection::None => 0,
            Selection::Points(pts) => pts.len() as u64,
            Selection::Hyperslab(h) => h.num_elements(),
        }
    }

    /// Forward query: the compact linear position of `coords` and the run
    /// of selected elements following it, or how far ahead along the
    /// fastest-changing axis the selection resumes.
    pub fn to_linear_index(&self, dims: &[u64], coords: &[u64]) -> LinearIndex {
        match self {
            Selection::All => {
                let last = dims.len() - 1;
                LinearIndex::Selected {
                    index: coords_to_linear(dims, coords),
                    run: dims[last] - coords[last],
                }
            }
            Selection::None => LinearIndex::End,
            Selection::Points(pts) => points_to_linear(pts, coords),
            Selection::Hyperslab(h) => h.to_linear_index(coords),
        }
    }

    /// Reverse query: dataspace coordinates of the element at compact
    /// position `index`, written into `coords`, plus the run length to the
    /// end of the containing block.
    ///
    /// Precondition: `index < num_elements(dims)`.
    pub fn to_coordinates_into(&self, dims: &[u64], index: u64, coords: &mut [u64]) -> u64 {
        match self {
            Selection::All => {
                linear_to_coords_into(dims, index, coords);
                let last = dims.len() - 1;
                dims[last] - coords[last]
            }
            Selection::None => panic!("reverse query on an empty selection"),
            Selection::Points(pts) => {
                coords.copy_from_slice(&pts[index as usize]);
                1
            }
            Selection::Hyperslab(h) => h.to_coordinates_into(index, coords),
        }
    }

    /// Allocating form of [`Selection::to_coordinates_into`].
    pub fn to_coordinates(&self, dims: &[u64], index: u64) -> (Vec<u64>, u64) {
        let mut coords = vec![0u64; dims.len()];
        let run = self.to_coordinates_into(dims, index, &mut coords);
        (coords, run)
    }

    /// Parse a serialized dataspace selection; returns the selection and
    /// the number of bytes consumed.
    ///
    /// Block-list hyperslab encodings (version 1) are accepted only when
    /// they contain a single block; anything else has no regular
    /// start/stride/count/block form.
    pub fn parse(data: &[u8]) -> Result<(Selection, usize), FormatError> {
        ensure_len(data, 0, 8)?;
        let selection_type = read_u32(data, 0);
        let version = read_u32(data, 4);
        let pos = 8;
        match selection_type {
            0 | 3 => {
                // "none" and "all" carry 8 reserved bytes in version 1
                if version != 1 {
                    return Err(FormatError::InvalidSelectionVersion {
                        selection_type,
                        version,
                    });
                }
                ensure_len(data, pos, 8)?;
                let sel = if selection_type == 0 {
                    Selection::None
                } else {
                    Selection::All
                };
                Ok((sel, pos + 8))
            }
            1 => parse_points_v1(data, pos, version),
            2 => match version {
                1 => parse_hyperslab_v1(data, pos),
                2 => parse_hyperslab_v2(data, pos),
                _ => Err(FormatError::InvalidSelectionVersion {
                    selection_type,
                    version,
                }),
            },
            _ => Err(FormatError::InvalidSelectionType(selection_type)),
        }
    }
}

/// Forward query over a point list: equality scan, then the nearest point
/// strictly ahead on the fastest-changing axis.
fn points_to_linear(points: &[Vec<u64>], coords: &[u64]) -> LinearIndex {
    let last = coords.len() - 1;
    let mut gap: Option<u64> = None;
    for (i, point) in points.iter().enumerate() {
        if point[..last] != coords[..last] {
            continue;
        }
        if point[last] == coords[last] {
            return LinearIndex::Selected {
                index: i as u64,
                run: 1,
            };
        }
        if point[last] > coords[last] {
            let d = point[last] - coords[last];
            gap = Some(gap.map_or(d, |g| g.min(d)));
        }
    }
    match gap {
        Some(gap) => LinearIndex::Gap { gap },
        None => LinearIndex::End,
    }
}

// ---------------------------------------------------------------------------
// Serialized selection decoding
// ---------------------------------------------------------------------------

fn ensure_len(data: &[u8], offset: usize, needed: usize) -> Result<(), FormatError> {
    if offset + needed > data.len() {
        Err(FormatError::UnexpectedEof {
            expected: offset + needed,
            available: data.len(),
        })
    } else {
        Ok(())
    }
}

fn read_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

fn read_u64(data: &[u8], pos: usize) -> u64 {
    u64::from_le_bytes([
        data[pos],
        data[pos + 1],
        data[pos + 2],
        data[pos + 3],
        data[pos + 4],
        data[pos + 5],
        data[pos + 6],
        data[pos + 7],
    ])
}

fn parse_points_v1(
    data: &[u8],
    mut pos: usize,
    version: u32,
) -> Result<(Selection, usize), FormatError> {
    if version != 1 {
        return Err(FormatError::InvalidSelectionVersion {
            selection_type: 1,
            version,
        });
    }
    // reserved(4) + length(4) + rank(4) + num_points(4)
    ensure_len(data, pos, 16)?;
    let rank = read_u32(data, pos + 8) as usize;
    let num_points = read_u32(data, pos + 12) as usize;
    pos += 16;

    ensure_len(data, pos, num_points * rank * 4)?;
    let mut points = Vec::with_capacity(num_points);
    for _ in 0..num_points {
        let mut point = Vec::with_capacity(rank);
        for _ in 0..rank {
            point.push(read_u32(data, pos) as u64);
            pos += 4;
        }
        points.push(point);
    }
    Ok((Selection::Points(points), pos))
}

fn parse_hyperslab_v1(data: &[u8], mut pos: usize) -> Result<(Selection, usize), FormatError> {
    // reserved(4) + length(4) + rank(4) + num_blocks(4)
    ensure_len(data, pos, 16)?;
    let rank = read_u32(data, pos + 8) as usize;
    let num_blocks = read_u32(data, pos + 12) as usize;
    pos += 16;

    if num_blocks != 1 {
        return Err(FormatError::IrregularHyperslab);
    }

    // One block: start corner then opposite corner, inclusive.
    ensure_len(data, pos, rank * 8)?;
    let mut start = Vec::with_capacity(rank);
    let mut extent = Vec::with_capacity(rank);
    for k in 0..rank {
        start.push(read_u32(data, pos + k * 4) as u64);
    }
    for k in 0..rank {
        let end = read_u32(data, pos + (rank + k) * 4) as u64;
        if end < start[k] {
            return Err(FormatError::InvalidHyperslab);
        }
        extent.push(end - start[k] + 1);
    }
    pos += rank * 8;

    let selection = HyperslabSelection::new(start, extent.clone(), vec![1; rank], extent)?;
    Ok((Selection::Hyperslab(selection), pos))
}

fn parse_hyperslab_v2(data: &[u8], mut pos: usize) -> Result<(Selection, usize), FormatError> {
    // flags(1) + length(4) + rank(4)
    ensure_len(data, pos, 9)?;
    let rank = read_u32(data, pos + 5) as usize;
    pos += 9;

    ensure_len(data, pos, rank * 32)?;
    let mut start = Vec::with_capacity(rank);
    let mut stride = Vec::with_capacity(rank);
    let mut count = Vec::with_capacity(rank);
    let mut block = Vec::with_capacity(rank);
    for _ in 0..rank {
        start.push(read_u64(data, pos));
        stride.push(read_u64(data, pos + 8));
        count.push(read_u64(data, pos + 16));
        block.push(read_u64(data, pos + 24));
        pos += 32;
    }

    let selection = HyperslabSelection::new(start, stride, count, block)?;
    Ok((Selection::Hyperslab(selection), pos))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
