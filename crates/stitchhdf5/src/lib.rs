//! Virtual dataset (VDS) read engine for HDF5 files.
//!
//! A virtual dataset is a logical dataset whose contents are stitched
//! together from selections of *source datasets*, possibly in other
//! files. This crate implements the read side of that stitching on top
//! of `stitchhdf5-format`: parsing the mapping table is the format
//! crate's job; resolving source files, caching opened handles, and
//! streaming elements into a caller buffer happen here.
//!
//! The engine is connected to the rest of a reader through the
//! [`VirtualSource`] trait:
//!
//! ```ignore
//! use stitchhdf5::{DatasetAccess, VirtualReadStream};
//!
//! let entries = descriptor.entries;
//! let mut stream = VirtualReadStream::new(
//!     source, &host_file, &entries, virtual_dims, fill_value, DatasetAccess::new(),
//! )?;
//! let mut values = vec![0.0f64; 100];
//! stream.read_virtual(&mut values)?;
//! ```
//!
//! Reads are dense: every requested element is produced, either from the
//! first mapping entry covering it or from the dataset's fill value.

pub mod access;
pub mod error;
pub mod virtual_read;

pub use access::DatasetAccess;
pub use error::Error;
pub use virtual_read::{SelectionStep, SourceRuns, VirtualReadStream, VirtualSource};

// Re-export the format-level types that appear in the engine's API.
pub use stitchhdf5_format::chunk_cache::ChunkCache;
pub use stitchhdf5_format::dataspace::UNLIMITED;
pub use stitchhdf5_format::selection::{HyperslabSelection, LinearIndex, Selection};
pub use stitchhdf5_format::vds::{VdsDescriptor, VdsEntry};
