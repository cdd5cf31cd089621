//! Pure-Rust parsing of the HDF5 structures behind virtual datasets.
//!
//! This crate provides the byte-level and algebraic building blocks the
//! `stitchhdf5` read engine is built on: dataspace and data layout
//! messages, global heap collections, the virtual dataset mapping table,
//! hyperslab selection arithmetic, and a per-dataset chunk cache.
//! It supports `no_std` environments with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod checksum;
pub mod chunk_cache;
pub mod data_layout;
pub mod dataspace;
pub mod error;
pub mod global_heap;
pub mod selection;
pub mod vds;
