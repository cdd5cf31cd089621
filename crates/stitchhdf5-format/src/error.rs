//! Error types for HDF5 format parsing.

use core::fmt;

/// Errors that can occur when parsing HDF5 binary format structures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Unexpected end of data.
    UnexpectedEof {
        /// Number of bytes expected.
        expected: usize,
        /// Number of bytes actually available.
        available: usize,
    },
    /// Invalid offset size (must be 2, 4, or 8).
    InvalidOffsetSize(u8),
    /// Invalid length size (must be 2, 4, or 8).
    InvalidLengthSize(u8),
    /// Invalid dataspace version.
    InvalidDataspaceVersion(u8),
    /// Invalid dataspace type.
    InvalidDataspaceType(u8),
    /// Invalid data layout version.
    InvalidLayoutVersion(u8),
    /// Invalid data layout class.
    InvalidLayoutClass(u8),
    /// Invalid global heap collection signature.
    InvalidGlobalHeapSignature,
    /// Invalid global heap collection version.
    InvalidGlobalHeapVersion(u8),
    /// No object with the given index in a global heap collection.
    GlobalHeapObjectNotFound(u16),
    /// Invalid virtual dataset heap block version.
    InvalidVdsVersion(u8),
    /// Unknown serialized selection type code.
    InvalidSelectionType(u32),
    /// Unsupported serialized selection version for a given type.
    InvalidSelectionVersion {
        /// The selection type code.
        selection_type: u32,
        /// The version found.
        version: u32,
    },
    /// A block-list hyperslab encoding that no regular
    /// start/stride/count/block pattern can represent.
    IrregularHyperslab,
    /// Hyperslab parameters violating `stride >= block >= 1` or
    /// `count >= 1` on some axis.
    InvalidHyperslab,
    /// A name in a virtual dataset entry is missing its NUL terminator.
    UnterminatedName,
    /// A name in a virtual dataset entry is not valid UTF-8.
    InvalidEntryName,
    /// Jenkins lookup3 checksum mismatch.
    ChecksumMismatch {
        /// The checksum stored in the file.
        expected: u32,
        /// The checksum we computed.
        computed: u32,
    },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::UnexpectedEof {
                expected,
                available,
            } => {
                write!(f, "unexpected EOF: need {expected} bytes, have {available}")
            }
            FormatError::InvalidOffsetSize(s) => {
                write!(f, "invalid offset size: {s} (must be 2, 4, or 8)")
            }
            FormatError::InvalidLengthSize(s) => {
                write!(f, "invalid length size: {s} (must be 2, 4, or 8)")
            }
            FormatError::InvalidDataspaceVersion(v) => {
                write!(f, "invalid dataspace version: {v}")
            }
            FormatError::InvalidDataspaceType(t) => {
                write!(f, "invalid dataspace type: {t}")
            }
            FormatError::InvalidLayoutVersion(v) => {
                write!(f, "invalid data layout version: {v}")
            }
            FormatError::InvalidLayoutClass(c) => {
                write!(f, "invalid data layout class: {c}")
            }
            FormatError::InvalidGlobalHeapSignature => {
                write!(f, "invalid global heap collection signature")
            }
            FormatError::InvalidGlobalHeapVersion(v) => {
                write!(f, "invalid global heap collection version: {v}")
            }
            FormatError::GlobalHeapObjectNotFound(i) => {
                write!(f, "global heap object {i} not found")
            }
            FormatError::InvalidVdsVersion(v) => {
                write!(f, "invalid virtual dataset heap block version: {v}")
            }
            FormatError::InvalidSelectionType(t) => {
                write!(f, "invalid selection type: {t}")
            }
            FormatError::InvalidSelectionVersion {
                selection_type,
                version,
            } => {
                write!(
                    f,
                    "unsupported version {version} for selection type {selection_type}"
                )
            }
            FormatError::IrregularHyperslab => {
                write!(f, "irregular hyperslab cannot be represented")
            }
            FormatError::InvalidHyperslab => {
                write!(f, "invalid hyperslab parameters")
            }
            FormatError::UnterminatedName => {
                write!(f, "unterminated name in virtual dataset entry")
            }
            FormatError::InvalidEntryName => {
                write!(f, "non-UTF-8 name in virtual dataset entry")
            }
            FormatError::ChecksumMismatch { expected, computed } => {
                write!(
                    f,
                    "checksum mismatch: expected {expected:#010x}, computed {computed:#010x}"
                )
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FormatError {}
