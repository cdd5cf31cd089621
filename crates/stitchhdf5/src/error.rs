//! Error types for the virtual dataset engine.

use std::fmt;

use stitchhdf5_format::error::FormatError;

/// Errors that can occur when reading a virtual dataset.
#[derive(Debug)]
pub enum Error {
    /// I/O error from the filesystem.
    Io(std::io::Error),
    /// Low-level format parsing error.
    Format(FormatError),
    /// The object at the given path is not a dataset.
    NotADataset(String),
    /// The virtual dataspace has an unlimited dimension.
    UnlimitedVirtualDataset,
    /// Only seeking from the start is supported.
    UnsupportedSeek,
    /// A read would advance the stream position past `u64::MAX`.
    PositionOverflow,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Format(e) => write!(f, "HDF5 format error: {e}"),
            Error::NotADataset(path) => write!(f, "not a dataset: {path}"),
            Error::UnlimitedVirtualDataset => {
                write!(f, "virtual dataset has an unlimited dimension")
            }
            Error::UnsupportedSeek => write!(f, "only seeking from the start is supported"),
            Error::PositionOverflow => write!(f, "read would overflow the stream position"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Format(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FormatError> for Error {
    fn from(e: FormatError) -> Self {
        Error::Format(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
