//! Run storage.
//!
//! Sorted runs are kept out of memory between the sorting passes. A [`RunStorage`] persists a run
//! returning a handle to it and streams the run back consuming the handle. A handle owns the run's backing
//! resource: it is released once the run stream is dropped or exhausted, or once the handle itself is dropped.

use std::error::Error;
use std::fmt::{self, Display};
use std::io;
use std::path::Path;

pub mod mem;
pub mod rmp;
pub mod text;

pub use mem::{MemoryRun, MemoryRunStorage};
pub use rmp::{RmpRun, RmpRunStorage};
pub use text::{TextRun, TextRunStorage};

/// Run storage interface.
pub trait RunStorage<T> {
    /// Persisted run handle.
    type Handle;
    /// Persisted run reader.
    type Stream: Iterator<Item = Result<T, Self::Error>>;
    /// Storage error.
    type Error: Error;

    /// Persists a sorted run consuming all the items.
    /// Stops at the first item error returning it.
    fn persist<I>(&self, items: I) -> Result<Self::Handle, Self::Error>
    where
        I: IntoIterator<Item = Result<T, Self::Error>>;

    /// Returns a stream yielding the run items in the persisted order.
    fn stream(&self, handle: Self::Handle) -> Result<Self::Stream, Self::Error>;
}

/// File backed run storage error.
#[derive(Debug)]
pub enum RunStorageError {
    /// Common I/O error.
    IO(io::Error),
    /// Data serialization error.
    SerializationError(rmp_serde::encode::Error),
    /// Data deserialization error.
    DeserializationError(rmp_serde::decode::Error),
    /// Text record parsing error.
    ParseError(String),
    /// Record can not be stored as a single text line.
    InvalidRecord(String),
}

impl From<io::Error> for RunStorageError {
    fn from(err: io::Error) -> Self {
        RunStorageError::IO(err)
    }
}

impl From<rmp_serde::encode::Error> for RunStorageError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        RunStorageError::SerializationError(err)
    }
}

impl From<rmp_serde::decode::Error> for RunStorageError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        RunStorageError::DeserializationError(err)
    }
}

impl Error for RunStorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            RunStorageError::IO(err) => Some(err),
            RunStorageError::SerializationError(err) => Some(err),
            RunStorageError::DeserializationError(err) => Some(err),
            RunStorageError::ParseError(_) => None,
            RunStorageError::InvalidRecord(_) => None,
        }
    }
}

impl Display for RunStorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            RunStorageError::IO(err) => write!(f, "I/O operation failed: {}", err),
            RunStorageError::SerializationError(err) => write!(f, "data serialization error: {}", err),
            RunStorageError::DeserializationError(err) => write!(f, "data deserialization error: {}", err),
            RunStorageError::ParseError(err) => write!(f, "record parsing error: {}", err),
            RunStorageError::InvalidRecord(record) => write!(f, "record contains a line break: {:?}", record),
        }
    }
}

/// Creates a temporary directory runs files are stored in.
/// The directory is created in `tmp_path` if it is provided, otherwise in the default OS temporary directory.
fn init_tmp_directory(tmp_path: Option<&Path>) -> Result<tempfile::TempDir, RunStorageError> {
    let tmp_dir = if let Some(tmp_path) = tmp_path {
        tempfile::tempdir_in(tmp_path)
    } else {
        tempfile::tempdir()
    }?;

    log::info!("using {} as a temporary directory", tmp_dir.path().display());

    return Ok(tmp_dir);
}
