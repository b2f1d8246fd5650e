use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Errors raised by the restoration and deduplication pipelines.
///
/// Only `InvalidRoot` and `InvalidOptions` abort a run. Everything else is
/// scoped to a single file and ends up inside a per-run report.
#[derive(Error, Debug)]
pub enum Error {
    /// The file type cannot hold the requested metadata.
    #[error("unsupported format for {}: {reason}", path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },

    /// I/O failure while writing metadata or file times.
    #[error("failed to write metadata to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// I/O failure while reading a file for hashing.
    #[error("failed to hash {}: {source}", path.display())]
    Hash {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// I/O failure while removing a duplicate.
    #[error("failed to delete {}: {source}", path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The scan root does not exist or is not a directory.
    #[error("invalid root {}: {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: String },

    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl Error {
    /// Whether this error stops the whole run rather than a single file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::InvalidRoot { .. } | Error::InvalidOptions(_))
    }
}
