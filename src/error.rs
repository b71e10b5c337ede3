#![forbid(unsafe_code)]

//! Error types shared by the catalog, the batch executor and the devices.

use std::io;

use thiserror::Error;

use crate::model::Drive;

/// Failures reported by a device (directory source or file operations).
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The source file could not be opened for reading.
    #[error("cannot open {drive}:{name}: {source}")]
    FileOpen {
        drive: Drive,
        name: String,
        #[source]
        source: io::Error,
    },

    /// The destination file could not be created.
    #[error("cannot create {drive}:{name}: {source}")]
    FileCreate {
        drive: Drive,
        name: String,
        #[source]
        source: io::Error,
    },

    /// A record read or write failed mid-transfer.
    #[error("I/O failure on {drive}:{name}: {source}")]
    DeviceIo {
        drive: Drive,
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("no file {name} on drive {drive}")]
    NotFound { drive: Drive, name: String },

    #[error("drive {0} is not mapped")]
    NoSuchDrive(Drive),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors surfaced by the core and the application loop.
#[derive(Debug, Error)]
pub enum CommanderError {
    /// More file records than the catalog can hold; the catalog is truncated but usable.
    #[error("directory of {drive}: exceeds {capacity} entries, list truncated")]
    DirectoryOverflow { drive: Drive, capacity: usize },

    #[error("source and destination are both drive {0}")]
    SameDrive(Drive),

    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Backing storage for a catalog could not be reserved.
    #[error("cannot allocate catalog storage for {capacity} entries")]
    Allocation { capacity: usize },

    #[error("config error: {0}")]
    Config(String),

    #[error("terminal error: {0}")]
    Terminal(#[from] io::Error),
}

pub type Result<T, E = CommanderError> = std::result::Result<T, E>;
