//! Custom error types for the I/O module.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IoError {
    #[error(
        "Image {} is {found} bytes, exceeding the maximum allowed size of {limit} bytes.",
        .path.display()
    )]
    FileTooLarge {
        path: PathBuf,
        limit: u64,
        found: u64,
    },

    #[error("Image {} is empty.", .path.display())]
    EmptyFile { path: PathBuf },

    #[error("Cannot open image {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("An underlying I/O error occurred: {0}")]
    StdIo(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IoError>;
