//! Error types for extract-and-invoke runs.
//!
//! Each layer has its own `thiserror` enum; `ExtractError` wraps them so a
//! caller can match on one [`ErrorKind`] regardless of where a failure
//! started.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::module::ModuleError;
use crate::resource::{ImageError, ResourceAccessError, ResourceErrorKind};

/// Main error type for extract-and-invoke operations.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Resource lookup failed at one of its four steps
    #[error(transparent)]
    Resource(#[from] ResourceAccessError),

    /// Module load or symbol resolution failed
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// The source image could not be opened or parsed
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Writing the extracted payload failed
    #[error("Cannot write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for extract-and-invoke operations
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Flat classification of every failure the crate reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    LoadFailed,
    LockFailed,
    SizeZero,
    ModuleLoadFailed,
    SymbolNotFound,
    Io,
    Image,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractError::Resource(err) => match err.kind {
                ResourceErrorKind::NotFound => ErrorKind::NotFound,
                ResourceErrorKind::LoadFailed => ErrorKind::LoadFailed,
                ResourceErrorKind::LockFailed => ErrorKind::LockFailed,
                ResourceErrorKind::SizeZero => ErrorKind::SizeZero,
            },
            ExtractError::Module(ModuleError::LoadFailed { .. }) => ErrorKind::ModuleLoadFailed,
            ExtractError::Module(ModuleError::SymbolNotFound { .. }) => ErrorKind::SymbolNotFound,
            ExtractError::Image(ImageError::Io(_)) => ErrorKind::Io,
            ExtractError::Image(_) => ErrorKind::Image,
            ExtractError::Io { .. } => ErrorKind::Io,
        }
    }

    /// Process exit status for this failure. Every failure is fatal.
    pub fn exit_code(&self) -> u8 {
        1
    }
}
