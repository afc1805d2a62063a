//! Bounded, read-only access to image files.
//!
//! `ImageFile` memory-maps an executable image so resource bytes can be
//! borrowed straight from the mapping without copying. The mapping is
//! read-only and its size is capped by `IOLimits`.

pub mod error;

use crate::io::error::{IoError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Defines the resource limits for image mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IOLimits {
    /// The absolute maximum file size that can be mapped.
    pub max_file_size: u64,
}

impl Default for IOLimits {
    fn default() -> Self {
        Self {
            max_file_size: 512 * 1024 * 1024, // 512MB
        }
    }
}

/// A read-only memory-mapped image file.
pub struct ImageFile {
    path: PathBuf,
    mmap: Mmap,
}

impl ImageFile {
    /// Opens a file and memory-maps it read-only.
    ///
    /// Fails if the file is empty or larger than `limits.max_file_size`.
    pub fn open<P: AsRef<Path>>(path: P, limits: &IOLimits) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| IoError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let file_size = file.metadata()?.len();

        debug!(
            path = %path.display(),
            size = file_size,
            limits.max_file_size = limits.max_file_size,
            "Mapping image"
        );

        if file_size > limits.max_file_size {
            warn!(
                path = %path.display(),
                size = file_size,
                limit = limits.max_file_size,
                "Image is too large"
            );
            return Err(IoError::FileTooLarge {
                path: path.to_path_buf(),
                limit: limits.max_file_size,
                found: file_size,
            });
        }

        // memmap cannot map empty files, and an empty file is never an image.
        if file_size == 0 {
            return Err(IoError::EmptyFile {
                path: path.to_path_buf(),
            });
        }

        // Safety: read-only map of a regular file. Concurrent truncation by
        // another process is outside what this crate defends against.
        let mmap = unsafe { Mmap::map(&file)? };

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
        })
    }

    /// Path the image was mapped from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the mapping in bytes.
    pub fn size(&self) -> u64 {
        self.mmap.len() as u64
    }
}

impl std::fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageFile")
            .field("path", &self.path)
            .field("size", &self.mmap.len())
            .finish()
    }
}

impl AsRef<[u8]> for ImageFile {
    fn as_ref(&self) -> &[u8] {
        &self.mmap
    }
}
