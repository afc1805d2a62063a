//! Opening images and resolving the current process image.
//!
//! The current image is resolved once and cached for the life of the
//! process:
//! - on Windows it is the module `GetModuleHandleW(NULL)` returns, so
//!   lookups go through the OS loader's own resource API;
//! - elsewhere it is the running executable (`std::env::current_exe`),
//!   memory-mapped read-only and parsed as a PE image.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::{debug, info};

use crate::formats::pe::{PeError, PeImage};
use crate::io::error::IoError;
use crate::io::{IOLimits, ImageFile};
use crate::resource::source::MappedImage;

/// Failure to open or recognize an image.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error("{} is not a PE image: {source}", .path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: PeError,
    },

    #[error("Cannot locate the running executable: {0}")]
    CurrentExe(#[source] std::io::Error),

    #[error("Cannot obtain the module handle (error code {0})")]
    ModuleHandle(u32),
}

#[cfg(windows)]
pub type CurrentImage = crate::resource::win32::HostModule;

#[cfg(not(windows))]
pub type CurrentImage = MappedImage;

static CURRENT: OnceCell<CurrentImage> = OnceCell::new();

/// Map the image at `path` and parse its headers.
pub fn open_image<P: AsRef<Path>>(path: P, limits: &IOLimits) -> Result<MappedImage, ImageError> {
    let path = path.as_ref();
    let file = ImageFile::open(path, limits)?;
    let image = PeImage::parse(file).map_err(|source| ImageError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        machine = ?image.machine(),
        has_resources = image.has_resources(),
        "Image opened"
    );
    Ok(image)
}

/// The image of the running process.
pub fn current_image() -> Result<&'static CurrentImage, ImageError> {
    CURRENT.get_or_try_init(load_current)
}

#[cfg(windows)]
fn load_current() -> Result<CurrentImage, ImageError> {
    let module = crate::resource::win32::HostModule::main()?;
    info!("Using the process module as the current image");
    Ok(module)
}

#[cfg(not(windows))]
fn load_current() -> Result<CurrentImage, ImageError> {
    let exe = std::env::current_exe().map_err(ImageError::CurrentExe)?;
    info!(path = %exe.display(), "Using the running executable as the current image");
    open_image(&exe, &IOLimits::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::pe::builder::ImageBuilder;
    use std::io::Write;

    #[test]
    fn open_image_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&ImageBuilder::new().rcdata_id(1, b"abc".to_vec()).build())
            .unwrap();

        let image = open_image(file.path(), &IOLimits::default()).unwrap();
        assert!(image.has_resources());
    }

    #[test]
    fn open_image_rejects_non_pe() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x7f; 256]).unwrap();

        let err = open_image(file.path(), &IOLimits::default()).unwrap_err();
        assert!(matches!(
            err,
            ImageError::Format {
                source: PeError::InvalidDosSignature,
                ..
            }
        ));
    }

    #[cfg(not(windows))]
    #[test]
    fn current_image_is_cached_or_fails_consistently() {
        // Test binaries on non-Windows hosts are not PE images.
        let first = current_image().map(|image| image as *const CurrentImage);
        let second = current_image().map(|image| image as *const CurrentImage);
        match (first, second) {
            (Ok(a), Ok(b)) => assert_eq!(a, b),
            (Err(_), Err(_)) => {}
            _ => panic!("current image resolution is not stable"),
        }
    }
}
