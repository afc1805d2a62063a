//! Shared helpers for the integration tests.
//!
//! Images are synthesized with `ImageBuilder`, so no sample binaries are
//! needed and the tests run on any host.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::ffi::{c_void, CStr};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use rsrc_extract::formats::pe::builder::ImageBuilder;
use rsrc_extract::formats::pe::PeImage;
use rsrc_extract::ModuleLoader;
use tempfile::NamedTempFile;

/// Resource ID the extractor looks for by default.
pub const PAYLOAD_ID: u16 = 101;

/// Stand-in for an embedded module: an `MZ` stub followed by filler.
pub fn payload() -> Vec<u8> {
    let mut bytes = b"MZ\x90\x00\x03\x00\x00\x00\x04\x00\x00\x00\xff\xff\x00\x00".to_vec();
    bytes.extend((0..=255u8).cycle().take(1000));
    bytes
}

/// An image with the payload under ID 101 plus a couple of decoys.
pub fn host_image_bytes() -> Vec<u8> {
    ImageBuilder::new()
        .rcdata_id(1, b"decoy".to_vec())
        .rcdata_named("MANIFEST", b"<assembly/>".to_vec())
        .rcdata_id(PAYLOAD_ID, payload())
        .build()
}

pub fn host_image() -> PeImage<Vec<u8>> {
    PeImage::parse(host_image_bytes()).unwrap()
}

/// Creates a temporary file with the given content.
pub fn create_temp_file(content: &[u8]) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content).unwrap();
    temp_file
}

thread_local! {
    static CALLS: Cell<usize> = const { Cell::new(0) };
}

extern "system" fn dll_hello() {
    CALLS.with(|calls| calls.set(calls.get() + 1));
}

/// Number of times the mock export has run on this thread.
pub fn entry_calls() -> usize {
    CALLS.with(Cell::get)
}

/// A loader that never touches the OS and counts what it is asked to do.
#[derive(Debug, Default)]
pub struct MockLoader {
    pub exports: Vec<&'static str>,
    pub load_error: Option<u32>,
    pub loaded: RefCell<Vec<PathBuf>>,
    pub unloaded: Cell<usize>,
}

impl MockLoader {
    pub fn exporting(names: &[&'static str]) -> Self {
        Self {
            exports: names.to_vec(),
            ..Self::default()
        }
    }

    pub fn failing(code: u32) -> Self {
        Self {
            load_error: Some(code),
            ..Self::default()
        }
    }
}

impl ModuleLoader for MockLoader {
    type Handle = usize;

    fn load(&self, path: &Path) -> Result<usize, u32> {
        if let Some(code) = self.load_error {
            return Err(code);
        }
        let mut loaded = self.loaded.borrow_mut();
        loaded.push(path.to_path_buf());
        Ok(loaded.len())
    }

    fn resolve(&self, _handle: usize, name: &CStr) -> Result<NonNull<c_void>, u32> {
        match name.to_str() {
            Ok(name) if self.exports.contains(&name) => {
                NonNull::new(dll_hello as extern "system" fn() as *mut c_void).ok_or(127)
            }
            _ => Err(127),
        }
    }

    fn unload(&self, _handle: usize) {
        self.unloaded.set(self.unloaded.get() + 1);
    }
}
