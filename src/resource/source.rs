//! The resource-lookup capability a [`ResourceView`](super::ResourceView) resolves against.

use std::ptr::NonNull;

use crate::formats::pe::directories::{LookupError, ResourceDataEntry, ResourceKey};
use crate::formats::pe::PeImage;
use crate::io::ImageFile;

// Win32 error codes, reported by the PE-backed source as the OS would
pub const ERROR_INVALID_DATA: u32 = 13;
pub const ERROR_RESOURCE_DATA_NOT_FOUND: u32 = 1812;
pub const ERROR_RESOURCE_TYPE_NOT_FOUND: u32 = 1813;
pub const ERROR_RESOURCE_NAME_NOT_FOUND: u32 = 1814;
pub const ERROR_RESOURCE_LANG_NOT_FOUND: u32 = 1815;

/// An image that can resolve RCDATA resources in four steps.
///
/// Each step returns the platform error code on failure. The handle types
/// are whatever the backing implementation needs to carry between steps.
///
/// # Safety
///
/// A pointer returned by [`lock`](Self::lock) must be valid for reads of
/// the number of bytes [`size_of`](Self::size_of) reports for the same
/// resource, and the memory must not be mutated or freed while the source
/// is borrowed.
pub unsafe trait ResourceSource {
    /// Resource metadata (`HRSRC`)
    type Info: Copy;
    /// Handle to the backing data (`HGLOBAL`)
    type Data: Copy;

    /// Locate a resource of the RCDATA category.
    fn find(&self, name: ResourceKey<'_>) -> Result<Self::Info, u32>;

    /// Obtain a handle to the resource's backing data.
    fn load(&self, info: Self::Info) -> Result<Self::Data, u32>;

    /// Obtain the address of the first byte.
    fn lock(&self, data: Self::Data) -> Result<NonNull<u8>, u32>;

    /// Obtain the length in bytes.
    fn size_of(&self, info: Self::Info) -> Result<u32, u32>;
}

mod sealed {
    /// Byte containers whose `as_ref` always yields the same, unmoving buffer.
    pub trait StableBytes: AsRef<[u8]> {}

    impl StableBytes for &[u8] {}
    impl StableBytes for Vec<u8> {}
    impl StableBytes for Box<[u8]> {}
    impl StableBytes for memmap2::Mmap {}
    impl StableBytes for crate::io::ImageFile {}
}

/// File range of a located resource, validated against the image bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeResourceData {
    offset: usize,
    len: usize,
}

fn lookup_code(err: &LookupError) -> u32 {
    match err {
        LookupError::NoResourceDirectory => ERROR_RESOURCE_DATA_NOT_FOUND,
        LookupError::TypeNotFound => ERROR_RESOURCE_TYPE_NOT_FOUND,
        LookupError::NameNotFound => ERROR_RESOURCE_NAME_NOT_FOUND,
        LookupError::LangNotFound => ERROR_RESOURCE_LANG_NOT_FOUND,
        LookupError::Malformed(_) => ERROR_INVALID_DATA,
    }
}

// SAFETY: `load` validates the entry's file range against the image bytes,
// `lock` hands out a pointer into that range, and `StableBytes` containers
// cannot move or change their buffer behind a shared borrow.
unsafe impl<D: sealed::StableBytes> ResourceSource for PeImage<D> {
    type Info = ResourceDataEntry;
    type Data = PeResourceData;

    fn find(&self, name: ResourceKey<'_>) -> Result<ResourceDataEntry, u32> {
        self.find_rcdata(name).map_err(|err| {
            tracing::debug!(error = %err, "RCDATA lookup failed");
            lookup_code(&err)
        })
    }

    fn load(&self, info: ResourceDataEntry) -> Result<PeResourceData, u32> {
        let bytes = self.entry_bytes(&info).map_err(|err| {
            tracing::debug!(error = %err, rva = info.rva, "Resource data outside the image");
            ERROR_RESOURCE_DATA_NOT_FOUND
        })?;
        let offset = bytes.as_ptr() as usize - self.bytes().as_ptr() as usize;
        Ok(PeResourceData {
            offset,
            len: bytes.len(),
        })
    }

    fn lock(&self, data: PeResourceData) -> Result<NonNull<u8>, u32> {
        self.bytes()
            .get(data.offset..data.offset + data.len)
            .map(|bytes| NonNull::from(bytes).cast::<u8>())
            .ok_or(ERROR_INVALID_DATA)
    }

    fn size_of(&self, info: ResourceDataEntry) -> Result<u32, u32> {
        Ok(info.size)
    }
}

/// An image mapped from disk.
pub type MappedImage = PeImage<ImageFile>;
