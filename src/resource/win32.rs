//! The OS loader's resource API as a [`ResourceSource`].

use std::ffi::c_void;
use std::ptr::{self, NonNull};

use windows_sys::Win32::Foundation::GetLastError;
use windows_sys::Win32::System::LibraryLoader::{
    FindResourceW, GetModuleHandleW, LoadResource, LockResource, SizeofResource,
};

use crate::formats::pe::RT_RCDATA;
use crate::resource::image::ImageError;
use crate::resource::source::{ResourceSource, ERROR_RESOURCE_NAME_NOT_FOUND};
use crate::resource::ResourceKey;

/// A module mapped by the OS loader.
///
/// The handle is not reference counted here; the module must stay loaded
/// for as long as this value (and any view into it) is alive.
#[derive(Debug, Clone, Copy)]
pub struct HostModule(*mut c_void);

// SAFETY: module handles are process-wide and the resource functions used
// here are thread-safe.
unsafe impl Send for HostModule {}
unsafe impl Sync for HostModule {}

impl HostModule {
    /// The module the process was started from.
    pub fn main() -> Result<Self, ImageError> {
        // SAFETY: a null name asks for the executable's own handle, which
        // is valid for the life of the process.
        let handle = unsafe { GetModuleHandleW(ptr::null()) };
        if handle.is_null() {
            return Err(ImageError::ModuleHandle(last_error()));
        }
        Ok(Self(handle))
    }

    /// Wrap a handle obtained elsewhere.
    ///
    /// # Safety
    ///
    /// `handle` must refer to a loaded module that outlives the returned
    /// value.
    pub unsafe fn from_raw(handle: *mut c_void) -> Self {
        Self(handle)
    }

    pub fn as_raw(&self) -> *mut c_void {
        self.0
    }
}

fn last_error() -> u32 {
    // SAFETY: reads thread-local state only.
    unsafe { GetLastError() }
}

/// `MAKEINTRESOURCEW`
fn int_resource(id: u16) -> *const u16 {
    id as usize as *const u16
}

// SAFETY: `LockResource` returns a pointer into the mapped module, which
// stays valid and read-only while the module is loaded.
unsafe impl ResourceSource for HostModule {
    type Info = *mut c_void;
    type Data = *mut c_void;

    fn find(&self, name: ResourceKey<'_>) -> Result<*mut c_void, u32> {
        let found = match name {
            // SAFETY: integer resources are passed by value in the pointer.
            ResourceKey::Id(id) => unsafe {
                FindResourceW(self.0, int_resource(id), int_resource(RT_RCDATA))
            },
            ResourceKey::Name(text) => {
                if text.contains('\0') {
                    return Err(ERROR_RESOURCE_NAME_NOT_FOUND);
                }
                let wide: Vec<u16> = text.encode_utf16().chain(Some(0)).collect();
                // SAFETY: `wide` is NUL-terminated and outlives the call.
                unsafe { FindResourceW(self.0, wide.as_ptr(), int_resource(RT_RCDATA)) }
            }
        };
        if found.is_null() {
            Err(last_error())
        } else {
            Ok(found)
        }
    }

    fn load(&self, info: *mut c_void) -> Result<*mut c_void, u32> {
        // SAFETY: `info` came from `find` on this module.
        let data = unsafe { LoadResource(self.0, info) };
        if data.is_null() {
            Err(last_error())
        } else {
            Ok(data)
        }
    }

    fn lock(&self, data: *mut c_void) -> Result<NonNull<u8>, u32> {
        // SAFETY: `data` came from `load` on this module.
        let ptr = unsafe { LockResource(data) };
        NonNull::new(ptr.cast::<u8>()).ok_or_else(last_error)
    }

    fn size_of(&self, info: *mut c_void) -> Result<u32, u32> {
        // SAFETY: `info` came from `find` on this module.
        match unsafe { SizeofResource(self.0, info) } {
            0 => Err(last_error()),
            size => Ok(size),
        }
    }
}
