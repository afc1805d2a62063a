//! The host's own dynamic loader.

use std::ffi::{c_void, CStr};
use std::path::Path;
use std::ptr::NonNull;

use super::ModuleLoader;

/// `LoadLibraryW` / `GetProcAddress` / `FreeLibrary` on Windows,
/// `dlopen` / `dlsym` / `dlclose` elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLoader;

/// A module handle from the system loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemHandle(NonNull<c_void>);

#[cfg(windows)]
mod imp {
    use super::*;
    use std::os::windows::ffi::OsStrExt;

    use windows_sys::Win32::Foundation::{FreeLibrary, GetLastError};
    use windows_sys::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};

    fn last_error() -> u32 {
        // SAFETY: reads thread-local state only.
        unsafe { GetLastError() }
    }

    pub fn load(path: &Path) -> Result<SystemHandle, u32> {
        let wide: Vec<u16> = path.as_os_str().encode_wide().chain(Some(0)).collect();
        // SAFETY: `wide` is NUL-terminated and outlives the call.
        let handle = unsafe { LoadLibraryW(wide.as_ptr()) };
        NonNull::new(handle).map(SystemHandle).ok_or_else(last_error)
    }

    pub fn resolve(handle: SystemHandle, name: &CStr) -> Result<NonNull<c_void>, u32> {
        // SAFETY: `handle` is a live module and `name` is NUL-terminated.
        let address = unsafe { GetProcAddress(handle.0.as_ptr(), name.as_ptr().cast()) };
        address
            .and_then(|f| NonNull::new(f as *mut c_void))
            .ok_or_else(last_error)
    }

    pub fn unload(handle: SystemHandle) {
        // SAFETY: `handle` came from `LoadLibraryW` and is released once.
        if unsafe { FreeLibrary(handle.0.as_ptr()) } == 0 {
            tracing::warn!(code = last_error(), "FreeLibrary failed");
        }
    }
}

#[cfg(unix)]
mod imp {
    use super::*;
    use std::borrow::Cow;
    use std::ffi::CString;
    use std::os::raw::{c_char, c_int};
    use std::os::unix::ffi::OsStrExt;

    const RTLD_NOW: c_int = 2;
    const EINVAL: u32 = 22;

    #[cfg_attr(target_os = "linux", link(name = "dl"))]
    extern "C" {
        fn dlopen(filename: *const c_char, flag: c_int) -> *mut c_void;
        fn dlsym(handle: *mut c_void, symbol: *const c_char) -> *mut c_void;
        fn dlclose(handle: *mut c_void) -> c_int;
        fn dlerror() -> *mut c_char;
    }

    /// Takes (and so clears) the pending `dlerror` message.
    fn take_dlerror() -> Option<String> {
        // SAFETY: `dlerror` returns null or a NUL-terminated thread-local string.
        unsafe {
            let text = dlerror();
            (!text.is_null()).then(|| CStr::from_ptr(text).to_string_lossy().into_owned())
        }
    }

    /// The dl* functions report failures only as text and leave `errno`
    /// unspecified, so the text is logged and the code is always 0.
    fn last_error(op: &str) -> u32 {
        let message = take_dlerror();
        tracing::warn!(op, message = message.as_deref().unwrap_or(""), "Loader call failed");
        0
    }

    /// `dlopen` searches the library path for a name without a slash;
    /// such a name is anchored to the working directory instead.
    pub(super) fn dlopen_path(path: &Path) -> Cow<'_, Path> {
        if path.parent() == Some(Path::new("")) {
            Cow::Owned(Path::new(".").join(path))
        } else {
            Cow::Borrowed(path)
        }
    }

    pub fn load(path: &Path) -> Result<SystemHandle, u32> {
        let path = CString::new(dlopen_path(path).as_os_str().as_bytes()).map_err(|_| EINVAL)?;
        // SAFETY: `path` is NUL-terminated and outlives the call.
        let handle = unsafe { dlopen(path.as_ptr(), RTLD_NOW) };
        NonNull::new(handle)
            .map(SystemHandle)
            .ok_or_else(|| last_error("dlopen"))
    }

    pub fn resolve(handle: SystemHandle, name: &CStr) -> Result<NonNull<c_void>, u32> {
        take_dlerror();
        // SAFETY: `handle` is a live module and `name` is NUL-terminated.
        let address = unsafe { dlsym(handle.0.as_ptr(), name.as_ptr()) };
        NonNull::new(address).ok_or_else(|| last_error("dlsym"))
    }

    pub fn unload(handle: SystemHandle) {
        // SAFETY: `handle` came from `dlopen` and is released once.
        if unsafe { dlclose(handle.0.as_ptr()) } != 0 {
            last_error("dlclose");
        }
    }
}

impl ModuleLoader for SystemLoader {
    type Handle = SystemHandle;

    fn load(&self, path: &Path) -> Result<SystemHandle, u32> {
        imp::load(path)
    }

    fn resolve(&self, handle: SystemHandle, name: &CStr) -> Result<NonNull<c_void>, u32> {
        imp::resolve(handle, name)
    }

    fn unload(&self, handle: SystemHandle) {
        imp::unload(handle)
    }
}
