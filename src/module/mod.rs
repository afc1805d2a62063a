//! Dynamically linked modules with scoped ownership.
//!
//! [`LoadedModule`] pairs a handle from a [`ModuleLoader`] with the loader
//! that produced it and releases the handle exactly once when dropped.
//! A load that fails produces no `LoadedModule`, so there is nothing to
//! release on that path.

pub mod system;

use std::ffi::{c_void, CString};
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use thiserror::Error;
use tracing::{debug, info, warn};

pub use system::SystemLoader;

/// The platform's dynamic loader.
pub trait ModuleLoader {
    /// Loaded-module handle (`HMODULE`, `dlopen` handle)
    type Handle: Copy + fmt::Debug;

    /// Load the module at `path`, returning the platform error code on failure.
    fn load(&self, path: &Path) -> Result<Self::Handle, u32>;

    /// Address of the export `name`.
    fn resolve(&self, handle: Self::Handle, name: &std::ffi::CStr) -> Result<NonNull<c_void>, u32>;

    /// Release a handle returned by [`load`](Self::load).
    fn unload(&self, handle: Self::Handle);
}

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Cannot load the module {} (error code {code})", .path.display())]
    LoadFailed { path: PathBuf, code: u32 },

    #[error("Cannot find the function {name} (error code {code})")]
    SymbolNotFound { name: String, code: u32 },
}

/// A module kept loaded until this value is dropped.
pub struct LoadedModule<'l, L: ModuleLoader> {
    loader: &'l L,
    handle: L::Handle,
    path: PathBuf,
}

impl<'l, L: ModuleLoader> LoadedModule<'l, L> {
    pub fn load<P: AsRef<Path>>(loader: &'l L, path: P) -> Result<Self, ModuleError> {
        let path = path.as_ref();
        let handle = loader.load(path).map_err(|code| {
            warn!(path = %path.display(), code, "Module load failed");
            ModuleError::LoadFailed {
                path: path.to_path_buf(),
                code,
            }
        })?;
        info!(path = %path.display(), ?handle, "Module loaded");
        Ok(Self {
            loader,
            handle,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn handle(&self) -> L::Handle {
        self.handle
    }

    /// Resolve an exported function by name.
    ///
    /// A name with an interior NUL can never be exported and is rejected
    /// without asking the loader.
    pub fn export(&self, name: &str) -> Result<ExportedFn<'_>, ModuleError> {
        let not_found = |code| ModuleError::SymbolNotFound {
            name: name.to_string(),
            code,
        };
        let symbol = CString::new(name).map_err(|_| not_found(0))?;
        let address = self.loader.resolve(self.handle, &symbol).map_err(|code| {
            warn!(symbol = name, code, "Export not found");
            not_found(code)
        })?;
        debug!(symbol = name, address = ?address, "Export resolved");
        Ok(ExportedFn {
            address,
            _module: PhantomData,
        })
    }
}

impl<L: ModuleLoader> Drop for LoadedModule<'_, L> {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "Unloading module");
        self.loader.unload(self.handle);
    }
}

impl<L: ModuleLoader> fmt::Debug for LoadedModule<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("handle", &self.handle)
            .field("path", &self.path)
            .finish()
    }
}

/// A function exported by a [`LoadedModule`], valid while the module is loaded.
#[derive(Debug, Clone, Copy)]
pub struct ExportedFn<'m> {
    address: NonNull<c_void>,
    _module: PhantomData<&'m ()>,
}

impl ExportedFn<'_> {
    pub fn address(&self) -> *const c_void {
        self.address.as_ptr()
    }

    /// Call the export with no arguments.
    ///
    /// # Safety
    ///
    /// The export must be a function taking no arguments and returning
    /// nothing under the platform's system calling convention, and it must
    /// be safe to run in this process.
    pub unsafe fn invoke(&self) {
        let entry: extern "system" fn() = unsafe { std::mem::transmute(self.address.as_ptr()) };
        entry();
    }
}
