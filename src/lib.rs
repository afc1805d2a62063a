//! Zero-copy access to RCDATA resources in PE images, and extraction of
//! embedded modules.
//!
//! [`ResourceView`] borrows one resource's bytes from an image, either the
//! running process or a PE file mapped from disk. [`extract_and_invoke`]
//! writes those bytes out, loads them as a dynamic module and calls an
//! export.

pub mod config;
pub mod error;
pub mod extract;
pub mod formats;
pub mod io;
pub mod logging;
pub mod module;
pub mod resource;

pub use config::{ExtractConfig, ImageConfig, WriteMode};
pub use error::{ErrorKind, ExtractError, Result};
pub use extract::{extract_and_invoke, write_payload, ExtractReport};
pub use module::{ExportedFn, LoadedModule, ModuleError, ModuleLoader, SystemLoader};
pub use resource::{
    current_image, open_image, ResourceAccessError, ResourceErrorKind, ResourceId,
    ResourceSource, ResourceView,
};
