//! Data directory parsers

pub mod resource;

pub use resource::{LookupError, ResourceDataEntry, ResourceDirectory, ResourceKey};
