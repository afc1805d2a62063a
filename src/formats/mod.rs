//! Executable image formats

pub mod pe;
