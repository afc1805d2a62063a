//! `SystemLoader` against a real shared object on Linux.
//!
//! This binary changes the working directory, so it holds a single test.
#![cfg(target_os = "linux")]

use std::path::Path;

use rsrc_extract::{LoadedModule, ModuleError, SystemLoader};

const LIBM_CANDIDATES: &[&str] = &[
    "/lib/x86_64-linux-gnu/libm.so.6",
    "/usr/lib/x86_64-linux-gnu/libm.so.6",
    "/lib/aarch64-linux-gnu/libm.so.6",
    "/usr/lib/aarch64-linux-gnu/libm.so.6",
    "/lib64/libm.so.6",
    "/usr/lib64/libm.so.6",
    "/usr/lib/libm.so.6",
    "/lib/libm.so.6",
];

#[test]
fn test_bare_relative_name_loads_from_working_directory() {
    let Some(libm) = LIBM_CANDIDATES.iter().map(Path::new).find(|p| p.exists()) else {
        eprintln!("no libm.so.6 found, skipping");
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    std::fs::copy(libm, dir.path().join("TestMyDll.dll")).unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let module = LoadedModule::load(&SystemLoader, "TestMyDll.dll").unwrap();
    assert_eq!(module.path(), Path::new("TestMyDll.dll"));
    assert!(!module.export("cos").unwrap().address().is_null());

    let missing = module.export("NoSuchExport");
    assert!(matches!(
        missing,
        Err(ModuleError::SymbolNotFound { code: 0, .. })
    ));

    // A stale failure must not leak into the next lookup.
    assert!(module.export("sin").is_ok());
}
