//! Extract an embedded module, load it, and call its entry export.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, info_span};

use crate::config::{ExtractConfig, WriteMode};
use crate::error::{ExtractError, Result};
use crate::module::{LoadedModule, ModuleLoader};
use crate::resource::{ResourceSource, ResourceView};

/// What a run wrote to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    pub output: PathBuf,
    /// Bytes written by this run.
    pub bytes_written: u64,
    /// Length of the output file afterwards.
    pub file_len: u64,
}

/// Write the view's bytes to `path`.
pub fn write_payload(view: &ResourceView<'_>, path: &Path, mode: WriteMode) -> Result<ExtractReport> {
    let io_err = |source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut options = OpenOptions::new();
    match mode {
        WriteMode::Append => options.append(true).create(true),
        WriteMode::Overwrite => options.write(true).create(true).truncate(true),
    };

    let mut file = options.open(path).map_err(io_err)?;
    file.write_all(view.as_bytes()).map_err(io_err)?;
    file.flush().map_err(io_err)?;
    let file_len = file.metadata().map_err(io_err)?.len();

    info!(
        path = %path.display(),
        bytes = view.size(),
        file_len,
        ?mode,
        "Payload written"
    );

    Ok(ExtractReport {
        output: path.to_path_buf(),
        bytes_written: view.size() as u64,
        file_len,
    })
}

/// Extract `config.resource` from `image` to `config.output`, load the
/// result through `loader`, and call `config.entry_symbol`.
///
/// The module is released before returning, whether or not the export was
/// found.
///
/// # Safety
///
/// Loading the extracted file runs its initialization code, and the export
/// is called as an `extern "system" fn()`. Both must be safe to run in this
/// process.
pub unsafe fn extract_and_invoke<S, L>(
    config: &ExtractConfig,
    image: &S,
    loader: &L,
) -> Result<ExtractReport>
where
    S: ResourceSource + ?Sized,
    L: ModuleLoader,
{
    let span = info_span!("extract_and_invoke", resource = %config.resource);
    let _enter = span.enter();

    let view = ResourceView::open(&config.resource, image)?;
    let report = write_payload(&view, &config.output, config.write_mode)?;

    let module = LoadedModule::load(loader, &config.output)?;
    let entry = module.export(&config.entry_symbol)?;

    info!(symbol = %config.entry_symbol, "Invoking export");
    // SAFETY: upheld by the caller.
    unsafe { entry.invoke() };

    Ok(report)
}
