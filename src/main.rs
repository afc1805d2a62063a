use std::process::ExitCode;

use anyhow::Context;
use rsrc_extract::logging::{init_tracing, DEFAULT_FILTER};
use rsrc_extract::resource::ResourceSource;
use rsrc_extract::{current_image, extract_and_invoke, open_image, ExtractConfig, SystemLoader};

fn main() -> ExitCode {
    init_tracing(DEFAULT_FILTER);

    println!("\n *** Extracting a DLL embedded as a binary resource\n");

    match run(&ExtractConfig::default()) {
        Ok(()) => {
            println!(" All right!");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("\n !!! ERROR: {err:#}");
            let code = err
                .downcast_ref::<rsrc_extract::ExtractError>()
                .map_or(1, |err| err.exit_code());
            ExitCode::from(code)
        }
    }
}

fn run(config: &ExtractConfig) -> anyhow::Result<()> {
    match &config.image.path {
        Some(path) => {
            let image = open_image(path, &config.image.limits())?;
            invoke(config, &image)
        }
        None => {
            let image = current_image().context("Cannot open the running executable")?;
            invoke(config, image)
        }
    }
}

fn invoke<S: ResourceSource + ?Sized>(config: &ExtractConfig, image: &S) -> anyhow::Result<()> {
    // SAFETY: the embedded module ships with this executable and its entry
    // export takes no arguments.
    let report = unsafe { extract_and_invoke(config, image, &SystemLoader) }?;
    tracing::info!(?report, "Done");
    Ok(())
}
