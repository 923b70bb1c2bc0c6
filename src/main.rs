use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use scenebridge::ConvertOptions;

/// Converts 3D scenes between the native XML scene library and glTF 2.0.
///
/// The direction is inferred from the input extension: `.xml`/`.hsx` inputs
/// export to glTF, `.gltf`/`.glb` inputs import to the native library.
#[derive(Parser, Debug)]
#[command(name = "scenebridge", version, about)]
struct Cli {
    /// Input scene file (.xml/.hsx or .gltf/.glb)
    input: PathBuf,

    /// Output scene file
    output: PathBuf,

    /// Convert geometry only, suppressing materials and textures
    #[arg(long)]
    only_geometry: bool,

    /// Fail on unsupported constructs instead of degrading with a warning
    #[arg(long)]
    strict: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let opts = ConvertOptions {
        only_geometry: cli.only_geometry,
        strict: cli.strict,
    };
    match scenebridge::convert_file(&cli.input, &cli.output, &opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("conversion failed: {err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
