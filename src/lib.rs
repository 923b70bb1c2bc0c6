#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]

pub mod convert;
pub mod errors;
pub mod hsx;
pub mod scene;
pub mod tex;

use std::path::Path;

pub use convert::{export_scene, import_gltf, import_slice, write_gltf, ConvertOptions, GltfExport};
pub use errors::{ConvertError, Result};
pub use hsx::{read_hsx, write_hsx};
pub use scene::SceneData;
pub use tex::{ChannelRemap, ChannelSelect, PackContext};

/// Conversion direction, decided by the input file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// glTF/GLB in, native library out.
    GltfToNative,
    /// Native library in, glTF out.
    NativeToGltf,
}

impl Direction {
    pub fn from_input(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("gltf" | "glb") => Ok(Direction::GltfToNative),
            Some("xml" | "hsx") => Ok(Direction::NativeToGltf),
            other => Err(ConvertError::MalformedInput(format!(
                "cannot infer conversion direction from input extension {other:?}"
            ))),
        }
    }
}

/// Convert one file end to end.
pub fn convert_file(input: &Path, output: &Path, opts: &ConvertOptions) -> Result<()> {
    match Direction::from_input(input)? {
        Direction::GltfToNative => {
            let scene = convert::import_gltf(input, opts)?;
            hsx::write_hsx(output, &scene)
        }
        Direction::NativeToGltf => {
            let scene = hsx::read_hsx(input)?;
            let export = convert::export_scene(&scene, opts)?;
            convert::write_gltf(output, &export)
        }
    }
}
