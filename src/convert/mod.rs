//! Bidirectional conversion between the scene model and glTF.
//!
//! - [`accessor`] — typed reads over shared glTF byte buffers
//! - [`import`] — glTF → scene model (geometry consolidation, scene walk)
//! - [`export`] — scene model → glTF (buffer serialization, node emission)
//! - [`material`] — variant model ↔ glTF PBR + extensions

pub mod accessor;
pub mod export;
pub mod import;
pub mod material;

pub use export::{export_scene, write_gltf, GltfExport};
pub use import::{import_document, import_gltf, import_slice};

/// Caller policy for one conversion run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertOptions {
    /// Suppress material and texture conversion entirely; all triangles
    /// coalesce onto material index 0.
    pub only_geometry: bool,
    /// Make unsupported constructs fatal instead of warn-and-degrade.
    pub strict: bool,
}
