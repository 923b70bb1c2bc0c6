//! Error Types
//!
//! This module defines the error taxonomy used throughout the converter.
//!
//! # Overview
//!
//! The main error type [`ConvertError`] covers all failure modes:
//! - malformed input files (XML, glTF, images)
//! - structural violations detected during conversion (sparse id spaces,
//!   inconsistent primitive layouts, unsupported topology)
//! - policy-gated conditions that are fatal only under strict mode
//!   (unsupported material variants, mismatched samplers, native-only
//!   instance features)
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, ConvertError>`.

use thiserror::Error;

/// The main error type for scenebridge.
///
/// Fatal conditions abort the whole conversion call; no partial scene is
/// produced. The policy-gated variants (`UnsupportedMaterialVariant`,
/// `UnsupportedSamplerCombination`, `UnsupportedInstanceFeature`) are only
/// raised under strict mode — in permissive mode the same conditions are
/// logged and the conversion degrades instead.
#[derive(Error, Debug)]
pub enum ConvertError {
    // ========================================================================
    // Input Parsing Errors
    // ========================================================================
    /// The input file could not be parsed or addresses data out of bounds.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// glTF parsing or loading error.
    #[error("glTF error: {0}")]
    Gltf(String),

    /// XML parsing or writing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Image decoding or encoding error.
    #[error("Image error: {0}")]
    Image(String),

    /// JSON error while building extension blocks or serializing output.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decoding error (embedded buffer data URIs).
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    // ========================================================================
    // Structural Errors (always fatal)
    // ========================================================================
    /// A mesh primitive uses a topology other than indexed triangle lists.
    #[error("Unsupported topology in mesh {mesh_id}: {detail}")]
    UnsupportedTopology {
        /// Mesh the primitive belongs to
        mesh_id: u32,
        /// What was encountered
        detail: String,
    },

    /// An id-keyed collection is sparse: its maximum id is not `len - 1`.
    #[error("Inconsistent {collection} ids: max id {max_id} with {count} entries")]
    InconsistentIds {
        /// Which collection failed the check
        collection: &'static str,
        /// Highest id present
        max_id: u32,
        /// Number of entries
        count: usize,
    },

    /// Attribute accessors within one primitive resolve to different vertex
    /// ranges, which would silently corrupt triangle topology.
    #[error("Inconsistent primitive layout in mesh {mesh_id}")]
    InconsistentPrimitiveLayout {
        /// Mesh the primitive belongs to
        mesh_id: u32,
    },

    // ========================================================================
    // Policy-Gated Errors (fatal under strict mode only)
    // ========================================================================
    /// A material variant that has no glTF counterpart was encountered
    /// during export under strict mode.
    #[error("Unsupported material variant '{variant}' for material id {id}")]
    UnsupportedMaterialVariant {
        /// Material id
        id: u32,
        /// Variant name
        variant: &'static str,
    },

    /// Two textures merged into one packed image carry different samplers.
    #[error("Different samplers for merged textures (texture ids {0:?})")]
    UnsupportedSamplerCombination(Vec<u32>),

    /// An instance carries a native-only feature the foreign format cannot
    /// express (remap lists).
    #[error("Unsupported instance feature '{feature}' in scene '{scene}'")]
    UnsupportedInstanceFeature {
        /// Scene name
        scene: String,
        /// Feature name
        feature: &'static str,
    },
}

// ============================================================================
// Convenient conversion implementations
// ============================================================================

impl From<image::ImageError> for ConvertError {
    fn from(err: image::ImageError) -> Self {
        ConvertError::Image(err.to_string())
    }
}

impl From<gltf::Error> for ConvertError {
    fn from(err: gltf::Error) -> Self {
        ConvertError::Gltf(err.to_string())
    }
}

impl From<roxmltree::Error> for ConvertError {
    fn from(err: roxmltree::Error) -> Self {
        ConvertError::Xml(err.to_string())
    }
}

impl From<quick_xml::Error> for ConvertError {
    fn from(err: quick_xml::Error) -> Self {
        ConvertError::Xml(err.to_string())
    }
}

/// Alias for `Result<T, ConvertError>`.
pub type Result<T> = std::result::Result<T, ConvertError>;
