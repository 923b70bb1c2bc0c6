use glam::Vec3;

use super::texture::TextureInstance;

// ============================================================================
// Parameter sources
// ============================================================================

/// A scalar material parameter: either a constant or texture-driven.
///
/// Exactly one alternative is populated at any time; the type makes the
/// original's "value unless texture pointer set" convention explicit.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarSource {
    Constant(f32),
    Texture(TextureInstance),
}

impl ScalarSource {
    pub fn as_constant(&self) -> Option<f32> {
        match self {
            ScalarSource::Constant(v) => Some(*v),
            ScalarSource::Texture(_) => None,
        }
    }

    pub fn as_texture(&self) -> Option<&TextureInstance> {
        match self {
            ScalarSource::Constant(_) => None,
            ScalarSource::Texture(t) => Some(t),
        }
    }
}

/// A color material parameter: constant vector or texture-driven.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSource {
    Constant(Vec3),
    Texture(TextureInstance),
}

impl ColorSource {
    pub fn as_texture(&self) -> Option<&TextureInstance> {
        match self {
            ColorSource::Constant(_) => None,
            ColorSource::Texture(t) => Some(t),
        }
    }
}

// ============================================================================
// glTF-style PBR variant
// ============================================================================

/// Alpha coverage mode. Unrecognized wire strings coerce to `Opaque`;
/// that silent fallback is the import compatibility policy, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    /// Binary coverage against the carried cutoff.
    Mask(f32),
    Blend,
}

impl AlphaMode {
    pub fn parse(mode: &str, cutoff: f32) -> Self {
        match mode {
            "MASK" | "mask" => AlphaMode::Mask(cutoff),
            "BLEND" | "blend" => AlphaMode::Blend,
            _ => AlphaMode::Opaque,
        }
    }
}

/// Glossiness/metalness/coat parameterization of a PBR material.
///
/// The native format either carries the three planes in one packed texture
/// (R = glossiness, G = metalness, B = coat) or as three independent
/// constant-or-texture parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum GmcSource {
    Packed(TextureInstance),
    Split {
        glossiness: ScalarSource,
        metalness: ScalarSource,
        coat: ScalarSource,
    },
}

impl Default for GmcSource {
    fn default() -> Self {
        GmcSource::Split {
            glossiness: ScalarSource::Constant(0.0),
            metalness: ScalarSource::Constant(0.0),
            coat: ScalarSource::Constant(0.0),
        }
    }
}

/// The one variant that round-trips losslessly to glTF PBR.
#[derive(Debug, Clone, PartialEq)]
pub struct GltfPbrMaterial {
    pub color: ColorSource,
    pub gmc: GmcSource,
    /// Fresnel IOR; a dedicated extension block is emitted only when this
    /// deviates from the implicit glTF default of 1.5.
    pub fresnel_ior: f32,
    pub emission: Vec3,
    pub emission_texture: Option<TextureInstance>,
    pub normal_texture: Option<TextureInstance>,
    pub occlusion_texture: Option<TextureInstance>,
    pub alpha_mode: AlphaMode,
}

impl Default for GltfPbrMaterial {
    fn default() -> Self {
        Self {
            color: ColorSource::Constant(Vec3::ONE),
            gmc: GmcSource::default(),
            fresnel_ior: 1.5,
            emission: Vec3::ZERO,
            emission_texture: None,
            normal_texture: None,
            occlusion_texture: None,
            alpha_mode: AlphaMode::Opaque,
        }
    }
}

// ============================================================================
// Material variant model
// ============================================================================

/// Closed set of native material kinds.
///
/// Conversion sites match exhaustively; adding a kind must break compilation
/// at every converter rather than fall into a runtime default.
#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    /// Area-light emitter.
    LightSource { color: Vec3, multiplier: f32 },
    GltfPbr(GltfPbrMaterial),
    Diffuse {
        reflectance: ColorSource,
        roughness: ScalarSource,
    },
    Conductor {
        eta: Vec3,
        k: Vec3,
        reflectance: ColorSource,
        roughness: ScalarSource,
    },
    Dielectric {
        int_ior: f32,
        ext_ior: f32,
        transmittance: ColorSource,
    },
    Plastic {
        diffuse: ColorSource,
        int_ior: f32,
        ext_ior: f32,
        roughness: ScalarSource,
    },
    /// Weighted composition of two other table entries. The references are
    /// ids into the scene material table, never owned sub-objects.
    Blend {
        first: u32,
        second: u32,
        weight: f32,
    },
    ThinFilm {
        ior: f32,
        thickness: ScalarSource,
        reflectance: ColorSource,
    },
}

impl Material {
    /// Variant name as used on the native wire and in diagnostics.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Material::LightSource { .. } => "light_source",
            Material::GltfPbr(_) => "gltf_pbr",
            Material::Diffuse { .. } => "diffuse",
            Material::Conductor { .. } => "conductor",
            Material::Dielectric { .. } => "dielectric",
            Material::Plastic { .. } => "plastic",
            Material::Blend { .. } => "blend",
            Material::ThinFilm { .. } => "thin_film",
        }
    }
}

/// A named entry of the scene material table.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialEntry {
    pub name: String,
    pub variant: Material,
}
