use std::path::PathBuf;

use glam::Mat4;

// ============================================================================
// Sampler description
// ============================================================================

/// Texture address mode per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    #[default]
    Repeat,
    Clamp,
    Mirror,
}

impl WrapMode {
    /// Parse the native wire name; unknown names fall back to `Repeat`.
    pub fn parse(s: &str) -> Self {
        match s {
            "clamp" => WrapMode::Clamp,
            "mirror" => WrapMode::Mirror,
            _ => WrapMode::Repeat,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WrapMode::Repeat => "wrap",
            WrapMode::Clamp => "clamp",
            WrapMode::Mirror => "mirror",
        }
    }
}

/// Texture minification/magnification filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

impl FilterMode {
    pub fn parse(s: &str) -> Self {
        match s {
            "nearest" | "point" => FilterMode::Nearest,
            _ => FilterMode::Linear,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterMode::Nearest => "nearest",
            FilterMode::Linear => "linear",
        }
    }
}

/// Sampler state attached to a [`TextureInstance`].
///
/// Two instances merged into one packed image must agree on this descriptor;
/// the pack engine checks that before rasterizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerDesc {
    pub wrap_u: WrapMode,
    pub wrap_v: WrapMode,
    pub filter: FilterMode,
}

// ============================================================================
// Texture instance (per-material texture binding)
// ============================================================================

/// A material-side reference to a texture in the scene texture table.
///
/// Value type, copied freely; the referenced texture is owned by the scene
/// and shared by id.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInstance {
    /// Id into [`SceneData::textures`](crate::scene::SceneData).
    pub texture: u32,
    pub sampler: SamplerDesc,
    /// UV transform applied before sampling.
    pub matrix: Mat4,
    /// Input gamma of the source pixels; `1.0` marks linear data that must
    /// not be sRGB-encoded when packed.
    pub input_gamma: f32,
    /// Derive alpha from RGB luminance when the source has no alpha channel.
    pub alpha_from_rgb: bool,
}

impl TextureInstance {
    pub fn new(texture: u32) -> Self {
        Self {
            texture,
            sampler: SamplerDesc::default(),
            matrix: Mat4::IDENTITY,
            input_gamma: 2.2,
            alpha_from_rgb: true,
        }
    }

    /// Instance over linear (non-color) data: normal maps, packed
    /// metallic-roughness planes.
    pub fn new_linear(texture: u32) -> Self {
        Self {
            input_gamma: 1.0,
            ..Self::new(texture)
        }
    }

    /// Whether the source pixels are already linear.
    pub fn is_linear(&self) -> bool {
        (self.input_gamma - 1.0).abs() < f32::EPSILON
    }
}

// ============================================================================
// Texture table entry
// ============================================================================

/// Pixel source of a texture table entry.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureSource {
    /// On-disk image file, decoded lazily by the pack engine.
    File(PathBuf),
    /// In-memory RGBA float pixels, row-major, 4 floats per pixel.
    /// Used for textures carried inside an imported glTF document.
    Memory {
        width: u32,
        height: u32,
        rgba: Vec<f32>,
    },
}

/// One entry of the scene texture table.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub name: String,
    pub source: TextureSource,
    pub width: u32,
    pub height: u32,
    /// Bytes per pixel as recorded by the native library (`bytesize / (w*h)`);
    /// 16 marks a float4 source such as EXR.
    pub bytes_per_pixel: u32,
}

impl Texture {
    pub fn from_file(name: impl Into<String>, path: PathBuf, width: u32, height: u32, bytes_per_pixel: u32) -> Self {
        Self {
            name: name.into(),
            source: TextureSource::File(path),
            width,
            height,
            bytes_per_pixel,
        }
    }

    pub fn from_rgba_f32(name: impl Into<String>, width: u32, height: u32, rgba: Vec<f32>) -> Self {
        debug_assert_eq!(rgba.len(), (width * height * 4) as usize);
        Self {
            name: name.into(),
            source: TextureSource::Memory { width, height, rgba },
            width,
            height,
            bytes_per_pixel: 16,
        }
    }
}
