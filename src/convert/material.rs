//! Material conversion between the variant model and glTF PBR.
//!
//! Import is a direct field mapping: every glTF material becomes exactly one
//! `Material::GltfPbr` entry. Export is where the work is: only the PBR
//! variant converts, and its glossiness/metalness/coat parameterization has
//! to be re-packed into the fixed glTF metallic-roughness channel layout via
//! remap descriptors handed to the pack engine.

use glam::Vec3;
use gltf::json;
use gltf::json::validation::Checked::Valid;
use log::warn;

use crate::errors::{ConvertError, Result};
use crate::scene::{
    AlphaMode, ColorSource, GltfPbrMaterial, GmcSource, Material, MaterialEntry, SamplerDesc,
    ScalarSource, SceneData, TextureInstance,
};
use crate::scene::texture::{FilterMode, WrapMode};
use crate::tex::{ChannelRemap, ChannelSelect, PackContext, REMAP_ONES, REMAP_ZEROS};

// ============================================================================
// Import: glTF material -> variant model
// ============================================================================

fn sampler_from_gltf(sampler: &gltf::texture::Sampler) -> SamplerDesc {
    use gltf::texture::WrappingMode;
    let wrap = |mode: WrappingMode| match mode {
        WrappingMode::ClampToEdge => WrapMode::Clamp,
        WrappingMode::MirroredRepeat => WrapMode::Mirror,
        WrappingMode::Repeat => WrapMode::Repeat,
    };
    let filter = match sampler.mag_filter() {
        Some(gltf::texture::MagFilter::Nearest) => FilterMode::Nearest,
        _ => FilterMode::Linear,
    };
    SamplerDesc {
        wrap_u: wrap(sampler.wrap_s()),
        wrap_v: wrap(sampler.wrap_t()),
        filter,
    }
}

/// Instance over a glTF texture reference; the texture table id equals the
/// glTF texture index, which is dense by construction.
fn instance_from_texture(tex: &gltf::Texture, linear: bool) -> TextureInstance {
    let mut inst = if linear {
        TextureInstance::new_linear(tex.index() as u32)
    } else {
        TextureInstance::new(tex.index() as u32)
    };
    inst.sampler = sampler_from_gltf(&tex.sampler());
    inst
}

fn alpha_mode_from_gltf(mat: &gltf::Material) -> AlphaMode {
    match mat.alpha_mode() {
        gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
        gltf::material::AlphaMode::Mask => AlphaMode::Mask(mat.alpha_cutoff().unwrap_or(0.5)),
        gltf::material::AlphaMode::Blend => AlphaMode::Blend,
    }
}

/// Map one glTF material to a `GltfPbr` variant entry.
///
/// Other variant kinds are only ever authored in native scenes; a foreign
/// PBR material never infers one.
pub fn import_material(index: usize, mat: &gltf::Material) -> MaterialEntry {
    let pbr = mat.pbr_metallic_roughness();

    let color = match pbr.base_color_texture() {
        Some(info) => ColorSource::Texture(instance_from_texture(&info.texture(), false)),
        None => {
            let [r, g, b, _] = pbr.base_color_factor();
            ColorSource::Constant(Vec3::new(r, g, b))
        }
    };

    // glTF carries roughness, the variant model carries glossiness. When the
    // pair is texture-driven both planes come from the shared MR texture.
    let gmc = match pbr.metallic_roughness_texture() {
        Some(info) => {
            let inst = instance_from_texture(&info.texture(), true);
            GmcSource::Split {
                glossiness: ScalarSource::Texture(inst.clone()),
                metalness: ScalarSource::Texture(inst),
                coat: ScalarSource::Constant(0.0),
            }
        }
        None => GmcSource::Split {
            glossiness: ScalarSource::Constant(1.0 - pbr.roughness_factor()),
            metalness: ScalarSource::Constant(pbr.metallic_factor()),
            coat: ScalarSource::Constant(0.0),
        },
    };

    let variant = Material::GltfPbr(GltfPbrMaterial {
        color,
        gmc,
        fresnel_ior: 1.5,
        emission: Vec3::from_array(mat.emissive_factor()),
        emission_texture: mat
            .emissive_texture()
            .map(|info| instance_from_texture(&info.texture(), false)),
        normal_texture: mat
            .normal_texture()
            .map(|n| instance_from_texture(&n.texture(), true)),
        occlusion_texture: mat
            .occlusion_texture()
            .map(|o| instance_from_texture(&o.texture(), true)),
        alpha_mode: alpha_mode_from_gltf(mat),
    });

    MaterialEntry {
        name: mat.name().map_or_else(|| format!("material_{index}"), str::to_owned),
        variant,
    }
}

// ============================================================================
// Export: variant model -> glTF material
// ============================================================================

fn texture_info(image_index: usize) -> json::texture::Info {
    json::texture::Info {
        index: json::Index::new(image_index as u32),
        tex_coord: 0,
        extensions: Default::default(),
        extras: Default::default(),
    }
}

/// Pack an RGB color texture: channels R, G, B verbatim from the single
/// contributor.
fn pack_rgb(
    ctx: &mut PackContext,
    scene: &SceneData,
    inst: &TextureInstance,
    strict: bool,
) -> Result<usize> {
    let remap = ChannelRemap::from_signed(&[1, 2, 3], vec![inst.clone()])?;
    ctx.pack(scene, &remap, strict)
}

/// Pack a single-channel texture from the contributor's first channel.
fn pack_gray(
    ctx: &mut PackContext,
    scene: &SceneData,
    inst: &TextureInstance,
    strict: bool,
) -> Result<usize> {
    let remap = ChannelRemap::from_signed(&[1], vec![inst.clone()])?;
    ctx.pack(scene, &remap, strict)
}

struct MrSlot {
    texture: Option<json::texture::Info>,
    metallic_factor: f32,
    roughness_factor: f32,
    coat_factor: f32,
    coat_texture: Option<json::texture::Info>,
}

/// Convert the glossiness/metalness/coat parameterization into the glTF
/// metallic-roughness slot plus an optional clearcoat extension payload.
fn convert_gmc(
    gmc: &GmcSource,
    scene: &SceneData,
    ctx: &mut PackContext,
    strict: bool,
) -> Result<MrSlot> {
    match gmc {
        // Native packed layout is R = glossiness, G = metalness, B = coat.
        // glTF wants G = roughness, B = metallic: zero the R plane, invert
        // glossiness into G, move metalness to B. Coat becomes its own
        // single-channel extension image.
        GmcSource::Packed(inst) => {
            let mr = ChannelRemap::from_signed(&[REMAP_ZEROS, -1, 2], vec![inst.clone()])?;
            let mr_image = ctx.pack(scene, &mr, strict)?;
            let coat = ChannelRemap::from_signed(&[3], vec![inst.clone()])?;
            let coat_image = ctx.pack(scene, &coat, strict)?;
            Ok(MrSlot {
                texture: Some(texture_info(mr_image)),
                metallic_factor: 1.0,
                roughness_factor: 1.0,
                coat_factor: 1.0,
                coat_texture: Some(texture_info(coat_image)),
            })
        }
        // Independent parameters: synthesize one 3-channel descriptor on
        // the fly. Constant parameters stay as factors over a constant-one
        // channel; texture parameters append a contributor and point their
        // channel at it (glossiness inverted, since roughness = 1 - g).
        GmcSource::Split { glossiness, metalness, coat } => {
            let mut selectors = [REMAP_ZEROS, REMAP_ONES, REMAP_ONES];
            let mut textures: Vec<TextureInstance> = Vec::new();
            let mut roughness_factor = 1.0;
            let mut metallic_factor = 1.0;

            match glossiness {
                ScalarSource::Constant(g) => roughness_factor = 1.0 - g,
                ScalarSource::Texture(inst) => {
                    textures.push(inst.clone());
                    selectors[1] = -(textures.len() as i32);
                }
            }
            match metalness {
                ScalarSource::Constant(m) => metallic_factor = *m,
                ScalarSource::Texture(inst) => {
                    textures.push(inst.clone());
                    selectors[2] = textures.len() as i32;
                }
            }

            let texture = if textures.is_empty() {
                None
            } else {
                let remap = ChannelRemap::from_signed(&selectors, textures)?;
                Some(texture_info(ctx.pack(scene, &remap, strict)?))
            };

            let (coat_factor, coat_texture) = match coat {
                ScalarSource::Constant(c) => (*c, None),
                ScalarSource::Texture(inst) => {
                    (1.0, Some(texture_info(pack_gray(ctx, scene, inst, strict)?)))
                }
            };

            Ok(MrSlot {
                texture,
                metallic_factor,
                roughness_factor,
                coat_factor,
                coat_texture,
            })
        }
    }
}

fn convert_pbr(
    name: &str,
    pbr: &GltfPbrMaterial,
    scene: &SceneData,
    ctx: &mut PackContext,
    strict: bool,
) -> Result<json::Material> {
    let mut out = json::Material {
        name: Some(name.to_owned()),
        ..Default::default()
    };

    match &pbr.color {
        ColorSource::Constant(c) => {
            out.pbr_metallic_roughness.base_color_factor =
                json::material::PbrBaseColorFactor([c.x, c.y, c.z, 1.0]);
        }
        ColorSource::Texture(inst) => {
            out.pbr_metallic_roughness.base_color_texture =
                Some(texture_info(pack_rgb(ctx, scene, inst, strict)?));
        }
    }

    let mr = convert_gmc(&pbr.gmc, scene, ctx, strict)?;
    out.pbr_metallic_roughness.metallic_factor = json::material::StrengthFactor(mr.metallic_factor);
    out.pbr_metallic_roughness.roughness_factor = json::material::StrengthFactor(mr.roughness_factor);
    out.pbr_metallic_roughness.metallic_roughness_texture = mr.texture;

    out.emissive_factor = json::material::EmissiveFactor(pbr.emission.to_array());
    if let Some(inst) = &pbr.emission_texture {
        out.emissive_texture = Some(texture_info(pack_rgb(ctx, scene, inst, strict)?));
    }
    if let Some(inst) = &pbr.normal_texture {
        out.normal_texture = Some(json::material::NormalTexture {
            index: json::Index::new(pack_rgb(ctx, scene, inst, strict)? as u32),
            scale: 1.0,
            tex_coord: 0,
            extensions: Default::default(),
            extras: Default::default(),
        });
    }
    if let Some(inst) = &pbr.occlusion_texture {
        out.occlusion_texture = Some(json::material::OcclusionTexture {
            index: json::Index::new(pack_gray(ctx, scene, inst, strict)? as u32),
            strength: json::material::StrengthFactor(1.0),
            tex_coord: 0,
            extensions: Default::default(),
            extras: Default::default(),
        });
    }

    match pbr.alpha_mode {
        AlphaMode::Opaque => {}
        AlphaMode::Mask(cutoff) => {
            out.alpha_mode = Valid(json::material::AlphaMode::Mask);
            out.alpha_cutoff = Some(json::material::AlphaCutoff(cutoff));
        }
        AlphaMode::Blend => out.alpha_mode = Valid(json::material::AlphaMode::Blend),
    }

    // Extension blocks only when they carry non-default content.
    let mut ext = gltf::json::extensions::material::Material::default();
    let mut has_ext = false;
    if mr.coat_texture.is_some() || mr.coat_factor != 0.0 {
        let mut coat = serde_json::json!({ "clearcoatFactor": mr.coat_factor });
        if let Some(info) = &mr.coat_texture {
            coat["clearcoatTexture"] = serde_json::json!({ "index": info.index.value() });
        }
        ext.others.insert("KHR_materials_clearcoat".to_owned(), coat);
        has_ext = true;
    }
    if (pbr.fresnel_ior - 1.5).abs() > 1e-6 {
        ext.others.insert(
            "KHR_materials_ior".to_owned(),
            serde_json::json!({ "ior": pbr.fresnel_ior }),
        );
        has_ext = true;
    }
    if has_ext {
        out.extensions = Some(ext);
    }

    Ok(out)
}

/// Convert one material table entry for export.
///
/// Non-PBR variants are fatal under strict mode; in permissive mode they
/// degrade to a default-valued placeholder that keeps the original name, so
/// the output stays loadable and primitive material indices stay valid.
pub fn export_material(
    id: u32,
    entry: &MaterialEntry,
    scene: &SceneData,
    ctx: &mut PackContext,
    strict: bool,
) -> Result<json::Material> {
    match &entry.variant {
        Material::GltfPbr(pbr) => convert_pbr(&entry.name, pbr, scene, ctx, strict),
        other => {
            let variant = other.variant_name();
            if strict {
                return Err(ConvertError::UnsupportedMaterialVariant { id, variant });
            }
            warn!("material id {id} ('{}'): variant '{variant}' has no glTF counterpart, emitting dummy material", entry.name);
            Ok(json::Material {
                name: Some(entry.name.clone()),
                ..Default::default()
            })
        }
    }
}
