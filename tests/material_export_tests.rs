//! Material Export Tests
//!
//! Tests for:
//! - strict vs permissive handling of non-PBR variants
//! - id-contiguity check running before any per-material work
//! - glossiness/metalness/coat conversion (constants, synthesized remaps,
//!   packed fast path)
//! - sampler-compatibility policy for merged contributors
//! - extension blocks emitted only for non-default values

use glam::Vec3;
use scenebridge::errors::ConvertError;
use scenebridge::scene::{
    ColorSource, GltfPbrMaterial, GmcSource, Material, MaterialEntry, ScalarSource, SceneData,
    Texture, TextureInstance, WrapMode,
};
use scenebridge::{export_scene, ConvertOptions};

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn gray_texture(value: f32) -> Texture {
    let rgba: Vec<f32> = (0..8 * 8).flat_map(|_| [value, value, value, 1.0]).collect();
    Texture::from_rgba_f32("gray", 8, 8, rgba)
}

fn scene_with_material(variant: Material) -> SceneData {
    let mut scene = SceneData::default();
    scene.materials.insert(
        0,
        MaterialEntry {
            name: "subject".into(),
            variant,
        },
    );
    scene
}

fn pbr(gmc: GmcSource) -> Material {
    Material::GltfPbr(GltfPbrMaterial {
        gmc,
        ..GltfPbrMaterial::default()
    })
}

// ============================================================================
// Strict / permissive policy
// ============================================================================

#[test]
fn diffuse_material_fails_strict_export() {
    let scene = scene_with_material(Material::Diffuse {
        reflectance: ColorSource::Constant(Vec3::splat(0.5)),
        roughness: ScalarSource::Constant(0.0),
    });
    let opts = ConvertOptions { strict: true, ..ConvertOptions::default() };
    let err = export_scene(&scene, &opts).unwrap_err();
    assert!(matches!(
        err,
        ConvertError::UnsupportedMaterialVariant { id: 0, variant: "diffuse" }
    ));
}

#[test]
fn diffuse_material_degrades_to_dummy_in_permissive_export() {
    let scene = scene_with_material(Material::Diffuse {
        reflectance: ColorSource::Constant(Vec3::splat(0.5)),
        roughness: ScalarSource::Constant(0.0),
    });
    let export = export_scene(&scene, &ConvertOptions::default()).unwrap();
    assert_eq!(export.root.materials.len(), 1);
    assert_eq!(export.root.materials[0].name.as_deref(), Some("subject"));
}

#[test]
fn sparse_material_ids_fail_before_conversion() {
    let mut scene = SceneData::default();
    for id in [0u32, 1, 3] {
        scene.materials.insert(
            id,
            MaterialEntry {
                name: format!("m{id}"),
                // strict would fail on the variant itself, proving the id
                // check runs first
                variant: Material::Diffuse {
                    reflectance: ColorSource::Constant(Vec3::ONE),
                    roughness: ScalarSource::Constant(0.0),
                },
            },
        );
    }
    let opts = ConvertOptions { strict: true, ..ConvertOptions::default() };
    let err = export_scene(&scene, &opts).unwrap_err();
    assert!(matches!(
        err,
        ConvertError::InconsistentIds { collection: "material", max_id: 3, count: 3 }
    ));
}

// ============================================================================
// Glossiness / metalness / coat conversion
// ============================================================================

#[test]
fn constant_gmc_becomes_factors_without_texture() {
    let scene = scene_with_material(pbr(GmcSource::Split {
        glossiness: ScalarSource::Constant(0.3),
        metalness: ScalarSource::Constant(0.4),
        coat: ScalarSource::Constant(0.0),
    }));
    let export = export_scene(&scene, &ConvertOptions::default()).unwrap();
    let mat = &export.root.materials[0];
    assert!(approx(mat.pbr_metallic_roughness.roughness_factor.0, 0.7));
    assert!(approx(mat.pbr_metallic_roughness.metallic_factor.0, 0.4));
    assert!(mat.pbr_metallic_roughness.metallic_roughness_texture.is_none());
    assert!(export.images.is_empty());
    assert!(mat.extensions.is_none());
}

#[test]
fn texture_driven_gmc_synthesizes_packed_image() {
    let mut scene = scene_with_material(pbr(GmcSource::Split {
        glossiness: ScalarSource::Texture(TextureInstance::new_linear(0)),
        metalness: ScalarSource::Texture(TextureInstance::new_linear(1)),
        coat: ScalarSource::Constant(0.0),
    }));
    scene.textures.insert(0, gray_texture(0.25));
    scene.textures.insert(1, gray_texture(0.75));

    let opts = ConvertOptions { strict: true, ..ConvertOptions::default() };
    let export = export_scene(&scene, &opts).unwrap();
    let mat = &export.root.materials[0];
    assert!(mat.pbr_metallic_roughness.metallic_roughness_texture.is_some());
    assert_eq!(export.images.len(), 1);

    let img = &export.images[0];
    assert_eq!(img.channels, 3);
    for px in img.pixels.chunks(3) {
        assert_eq!(px[0], 0, "R plane must stay constant zero");
        assert_eq!(px[1], 255 - 64, "G is inverted glossiness");
        assert_eq!(px[2], 191, "B is metalness");
    }
}

#[test]
fn packed_gmc_reuses_texture_and_emits_clearcoat() {
    let mut scene = scene_with_material(pbr(GmcSource::Packed(TextureInstance::new_linear(0))));
    // R = glossiness 0.25, G = metalness 0.75, B = coat 0.5
    let rgba: Vec<f32> = (0..4 * 4).flat_map(|_| [0.25, 0.75, 0.5, 1.0]).collect();
    scene.textures.insert(0, Texture::from_rgba_f32("gmc", 4, 4, rgba));

    let opts = ConvertOptions { strict: true, ..ConvertOptions::default() };
    let export = export_scene(&scene, &opts).unwrap();
    let mat = &export.root.materials[0];

    // metallic-roughness image plus the single-channel coat image
    assert_eq!(export.images.len(), 2);
    let mr = &export.images[0];
    for px in mr.pixels.chunks(3) {
        assert_eq!(px, [0, 255 - 64, 191]);
    }
    let coat = &export.images[1];
    assert_eq!(coat.channels, 1);
    assert!(coat.pixels.iter().all(|&v| v == 128));

    let ext = mat.extensions.as_ref().expect("clearcoat extension block");
    let coat_ext = ext.others.get("KHR_materials_clearcoat").expect("clearcoat entry");
    assert!(coat_ext.get("clearcoatTexture").is_some());
}

// ============================================================================
// Sampler compatibility
// ============================================================================

fn mismatched_sampler_scene() -> SceneData {
    let mut gloss = TextureInstance::new_linear(0);
    gloss.sampler.wrap_u = WrapMode::Repeat;
    let mut metal = TextureInstance::new_linear(1);
    metal.sampler.wrap_u = WrapMode::Clamp;

    let mut scene = scene_with_material(pbr(GmcSource::Split {
        glossiness: ScalarSource::Texture(gloss),
        metalness: ScalarSource::Texture(metal),
        coat: ScalarSource::Constant(0.0),
    }));
    scene.textures.insert(0, gray_texture(0.5));
    scene.textures.insert(1, gray_texture(0.5));
    scene
}

#[test]
fn mismatched_samplers_fail_strict_export() {
    let scene = mismatched_sampler_scene();
    let opts = ConvertOptions { strict: true, ..ConvertOptions::default() };
    let err = export_scene(&scene, &opts).unwrap_err();
    assert!(matches!(err, ConvertError::UnsupportedSamplerCombination(ids) if ids == vec![0, 1]));
}

#[test]
fn mismatched_samplers_degrade_to_first_contributor() {
    let scene = mismatched_sampler_scene();
    let export = export_scene(&scene, &ConvertOptions::default()).unwrap();
    assert_eq!(export.images.len(), 1);
}

// ============================================================================
// Extension blocks
// ============================================================================

#[test]
fn non_default_ior_emits_extension() {
    let scene = scene_with_material(Material::GltfPbr(GltfPbrMaterial {
        fresnel_ior: 1.33,
        ..GltfPbrMaterial::default()
    }));
    let export = export_scene(&scene, &ConvertOptions::default()).unwrap();
    let ext = export.root.materials[0].extensions.as_ref().expect("extension block");
    let ior = ext.others.get("KHR_materials_ior").expect("ior entry");
    assert!(approx(ior["ior"].as_f64().unwrap() as f32, 1.33));
}

#[test]
fn default_ior_emits_no_extension() {
    let scene = scene_with_material(Material::GltfPbr(GltfPbrMaterial::default()));
    let export = export_scene(&scene, &ConvertOptions::default()).unwrap();
    assert!(export.root.materials[0].extensions.is_none());
}

// ============================================================================
// Texture tables
// ============================================================================

#[test]
fn packed_images_get_texture_and_sampler_entries() {
    let mut scene = scene_with_material(Material::GltfPbr(GltfPbrMaterial {
        color: ColorSource::Texture(TextureInstance::new_linear(0)),
        ..GltfPbrMaterial::default()
    }));
    scene.textures.insert(0, gray_texture(0.5));
    let export = export_scene(&scene, &ConvertOptions::default()).unwrap();
    assert_eq!(export.root.images.len(), 1);
    assert_eq!(export.root.textures.len(), 1);
    assert_eq!(export.root.samplers.len(), 1);
    assert_eq!(export.root.images[0].uri.as_deref(), Some("image_0.png"));
}
