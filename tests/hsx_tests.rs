//! Native Library I/O Tests
//!
//! Tests for:
//! - write -> read round trip of every library (textures, materials,
//!   cameras, geometry, scenes)
//! - per-call-site defaults for omitted attributes
//! - malformed documents surfacing as errors

use std::path::{Path, PathBuf};

use glam::{Mat4, Vec2, Vec3, Vec4};
use scenebridge::errors::ConvertError;
use scenebridge::hsx::{read_hsx_str, write_hsx_string};
use scenebridge::scene::{
    AlphaMode, Camera, ColorSource, FilterMode, GltfPbrMaterial, GmcSource, Instance,
    InstancedScene, LightInstance, Material, MaterialEntry, Mesh, ScalarSource, SceneData,
    Texture, TextureInstance, WrapMode,
};

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn mat4_approx(a: Mat4, b: Mat4) -> bool {
    a.abs_diff_eq(b, EPSILON)
}

fn sample_scene() -> SceneData {
    let mut scene = SceneData::default();

    scene.textures.insert(
        0,
        Texture::from_file("wood", PathBuf::from("tex/wood.png"), 256, 128, 4),
    );

    let mut color_tex = TextureInstance::new(0);
    color_tex.sampler.wrap_u = WrapMode::Clamp;
    color_tex.sampler.filter = FilterMode::Nearest;
    color_tex.matrix = Mat4::from_translation(Vec3::new(0.5, 0.25, 0.0));
    scene.materials.insert(
        0,
        MaterialEntry {
            name: "wood_pbr".into(),
            variant: Material::GltfPbr(GltfPbrMaterial {
                color: ColorSource::Texture(color_tex),
                gmc: GmcSource::Split {
                    glossiness: ScalarSource::Constant(0.6),
                    metalness: ScalarSource::Constant(0.1),
                    coat: ScalarSource::Constant(0.0),
                },
                fresnel_ior: 1.33,
                emission: Vec3::new(0.0, 0.5, 0.0),
                emission_texture: None,
                normal_texture: None,
                occlusion_texture: None,
                alpha_mode: AlphaMode::Mask(0.4),
            }),
        },
    );
    scene.materials.insert(
        1,
        MaterialEntry {
            name: "glass".into(),
            variant: Material::Dielectric {
                int_ior: 1.52,
                ext_ior: 1.0,
                transmittance: ColorSource::Constant(Vec3::new(0.9, 0.95, 1.0)),
            },
        },
    );
    scene.materials.insert(
        2,
        MaterialEntry {
            name: "mix".into(),
            variant: Material::Blend { first: 0, second: 1, weight: 0.25 },
        },
    );

    scene.cameras.insert(
        0,
        Camera {
            name: "cam".into(),
            fov: 37.5,
            near_clip: 0.05,
            far_clip: 500.0,
            position: Vec3::new(1.0, 2.0, 3.0),
            look_at: Vec3::ZERO,
            up: Vec3::Y,
            matrix: Some(Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))),
        },
    );

    scene.meshes.insert(
        0,
        Mesh {
            name: "tri".into(),
            positions: vec![
                Vec4::new(0.0, 0.0, 0.0, 1.0),
                Vec4::new(1.0, 0.0, 0.0, 1.0),
                Vec4::new(0.0, 1.0, 0.0, 1.0),
            ],
            normals: vec![Vec4::new(0.0, 0.0, 1.0, 0.0); 3],
            tangents: vec![Vec4::new(1.0, 0.0, 0.0, 0.0); 3],
            uvs: vec![Vec2::ZERO, Vec2::X, Vec2::Y],
            indices: vec![0, 1, 2],
            mat_indices: vec![0],
        },
    );

    let mut inst = Instance::new(0, 0, Mat4::from_scale(Vec3::splat(2.0)));
    inst.remap_list_id = Some(3);
    scene.scenes.push(InstancedScene {
        name: "main".into(),
        instances: vec![inst],
        light_instances: vec![LightInstance {
            id: 0,
            light_id: 1,
            matrix: Mat4::from_translation(Vec3::Y),
        }],
    });

    scene
}

fn roundtrip(scene: &SceneData) -> SceneData {
    let text = write_hsx_string(scene).unwrap();
    read_hsx_str(&text, Path::new("")).unwrap()
}

// ============================================================================
// Round trip
// ============================================================================

#[test]
fn textures_round_trip() {
    let back = roundtrip(&sample_scene());
    let tex = &back.textures[&0];
    assert_eq!(tex.name, "wood");
    assert_eq!((tex.width, tex.height), (256, 128));
    assert_eq!(tex.bytes_per_pixel, 4);
}

#[test]
fn pbr_material_round_trips() {
    let original = sample_scene();
    let back = roundtrip(&original);
    assert_eq!(back.materials.len(), 3);

    let Material::GltfPbr(pbr) = &back.materials[&0].variant else {
        panic!("expected gltf_pbr variant");
    };
    let ColorSource::Texture(inst) = &pbr.color else {
        panic!("expected texture-driven color");
    };
    assert_eq!(inst.texture, 0);
    assert_eq!(inst.sampler.wrap_u, WrapMode::Clamp);
    assert_eq!(inst.sampler.filter, FilterMode::Nearest);
    assert!(mat4_approx(inst.matrix, Mat4::from_translation(Vec3::new(0.5, 0.25, 0.0))));

    let GmcSource::Split { glossiness, metalness, coat } = &pbr.gmc else {
        panic!("expected split gmc");
    };
    assert!(approx(glossiness.as_constant().unwrap(), 0.6));
    assert!(approx(metalness.as_constant().unwrap(), 0.1));
    assert!(approx(coat.as_constant().unwrap(), 0.0));
    assert!(approx(pbr.fresnel_ior, 1.33));
    assert!(matches!(pbr.alpha_mode, AlphaMode::Mask(c) if approx(c, 0.4)));
}

#[test]
fn blend_material_keeps_table_references() {
    let back = roundtrip(&sample_scene());
    assert!(matches!(
        back.materials[&2].variant,
        Material::Blend { first: 0, second: 1, weight } if approx(weight, 0.25)
    ));
}

#[test]
fn camera_round_trips_with_explicit_matrix() {
    let back = roundtrip(&sample_scene());
    let cam = &back.cameras[&0];
    assert!(approx(cam.fov, 37.5));
    assert!(approx(cam.near_clip, 0.05));
    assert!(approx(cam.far_clip, 500.0));
    assert!(mat4_approx(
        cam.matrix.unwrap(),
        Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))
    ));
}

#[test]
fn geometry_round_trips_exactly() {
    let original = sample_scene();
    let back = roundtrip(&original);
    let mesh = &back.meshes[&0];
    mesh.validate().unwrap();
    assert_eq!(mesh.positions, original.meshes[&0].positions);
    assert_eq!(mesh.indices, original.meshes[&0].indices);
    assert_eq!(mesh.mat_indices, original.meshes[&0].mat_indices);
    assert_eq!(mesh.uvs, original.meshes[&0].uvs);
}

#[test]
fn scene_instances_round_trip_with_native_fields() {
    let back = roundtrip(&sample_scene());
    let graph = &back.scenes[0];
    assert_eq!(graph.name, "main");
    let inst = &graph.instances[0];
    assert_eq!(inst.remap_list_id, Some(3));
    assert_eq!(inst.light_instance_id, None);
    assert!(mat4_approx(inst.matrix, Mat4::from_scale(Vec3::splat(2.0))));
    assert_eq!(graph.light_instances[0].light_id, 1);
}

// ============================================================================
// Defaults and malformed input
// ============================================================================

#[test]
fn omitted_material_parameters_take_defaults() {
    let text = r#"<scene_bundle>
        <materials_lib>
            <material id="0" name="bare" type="gltf_pbr"/>
        </materials_lib>
    </scene_bundle>"#;
    let scene = read_hsx_str(text, Path::new("")).unwrap();
    let Material::GltfPbr(pbr) = &scene.materials[&0].variant else {
        panic!("expected gltf_pbr");
    };
    assert!(matches!(pbr.color, ColorSource::Constant(c) if c == Vec3::ONE));
    assert!(approx(pbr.fresnel_ior, 1.5));
    assert!(matches!(pbr.alpha_mode, AlphaMode::Opaque));
}

#[test]
fn negative_rmap_id_means_unset() {
    let text = r#"<scene_bundle>
        <geometry_lib>
            <mesh id="0" name="m">
                <positions>0 0 0 1 0 0 0 1 0</positions>
                <normals>0 0 1 0 0 1 0 0 1</normals>
                <tangents>1 0 0 1 0 0 1 0 0</tangents>
                <indices>0 1 2</indices>
                <matindices>0</matindices>
            </mesh>
        </geometry_lib>
        <scenes_lib>
            <scene id="0" name="s">
                <instance id="0" mesh_id="0" rmap_id="-1" linst_id="-1"/>
            </scene>
        </scenes_lib>
    </scene_bundle>"#;
    let scene = read_hsx_str(text, Path::new("")).unwrap();
    let inst = &scene.scenes[0].instances[0];
    assert_eq!(inst.remap_list_id, None);
    assert_eq!(inst.light_instance_id, None);
    assert!(mat4_approx(inst.matrix, Mat4::IDENTITY));
}

#[test]
fn unknown_material_type_is_malformed() {
    let text = r#"<scene_bundle>
        <materials_lib><material id="0" type="velvet"/></materials_lib>
    </scene_bundle>"#;
    let err = read_hsx_str(text, Path::new("")).unwrap_err();
    assert!(matches!(err, ConvertError::MalformedInput(_)));
}

#[test]
fn broken_xml_is_an_xml_error() {
    let err = read_hsx_str("<scene_bundle><oops", Path::new("")).unwrap_err();
    assert!(matches!(err, ConvertError::Xml(_)));
}

#[test]
fn mesh_with_bad_index_fails_validation_on_read() {
    let text = r#"<scene_bundle>
        <geometry_lib>
            <mesh id="0" name="m">
                <positions>0 0 0 1 0 0 0 1 0</positions>
                <normals>0 0 1 0 0 1 0 0 1</normals>
                <tangents>1 0 0 1 0 0 1 0 0</tangents>
                <indices>0 1 9</indices>
                <matindices>0</matindices>
            </mesh>
        </geometry_lib>
    </scene_bundle>"#;
    assert!(read_hsx_str(text, Path::new("")).is_err());
}
