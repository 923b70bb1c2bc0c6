//! Geometry Round-Trip Tests
//!
//! Tests for:
//! - mesh invariants after consolidation
//! - export -> import round trip preserving vertex count, triangle count,
//!   and the triangle multiset by position
//! - attribute accessor dedup across primitives of one mesh
//! - instance and camera placement surviving the round trip

use glam::{Mat4, Vec2, Vec3, Vec4};
use scenebridge::convert::{export_scene, import_slice};
use scenebridge::scene::{Camera, Instance, InstancedScene, Mesh, SceneData};
use scenebridge::ConvertOptions;

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

/// Two quads stacked along Z: 8 vertices, 4 triangles, two material groups.
fn two_quad_mesh() -> Mesh {
    let mut positions = Vec::new();
    for z in [0.0f32, 1.0] {
        positions.extend([
            Vec4::new(0.0, 0.0, z, 1.0),
            Vec4::new(1.0, 0.0, z, 1.0),
            Vec4::new(1.0, 1.0, z, 1.0),
            Vec4::new(0.0, 1.0, z, 1.0),
        ]);
    }
    let n = positions.len();
    Mesh {
        name: "quads".into(),
        positions,
        normals: vec![Vec4::new(0.0, 0.0, 1.0, 0.0); n],
        tangents: vec![Vec4::new(1.0, 0.0, 0.0, 0.0); n],
        uvs: vec![Vec2::new(0.25, 0.75); n],
        indices: vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7],
        mat_indices: vec![0, 0, 1, 1],
    }
}

fn geometry_scene() -> SceneData {
    let mut scene = SceneData::default();
    let mesh = two_quad_mesh();
    mesh.validate().unwrap();
    scene.meshes.insert(0, mesh);
    scene.scenes.push(InstancedScene {
        name: "main".into(),
        instances: vec![Instance::new(
            0,
            0,
            Mat4::from_translation(Vec3::new(2.0, 0.0, -1.0)),
        )],
        light_instances: Vec::new(),
    });
    scene
}

fn roundtrip(scene: &SceneData) -> SceneData {
    let opts = ConvertOptions { only_geometry: true, strict: true };
    let export = export_scene(scene, &opts).unwrap();
    let text = gltf::json::serialize::to_string(&export.root).unwrap();
    import_slice(text.as_bytes(), &opts).unwrap()
}

/// Triangle as position bit patterns, rotated so the lexicographically
/// smallest vertex leads; winding order is preserved.
fn triangle_multiset(mesh: &Mesh) -> Vec<[[u32; 3]; 3]> {
    let key = |i: u32| -> [u32; 3] {
        let p = mesh.positions[i as usize];
        [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]
    };
    let mut tris: Vec<[[u32; 3]; 3]> = mesh
        .indices
        .chunks_exact(3)
        .map(|t| {
            let v = [key(t[0]), key(t[1]), key(t[2])];
            let lead = (0..3).min_by_key(|&i| v[i]).unwrap_or(0);
            [v[lead], v[(lead + 1) % 3], v[(lead + 2) % 3]]
        })
        .collect();
    tris.sort_unstable();
    tris
}

// ============================================================================
// Round trip
// ============================================================================

#[test]
fn geometry_only_round_trip_preserves_topology() {
    let scene = geometry_scene();
    let back = roundtrip(&scene);

    assert_eq!(back.meshes.len(), 1);
    let original = &scene.meshes[&0];
    let imported = &back.meshes[&0];
    imported.validate().unwrap();

    assert_eq!(imported.vertex_count(), original.vertex_count());
    assert_eq!(imported.triangle_count(), original.triangle_count());
    assert_eq!(triangle_multiset(imported), triangle_multiset(original));
}

#[test]
fn shared_accessors_are_not_duplicated_on_import() {
    // the two material groups export as two primitives over the same
    // attribute accessors; consolidation must reuse the vertex range
    let back = roundtrip(&geometry_scene());
    assert_eq!(back.meshes[&0].vertex_count(), 8);
}

#[test]
fn only_geometry_coalesces_material_indices() {
    let back = roundtrip(&geometry_scene());
    assert!(back.meshes[&0].mat_indices.iter().all(|&m| m == 0));
}

#[test]
fn uvs_survive_the_round_trip() {
    let back = roundtrip(&geometry_scene());
    for uv in &back.meshes[&0].uvs {
        assert!(approx(uv.x, 0.25) && approx(uv.y, 0.75), "uv {uv:?}");
    }
}

#[test]
fn instance_placement_survives_the_round_trip() {
    let back = roundtrip(&geometry_scene());
    assert_eq!(back.scenes.len(), 1);
    let inst = &back.scenes[0].instances[0];
    assert_eq!(inst.mesh_id, 0);
    let t = inst.matrix.w_axis.truncate();
    assert!(approx(t.x, 2.0) && approx(t.y, 0.0) && approx(t.z, -1.0));
}

#[test]
fn camera_round_trips_parameters_and_placement() {
    let mut scene = geometry_scene();
    scene.cameras.insert(
        0,
        Camera {
            name: "main_cam".into(),
            fov: 60.0,
            near_clip: 0.1,
            far_clip: 250.0,
            position: Vec3::new(0.0, 1.0, 5.0),
            look_at: Vec3::ZERO,
            up: Vec3::Y,
            matrix: None,
        },
    );
    let back = roundtrip(&scene);

    let cam = &back.cameras[&0];
    assert!(approx(cam.fov, 60.0));
    assert!(approx(cam.near_clip, 0.1));
    assert!(approx(cam.far_clip, 250.0));
    // placement comes back through the node binding pass
    let m = cam.matrix.expect("camera node matrix");
    let pos = m.w_axis.truncate();
    assert!(approx(pos.x, 0.0) && approx(pos.y, 1.0) && approx(pos.z, 5.0));
}
