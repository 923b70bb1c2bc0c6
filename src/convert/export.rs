//! glTF export: vertex/index serialization, material conversion, camera and
//! scene graph emission.

use std::collections::BTreeMap;
use std::path::Path;

use base64::Engine;
use glam::{Mat4, Vec3};
use gltf::json;
use gltf::json::validation::{Checked::Valid, USize64};
use log::warn;

use crate::errors::{ConvertError, Result};
use crate::scene::texture::{FilterMode, SamplerDesc, WrapMode};
use crate::scene::{check_contiguous_ids, InstancedScene, Mesh, SceneData};
use crate::tex::{PackContext, PackedImage};

use super::material::export_material;
use super::ConvertOptions;

/// The assembled glTF document plus its packed side-car images.
///
/// `write_gltf` puts the images next to the document under the names the
/// document references them by (`image_N.png`).
#[derive(Debug)]
pub struct GltfExport {
    pub root: json::Root,
    pub images: Vec<PackedImage>,
}

/// Export a converted scene to an in-memory glTF document.
///
/// Vertex and index payloads are embedded as base64 data URIs, one buffer
/// per mesh. Fails before any per-entity work when an id space is sparse.
pub fn export_scene(scene: &SceneData, opts: &ConvertOptions) -> Result<GltfExport> {
    check_contiguous_ids(&scene.meshes, "mesh")?;
    if !opts.only_geometry {
        check_contiguous_ids(&scene.materials, "material")?;
        check_contiguous_ids(&scene.textures, "texture")?;
    }
    check_contiguous_ids(&scene.cameras, "camera")?;

    let mut root = json::Root {
        asset: json::Asset {
            generator: Some("scenebridge".into()),
            ..json::Asset::default()
        },
        ..json::Root::default()
    };

    for (&id, mesh) in &scene.meshes {
        mesh.validate()?;
        export_mesh(&mut root, id, mesh, scene, opts)?;
    }

    let mut ctx = PackContext::new();
    if !opts.only_geometry {
        for (&id, entry) in &scene.materials {
            let mat = export_material(id, entry, scene, &mut ctx, opts.strict)?;
            root.materials.push(mat);
        }
        export_texture_tables(&mut root, &ctx);
    }

    let camera_nodes = export_cameras(&mut root, scene);
    for inst_scene in &scene.scenes {
        export_instanced_scene(&mut root, inst_scene, &camera_nodes, opts)?;
    }
    if !root.scenes.is_empty() {
        root.scene = Some(json::Index::new(0));
    }

    Ok(GltfExport { root, images: ctx.images })
}

/// Write the document and its packed images to disk. Images land next to
/// the `.gltf` file.
pub fn write_gltf(path: &Path, export: &GltfExport) -> Result<()> {
    let text = json::serialize::to_string_pretty(&export.root)?;
    std::fs::write(path, text)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    for (i, image) in export.images.iter().enumerate() {
        std::fs::write(dir.join(PackedImage::uri(i)), image.encode_png()?)?;
    }
    Ok(())
}

// ============================================================================
// Geometry serialization
// ============================================================================

fn push_accessor(
    root: &mut json::Root,
    view: json::Index<json::buffer::View>,
    byte_offset: usize,
    count: usize,
    type_: json::accessor::Type,
    component: json::accessor::ComponentType,
    min: Option<serde_json::Value>,
    max: Option<serde_json::Value>,
) -> json::Index<json::Accessor> {
    root.accessors.push(json::Accessor {
        buffer_view: Some(view),
        byte_offset: Some(USize64::from(byte_offset)),
        count: USize64::from(count),
        component_type: Valid(json::accessor::GenericComponentType(component)),
        extensions: Default::default(),
        extras: Default::default(),
        type_: Valid(type_),
        min,
        max,
        name: None,
        normalized: false,
        sparse: None,
    });
    json::Index::new(root.accessors.len() as u32 - 1)
}

/// Serialize one mesh as one shared buffer: the vertex region (positions,
/// normals, tangents as VEC3 runs, then flipped UVs) in a single
/// `ARRAY_BUFFER` view, followed by one `ELEMENT_ARRAY_BUFFER` view per
/// per-material triangle group.
fn export_mesh(
    root: &mut json::Root,
    id: u32,
    mesh: &Mesh,
    scene: &SceneData,
    opts: &ConvertOptions,
) -> Result<()> {
    let n = mesh.vertex_count();
    let mut bytes: Vec<u8> = Vec::with_capacity(n * 44 + mesh.indices.len() * 4);
    for p in &mesh.positions {
        bytes.extend_from_slice(&p.x.to_le_bytes());
        bytes.extend_from_slice(&p.y.to_le_bytes());
        bytes.extend_from_slice(&p.z.to_le_bytes());
    }
    let normals_offset = bytes.len();
    for v in &mesh.normals {
        bytes.extend_from_slice(&v.x.to_le_bytes());
        bytes.extend_from_slice(&v.y.to_le_bytes());
        bytes.extend_from_slice(&v.z.to_le_bytes());
    }
    let tangents_offset = bytes.len();
    for v in &mesh.tangents {
        bytes.extend_from_slice(&v.x.to_le_bytes());
        bytes.extend_from_slice(&v.y.to_le_bytes());
        bytes.extend_from_slice(&v.z.to_le_bytes());
    }
    let uv_offset = bytes.len();
    // UV origin differs between the formats, flip vertically on the way out.
    for uv in &mesh.uvs {
        bytes.extend_from_slice(&uv.x.to_le_bytes());
        bytes.extend_from_slice(&(1.0 - uv.y).to_le_bytes());
    }
    let vertex_region = bytes.len();

    // Triangle groups by material id; BTreeMap keeps primitive order stable.
    let mut groups: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for (t, &mat) in mesh.mat_indices.iter().enumerate() {
        groups
            .entry(mat)
            .or_default()
            .extend_from_slice(&mesh.indices[t * 3..t * 3 + 3]);
    }
    if !opts.only_geometry {
        for &mat in groups.keys() {
            if !scene.materials.contains_key(&mat) {
                return Err(ConvertError::MalformedInput(format!(
                    "mesh {id} references material id {mat} not in library"
                )));
            }
        }
    }

    let mut group_offsets = Vec::with_capacity(groups.len());
    for indices in groups.values() {
        group_offsets.push(bytes.len());
        for i in indices {
            bytes.extend_from_slice(&i.to_le_bytes());
        }
    }

    let buffer = json::Index::new(root.buffers.len() as u32);
    let uri = format!(
        "data:application/octet-stream;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    );
    root.buffers.push(json::Buffer {
        byte_length: USize64::from(bytes.len()),
        extensions: Default::default(),
        extras: Default::default(),
        name: Some(mesh.name.clone()),
        uri: Some(uri),
    });

    let vertex_view = json::Index::new(root.buffer_views.len() as u32);
    root.buffer_views.push(json::buffer::View {
        buffer,
        byte_length: USize64::from(vertex_region),
        byte_offset: None,
        byte_stride: None,
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        target: Some(Valid(json::buffer::Target::ArrayBuffer)),
    });

    let (min, max) = position_bounds(mesh);
    let positions = push_accessor(
        root,
        vertex_view,
        0,
        n,
        json::accessor::Type::Vec3,
        json::accessor::ComponentType::F32,
        Some(serde_json::json!([min.x, min.y, min.z])),
        Some(serde_json::json!([max.x, max.y, max.z])),
    );
    let normals = push_accessor(
        root,
        vertex_view,
        normals_offset,
        n,
        json::accessor::Type::Vec3,
        json::accessor::ComponentType::F32,
        None,
        None,
    );
    let tangents = push_accessor(
        root,
        vertex_view,
        tangents_offset,
        n,
        json::accessor::Type::Vec3,
        json::accessor::ComponentType::F32,
        None,
        None,
    );
    let uvs = push_accessor(
        root,
        vertex_view,
        uv_offset,
        n,
        json::accessor::Type::Vec2,
        json::accessor::ComponentType::F32,
        None,
        None,
    );

    let mut primitives = Vec::with_capacity(groups.len());
    for ((&mat, indices), &offset) in groups.iter().zip(&group_offsets) {
        let view = json::Index::new(root.buffer_views.len() as u32);
        root.buffer_views.push(json::buffer::View {
            buffer,
            byte_length: USize64::from(indices.len() * 4),
            byte_offset: Some(USize64::from(offset)),
            byte_stride: None,
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            target: Some(Valid(json::buffer::Target::ElementArrayBuffer)),
        });
        let index_accessor = push_accessor(
            root,
            view,
            0,
            indices.len(),
            json::accessor::Type::Scalar,
            json::accessor::ComponentType::U32,
            Some(serde_json::json!([indices.iter().min().copied().unwrap_or(0)])),
            Some(serde_json::json!([indices.iter().max().copied().unwrap_or(0)])),
        );

        let mut attributes = BTreeMap::new();
        attributes.insert(Valid(json::mesh::Semantic::Positions), positions);
        attributes.insert(Valid(json::mesh::Semantic::Normals), normals);
        attributes.insert(Valid(json::mesh::Semantic::Tangents), tangents);
        attributes.insert(Valid(json::mesh::Semantic::TexCoords(0)), uvs);
        primitives.push(json::mesh::Primitive {
            attributes,
            extensions: Default::default(),
            extras: Default::default(),
            indices: Some(index_accessor),
            material: (!opts.only_geometry).then(|| json::Index::new(mat)),
            mode: Valid(json::mesh::Mode::Triangles),
            targets: None,
        });
    }

    root.meshes.push(json::Mesh {
        extensions: Default::default(),
        extras: Default::default(),
        name: Some(mesh.name.clone()),
        primitives,
        weights: None,
    });
    Ok(())
}

fn position_bounds(mesh: &Mesh) -> (Vec3, Vec3) {
    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    for p in &mesh.positions {
        min = min.min(p.truncate());
        max = max.max(p.truncate());
    }
    if mesh.positions.is_empty() {
        (Vec3::ZERO, Vec3::ZERO)
    } else {
        (min, max)
    }
}

// ============================================================================
// Texture, camera, and scene tables
// ============================================================================

/// One texture and sampler entry per packed image; the texture index equals
/// the image index, which is what the material converter hands out.
fn export_texture_tables(root: &mut json::Root, ctx: &PackContext) {
    for (i, image) in ctx.images.iter().enumerate() {
        root.images.push(json::Image {
            buffer_view: None,
            mime_type: None,
            name: None,
            uri: Some(PackedImage::uri(i)),
            extensions: Default::default(),
            extras: Default::default(),
        });
        root.samplers.push(sampler_to_gltf(image.sampler));
        root.textures.push(json::Texture {
            name: None,
            sampler: Some(json::Index::new(i as u32)),
            source: json::Index::new(i as u32),
            extensions: Default::default(),
            extras: Default::default(),
        });
    }
}

fn sampler_to_gltf(sampler: SamplerDesc) -> json::texture::Sampler {
    let wrap = |mode: WrapMode| match mode {
        WrapMode::Repeat => json::texture::WrappingMode::Repeat,
        WrapMode::Clamp => json::texture::WrappingMode::ClampToEdge,
        WrapMode::Mirror => json::texture::WrappingMode::MirroredRepeat,
    };
    let (mag, min) = match sampler.filter {
        FilterMode::Nearest => (
            json::texture::MagFilter::Nearest,
            json::texture::MinFilter::Nearest,
        ),
        FilterMode::Linear => (
            json::texture::MagFilter::Linear,
            json::texture::MinFilter::Linear,
        ),
    };
    json::texture::Sampler {
        mag_filter: Some(Valid(mag)),
        min_filter: Some(Valid(min)),
        name: None,
        wrap_s: Valid(wrap(sampler.wrap_u)),
        wrap_t: Valid(wrap(sampler.wrap_v)),
        extensions: Default::default(),
        extras: Default::default(),
    }
}

fn matrix_field(matrix: Mat4) -> Option<[f32; 16]> {
    if matrix.abs_diff_eq(Mat4::IDENTITY, 1e-9) {
        None
    } else {
        Some(matrix.to_cols_array())
    }
}

fn push_node(root: &mut json::Root, node: json::Node) -> json::Index<json::Node> {
    root.nodes.push(node);
    json::Index::new(root.nodes.len() as u32 - 1)
}

fn blank_node() -> json::Node {
    json::Node {
        camera: None,
        children: None,
        extensions: Default::default(),
        extras: Default::default(),
        matrix: None,
        mesh: None,
        name: None,
        rotation: None,
        scale: None,
        translation: None,
        skin: None,
        weights: None,
    }
}

/// Emit each camera as a perspective camera carried by its own node; the
/// node indices are appended to every exported scene.
fn export_cameras(root: &mut json::Root, scene: &SceneData) -> Vec<json::Index<json::Node>> {
    let mut nodes = Vec::with_capacity(scene.cameras.len());
    for (&id, cam) in &scene.cameras {
        let camera = json::Index::new(root.cameras.len() as u32);
        root.cameras.push(json::Camera {
            name: Some(cam.name.clone()),
            orthographic: None,
            perspective: Some(json::camera::Perspective {
                aspect_ratio: None,
                yfov: cam.fov.to_radians(),
                zfar: Some(cam.far_clip),
                znear: cam.near_clip,
                extensions: Default::default(),
                extras: Default::default(),
            }),
            type_: Valid(json::camera::Type::Perspective),
            extensions: Default::default(),
            extras: Default::default(),
        });
        let node = json::Node {
            camera: Some(camera),
            matrix: matrix_field(cam.node_matrix()),
            name: Some(format!("camera_node_{id}")),
            ..blank_node()
        };
        nodes.push(push_node(root, node));
    }
    nodes
}

/// Emit one scene's instances as nodes. Remap lists are a native-only
/// feature: fatal under strict mode, dropped with a warning otherwise.
/// Light instances and light links have no exportable counterpart and are
/// always dropped with a warning.
fn export_instanced_scene(
    root: &mut json::Root,
    inst_scene: &InstancedScene,
    camera_nodes: &[json::Index<json::Node>],
    opts: &ConvertOptions,
) -> Result<()> {
    let mut nodes = Vec::with_capacity(inst_scene.instances.len() + camera_nodes.len());
    for inst in &inst_scene.instances {
        if inst.remap_list_id.is_some() {
            if opts.strict {
                return Err(ConvertError::UnsupportedInstanceFeature {
                    scene: inst_scene.name.clone(),
                    feature: "material remap list",
                });
            }
            warn!(
                "scene '{}': instance {} carries a material remap list, dropping it",
                inst_scene.name, inst.id
            );
        }
        if inst.light_instance_id.is_some() {
            warn!(
                "scene '{}': instance {} carries a light-instance link, dropping it",
                inst_scene.name, inst.id
            );
        }
        let node = json::Node {
            mesh: Some(json::Index::new(inst.mesh_id)),
            matrix: matrix_field(inst.matrix),
            name: Some(format!("instance_{}", inst.id)),
            ..blank_node()
        };
        nodes.push(push_node(root, node));
    }
    for light in &inst_scene.light_instances {
        warn!(
            "scene '{}': light instance {} (light id {}) is not exportable, dropping it",
            inst_scene.name, light.id, light.light_id
        );
    }
    nodes.extend_from_slice(camera_nodes);

    root.scenes.push(json::Scene {
        extensions: Default::default(),
        extras: Default::default(),
        name: Some(inst_scene.name.clone()),
        nodes,
    });
    Ok(())
}
