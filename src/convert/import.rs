//! glTF import: geometry consolidation and scene graph translation.

use std::path::Path;

use glam::{Mat4, Quat, Vec2, Vec3};
use gltf::Semantic;
use log::warn;
use rustc_hash::FxHashMap;

use crate::errors::{ConvertError, Result};
use crate::scene::{
    Camera, Instance, InstancedScene, LightInstance, Mesh, SceneData, Texture,
};

use super::accessor;
use super::material::import_material;
use super::ConvertOptions;

/// Import a glTF or GLB file from disk.
pub fn import_gltf(path: &Path, opts: &ConvertOptions) -> Result<SceneData> {
    let (doc, buffers, images) = gltf::import(path)?;
    import_document(&doc, &buffers, &images, opts)
}

/// Import from an in-memory document (GLB bytes or JSON with embedded
/// data-URI buffers).
pub fn import_slice(bytes: &[u8], opts: &ConvertOptions) -> Result<SceneData> {
    let (doc, buffers, images) = gltf::import_slice(bytes)?;
    import_document(&doc, &buffers, &images, opts)
}

pub fn import_document(
    doc: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    images: &[gltf::image::Data],
    opts: &ConvertOptions,
) -> Result<SceneData> {
    let mut scene = SceneData::default();

    for mesh in doc.meshes() {
        let id = mesh.index() as u32;
        scene.meshes.insert(id, consolidate_mesh(&mesh, buffers, opts.only_geometry)?);
    }

    if !opts.only_geometry {
        import_textures(doc, images, &mut scene)?;
        for (index, mat) in doc.materials().enumerate() {
            scene.materials.insert(index as u32, import_material(index, &mat));
        }
    }

    import_cameras(doc, &mut scene);
    import_scenes(doc, &mut scene);

    Ok(scene)
}

// ============================================================================
// Geometry consolidation
// ============================================================================

/// Merge all primitives of one source mesh into one consolidated mesh with
/// globally unique vertex ids.
///
/// Primitives sharing the identical attribute accessors share one vertex
/// range instead of duplicating data; the first-use offset of each accessor
/// is memoized, and indices of later primitives are shifted by their range's
/// offset when appended.
fn consolidate_mesh(
    mesh: &gltf::Mesh,
    buffers: &[gltf::buffer::Data],
    only_geometry: bool,
) -> Result<Mesh> {
    let mesh_id = mesh.index() as u32;
    let mut out = Mesh {
        name: mesh
            .name()
            .map_or_else(|| format!("mesh_{mesh_id}"), str::to_owned),
        ..Mesh::default()
    };
    let mut offsets: FxHashMap<usize, u32> = FxHashMap::default();

    for prim in mesh.primitives() {
        if prim.mode() != gltf::mesh::Mode::Triangles {
            return Err(ConvertError::UnsupportedTopology {
                mesh_id,
                detail: format!("primitive mode {:?}", prim.mode()),
            });
        }
        let index_accessor = prim.indices().ok_or(ConvertError::UnsupportedTopology {
            mesh_id,
            detail: "non-indexed geometry is not supported".into(),
        })?;
        let pos = prim.get(&Semantic::Positions).ok_or_else(|| {
            ConvertError::MalformedInput(format!("mesh {mesh_id}: primitive without POSITION"))
        })?;
        let norm = prim.get(&Semantic::Normals).ok_or_else(|| {
            ConvertError::MalformedInput(format!("mesh {mesh_id}: primitive without NORMAL"))
        })?;
        let tan = prim.get(&Semantic::Tangents);

        // All attribute streams of one primitive must resolve to the same
        // vertex range, or the shifted indices would address the wrong
        // vertices for some of them.
        let offset = match offsets.get(&pos.index()).copied() {
            Some(off) => {
                let norm_matches = offsets.get(&norm.index()).copied() == Some(off);
                let tan_matches = match &tan {
                    Some(t) => offsets.get(&t.index()).copied() == Some(off),
                    None => true,
                };
                if !norm_matches || !tan_matches {
                    return Err(ConvertError::InconsistentPrimitiveLayout { mesh_id });
                }
                off
            }
            None => {
                if offsets.contains_key(&norm.index())
                    || tan.as_ref().is_some_and(|t| offsets.contains_key(&t.index()))
                {
                    return Err(ConvertError::InconsistentPrimitiveLayout { mesh_id });
                }
                let off = out.positions.len() as u32;
                append_vertex_range(&mut out, mesh_id, &prim, &pos, &norm, tan.as_ref(), buffers)?;
                offsets.insert(pos.index(), off);
                offsets.insert(norm.index(), off);
                if let Some(t) = &tan {
                    offsets.insert(t.index(), off);
                }
                off
            }
        };

        let indices = accessor::read_indices(&index_accessor, buffers, offset)?;
        if indices.len() % 3 != 0 {
            return Err(ConvertError::UnsupportedTopology {
                mesh_id,
                detail: format!("index count {} is not a triangle list", indices.len()),
            });
        }
        let mat = if only_geometry {
            0
        } else {
            prim.material().index().map_or(0, |i| i as u32)
        };
        out.mat_indices
            .extend(std::iter::repeat(mat).take(indices.len() / 3));
        out.indices.extend(indices);
    }

    out.validate()?;
    Ok(out)
}

/// Read one primitive's attribute accessors and append them as a new vertex
/// range. Missing tangents are synthesized from normals; texture
/// coordinates default to zero when absent or inconsistent.
fn append_vertex_range(
    out: &mut Mesh,
    mesh_id: u32,
    prim: &gltf::Primitive,
    pos: &gltf::Accessor,
    norm: &gltf::Accessor,
    tan: Option<&gltf::Accessor>,
    buffers: &[gltf::buffer::Data],
) -> Result<()> {
    let positions = accessor::read_vec(pos, buffers, 1.0)?;
    let normals = accessor::read_vec(norm, buffers, 0.0)?;
    if normals.len() != positions.len() {
        return Err(ConvertError::InconsistentPrimitiveLayout { mesh_id });
    }
    let tangents = match tan {
        Some(t) => {
            let tangents = accessor::read_vec(t, buffers, 0.0)?;
            if tangents.len() != positions.len() {
                return Err(ConvertError::InconsistentPrimitiveLayout { mesh_id });
            }
            tangents
        }
        None => normals
            .iter()
            .map(|n| Mesh::synthesize_tangent(n.truncate()))
            .collect(),
    };
    let uvs = match prim.get(&Semantic::TexCoords(0)) {
        Some(uv) => {
            // UV origin differs between the formats, flip vertically on the
            // way in (the exporter flips back out).
            let uvs: Vec<Vec2> = accessor::read_vec2(&uv, buffers)?
                .into_iter()
                .map(|uv| Vec2::new(uv.x, 1.0 - uv.y))
                .collect();
            if uvs.len() == positions.len() {
                uvs
            } else {
                warn!(
                    "mesh {mesh_id}: TEXCOORD_0 length {} does not match {} vertices, zero-filling",
                    uvs.len(),
                    positions.len()
                );
                vec![Vec2::ZERO; positions.len()]
            }
        }
        None => vec![Vec2::ZERO; positions.len()],
    };

    out.positions.extend(positions);
    out.normals.extend(normals);
    out.tangents.extend(tangents);
    out.uvs.extend(uvs);
    Ok(())
}

// ============================================================================
// Textures, cameras, scene graphs
// ============================================================================

fn import_textures(
    doc: &gltf::Document,
    images: &[gltf::image::Data],
    scene: &mut SceneData,
) -> Result<()> {
    for tex in doc.textures() {
        let id = tex.index() as u32;
        let image = images.get(tex.source().index()).ok_or_else(|| {
            ConvertError::MalformedInput(format!(
                "texture {id} references missing image {}",
                tex.source().index()
            ))
        })?;
        let name = tex
            .name()
            .map_or_else(|| format!("texture_{id}"), str::to_owned);
        let rgba = pixels_to_rgba_f32(image)?;
        scene
            .textures
            .insert(id, Texture::from_rgba_f32(name, image.width, image.height, rgba));
    }
    Ok(())
}

/// Normalize any decoded image layout to RGBA f32.
fn pixels_to_rgba_f32(image: &gltf::image::Data) -> Result<Vec<f32>> {
    use gltf::image::Format;
    let count = (image.width * image.height) as usize;
    let mut out = Vec::with_capacity(count * 4);
    let u8n = |v: u8| f32::from(v) / 255.0;
    match image.format {
        Format::R8 => {
            for &v in &image.pixels {
                out.extend_from_slice(&[u8n(v), u8n(v), u8n(v), 1.0]);
            }
        }
        Format::R8G8 => {
            for p in image.pixels.chunks_exact(2) {
                out.extend_from_slice(&[u8n(p[0]), u8n(p[1]), 0.0, 1.0]);
            }
        }
        Format::R8G8B8 => {
            for p in image.pixels.chunks_exact(3) {
                out.extend_from_slice(&[u8n(p[0]), u8n(p[1]), u8n(p[2]), 1.0]);
            }
        }
        Format::R8G8B8A8 => {
            for p in image.pixels.chunks_exact(4) {
                out.extend_from_slice(&[u8n(p[0]), u8n(p[1]), u8n(p[2]), u8n(p[3])]);
            }
        }
        other => {
            return Err(ConvertError::MalformedInput(format!(
                "unsupported decoded image format {other:?}"
            )))
        }
    }
    if out.len() != count * 4 {
        return Err(ConvertError::MalformedInput(
            "decoded image payload does not match its dimensions".into(),
        ));
    }
    Ok(out)
}

fn import_cameras(doc: &gltf::Document, scene: &mut SceneData) {
    for cam in doc.cameras() {
        let id = cam.index() as u32;
        let name = cam
            .name()
            .map_or_else(|| format!("camera_{id}"), str::to_owned);
        let mut out = Camera { name, ..Camera::default() };
        match cam.projection() {
            gltf::camera::Projection::Perspective(p) => {
                out.fov = p.yfov().to_degrees();
                out.near_clip = p.znear();
                if let Some(far) = p.zfar() {
                    out.far_clip = far;
                }
            }
            gltf::camera::Projection::Orthographic(_) => {
                // No native counterpart; keep the id dense with defaults.
                warn!("camera id {id}: orthographic projection has no native counterpart, using default perspective parameters");
            }
        }
        scene.cameras.insert(id, out);
    }
}

/// Node transform: explicit matrix, or compose scale, rotation, translation
/// applied right to left.
fn node_matrix(node: &gltf::Node) -> Mat4 {
    match node.transform() {
        gltf::scene::Transform::Matrix { matrix } => Mat4::from_cols_array_2d(&matrix),
        gltf::scene::Transform::Decomposed { translation, rotation, scale } => {
            Mat4::from_scale_rotation_translation(
                Vec3::from_array(scale),
                Quat::from_array(rotation),
                Vec3::from_array(translation),
            )
        }
    }
}

/// Walk each foreign scene's top-level nodes and classify them by the
/// single reference they carry. Camera bindings run as a second pass over
/// the already-imported camera objects, overwriting their placement.
fn import_scenes(doc: &gltf::Document, scene: &mut SceneData) {
    for src in doc.scenes() {
        let mut out = InstancedScene {
            name: src
                .name()
                .map_or_else(|| format!("scene_{}", src.index()), str::to_owned),
            ..InstancedScene::default()
        };
        for node in src.nodes() {
            let matrix = node_matrix(&node);
            if let Some(mesh) = node.mesh() {
                let id = out.instances.len() as u32;
                out.instances.push(Instance::new(id, mesh.index() as u32, matrix));
            } else if let Some(light) = node.light() {
                let id = out.light_instances.len() as u32;
                out.light_instances.push(LightInstance {
                    id,
                    light_id: light.index() as u32,
                    matrix,
                });
            }
            if let Some(cam) = node.camera() {
                if let Some(entry) = scene.cameras.get_mut(&(cam.index() as u32)) {
                    entry.matrix = Some(matrix);
                    entry.position = matrix.w_axis.truncate();
                }
            }
        }
        scene.scenes.push(out);
    }
}
