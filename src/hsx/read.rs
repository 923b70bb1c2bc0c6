//! Native scene library reader.
//!
//! The native format is one XML document with id-keyed libraries for
//! textures, materials, cameras, geometry, and instanced scenes. All
//! helpers take a documented default for omitted attributes; a present but
//! unparsable value is `MalformedInput`, never a silent fallback.

use std::path::{Path, PathBuf};

use glam::{Mat4, Vec2, Vec3, Vec4};
use roxmltree::Node;

use crate::errors::{ConvertError, Result};
use crate::scene::texture::{FilterMode, WrapMode};
use crate::scene::{
    AlphaMode, Camera, ColorSource, GltfPbrMaterial, GmcSource, Instance, InstancedScene,
    LightInstance, Material, MaterialEntry, Mesh, ScalarSource, SceneData, Texture,
    TextureInstance,
};

/// Read a native scene library file.
pub fn read_hsx(path: &Path) -> Result<SceneData> {
    let text = std::fs::read_to_string(path)?;
    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    read_hsx_str(&text, &base)
}

/// Read from an XML string; `base` resolves relative texture locations.
pub fn read_hsx_str(text: &str, base: &Path) -> Result<SceneData> {
    let doc = roxmltree::Document::parse(text)?;
    let root = doc.root_element();
    if root.tag_name().name() != "scene_bundle" {
        return Err(ConvertError::MalformedInput(format!(
            "expected <scene_bundle> root, found <{}>",
            root.tag_name().name()
        )));
    }

    let mut scene = SceneData::default();
    for lib in root.children().filter(Node::is_element) {
        match lib.tag_name().name() {
            "textures_lib" => read_textures(&lib, base, &mut scene)?,
            "materials_lib" => read_materials(&lib, &mut scene)?,
            "cameras_lib" => read_cameras(&lib, &mut scene)?,
            "geometry_lib" => read_geometry(&lib, &mut scene)?,
            "scenes_lib" => read_scenes(&lib, &mut scene)?,
            other => {
                return Err(ConvertError::MalformedInput(format!(
                    "unknown library element <{other}>"
                )))
            }
        }
    }
    Ok(scene)
}

// ============================================================================
// Attribute and text helpers
// ============================================================================

fn bad(node: &Node, what: &str) -> ConvertError {
    ConvertError::MalformedInput(format!("<{}>: {what}", node.tag_name().name()))
}

fn attr_req(node: &Node, name: &str) -> Result<String> {
    node.attribute(name)
        .map(str::to_owned)
        .ok_or_else(|| bad(node, &format!("missing attribute '{name}'")))
}

fn attr_u32_req(node: &Node, name: &str) -> Result<u32> {
    attr_req(node, name)?
        .parse()
        .map_err(|_| bad(node, &format!("attribute '{name}' is not an unsigned integer")))
}

/// Parse an optional float attribute; absent means `default`.
fn attr_f32(node: &Node, name: &str, default: f32) -> Result<f32> {
    match node.attribute(name) {
        None => Ok(default),
        Some(s) => s
            .parse()
            .map_err(|_| bad(node, &format!("attribute '{name}' is not a number"))),
    }
}

/// Parse an optional signed attribute where any negative value means unset.
fn attr_opt_id(node: &Node, name: &str) -> Result<Option<u32>> {
    match node.attribute(name) {
        None => Ok(None),
        Some(s) => {
            let v: i64 = s
                .parse()
                .map_err(|_| bad(node, &format!("attribute '{name}' is not an integer")))?;
            Ok(u32::try_from(v).ok())
        }
    }
}

fn parse_floats(node: &Node, text: &str) -> Result<Vec<f32>> {
    text.split_whitespace()
        .map(|t| t.parse().map_err(|_| bad(node, &format!("bad float '{t}'"))))
        .collect()
}

fn parse_vec3(node: &Node, text: &str) -> Result<Vec3> {
    let v = parse_floats(node, text)?;
    if v.len() != 3 {
        return Err(bad(node, "expected 3 floats"));
    }
    Ok(Vec3::new(v[0], v[1], v[2]))
}

/// Matrices are stored row-major on the wire.
fn parse_mat4(node: &Node, text: &str) -> Result<Mat4> {
    let v = parse_floats(node, text)?;
    if v.len() != 16 {
        return Err(bad(node, "expected 16 floats"));
    }
    let mut cols = [0.0f32; 16];
    cols.copy_from_slice(&v);
    Ok(Mat4::from_cols_array(&cols).transpose())
}

fn child<'a, 'i>(node: &Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

fn child_text(node: &Node, name: &str) -> Option<String> {
    child(node, name).and_then(|c| c.text().map(str::to_owned))
}

// ============================================================================
// Libraries
// ============================================================================

fn read_textures(lib: &Node, base: &Path, scene: &mut SceneData) -> Result<()> {
    for node in lib.children().filter(|n| n.has_tag_name("texture")) {
        let id = attr_u32_req(&node, "id")?;
        let width = attr_u32_req(&node, "width")?;
        let height = attr_u32_req(&node, "height")?;
        let bytesize = attr_u32_req(&node, "bytesize")?;
        if width == 0 || height == 0 {
            return Err(bad(&node, "zero texture dimensions"));
        }
        let loc = attr_req(&node, "loc")?;
        let path: PathBuf = base.join(loc);
        scene.textures.insert(
            id,
            Texture::from_file(
                node.attribute("name").unwrap_or_default(),
                path,
                width,
                height,
                bytesize / (width * height),
            ),
        );
    }
    Ok(())
}

/// Parse a `<texture .../>` reference element on a material parameter.
fn texture_ref(node: &Node) -> Result<TextureInstance> {
    let mut inst = TextureInstance::new(attr_u32_req(node, "id")?);
    inst.sampler.wrap_u = WrapMode::parse(node.attribute("addressing_mode_u").unwrap_or("wrap"));
    inst.sampler.wrap_v = WrapMode::parse(node.attribute("addressing_mode_v").unwrap_or("wrap"));
    inst.sampler.filter = FilterMode::parse(node.attribute("filter").unwrap_or("linear"));
    if let Some(text) = node.attribute("matrix") {
        inst.matrix = parse_mat4(node, text)?;
    }
    inst.input_gamma = attr_f32(node, "input_gamma", 2.2)?;
    inst.alpha_from_rgb = attr_f32(node, "alpha_from_rgb", 1.0)? != 0.0;
    Ok(inst)
}

/// A material parameter element: constant `val` attribute or one `<texture>`
/// child, never both.
fn scalar_source(mat: &Node, name: &str, default: f32) -> Result<ScalarSource> {
    let Some(param) = child(mat, name) else {
        return Ok(ScalarSource::Constant(default));
    };
    if let Some(tex) = child(&param, "texture") {
        return Ok(ScalarSource::Texture(texture_ref(&tex)?));
    }
    Ok(ScalarSource::Constant(attr_f32(&param, "val", default)?))
}

fn color_source(mat: &Node, name: &str, default: Vec3) -> Result<ColorSource> {
    let Some(param) = child(mat, name) else {
        return Ok(ColorSource::Constant(default));
    };
    if let Some(tex) = child(&param, "texture") {
        return Ok(ColorSource::Texture(texture_ref(&tex)?));
    }
    match param.attribute("val") {
        Some(text) => Ok(ColorSource::Constant(parse_vec3(&param, text)?)),
        None => Ok(ColorSource::Constant(default)),
    }
}

fn opt_texture(mat: &Node, name: &str) -> Result<Option<TextureInstance>> {
    match child(mat, name).and_then(|p| child(&p, "texture")) {
        Some(tex) => Ok(Some(texture_ref(&tex)?)),
        None => Ok(None),
    }
}

fn vec3_attr(mat: &Node, name: &str, default: Vec3) -> Result<Vec3> {
    match child(mat, name) {
        Some(param) => match param.attribute("val") {
            Some(text) => parse_vec3(&param, text),
            None => Ok(default),
        },
        None => Ok(default),
    }
}

fn f32_param(mat: &Node, name: &str, default: f32) -> Result<f32> {
    match child(mat, name) {
        Some(param) => attr_f32(&param, "val", default),
        None => Ok(default),
    }
}

fn read_gltf_pbr(node: &Node) -> Result<Material> {
    let gmc = if let Some(packed) = child(node, "gmc_texture").as_ref().and_then(|p| child(p, "texture")) {
        GmcSource::Packed(texture_ref(&packed)?)
    } else {
        GmcSource::Split {
            glossiness: scalar_source(node, "glossiness", 0.0)?,
            metalness: scalar_source(node, "metalness", 0.0)?,
            coat: scalar_source(node, "coat", 0.0)?,
        }
    };
    let alpha_mode = match child(node, "alpha") {
        Some(alpha) => AlphaMode::parse(
            alpha.attribute("mode").unwrap_or("opaque"),
            attr_f32(&alpha, "cutoff", 0.5)?,
        ),
        None => AlphaMode::Opaque,
    };
    Ok(Material::GltfPbr(GltfPbrMaterial {
        color: color_source(node, "color", Vec3::ONE)?,
        gmc,
        fresnel_ior: f32_param(node, "fresnel_ior", 1.5)?,
        emission: vec3_attr(node, "emission", Vec3::ZERO)?,
        emission_texture: opt_texture(node, "emission_texture")?,
        normal_texture: opt_texture(node, "normal_texture")?,
        occlusion_texture: opt_texture(node, "occlusion_texture")?,
        alpha_mode,
    }))
}

fn read_materials(lib: &Node, scene: &mut SceneData) -> Result<()> {
    for node in lib.children().filter(|n| n.has_tag_name("material")) {
        let id = attr_u32_req(&node, "id")?;
        let kind = attr_req(&node, "type")?;
        let variant = match kind.as_str() {
            "light_source" => Material::LightSource {
                color: vec3_attr(&node, "color", Vec3::ONE)?,
                multiplier: f32_param(&node, "multiplier", 1.0)?,
            },
            "gltf_pbr" => read_gltf_pbr(&node)?,
            "diffuse" => Material::Diffuse {
                reflectance: color_source(&node, "reflectance", Vec3::splat(0.5))?,
                roughness: scalar_source(&node, "roughness", 0.0)?,
            },
            "conductor" => Material::Conductor {
                eta: vec3_attr(&node, "eta", Vec3::ONE)?,
                k: vec3_attr(&node, "k", Vec3::ZERO)?,
                reflectance: color_source(&node, "reflectance", Vec3::ONE)?,
                roughness: scalar_source(&node, "roughness", 0.0)?,
            },
            "dielectric" => Material::Dielectric {
                int_ior: f32_param(&node, "int_ior", 1.5)?,
                ext_ior: f32_param(&node, "ext_ior", 1.0)?,
                transmittance: color_source(&node, "transmittance", Vec3::ONE)?,
            },
            "plastic" => Material::Plastic {
                diffuse: color_source(&node, "diffuse", Vec3::splat(0.5))?,
                int_ior: f32_param(&node, "int_ior", 1.5)?,
                ext_ior: f32_param(&node, "ext_ior", 1.0)?,
                roughness: scalar_source(&node, "roughness", 0.0)?,
            },
            "blend" => {
                let first = child(&node, "first")
                    .ok_or_else(|| bad(&node, "blend without <first>"))?;
                let second = child(&node, "second")
                    .ok_or_else(|| bad(&node, "blend without <second>"))?;
                Material::Blend {
                    first: attr_u32_req(&first, "id")?,
                    second: attr_u32_req(&second, "id")?,
                    weight: f32_param(&node, "weight", 0.5)?,
                }
            }
            "thin_film" => Material::ThinFilm {
                ior: f32_param(&node, "ior", 1.5)?,
                thickness: scalar_source(&node, "thickness", 0.0)?,
                reflectance: color_source(&node, "reflectance", Vec3::ONE)?,
            },
            other => {
                return Err(bad(&node, &format!("unknown material type '{other}'")));
            }
        };
        scene.materials.insert(
            id,
            MaterialEntry {
                name: node.attribute("name").unwrap_or_default().to_owned(),
                variant,
            },
        );
    }
    Ok(())
}

fn read_cameras(lib: &Node, scene: &mut SceneData) -> Result<()> {
    for node in lib.children().filter(|n| n.has_tag_name("camera")) {
        let id = attr_u32_req(&node, "id")?;
        let mut cam = Camera {
            name: node.attribute("name").unwrap_or_default().to_owned(),
            ..Camera::default()
        };
        if let Some(text) = child_text(&node, "fov") {
            cam.fov = parse_floats(&node, &text)?.first().copied().unwrap_or(45.0);
        }
        if let Some(text) = child_text(&node, "nearClipPlane") {
            cam.near_clip = parse_floats(&node, &text)?.first().copied().unwrap_or(0.01);
        }
        if let Some(text) = child_text(&node, "farClipPlane") {
            cam.far_clip = parse_floats(&node, &text)?.first().copied().unwrap_or(100.0);
        }
        if let Some(text) = child_text(&node, "position") {
            cam.position = parse_vec3(&node, &text)?;
        }
        if let Some(text) = child_text(&node, "look_at") {
            cam.look_at = parse_vec3(&node, &text)?;
        }
        if let Some(text) = child_text(&node, "up") {
            cam.up = parse_vec3(&node, &text)?;
        }
        if let Some(text) = child_text(&node, "matrix") {
            cam.matrix = Some(parse_mat4(&node, &text)?);
        }
        scene.cameras.insert(id, cam);
    }
    Ok(())
}

fn read_geometry(lib: &Node, scene: &mut SceneData) -> Result<()> {
    for node in lib.children().filter(|n| n.has_tag_name("mesh")) {
        let id = attr_u32_req(&node, "id")?;
        let read_array = |name: &str| -> Result<Vec<f32>> {
            match child_text(&node, name) {
                Some(text) => parse_floats(&node, &text),
                None => Ok(Vec::new()),
            }
        };
        let to_vec4 = |v: &[f32], w: f32| -> Result<Vec<Vec4>> {
            if v.len() % 3 != 0 {
                return Err(bad(&node, "vertex array length is not a multiple of 3"));
            }
            Ok(v.chunks_exact(3).map(|c| Vec4::new(c[0], c[1], c[2], w)).collect())
        };

        let positions = to_vec4(&read_array("positions")?, 1.0)?;
        let normals = to_vec4(&read_array("normals")?, 0.0)?;
        let tangents = to_vec4(&read_array("tangents")?, 0.0)?;
        let uv_raw = read_array("texcoords")?;
        if uv_raw.len() % 2 != 0 {
            return Err(bad(&node, "texcoord array length is not a multiple of 2"));
        }
        let uvs: Vec<Vec2> = uv_raw.chunks_exact(2).map(|c| Vec2::new(c[0], c[1])).collect();
        let uvs = if uvs.is_empty() {
            vec![Vec2::ZERO; positions.len()]
        } else {
            uvs
        };

        let read_indices = |name: &str| -> Result<Vec<u32>> {
            match child_text(&node, name) {
                Some(text) => text
                    .split_whitespace()
                    .map(|t| t.parse().map_err(|_| bad(&node, &format!("bad index '{t}'"))))
                    .collect(),
                None => Ok(Vec::new()),
            }
        };
        let indices = read_indices("indices")?;
        let mat_indices = read_indices("matindices")?;

        let mesh = Mesh {
            name: node.attribute("name").unwrap_or_default().to_owned(),
            positions,
            normals,
            tangents,
            uvs,
            indices,
            mat_indices,
        };
        mesh.validate()?;
        scene.meshes.insert(id, mesh);
    }
    Ok(())
}

fn read_scenes(lib: &Node, scene: &mut SceneData) -> Result<()> {
    for node in lib.children().filter(|n| n.has_tag_name("scene")) {
        let mut out = InstancedScene {
            name: node.attribute("name").unwrap_or_default().to_owned(),
            ..InstancedScene::default()
        };
        for inst in node.children().filter(Node::is_element) {
            let matrix = match inst.attribute("matrix") {
                Some(text) => parse_mat4(&inst, text)?,
                None => Mat4::IDENTITY,
            };
            match inst.tag_name().name() {
                "instance" => {
                    let mut instance = Instance::new(
                        attr_u32_req(&inst, "id")?,
                        attr_u32_req(&inst, "mesh_id")?,
                        matrix,
                    );
                    instance.remap_list_id = attr_opt_id(&inst, "rmap_id")?;
                    instance.light_instance_id = attr_opt_id(&inst, "linst_id")?;
                    out.instances.push(instance);
                }
                "light_instance" => out.light_instances.push(LightInstance {
                    id: attr_u32_req(&inst, "id")?,
                    light_id: attr_u32_req(&inst, "light_id")?,
                    matrix,
                }),
                other => {
                    return Err(bad(&inst, &format!("unknown scene element <{other}>")));
                }
            }
        }
        scene.scenes.push(out);
    }
    Ok(())
}
