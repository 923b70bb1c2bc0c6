//! Native scene library writer. Mirrors the reader element for element.

use std::path::Path;

use glam::Mat4;
use image::ImageEncoder;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::errors::Result;
use crate::scene::texture::TextureSource;
use crate::scene::{
    AlphaMode, ColorSource, GltfPbrMaterial, GmcSource, Material, ScalarSource, SceneData,
    TextureInstance,
};

type Xml = Writer<Vec<u8>>;

/// Write a native scene library file.
///
/// Textures carried in memory (imported from glTF) are saved as PNG files
/// next to the document and referenced by location.
pub fn write_hsx(path: &Path, scene: &SceneData) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let text = render(scene, Some(dir))?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Render the document to a string without touching the filesystem.
/// In-memory textures are referenced by their would-be location.
pub fn write_hsx_string(scene: &SceneData) -> Result<String> {
    render(scene, None)
}

fn render(scene: &SceneData, image_dir: Option<&Path>) -> Result<String> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    start(&mut w, "scene_bundle", &[])?;

    write_textures(&mut w, scene, image_dir)?;
    write_materials(&mut w, scene)?;
    write_cameras(&mut w, scene)?;
    write_geometry(&mut w, scene)?;
    write_scenes(&mut w, scene)?;

    end(&mut w, "scene_bundle")?;
    Ok(String::from_utf8_lossy(&w.into_inner()).into_owned())
}

// ============================================================================
// Event helpers
// ============================================================================

fn start(w: &mut Xml, name: &str, attrs: &[(&str, String)]) -> Result<()> {
    let mut el = BytesStart::new(name);
    for (k, v) in attrs {
        el.push_attribute((*k, v.as_str()));
    }
    w.write_event(Event::Start(el))?;
    Ok(())
}

fn end(w: &mut Xml, name: &str) -> Result<()> {
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn empty(w: &mut Xml, name: &str, attrs: &[(&str, String)]) -> Result<()> {
    let mut el = BytesStart::new(name);
    for (k, v) in attrs {
        el.push_attribute((*k, v.as_str()));
    }
    w.write_event(Event::Empty(el))?;
    Ok(())
}

fn text_el(w: &mut Xml, name: &str, text: &str) -> Result<()> {
    start(w, name, &[])?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    end(w, name)
}

fn fmt_floats(values: impl IntoIterator<Item = f32>) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Matrices go out row-major, matching the reader's transpose.
fn fmt_mat(m: Mat4) -> String {
    fmt_floats(m.transpose().to_cols_array())
}

// ============================================================================
// Libraries
// ============================================================================

fn write_textures(w: &mut Xml, scene: &SceneData, image_dir: Option<&Path>) -> Result<()> {
    start(w, "textures_lib", &[])?;
    for (&id, tex) in &scene.textures {
        let (loc, bytesize) = match &tex.source {
            TextureSource::File(path) => (
                path.to_string_lossy().into_owned(),
                tex.bytes_per_pixel * tex.width * tex.height,
            ),
            TextureSource::Memory { width, height, rgba } => {
                let loc = format!("texture_{id}.png");
                if let Some(dir) = image_dir {
                    let pixels: Vec<u8> = rgba
                        .iter()
                        .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
                        .collect();
                    let mut buf = Vec::new();
                    image::codecs::png::PngEncoder::new(&mut buf).write_image(
                        &pixels,
                        *width,
                        *height,
                        image::ExtendedColorType::Rgba8,
                    )?;
                    std::fs::write(dir.join(&loc), buf)?;
                }
                (loc, width * height * 4)
            }
        };
        empty(
            w,
            "texture",
            &[
                ("id", id.to_string()),
                ("name", tex.name.clone()),
                ("loc", loc),
                ("width", tex.width.to_string()),
                ("height", tex.height.to_string()),
                ("bytesize", bytesize.to_string()),
            ],
        )?;
    }
    end(w, "textures_lib")
}

fn texture_ref_attrs(inst: &TextureInstance) -> Vec<(&'static str, String)> {
    let mut attrs = vec![
        ("id", inst.texture.to_string()),
        ("addressing_mode_u", inst.sampler.wrap_u.as_str().to_owned()),
        ("addressing_mode_v", inst.sampler.wrap_v.as_str().to_owned()),
        ("filter", inst.sampler.filter.as_str().to_owned()),
        ("input_gamma", inst.input_gamma.to_string()),
        ("alpha_from_rgb", if inst.alpha_from_rgb { "1" } else { "0" }.to_owned()),
    ];
    if !inst.matrix.abs_diff_eq(Mat4::IDENTITY, 1e-9) {
        attrs.push(("matrix", fmt_mat(inst.matrix)));
    }
    attrs
}

fn write_texture_param(w: &mut Xml, name: &str, inst: &TextureInstance) -> Result<()> {
    start(w, name, &[])?;
    empty(w, "texture", &texture_ref_attrs(inst))?;
    end(w, name)
}

fn write_scalar(w: &mut Xml, name: &str, source: &ScalarSource) -> Result<()> {
    match source {
        ScalarSource::Constant(v) => empty(w, name, &[("val", v.to_string())]),
        ScalarSource::Texture(inst) => write_texture_param(w, name, inst),
    }
}

fn write_color(w: &mut Xml, name: &str, source: &ColorSource) -> Result<()> {
    match source {
        ColorSource::Constant(c) => empty(w, name, &[("val", fmt_floats(c.to_array()))]),
        ColorSource::Texture(inst) => write_texture_param(w, name, inst),
    }
}

fn write_pbr(w: &mut Xml, pbr: &GltfPbrMaterial) -> Result<()> {
    write_color(w, "color", &pbr.color)?;
    match &pbr.gmc {
        GmcSource::Packed(inst) => write_texture_param(w, "gmc_texture", inst)?,
        GmcSource::Split { glossiness, metalness, coat } => {
            write_scalar(w, "glossiness", glossiness)?;
            write_scalar(w, "metalness", metalness)?;
            write_scalar(w, "coat", coat)?;
        }
    }
    empty(w, "fresnel_ior", &[("val", pbr.fresnel_ior.to_string())])?;
    empty(w, "emission", &[("val", fmt_floats(pbr.emission.to_array()))])?;
    if let Some(inst) = &pbr.emission_texture {
        write_texture_param(w, "emission_texture", inst)?;
    }
    if let Some(inst) = &pbr.normal_texture {
        write_texture_param(w, "normal_texture", inst)?;
    }
    if let Some(inst) = &pbr.occlusion_texture {
        write_texture_param(w, "occlusion_texture", inst)?;
    }
    match pbr.alpha_mode {
        AlphaMode::Opaque => {}
        AlphaMode::Mask(cutoff) => empty(
            w,
            "alpha",
            &[("mode", "mask".to_owned()), ("cutoff", cutoff.to_string())],
        )?,
        AlphaMode::Blend => empty(w, "alpha", &[("mode", "blend".to_owned())])?,
    }
    Ok(())
}

fn write_materials(w: &mut Xml, scene: &SceneData) -> Result<()> {
    start(w, "materials_lib", &[])?;
    for (&id, entry) in &scene.materials {
        start(
            w,
            "material",
            &[
                ("id", id.to_string()),
                ("name", entry.name.clone()),
                ("type", entry.variant.variant_name().to_owned()),
            ],
        )?;
        match &entry.variant {
            Material::LightSource { color, multiplier } => {
                empty(w, "color", &[("val", fmt_floats(color.to_array()))])?;
                empty(w, "multiplier", &[("val", multiplier.to_string())])?;
            }
            Material::GltfPbr(pbr) => write_pbr(w, pbr)?,
            Material::Diffuse { reflectance, roughness } => {
                write_color(w, "reflectance", reflectance)?;
                write_scalar(w, "roughness", roughness)?;
            }
            Material::Conductor { eta, k, reflectance, roughness } => {
                empty(w, "eta", &[("val", fmt_floats(eta.to_array()))])?;
                empty(w, "k", &[("val", fmt_floats(k.to_array()))])?;
                write_color(w, "reflectance", reflectance)?;
                write_scalar(w, "roughness", roughness)?;
            }
            Material::Dielectric { int_ior, ext_ior, transmittance } => {
                empty(w, "int_ior", &[("val", int_ior.to_string())])?;
                empty(w, "ext_ior", &[("val", ext_ior.to_string())])?;
                write_color(w, "transmittance", transmittance)?;
            }
            Material::Plastic { diffuse, int_ior, ext_ior, roughness } => {
                write_color(w, "diffuse", diffuse)?;
                empty(w, "int_ior", &[("val", int_ior.to_string())])?;
                empty(w, "ext_ior", &[("val", ext_ior.to_string())])?;
                write_scalar(w, "roughness", roughness)?;
            }
            Material::Blend { first, second, weight } => {
                empty(w, "first", &[("id", first.to_string())])?;
                empty(w, "second", &[("id", second.to_string())])?;
                empty(w, "weight", &[("val", weight.to_string())])?;
            }
            Material::ThinFilm { ior, thickness, reflectance } => {
                empty(w, "ior", &[("val", ior.to_string())])?;
                write_scalar(w, "thickness", thickness)?;
                write_color(w, "reflectance", reflectance)?;
            }
        }
        end(w, "material")?;
    }
    end(w, "materials_lib")
}

fn write_cameras(w: &mut Xml, scene: &SceneData) -> Result<()> {
    start(w, "cameras_lib", &[])?;
    for (&id, cam) in &scene.cameras {
        start(w, "camera", &[("id", id.to_string()), ("name", cam.name.clone())])?;
        text_el(w, "fov", &cam.fov.to_string())?;
        text_el(w, "nearClipPlane", &cam.near_clip.to_string())?;
        text_el(w, "farClipPlane", &cam.far_clip.to_string())?;
        text_el(w, "position", &fmt_floats(cam.position.to_array()))?;
        text_el(w, "look_at", &fmt_floats(cam.look_at.to_array()))?;
        text_el(w, "up", &fmt_floats(cam.up.to_array()))?;
        if let Some(m) = cam.matrix {
            text_el(w, "matrix", &fmt_mat(m))?;
        }
        end(w, "camera")?;
    }
    end(w, "cameras_lib")
}

fn write_geometry(w: &mut Xml, scene: &SceneData) -> Result<()> {
    start(w, "geometry_lib", &[])?;
    for (&id, mesh) in &scene.meshes {
        start(
            w,
            "mesh",
            &[
                ("id", id.to_string()),
                ("name", mesh.name.clone()),
                ("vertnum", mesh.vertex_count().to_string()),
                ("trinum", mesh.triangle_count().to_string()),
            ],
        )?;
        let vec3s = |vs: &[glam::Vec4]| fmt_floats(vs.iter().flat_map(|v| [v.x, v.y, v.z]));
        text_el(w, "positions", &vec3s(&mesh.positions))?;
        text_el(w, "normals", &vec3s(&mesh.normals))?;
        text_el(w, "tangents", &vec3s(&mesh.tangents))?;
        text_el(w, "texcoords", &fmt_floats(mesh.uvs.iter().flat_map(|v| [v.x, v.y])))?;
        let ints = |vs: &[u32]| {
            vs.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        };
        text_el(w, "indices", &ints(&mesh.indices))?;
        text_el(w, "matindices", &ints(&mesh.mat_indices))?;
        end(w, "mesh")?;
    }
    end(w, "geometry_lib")
}

fn write_scenes(w: &mut Xml, scene: &SceneData) -> Result<()> {
    start(w, "scenes_lib", &[])?;
    for (index, inst_scene) in scene.scenes.iter().enumerate() {
        start(
            w,
            "scene",
            &[("id", index.to_string()), ("name", inst_scene.name.clone())],
        )?;
        for inst in &inst_scene.instances {
            let opt_id = |v: Option<u32>| v.map_or_else(|| "-1".to_owned(), |v| v.to_string());
            empty(
                w,
                "instance",
                &[
                    ("id", inst.id.to_string()),
                    ("mesh_id", inst.mesh_id.to_string()),
                    ("rmap_id", opt_id(inst.remap_list_id)),
                    ("linst_id", opt_id(inst.light_instance_id)),
                    ("matrix", fmt_mat(inst.matrix)),
                ],
            )?;
        }
        for light in &inst_scene.light_instances {
            empty(
                w,
                "light_instance",
                &[
                    ("id", light.id.to_string()),
                    ("light_id", light.light_id.to_string()),
                    ("matrix", fmt_mat(light.matrix)),
                ],
            )?;
        }
        end(w, "scene")?;
    }
    end(w, "scenes_lib")
}
