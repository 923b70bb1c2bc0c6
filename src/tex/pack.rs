//! The remap/pack engine: rasterizes channel remap descriptors into packed
//! multi-channel 8-bit images.

use std::rc::Rc;

use glam::Vec2;
use image::ImageEncoder;
use log::warn;
use rustc_hash::FxHashMap;

use crate::errors::{ConvertError, Result};
use crate::scene::texture::SamplerDesc;
use crate::scene::SceneData;

use super::remap::{ChannelRemap, ChannelSelect, PackKey};
use super::sample::{check_plane, decode_texture, ImagePlane};

/// Display exponent applied when a contributor is not declared linear.
const DISPLAY_GAMMA: f32 = 2.4;

/// Linear-to-display encoding, piecewise sRGB-style with a configurable
/// exponent.
fn to_display(s: f32, gamma: f32) -> f32 {
    if s <= 0.003_130_8 {
        12.92 * s
    } else {
        1.055 * s.powf(1.0 / gamma) - 0.055
    }
}

fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// One packed output image, ready for PNG encoding.
#[derive(Debug, Clone)]
pub struct PackedImage {
    pub width: u32,
    pub height: u32,
    /// 1..=4 interleaved 8-bit channels.
    pub channels: u8,
    pub pixels: Vec<u8>,
    /// Sampler shared by the contributors, carried into the output sampler
    /// table.
    pub sampler: SamplerDesc,
}

impl PackedImage {
    /// File name the image is referenced by from the document.
    pub fn uri(index: usize) -> String {
        format!("image_{index}.png")
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let color = match self.channels {
            1 => image::ExtendedColorType::L8,
            2 => image::ExtendedColorType::La8,
            3 => image::ExtendedColorType::Rgb8,
            4 => image::ExtendedColorType::Rgba8,
            n => {
                return Err(ConvertError::MalformedInput(format!(
                    "packed image with {n} channels cannot be PNG-encoded"
                )))
            }
        };
        let mut buf = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buf)
            .write_image(&self.pixels, self.width, self.height, color)?;
        Ok(buf)
    }
}

/// Per-export-run pack state: the decode cache and the content-addressed
/// packed-image cache. Dropping the context drops all cached state, so
/// repeated runs never see each other.
#[derive(Default)]
pub struct PackContext {
    decoded: FxHashMap<u32, Rc<ImagePlane>>,
    packed: FxHashMap<PackKey, usize>,
    pub images: Vec<PackedImage>,
}

impl PackContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache probe, exposed so determinism can be asserted without timing.
    pub fn lookup(&self, key: &PackKey) -> Option<usize> {
        self.packed.get(key).copied()
    }

    fn decoded(&mut self, scene: &SceneData, id: u32) -> Result<Rc<ImagePlane>> {
        if let Some(plane) = self.decoded.get(&id) {
            return Ok(Rc::clone(plane));
        }
        let plane = Rc::new(decode_texture(scene.texture(id)?)?);
        check_plane(&plane, id)?;
        self.decoded.insert(id, Rc::clone(&plane));
        Ok(plane)
    }

    /// Rasterize one remap descriptor, returning the packed image index.
    ///
    /// Identical descriptors (same selectors, contributor ids, and shared
    /// gamma) reuse the previously packed image.
    pub fn pack(&mut self, scene: &SceneData, remap: &ChannelRemap, strict: bool) -> Result<usize> {
        remap.validate()?;
        let first = remap.textures.first().ok_or_else(|| {
            ConvertError::MalformedInput("remap descriptor has no contributing textures".into())
        })?;

        let key = remap.cache_key();
        if let Some(index) = self.packed.get(&key) {
            return Ok(*index);
        }

        // Contributors merged into one image must agree on sampler state.
        let ids: Vec<u32> = remap.textures.iter().map(|t| t.texture).collect();
        let mismatch = remap.textures.iter().any(|t| t.sampler != first.sampler);
        if mismatch {
            if strict {
                return Err(ConvertError::UnsupportedSamplerCombination(ids));
            }
            warn!("different samplers for merged textures {ids:?}; using the first");
        }

        let first_plane = self.decoded(scene, first.texture)?;
        let (w, h) = (first_plane.width, first_plane.height);
        let channels = remap.channel_count();
        let mut pixels = vec![0u8; (w * h) as usize * channels];

        if remap.is_single_contributor() {
            self.pack_single(scene, remap, &mut pixels)?;
        } else {
            self.pack_multi(scene, remap, first.sampler, w, h, &mut pixels)?;
        }

        let index = self.images.len();
        self.images.push(PackedImage {
            width: w,
            height: h,
            channels: channels as u8,
            pixels,
            sampler: first.sampler,
        });
        self.packed.insert(key, index);
        Ok(index)
    }

    /// Fast path: one contributor, selectors address channels of its
    /// sampled RGBA value.
    fn pack_single(&mut self, scene: &SceneData, remap: &ChannelRemap, pixels: &mut [u8]) -> Result<()> {
        let inst = &remap.textures[0];
        let plane = self.decoded(scene, inst.texture)?;
        let (w, h) = (plane.width, plane.height);
        let linear = inst.is_linear();
        let channels = remap.channel_count();

        for y in 0..h {
            for x in 0..w {
                let uv = pixel_center_uv(x, y, w, h);
                let mut v = plane.sample(uv, inst);
                if !linear {
                    v.x = to_display(v.x, DISPLAY_GAMMA);
                    v.y = to_display(v.y, DISPLAY_GAMMA);
                    v.z = to_display(v.z, DISPLAY_GAMMA);
                }
                let base = ((y * w + x) as usize) * channels;
                for (c, sel) in remap.channels.iter().enumerate() {
                    pixels[base + c] = match *sel {
                        ChannelSelect::Zero => 0,
                        ChannelSelect::One => 255,
                        ChannelSelect::Map { index, invert } => {
                            let s = v[index];
                            quantize(if invert { 1.0 - s } else { s })
                        }
                    };
                }
            }
        }
        Ok(())
    }

    /// General path: each output channel resolves its own contributor, so
    /// channels of one packed image may come from different source images.
    /// Everything is sampled in normalized UV against the first
    /// contributor's resolution, which keeps mismatched sizes aligned.
    fn pack_multi(
        &mut self,
        scene: &SceneData,
        remap: &ChannelRemap,
        sampler: SamplerDesc,
        w: u32,
        h: u32,
        pixels: &mut [u8],
    ) -> Result<()> {
        let channels = remap.channel_count();
        for (c, sel) in remap.channels.iter().enumerate() {
            match *sel {
                ChannelSelect::Zero => {
                    for p in 0..(w * h) as usize {
                        pixels[p * channels + c] = 0;
                    }
                }
                ChannelSelect::One => {
                    for p in 0..(w * h) as usize {
                        pixels[p * channels + c] = 255;
                    }
                }
                ChannelSelect::Map { index, invert } => {
                    let mut inst = remap.textures[index].clone();
                    inst.sampler = sampler;
                    let plane = self.decoded(scene, inst.texture)?;
                    let linear = inst.is_linear();
                    for y in 0..h {
                        for x in 0..w {
                            let uv = pixel_center_uv(x, y, w, h);
                            let mut s = plane.sample(uv, &inst).x;
                            if !linear {
                                s = to_display(s, DISPLAY_GAMMA);
                            }
                            if invert {
                                s = 1.0 - s;
                            }
                            pixels[((y * w + x) as usize) * channels + c] = quantize(s);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// UV at the center of output pixel (x, y). Output rows run top to bottom
/// while UV space runs bottom to top, hence the vertical flip.
fn pixel_center_uv(x: u32, y: u32, w: u32, h: u32) -> Vec2 {
    Vec2::new(
        (x as f32 + 0.5) / w as f32,
        (h as f32 - 1.0 - y as f32 + 0.5) / h as f32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Texture;
    use crate::tex::remap::ChannelRemap;
    use crate::scene::texture::TextureInstance;

    fn scene_with_gray(value: f32) -> SceneData {
        let mut scene = SceneData::default();
        let rgba: Vec<f32> = (0..4 * 4).flat_map(|_| [value, value, value, 1.0]).collect();
        scene
            .textures
            .insert(0, Texture::from_rgba_f32("gray", 4, 4, rgba));
        scene
    }

    #[test]
    fn constant_selectors_ignore_texture_content() {
        let scene = scene_with_gray(0.37);
        let remap = ChannelRemap::from_signed(
            &[crate::tex::remap::REMAP_ZEROS, crate::tex::remap::REMAP_ONES, 0],
            vec![TextureInstance::new_linear(0)],
        )
        .unwrap();
        let mut ctx = PackContext::new();
        let idx = ctx.pack(&scene, &remap, true).unwrap();
        let img = &ctx.images[idx];
        assert_eq!(img.channels, 3);
        for px in img.pixels.chunks(3) {
            assert_eq!(px, [0, 255, 0]);
        }
    }

    #[test]
    fn inversion_is_255_minus_source() {
        let scene = scene_with_gray(0.25);
        let remap = ChannelRemap::from_signed(&[1, -1], vec![TextureInstance::new_linear(0)]).unwrap();
        let mut ctx = PackContext::new();
        let idx = ctx.pack(&scene, &remap, true).unwrap();
        let img = &ctx.images[idx];
        for px in img.pixels.chunks(2) {
            assert_eq!(px[0], 64); // 0.25 * 255 rounded
            assert_eq!(px[1], 255 - px[0]);
        }
    }

    #[test]
    fn repeated_pack_hits_the_cache() {
        let scene = scene_with_gray(0.5);
        let remap =
            ChannelRemap::from_signed(&[1, 2, 3], vec![TextureInstance::new_linear(0)]).unwrap();
        let mut ctx = PackContext::new();
        let a = ctx.pack(&scene, &remap, true).unwrap();
        let b = ctx.pack(&scene, &remap, true).unwrap();
        assert_eq!(a, b);
        assert_eq!(ctx.images.len(), 1);
        assert_eq!(ctx.lookup(&remap.cache_key()), Some(a));
    }
}
