//! Pixel decode and sampling for the pack engine.

use glam::{Vec2, Vec4};

use crate::errors::{ConvertError, Result};
use crate::scene::texture::{FilterMode, SamplerDesc, Texture, TextureInstance, TextureSource, WrapMode};

/// A decoded image plane: row-major RGBA, 4 floats per pixel, values in the
/// source's own encoding (no gamma conversion happens here).
#[derive(Debug, Clone)]
pub struct ImagePlane {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<f32>,
}

/// Ceiling applied to floating-point sources on load. EXR files may carry
/// infinities; anything outside the half-precision range is clamped so the
/// packed output stays finite.
const HALF_MAX: f32 = half::f16::MAX.to_f32_const();

fn clamp_half(v: f32) -> f32 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(-HALF_MAX, HALF_MAX)
}

/// Decode a texture table entry into an RGBA float plane.
///
/// LDR formats normalize to [0, 1]; floating-point formats (EXR, HDR) keep
/// their range apart from the half-precision clamp.
pub fn decode_texture(tex: &Texture) -> Result<ImagePlane> {
    match &tex.source {
        TextureSource::Memory { width, height, rgba } => Ok(ImagePlane {
            width: *width,
            height: *height,
            rgba: rgba.clone(),
        }),
        TextureSource::File(path) => {
            let img = image::open(path)?;
            let (width, height) = (img.width(), img.height());
            let rgba = match img {
                image::DynamicImage::ImageRgb32F(_) | image::DynamicImage::ImageRgba32F(_) => img
                    .to_rgba32f()
                    .into_raw()
                    .into_iter()
                    .map(clamp_half)
                    .collect(),
                _ => img
                    .to_rgba8()
                    .into_raw()
                    .into_iter()
                    .map(|v| f32::from(v) / 255.0)
                    .collect(),
            };
            Ok(ImagePlane { width, height, rgba })
        }
    }
}

fn wrap_index(i: i64, n: u32, mode: WrapMode) -> u32 {
    let n = i64::from(n);
    let w = match mode {
        WrapMode::Repeat => i.rem_euclid(n),
        WrapMode::Clamp => i.clamp(0, n - 1),
        WrapMode::Mirror => {
            let p = i.rem_euclid(2 * n);
            if p < n { p } else { 2 * n - 1 - p }
        }
    };
    w as u32
}

impl ImagePlane {
    pub fn texel(&self, x: u32, y: u32) -> Vec4 {
        let i = ((y * self.width + x) * 4) as usize;
        Vec4::new(self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3])
    }

    fn fetch(&self, x: i64, y: i64, sampler: &SamplerDesc) -> Vec4 {
        self.texel(
            wrap_index(x, self.width, sampler.wrap_u),
            wrap_index(y, self.height, sampler.wrap_v),
        )
    }

    /// Sample at a normalized UV with the instance's sampler and transform.
    pub fn sample(&self, uv: Vec2, inst: &TextureInstance) -> Vec4 {
        let t = inst.matrix * Vec4::new(uv.x, uv.y, 0.0, 1.0);
        let (u, v) = (t.x, t.y);
        match inst.sampler.filter {
            FilterMode::Nearest => {
                let x = (u * self.width as f32).floor() as i64;
                let y = (v * self.height as f32).floor() as i64;
                self.fetch(x, y, &inst.sampler)
            }
            FilterMode::Linear => {
                // texel centers at (i + 0.5) / n
                let fx = u * self.width as f32 - 0.5;
                let fy = v * self.height as f32 - 0.5;
                let x0 = fx.floor() as i64;
                let y0 = fy.floor() as i64;
                let tx = fx - x0 as f32;
                let ty = fy - y0 as f32;
                let s = &inst.sampler;
                let c00 = self.fetch(x0, y0, s);
                let c10 = self.fetch(x0 + 1, y0, s);
                let c01 = self.fetch(x0, y0 + 1, s);
                let c11 = self.fetch(x0 + 1, y0 + 1, s);
                c00.lerp(c10, tx).lerp(c01.lerp(c11, tx), ty)
            }
        }
    }
}

/// Reject size-zero planes before the pack loops index into them.
pub fn check_plane(plane: &ImagePlane, texture_id: u32) -> Result<()> {
    if plane.width == 0 || plane.height == 0 {
        return Err(ConvertError::MalformedInput(format!(
            "texture id {texture_id} decoded to an empty image"
        )));
    }
    if plane.rgba.len() != (plane.width * plane.height * 4) as usize {
        return Err(ConvertError::MalformedInput(format!(
            "texture id {texture_id}: pixel payload does not match {}x{}",
            plane.width, plane.height
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;

    fn plane_2x2() -> ImagePlane {
        // texels: (0,0)=red (1,0)=green (0,1)=blue (1,1)=white
        ImagePlane {
            width: 2,
            height: 2,
            rgba: vec![
                1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0,
                0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0,
            ],
        }
    }

    fn nearest_inst() -> TextureInstance {
        let mut inst = TextureInstance::new(0);
        inst.sampler.filter = FilterMode::Nearest;
        inst
    }

    #[test]
    fn nearest_sampling_hits_texels() {
        let p = plane_2x2();
        let inst = nearest_inst();
        assert_eq!(p.sample(Vec2::new(0.25, 0.25), &inst), Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(p.sample(Vec2::new(0.75, 0.75), &inst), Vec4::new(1.0, 1.0, 1.0, 1.0));
    }

    #[test]
    fn repeat_wraps_out_of_range_uv() {
        let p = plane_2x2();
        let inst = nearest_inst();
        assert_eq!(
            p.sample(Vec2::new(1.25, 0.25), &inst),
            p.sample(Vec2::new(0.25, 0.25), &inst)
        );
    }

    #[test]
    fn uv_transform_applies_before_sampling() {
        let p = plane_2x2();
        let mut inst = nearest_inst();
        inst.matrix = Mat4::from_translation(glam::Vec3::new(0.5, 0.0, 0.0));
        // shifted by half: (0.25, 0.25) lands on the green texel
        assert_eq!(p.sample(Vec2::new(0.25, 0.25), &inst), Vec4::new(0.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn half_clamp_kills_infinities() {
        assert_eq!(clamp_half(f32::INFINITY), HALF_MAX);
        assert_eq!(clamp_half(f32::NEG_INFINITY), -HALF_MAX);
        assert_eq!(clamp_half(1.0), 1.0);
    }
}
