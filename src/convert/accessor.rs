//! Typed reads over shared glTF byte buffers.
//!
//! Every accessor read is bounds-checked against both its buffer view and
//! the backing buffer before any element is touched; an overrun is a
//! [`ConvertError::MalformedInput`], never a panic.

use glam::{Vec2, Vec4};
use gltf::accessor::{DataType, Dimensions};

use crate::errors::{ConvertError, Result};

/// Resolve an accessor to its byte run and element stride.
fn accessor_slice<'a>(
    accessor: &gltf::Accessor,
    buffers: &'a [gltf::buffer::Data],
) -> Result<(&'a [u8], usize)> {
    let view = accessor.view().ok_or_else(|| {
        ConvertError::MalformedInput(format!("accessor {} has no buffer view", accessor.index()))
    })?;
    let buffer = buffers.get(view.buffer().index()).ok_or_else(|| {
        ConvertError::MalformedInput(format!(
            "accessor {} references missing buffer {}",
            accessor.index(),
            view.buffer().index()
        ))
    })?;
    let stride = view.stride().unwrap_or_else(|| accessor.size());
    let start = view.offset() + accessor.offset();
    let end = if accessor.count() == 0 {
        start
    } else {
        start + stride * (accessor.count() - 1) + accessor.size()
    };
    let view_end = view.offset() + view.length();
    if end > view_end || view_end > buffer.len() {
        return Err(ConvertError::MalformedInput(format!(
            "accessor {} overruns its buffer ({} > {})",
            accessor.index(),
            end,
            view_end.min(buffer.len())
        )));
    }
    Ok((&buffer[start..end], stride))
}

fn f32_at(bytes: &[u8], offset: usize) -> f32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&bytes[offset..offset + 4]);
    f32::from_le_bytes(b)
}

/// Read an index accessor, widening to `u32` and adding `offset` to every
/// element. The additive offset is how index streams of several primitives
/// concatenate into one mesh-wide stream.
pub fn read_indices(
    accessor: &gltf::Accessor,
    buffers: &[gltf::buffer::Data],
    offset: u32,
) -> Result<Vec<u32>> {
    if accessor.dimensions() != Dimensions::Scalar {
        return Err(ConvertError::MalformedInput(format!(
            "index accessor {} is not scalar",
            accessor.index()
        )));
    }
    let (bytes, stride) = accessor_slice(accessor, buffers)?;
    let mut out = Vec::with_capacity(accessor.count());
    for i in 0..accessor.count() {
        let at = i * stride;
        let raw = match accessor.data_type() {
            DataType::U8 => u32::from(bytes[at]),
            DataType::U16 => u32::from(u16::from_le_bytes([bytes[at], bytes[at + 1]])),
            DataType::U32 => {
                u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
            }
            other => {
                return Err(ConvertError::MalformedInput(format!(
                    "index accessor {} has component type {other:?}",
                    accessor.index()
                )))
            }
        };
        out.push(raw + offset);
    }
    Ok(out)
}

fn require_f32(accessor: &gltf::Accessor) -> Result<()> {
    if accessor.data_type() != DataType::F32 {
        return Err(ConvertError::MalformedInput(format!(
            "attribute accessor {} has component type {:?}, expected F32",
            accessor.index(),
            accessor.data_type()
        )));
    }
    Ok(())
}

/// Read a VEC3 or VEC4 float attribute as `Vec4`.
///
/// Three-component sources are padded with `pad_w`; four-component sources
/// (tangents carry handedness in w) are read whole.
pub fn read_vec(
    accessor: &gltf::Accessor,
    buffers: &[gltf::buffer::Data],
    pad_w: f32,
) -> Result<Vec<Vec4>> {
    require_f32(accessor)?;
    let comps = match accessor.dimensions() {
        Dimensions::Vec3 => 3,
        Dimensions::Vec4 => 4,
        other => {
            return Err(ConvertError::MalformedInput(format!(
                "attribute accessor {} has dimensions {other:?}, expected VEC3/VEC4",
                accessor.index()
            )))
        }
    };
    let (bytes, stride) = accessor_slice(accessor, buffers)?;
    let mut out = Vec::with_capacity(accessor.count());
    for i in 0..accessor.count() {
        let at = i * stride;
        let w = if comps == 4 { f32_at(bytes, at + 12) } else { pad_w };
        out.push(Vec4::new(
            f32_at(bytes, at),
            f32_at(bytes, at + 4),
            f32_at(bytes, at + 8),
            w,
        ));
    }
    Ok(out)
}

/// Read a VEC2 float attribute (texture coordinates).
pub fn read_vec2(accessor: &gltf::Accessor, buffers: &[gltf::buffer::Data]) -> Result<Vec<Vec2>> {
    require_f32(accessor)?;
    if accessor.dimensions() != Dimensions::Vec2 {
        return Err(ConvertError::MalformedInput(format!(
            "attribute accessor {} has dimensions {:?}, expected VEC2",
            accessor.index(),
            accessor.dimensions()
        )));
    }
    let (bytes, stride) = accessor_slice(accessor, buffers)?;
    let mut out = Vec::with_capacity(accessor.count());
    for i in 0..accessor.count() {
        let at = i * stride;
        out.push(Vec2::new(f32_at(bytes, at), f32_at(bytes, at + 4)));
    }
    Ok(out)
}
