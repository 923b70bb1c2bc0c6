use glam::{Vec2, Vec3, Vec4};

use crate::errors::{ConvertError, Result};

/// A consolidated indexed triangle mesh.
///
/// All attribute arrays are index-parallel: one entry per unique vertex.
/// `indices` is a flat triangle list; `mat_indices` carries one material id
/// per triangle.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub positions: Vec<Vec4>,
    pub normals: Vec<Vec4>,
    pub tangents: Vec<Vec4>,
    /// Zero-filled when the source carries no texture coordinates.
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
    /// One entry per triangle (`indices.len() / 3`).
    pub mat_indices: Vec<u32>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check the structural invariants of a consolidated mesh.
    ///
    /// - the index stream is a whole number of triangles and `mat_indices`
    ///   has one entry per triangle
    /// - attribute arrays are equal length
    /// - every index addresses an existing vertex
    pub fn validate(&self) -> Result<()> {
        if self.indices.len() % 3 != 0 {
            return Err(ConvertError::MalformedInput(format!(
                "mesh '{}': index count {} is not a multiple of 3",
                self.name,
                self.indices.len()
            )));
        }
        if self.mat_indices.len() != self.indices.len() / 3 {
            return Err(ConvertError::MalformedInput(format!(
                "mesh '{}': {} material indices for {} triangles",
                self.name,
                self.mat_indices.len(),
                self.indices.len() / 3
            )));
        }
        let n = self.positions.len();
        if self.normals.len() != n || self.tangents.len() != n || self.uvs.len() != n {
            return Err(ConvertError::MalformedInput(format!(
                "mesh '{}': attribute arrays disagree on vertex count \
                 (pos {}, norm {}, tan {}, uv {})",
                self.name,
                n,
                self.normals.len(),
                self.tangents.len(),
                self.uvs.len()
            )));
        }
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= n) {
            return Err(ConvertError::MalformedInput(format!(
                "mesh '{}': index {bad} out of range ({n} vertices)",
                self.name
            )));
        }
        Ok(())
    }

    /// Default tangent policy for sources that carry none.
    ///
    /// `cross(normal, +Y)`, falling back to `cross(normal, +X)` when the
    /// normal is parallel to the up axis. Approximate, not derived from UVs.
    pub fn synthesize_tangent(normal: Vec3) -> Vec4 {
        let t = normal.cross(Vec3::Y);
        let t = if t.length_squared() < 1e-12 {
            normal.cross(Vec3::X)
        } else {
            t
        };
        t.normalize_or_zero().extend(0.0)
    }
}
