//! In-memory scene model
//!
//! All entities live in id-keyed tables owned by [`SceneData`]. Ids are
//! dense and zero-based; the converter checks `max id == len - 1` before
//! touching a collection, since a sparse id space is the cheapest reliable
//! signal of a malformed library.

pub mod camera;
pub mod instance;
pub mod material;
pub mod mesh;
pub mod texture;

use std::collections::BTreeMap;

pub use camera::Camera;
pub use instance::{Instance, InstancedScene, LightInstance};
pub use material::{
    AlphaMode, ColorSource, GltfPbrMaterial, GmcSource, Material, MaterialEntry, ScalarSource,
};
pub use mesh::Mesh;
pub use texture::{FilterMode, SamplerDesc, Texture, TextureInstance, TextureSource, WrapMode};

use crate::errors::{ConvertError, Result};

/// The full converted scene: every library keyed by dense integer id,
/// iterated in id order.
#[derive(Debug, Clone, Default)]
pub struct SceneData {
    pub meshes: BTreeMap<u32, Mesh>,
    pub materials: BTreeMap<u32, MaterialEntry>,
    pub textures: BTreeMap<u32, Texture>,
    pub cameras: BTreeMap<u32, Camera>,
    pub scenes: Vec<InstancedScene>,
}

/// Fail fast when an id-keyed collection is sparse.
///
/// `BTreeMap` keeps keys ordered, so the last key is the maximum id.
pub fn check_contiguous_ids<T>(map: &BTreeMap<u32, T>, collection: &'static str) -> Result<()> {
    if let Some((&max_id, _)) = map.iter().next_back() {
        if max_id as usize != map.len() - 1 {
            return Err(ConvertError::InconsistentIds {
                collection,
                max_id,
                count: map.len(),
            });
        }
    }
    Ok(())
}

impl SceneData {
    /// Look up a texture, mapping a dangling id to `MalformedInput`.
    pub fn texture(&self, id: u32) -> Result<&Texture> {
        self.textures
            .get(&id)
            .ok_or_else(|| ConvertError::MalformedInput(format!("texture id {id} not in library")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguity_check_accepts_dense_and_empty() {
        let mut map: BTreeMap<u32, ()> = BTreeMap::new();
        assert!(check_contiguous_ids(&map, "material").is_ok());
        map.insert(0, ());
        map.insert(1, ());
        map.insert(2, ());
        assert!(check_contiguous_ids(&map, "material").is_ok());
    }

    #[test]
    fn contiguity_check_rejects_gap() {
        let mut map: BTreeMap<u32, ()> = BTreeMap::new();
        map.insert(0, ());
        map.insert(1, ());
        map.insert(3, ());
        let err = check_contiguous_ids(&map, "material").unwrap_err();
        assert!(matches!(
            err,
            crate::errors::ConvertError::InconsistentIds { max_id: 3, count: 3, .. }
        ));
    }
}
