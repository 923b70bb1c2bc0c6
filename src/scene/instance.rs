use glam::Mat4;

/// Placement of a geometry within one scene graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub id: u32,
    pub mesh_id: u32,
    pub matrix: Mat4,
    /// Native-only per-instance material remap list id; no foreign
    /// counterpart exists, so export treats its presence as a policy
    /// violation (fatal under strict, dropped with a warning otherwise).
    pub remap_list_id: Option<u32>,
    /// Native-only link to a light instance driving this geometry.
    pub light_instance_id: Option<u32>,
}

impl Instance {
    pub fn new(id: u32, mesh_id: u32, matrix: Mat4) -> Self {
        Self {
            id,
            mesh_id,
            matrix,
            remap_list_id: None,
            light_instance_id: None,
        }
    }
}

/// Placement of a light within one scene graph.
#[derive(Debug, Clone, PartialEq)]
pub struct LightInstance {
    pub id: u32,
    pub light_id: u32,
    pub matrix: Mat4,
}

/// One named top-level scene graph; a file may carry several.
#[derive(Debug, Clone, Default)]
pub struct InstancedScene {
    pub name: String,
    pub instances: Vec<Instance>,
    pub light_instances: Vec<LightInstance>,
}
