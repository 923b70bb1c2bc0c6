use glam::{Mat4, Vec3};

/// One entry of the scene camera library.
///
/// Placement is either the explicit `matrix` (camera-to-world) or derived
/// from `position`/`look_at`/`up` when no matrix is present.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub name: String,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near_clip: f32,
    pub far_clip: f32,
    pub position: Vec3,
    pub look_at: Vec3,
    pub up: Vec3,
    /// Explicit camera-to-world matrix; overrides the look-at triple.
    pub matrix: Option<Mat4>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            name: String::new(),
            fov: 45.0,
            near_clip: 0.01,
            far_clip: 100.0,
            position: Vec3::ZERO,
            look_at: Vec3::NEG_Z,
            up: Vec3::Y,
            matrix: None,
        }
    }
}

impl Camera {
    /// Camera-to-world placement matrix.
    ///
    /// Without an explicit matrix, builds one from the look-at triple with
    /// columns (right, up, -forward, position).
    pub fn node_matrix(&self) -> Mat4 {
        if let Some(m) = self.matrix {
            return m;
        }
        let forward = (self.look_at - self.position).normalize_or_zero();
        let forward = if forward.length_squared() < 0.5 { Vec3::NEG_Z } else { forward };
        let right = forward.cross(self.up).normalize_or_zero();
        let right = if right.length_squared() < 0.5 { Vec3::X } else { right };
        let up = right.cross(forward);
        Mat4::from_cols(
            right.extend(0.0),
            up.extend(0.0),
            (-forward).extend(0.0),
            self.position.extend(1.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn look_at_matrix_orients_along_view_direction() {
        let cam = Camera {
            position: Vec3::new(0.0, 0.0, 5.0),
            look_at: Vec3::ZERO,
            ..Camera::default()
        };
        let m = cam.node_matrix();
        // -Z column of a camera node points away from the target
        let back = m.z_axis.truncate();
        assert!((back - Vec3::Z).length() < 1e-5, "back vector {back:?}");
        assert!((m.w_axis.truncate() - cam.position).length() < 1e-5);
    }

    #[test]
    fn explicit_matrix_wins() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let cam = Camera { matrix: Some(m), ..Camera::default() };
        assert_eq!(cam.node_matrix(), m);
    }
}
