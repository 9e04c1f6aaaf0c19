use glam::{Mat4, Vec3};
use vista_scene::Camera;

/// Distance along the camera direction used to build the look-at target.
pub const LOOK_AT_DISTANCE: f32 = 5.0;

const MIN_DIRECTION_LENGTH: f32 = 1e-6;

/// Per-frame camera matrices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub eye: Vec3,
}

impl CameraMatrices {
    pub fn new(camera: &Camera, aspect_ratio: f32) -> Self {
        let view = view_matrix(camera.position, camera.direction);
        let projection = Mat4::perspective_rh(
            camera.vertical_fov_radians(),
            aspect_ratio,
            camera.near,
            camera.far,
        );
        Self {
            view,
            projection,
            view_projection: projection * view,
            eye: camera.position,
        }
    }
}

/// Look from `position` toward `position + direction * 5` with world up.
///
/// A near-zero direction falls back to -Z. Looking straight up or down swaps
/// the up vector to +Z so the basis stays well defined.
pub fn view_matrix(position: Vec3, direction: Vec3) -> Mat4 {
    let direction = if direction.length() < MIN_DIRECTION_LENGTH {
        tracing::debug!("degenerate camera direction {direction}, using -Z");
        Vec3::NEG_Z
    } else {
        direction
    };
    let up = if direction.normalize().cross(Vec3::Y).length() < MIN_DIRECTION_LENGTH {
        Vec3::Z
    } else {
        Vec3::Y
    };
    Mat4::look_at_rh(position, position + direction * LOOK_AT_DISTANCE, up)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_finite(m: &Mat4) {
        assert!(m.to_cols_array().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn look_at_target_lands_on_negative_z() {
        let camera = Camera {
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            vertical_fov_degrees: 60.0,
            near: 0.1,
            far: 100.0,
        };
        let m = CameraMatrices::new(&camera, 16.0 / 9.0);
        let target = m.view.transform_point3(Vec3::new(0.0, 0.0, -5.0));
        assert!(target.x.abs() < 1e-5);
        assert!(target.y.abs() < 1e-5);
        assert!((target.z + 5.0).abs() < 1e-5);
    }

    #[test]
    fn view_projection_is_projection_times_view() {
        let camera = Camera::default();
        let m = CameraMatrices::new(&camera, 1.5);
        assert_eq!(m.view_projection, m.projection * m.view);
        assert_eq!(m.eye, camera.position);
    }

    #[test]
    fn direction_length_does_not_change_view() {
        let a = view_matrix(Vec3::ONE, Vec3::new(0.0, 0.0, -1.0));
        let b = view_matrix(Vec3::ONE, Vec3::new(0.0, 0.0, -40.0));
        assert!(a.abs_diff_eq(b, 1e-5));
    }

    #[test]
    fn zero_direction_falls_back() {
        let m = view_matrix(Vec3::ZERO, Vec3::ZERO);
        assert_finite(&m);
        assert!(m.abs_diff_eq(view_matrix(Vec3::ZERO, Vec3::NEG_Z), 1e-6));
    }

    #[test]
    fn looking_straight_down_stays_finite() {
        let m = view_matrix(Vec3::new(0.0, 10.0, 0.0), Vec3::NEG_Y);
        assert_finite(&m);
    }
}
