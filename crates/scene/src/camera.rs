use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::SceneError;

/// Scene camera. Owned by the scene; the input controller is the only writer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: Vec3,
    /// Look direction. Not required to be normalized.
    pub direction: Vec3,
    #[serde(rename = "vertical_fov")]
    pub vertical_fov_degrees: f32,
    #[serde(rename = "near_plane")]
    pub near: f32,
    #[serde(rename = "far_plane")]
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            direction: Vec3::NEG_Z,
            vertical_fov_degrees: 60.0,
            near: 1.0,
            far: 1000.0,
        }
    }
}

impl Camera {
    /// Check `near < far` and a positive field of view.
    pub fn validate(&self) -> Result<(), SceneError> {
        if !(self.vertical_fov_degrees > 0.0 && self.vertical_fov_degrees < 180.0) {
            return Err(SceneError::InvalidCamera(format!(
                "vertical field of view must be in (0, 180), got {}",
                self.vertical_fov_degrees
            )));
        }
        if !(self.near > 0.0 && self.near < self.far) {
            return Err(SceneError::InvalidCamera(format!(
                "clip planes must satisfy 0 < near < far, got near={} far={}",
                self.near, self.far
            )));
        }
        Ok(())
    }

    pub fn vertical_fov_radians(&self) -> f32 {
        self.vertical_fov_degrees.to_radians()
    }
}
