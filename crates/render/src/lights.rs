use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::RenderError;

/// A light the viewer adds on top of the scene's own lights.
///
/// Values are scene tuning constants; `direction` is deliberately not
/// normalized and is uploaded as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraLight {
    pub name: String,
    pub position: Vec3,
    pub intensity: Vec3,
    /// Uploaded only when set. With a direction this is the spot cone
    /// half-angle in degrees.
    #[serde(default)]
    pub range: Option<f32>,
    pub direction: Vec3,
    /// When set, the x component becomes `sin(t) * amplitude`.
    #[serde(default)]
    pub sweep_amplitude: Option<f32>,
}

impl ExtraLight {
    /// 25 degree spot light above the scene centre, sweeping back and forth.
    pub fn sweeping_spot() -> Self {
        Self {
            name: "sweeping spot".into(),
            position: Vec3::new(0.0, 150.0, -5.0),
            intensity: Vec3::new(0.6, 0.3, 0.3),
            range: Some(25.0),
            direction: Vec3::new(0.0, -90.0, 0.0),
            sweep_amplitude: Some(45.0),
        }
    }

    /// Dim static directional fill light.
    pub fn dim_directional() -> Self {
        Self {
            name: "dim directional".into(),
            position: Vec3::new(0.0, 150.0, -5.0),
            intensity: Vec3::new(0.1, 0.15, 0.2),
            range: None,
            direction: Vec3::new(0.0, -10.0, 75.0),
            sweep_amplitude: None,
        }
    }

    /// Direction at scene time `t` seconds.
    pub fn direction_at(&self, t: f32) -> Vec3 {
        match self.sweep_amplitude {
            Some(amplitude) => Vec3::new(t.sin() * amplitude, self.direction.y, self.direction.z),
            None => self.direction,
        }
    }
}

pub fn default_extra_lights() -> Vec<ExtraLight> {
    vec![ExtraLight::sweeping_spot(), ExtraLight::dim_directional()]
}

/// Largest light array a renderer accepts. Keeps the frame uniform block
/// under the 64 KiB uniform binding limit.
pub const MAX_LIGHT_ARRAY: usize = 1024;

/// Partition of the shader light array.
///
/// Scene lights fill slots `0..scene_capacity()`; extra lights occupy the
/// last `extra_slots` slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightSlots {
    max_lights: usize,
    extra_slots: usize,
}

impl LightSlots {
    pub fn new(max_lights: usize, extra_slots: usize) -> Result<Self, RenderError> {
        if max_lights > MAX_LIGHT_ARRAY {
            return Err(RenderError::Config(format!(
                "light array of {max_lights} exceeds the limit of {MAX_LIGHT_ARRAY}"
            )));
        }
        if extra_slots > max_lights {
            return Err(RenderError::Config(format!(
                "{extra_slots} extra light slots do not fit in a light array of {max_lights}"
            )));
        }
        Ok(Self {
            max_lights,
            extra_slots,
        })
    }

    pub fn max_lights(&self) -> usize {
        self.max_lights
    }

    pub fn extra_slots(&self) -> usize {
        self.extra_slots
    }

    /// Number of slots available to scene lights.
    pub fn scene_capacity(&self) -> usize {
        self.max_lights - self.extra_slots
    }

    /// Slot index of the `k`-th extra light.
    pub fn extra_slot(&self, k: usize) -> usize {
        self.scene_capacity() + k
    }

    /// Fail when the scene brings more lights than the array can hold.
    pub fn check_scene_lights(&self, scene_lights: usize) -> Result<(), RenderError> {
        if scene_lights > self.scene_capacity() {
            return Err(RenderError::LightCapacity {
                scene_lights,
                extra: self.extra_slots,
                max: self.max_lights,
            });
        }
        Ok(())
    }
}
