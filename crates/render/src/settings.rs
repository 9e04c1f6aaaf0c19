use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::device::FrameState;
use crate::lights::{default_extra_lights, ExtraLight, LightSlots};
use crate::RenderError;

/// Renderer tuning, loadable from YAML. Missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Size of the shader-side light array.
    pub max_lights: usize,
    /// Slots reserved at the top of the array for `extra_lights`.
    pub extra_light_slots: usize,
    pub extra_lights: Vec<ExtraLight>,
    pub frame: FrameState,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            max_lights: 24,
            extra_light_slots: 2,
            extra_lights: default_extra_lights(),
            frame: FrameState::default(),
        }
    }
}

impl RendererSettings {
    pub fn from_yaml(text: &str) -> Result<Self, RenderError> {
        let settings: Self =
            serde_yaml::from_str(text).map_err(|e| RenderError::Config(e.to_string()))?;
        settings.light_slots()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| RenderError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_yaml(&text)
    }

    /// Validate the light array partition against the extra light list.
    pub fn light_slots(&self) -> Result<LightSlots, RenderError> {
        if self.extra_lights.len() != self.extra_light_slots {
            return Err(RenderError::Config(format!(
                "{} extra lights configured for {} reserved slots",
                self.extra_lights.len(),
                self.extra_light_slots
            )));
        }
        LightSlots::new(self.max_lights, self.extra_light_slots)
    }
}
