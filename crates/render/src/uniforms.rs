//! Uniform names of the scene program and their locations, resolved once after link.

use crate::device::{RenderDevice, UniformLocation, UniformValue};

pub const VIEW_XFORM: &str = "view_xform";
pub const PROJECTION_XFORM: &str = "projection_xform";
pub const PROJECTION_VIEW_MODEL_XFORM: &str = "projection_view_model_xform";
pub const MODEL_XFORM: &str = "model_xform";
pub const AMBIENT_INTENSITY: &str = "ambientIntensityColour";
pub const CAMERA_POS: &str = "cameraPos";

pub const MAT_AMBIENT: &str = "mat.ambient_colour";
pub const MAT_DIFFUSE: &str = "mat.diffuse_colour";
pub const MAT_SPECULAR: &str = "mat.specular_colour";
pub const MAT_SHININESS: &str = "mat.shininess";
pub const MAT_HAS_DIFFUSE: &str = "mat.hasDiffuse";
pub const MAT_HAS_SPECULAR: &str = "mat.hasSpecular";
pub const MAT_DIFFUSE_SAMPLER: &str = "mat.diffuse_sampler";
pub const MAT_SPECULAR_SAMPLER: &str = "mat.specular_sampler";

/// Name of a field of `Lights[index]`.
pub fn light_field(index: usize, field: &str) -> String {
    format!("Lights[{index}].{field}")
}

/// Locations of one light array element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightLocations {
    pub position: Option<UniformLocation>,
    pub intensity: Option<UniformLocation>,
    pub range: Option<UniformLocation>,
    pub direction: Option<UniformLocation>,
}

/// Locations of the `mat` struct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialLocations {
    pub ambient_colour: Option<UniformLocation>,
    pub diffuse_colour: Option<UniformLocation>,
    pub specular_colour: Option<UniformLocation>,
    pub shininess: Option<UniformLocation>,
    pub has_diffuse: Option<UniformLocation>,
    pub has_specular: Option<UniformLocation>,
    pub diffuse_sampler: Option<UniformLocation>,
    pub specular_sampler: Option<UniformLocation>,
}

/// Every uniform location the frame renderer writes.
///
/// A `None` location is skipped on upload, matching a uniform the program does
/// not use. An unresolved table (no usable program) skips everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformTable {
    pub view: Option<UniformLocation>,
    pub projection: Option<UniformLocation>,
    pub projection_view_model: Option<UniformLocation>,
    pub model: Option<UniformLocation>,
    pub ambient_intensity: Option<UniformLocation>,
    pub camera_pos: Option<UniformLocation>,
    pub lights: Vec<LightLocations>,
    pub material: MaterialLocations,
}

impl UniformTable {
    /// Table with no resolved locations, used when the program failed to build.
    pub fn unresolved(light_capacity: usize) -> Self {
        Self {
            lights: vec![LightLocations::default(); light_capacity],
            ..Self::default()
        }
    }

    /// Query every location by name once.
    pub fn resolve<D: RenderDevice>(device: &D, program: &D::Program, light_capacity: usize) -> Self {
        let loc = |name: &str| device.uniform_location(program, name);

        let lights = (0..light_capacity)
            .map(|i| LightLocations {
                position: loc(&light_field(i, "position")),
                intensity: loc(&light_field(i, "intensity")),
                range: loc(&light_field(i, "range")),
                direction: loc(&light_field(i, "direction")),
            })
            .collect();

        let table = Self {
            view: loc(VIEW_XFORM),
            projection: loc(PROJECTION_XFORM),
            projection_view_model: loc(PROJECTION_VIEW_MODEL_XFORM),
            model: loc(MODEL_XFORM),
            ambient_intensity: loc(AMBIENT_INTENSITY),
            camera_pos: loc(CAMERA_POS),
            lights,
            material: MaterialLocations {
                ambient_colour: loc(MAT_AMBIENT),
                diffuse_colour: loc(MAT_DIFFUSE),
                specular_colour: loc(MAT_SPECULAR),
                shininess: loc(MAT_SHININESS),
                has_diffuse: loc(MAT_HAS_DIFFUSE),
                has_specular: loc(MAT_HAS_SPECULAR),
                diffuse_sampler: loc(MAT_DIFFUSE_SAMPLER),
                specular_sampler: loc(MAT_SPECULAR_SAMPLER),
            },
        };
        tracing::debug!(
            resolved = table.resolved_count(),
            light_capacity,
            "uniform locations resolved"
        );
        table
    }

    /// Number of names that resolved to a location.
    pub fn resolved_count(&self) -> usize {
        let m = &self.material;
        let globals = [
            self.view,
            self.projection,
            self.projection_view_model,
            self.model,
            self.ambient_intensity,
            self.camera_pos,
            m.ambient_colour,
            m.diffuse_colour,
            m.specular_colour,
            m.shininess,
            m.has_diffuse,
            m.has_specular,
            m.diffuse_sampler,
            m.specular_sampler,
        ];
        let lights = self
            .lights
            .iter()
            .flat_map(|l| [l.position, l.intensity, l.range, l.direction]);
        globals.into_iter().chain(lights).flatten().count()
    }
}

/// Upload `value` if the location resolved.
pub fn upload<D: RenderDevice>(device: &mut D, location: Option<UniformLocation>, value: UniformValue) {
    if let Some(location) = location {
        device.set_uniform(location, value);
    }
}
