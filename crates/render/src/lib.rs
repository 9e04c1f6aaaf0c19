//! Scene renderer: turns a scene provider into draw calls on a render device.
//!
//! # Invariants
//! - The renderer never mutates the scene.
//! - Each mesh is uploaded once; each texture path is decoded at most once.
//! - Scene lights fill the low light slots, extra lights the top slots.
//!
//! The renderer talks to a [`RenderDevice`]. [`RecordingDevice`] journals every
//! call instead of touching a GPU and backs the headless tools and tests.

mod camera;
mod device;
mod lights;
mod mesh_store;
mod recording;
mod renderer;
mod settings;
mod texture_cache;
pub mod uniforms;
mod vertex;

pub use camera::{view_matrix, CameraMatrices, LOOK_AT_DISTANCE};
pub use device::{
    AttributeBinding, BufferKind, Channels, ComponentType, Filter, FrameState, IndexType,
    PixelFormat, ProgramDesc, RenderDevice, SamplerDesc, ShaderError, ShaderSource, ShaderStage,
    TextureUnit, TextureUpload, Topology, UniformLocation, UniformValue, VertexAttribute,
    VertexLayoutDesc, Wrap,
};
pub use lights::{default_extra_lights, ExtraLight, LightSlots, MAX_LIGHT_ARRAY};
pub use mesh_store::{MeshRecord, MeshStore};
pub use recording::{DeviceCommand, Recorded, RecordedBuffer, RecordedProgram, RecordingDevice};
pub use renderer::{
    FrameStats, SceneRenderer, SetupStats, WindowView, DIFFUSE_UNIT, SPECULAR_UNIT,
};
pub use settings::RendererSettings;
pub use texture_cache::{DecodedImage, FileImageDecoder, ImageDecoder, TextureCache, TextureHandle};
pub use vertex::{interleave, Vertex, ATTRIB_NORMAL, ATTRIB_POSITION, ATTRIB_UV};

use vista_common::MeshId;

/// Errors from turning source geometry into GPU meshes.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("attribute arrays differ in length: {positions} positions, {normals} normals, {uvs} uvs")]
    AttributeLengthMismatch {
        positions: usize,
        normals: usize,
        uvs: usize,
    },
    #[error("{mesh} is malformed: {reason}")]
    MalformedSource { mesh: MeshId, reason: String },
    #[error("{0} was already built")]
    DuplicateMesh(MeshId),
    #[error("{mesh}: index {index} at position {position} exceeds {vertex_count} vertices")]
    IndexOutOfRange {
        mesh: MeshId,
        position: usize,
        index: u32,
        vertex_count: usize,
    },
    #[error("{0} has more elements than fit in u32")]
    TooLarge(MeshId),
}

impl MeshError {
    /// Attach the mesh id to an error raised before the mesh was known.
    pub fn for_mesh(self, mesh: MeshId) -> Self {
        match self {
            e @ MeshError::AttributeLengthMismatch { .. } => MeshError::MalformedSource {
                mesh,
                reason: e.to_string(),
            },
            other => other,
        }
    }
}

/// Errors from renderer setup.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("renderer config: {0}")]
    Config(String),
    #[error("{scene_lights} scene lights exceed the light array ({max} slots, {extra} reserved)")]
    LightCapacity {
        scene_lights: usize,
        extra: usize,
        max: usize,
    },
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_becomes_malformed_source() {
        let err = MeshError::AttributeLengthMismatch {
            positions: 3,
            normals: 2,
            uvs: 3,
        }
        .for_mesh(MeshId(4));
        match err {
            MeshError::MalformedSource { mesh, reason } => {
                assert_eq!(mesh, MeshId(4));
                assert!(reason.contains("2 normals"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn other_errors_pass_through() {
        let err = MeshError::DuplicateMesh(MeshId(1)).for_mesh(MeshId(2));
        assert!(matches!(err, MeshError::DuplicateMesh(MeshId(1))));
    }

    #[test]
    fn capacity_message_names_counts() {
        let err = RenderError::LightCapacity {
            scene_lights: 30,
            extra: 2,
            max: 24,
        };
        assert!(err.to_string().contains("30 scene lights"));
    }
}
