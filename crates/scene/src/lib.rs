//! Scene model: the pre-built scene the viewer renders.
//!
//! # Invariants
//! - Geometry, materials, lights and instances are read-only to the viewer.
//! - The camera is the only mutable part, and only the input controller writes it.
//! - Every instance references an existing mesh and material.

mod camera;
mod model;
mod scene;

pub use camera::Camera;
pub use model::{Instance, InstanceDef, Light, Material, SourceMesh};
pub use scene::{Scene, SceneDocument, SceneProvider};

use vista_common::{InstanceId, MaterialId, MeshId};

/// Errors from building or loading a scene.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid camera: {0}")]
    InvalidCamera(String),
    #[error("duplicate mesh id {0}")]
    DuplicateMesh(MeshId),
    #[error("duplicate material id {0}")]
    DuplicateMaterial(MaterialId),
    #[error("duplicate instance id {0}")]
    DuplicateInstance(InstanceId),
    #[error("{instance} references unknown {mesh}")]
    UnknownMesh { instance: InstanceId, mesh: MeshId },
    #[error("{instance} references unknown {material}")]
    UnknownMaterial {
        instance: InstanceId,
        material: MaterialId,
    },
}
