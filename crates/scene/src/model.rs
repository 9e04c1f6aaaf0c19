use glam::{Affine3A, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use vista_common::{InstanceId, MaterialId, MeshId};

/// Per-vertex geometry arrays for one mesh shape, as the provider stores them.
///
/// The arrays are parallel: element `i` of each belongs to vertex `i`.
/// Tangents are carried for completeness; the renderer does not consume them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMesh {
    pub id: MeshId,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    #[serde(default, rename = "texture_coordinates")]
    pub uvs: Vec<Vec2>,
    #[serde(default)]
    pub tangents: Vec<Vec3>,
    #[serde(rename = "elements")]
    pub indices: Vec<u32>,
}

/// Phong-style surface description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    #[serde(default)]
    pub ambient_colour: Vec3,
    #[serde(default = "default_diffuse")]
    pub diffuse_colour: Vec3,
    #[serde(default)]
    pub specular_colour: Vec3,
    #[serde(default)]
    pub shininess: f32,
    /// Resource path of the diffuse map. Empty means untextured.
    #[serde(default)]
    pub diffuse_texture: String,
    /// Resource path of the specular map. Empty means untextured.
    #[serde(default)]
    pub specular_texture: String,
}

fn default_diffuse() -> Vec3 {
    Vec3::splat(0.8)
}

impl Material {
    pub fn untextured(id: MaterialId, diffuse_colour: Vec3) -> Self {
        Self {
            id,
            ambient_colour: Vec3::ZERO,
            diffuse_colour,
            specular_colour: Vec3::ZERO,
            shininess: 0.0,
            diffuse_texture: String::new(),
            specular_texture: String::new(),
        }
    }
}

/// Light supplied by the scene.
///
/// Without a direction this is a point light fading to zero at `range`. With
/// one, a positive `range` is a spot cone half-angle in degrees and a zero
/// `range` makes it directional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub position: Vec3,
    pub intensity: Vec3,
    pub range: f32,
    #[serde(default)]
    pub direction: Option<Vec3>,
}

impl Light {
    pub fn point(position: Vec3, intensity: Vec3, range: f32) -> Self {
        Self {
            position,
            intensity,
            range,
            direction: None,
        }
    }
}

/// A placement of a mesh with its own transform and material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instance {
    pub id: InstanceId,
    pub mesh_id: MeshId,
    pub material_id: MaterialId,
    /// Affine 4×3 transform (three basis columns plus translation).
    pub transform: Affine3A,
}

/// On-disk form of an instance. The transform is four column vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceDef {
    pub id: InstanceId,
    pub mesh: MeshId,
    pub material: MaterialId,
    #[serde(default = "identity_columns")]
    pub transform: [[f32; 3]; 4],
}

fn identity_columns() -> [[f32; 3]; 4] {
    [
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, 0.0],
    ]
}

impl From<&InstanceDef> for Instance {
    fn from(def: &InstanceDef) -> Self {
        Self {
            id: def.id,
            mesh_id: def.mesh,
            material_id: def.material,
            transform: Affine3A::from_cols_array_2d(&def.transform),
        }
    }
}

impl From<&Instance> for InstanceDef {
    fn from(instance: &Instance) -> Self {
        Self {
            id: instance.id,
            mesh: instance.mesh_id,
            material: instance.material_id,
            transform: instance.transform.to_cols_array_2d(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_def_defaults_to_identity() {
        let def: InstanceDef =
            serde_json::from_str(r#"{"id": 1, "mesh": 2, "material": 3}"#).unwrap();
        let instance = Instance::from(&def);
        assert_eq!(instance.transform, Affine3A::IDENTITY);
        assert_eq!(instance.mesh_id, MeshId(2));
    }

    #[test]
    fn instance_translation_is_last_column() {
        let def = InstanceDef {
            id: InstanceId(0),
            mesh: MeshId(0),
            material: MaterialId(0),
            transform: [
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
                [4.0, 5.0, 6.0],
            ],
        };
        let instance = Instance::from(&def);
        assert_eq!(Vec3::from(instance.transform.translation), Vec3::new(4.0, 5.0, 6.0));
        assert_eq!(InstanceDef::from(&instance).transform, def.transform);
    }

    #[test]
    fn material_texture_paths_default_empty() {
        let mat: Material = serde_json::from_str(r#"{"id": 4}"#).unwrap();
        assert!(mat.diffuse_texture.is_empty());
        assert!(mat.specular_texture.is_empty());
        assert_eq!(mat.diffuse_colour, Vec3::splat(0.8));
    }

    #[test]
    fn default_source_mesh_is_empty_mesh_zero() {
        let mesh = SourceMesh::default();
        assert_eq!(mesh.id, MeshId(0));
        assert!(mesh.positions.is_empty());
        assert!(mesh.indices.is_empty());
    }
}
