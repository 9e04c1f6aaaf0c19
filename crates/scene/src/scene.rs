use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use vista_common::{InstanceId, MaterialId, MeshId};

use crate::{Camera, Instance, InstanceDef, Light, Material, SceneError, SourceMesh};

/// Read access to a pre-built scene, plus the mutable camera.
///
/// The viewer never edits geometry, materials, lights or instances; the camera
/// is the single exception and is written only by the input controller.
pub trait SceneProvider {
    /// All source meshes, in provider order.
    fn meshes(&self) -> &[SourceMesh];
    fn materials(&self) -> &[Material];
    fn lights(&self) -> &[Light];
    fn ambient_light_intensity(&self) -> Vec3;
    fn camera(&self) -> &Camera;
    fn camera_mut(&mut self) -> &mut Camera;
    /// Seconds of scene time elapsed since start.
    fn time_in_seconds(&self) -> f32;
    /// Instance ids placing the given mesh. Empty when the mesh is unused.
    fn instances_by_mesh_id(&self, mesh_id: MeshId) -> &[InstanceId];
    fn instance_by_id(&self, id: InstanceId) -> Option<&Instance>;
    fn material_by_id(&self, id: MaterialId) -> Option<&Material>;
}

/// Serialized scene description (JSON or YAML).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneDocument {
    #[serde(default)]
    pub meshes: Vec<SourceMesh>,
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default)]
    pub lights: Vec<Light>,
    #[serde(default)]
    pub ambient_intensity: Vec3,
    #[serde(default)]
    pub camera: Camera,
    #[serde(default)]
    pub instances: Vec<InstanceDef>,
}

/// In-memory scene provider.
///
/// Uses BTreeMap indices so iteration over instances of a mesh is stable.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    meshes: Vec<SourceMesh>,
    materials: Vec<Material>,
    material_index: BTreeMap<MaterialId, usize>,
    lights: Vec<Light>,
    ambient_intensity: Vec3,
    camera: Camera,
    instances: BTreeMap<InstanceId, Instance>,
    instances_by_mesh: BTreeMap<MeshId, Vec<InstanceId>>,
    time_seconds: f32,
}

impl Scene {
    /// Empty scene with a default camera.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scene from a document, checking cross references.
    pub fn from_document(doc: SceneDocument) -> Result<Self, SceneError> {
        doc.camera.validate()?;

        let mut scene = Scene {
            lights: doc.lights,
            ambient_intensity: doc.ambient_intensity,
            camera: doc.camera,
            ..Scene::default()
        };
        for mesh in doc.meshes {
            scene.add_mesh(mesh)?;
        }
        for material in doc.materials {
            scene.add_material(material)?;
        }
        for def in &doc.instances {
            scene.add_instance(Instance::from(def))?;
        }

        tracing::info!(
            meshes = scene.meshes.len(),
            materials = scene.materials.len(),
            lights = scene.lights.len(),
            instances = scene.instances.len(),
            "scene loaded"
        );
        Ok(scene)
    }

    /// Load a scene file. `.yaml`/`.yml` are parsed as YAML, anything else as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let doc: SceneDocument = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&text)?,
            _ => serde_json::from_str(&text)?,
        };
        tracing::debug!("parsed scene document {}", path.display());
        Self::from_document(doc)
    }

    /// Snapshot the scene back into its serializable form.
    pub fn to_document(&self) -> SceneDocument {
        SceneDocument {
            meshes: self.meshes.clone(),
            materials: self.materials.clone(),
            lights: self.lights.clone(),
            ambient_intensity: self.ambient_intensity,
            camera: self.camera,
            instances: self.instances.values().map(InstanceDef::from).collect(),
        }
    }

    /// Save the scene as pretty JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), SceneError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &self.to_document())?;
        Ok(())
    }

    pub fn add_mesh(&mut self, mesh: SourceMesh) -> Result<(), SceneError> {
        if self.meshes.iter().any(|m| m.id == mesh.id) {
            return Err(SceneError::DuplicateMesh(mesh.id));
        }
        self.meshes.push(mesh);
        Ok(())
    }

    pub fn add_material(&mut self, material: Material) -> Result<(), SceneError> {
        if self.material_index.contains_key(&material.id) {
            return Err(SceneError::DuplicateMaterial(material.id));
        }
        self.material_index.insert(material.id, self.materials.len());
        self.materials.push(material);
        Ok(())
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    /// Place an instance. Its mesh and material must already exist.
    pub fn add_instance(&mut self, instance: Instance) -> Result<(), SceneError> {
        if self.instances.contains_key(&instance.id) {
            return Err(SceneError::DuplicateInstance(instance.id));
        }
        if !self.meshes.iter().any(|m| m.id == instance.mesh_id) {
            return Err(SceneError::UnknownMesh {
                instance: instance.id,
                mesh: instance.mesh_id,
            });
        }
        if !self.material_index.contains_key(&instance.material_id) {
            return Err(SceneError::UnknownMaterial {
                instance: instance.id,
                material: instance.material_id,
            });
        }
        self.instances_by_mesh
            .entry(instance.mesh_id)
            .or_default()
            .push(instance.id);
        self.instances.insert(instance.id, instance);
        Ok(())
    }

    pub fn set_ambient_light_intensity(&mut self, intensity: Vec3) {
        self.ambient_intensity = intensity;
    }

    pub fn set_camera(&mut self, camera: Camera) -> Result<(), SceneError> {
        camera.validate()?;
        self.camera = camera;
        Ok(())
    }

    /// Advance scene time. Negative deltas are ignored.
    pub fn advance(&mut self, dt_seconds: f32) {
        if dt_seconds > 0.0 {
            self.time_seconds += dt_seconds;
        }
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

impl SceneProvider for Scene {
    fn meshes(&self) -> &[SourceMesh] {
        &self.meshes
    }

    fn materials(&self) -> &[Material] {
        &self.materials
    }

    fn lights(&self) -> &[Light] {
        &self.lights
    }

    fn ambient_light_intensity(&self) -> Vec3 {
        self.ambient_intensity
    }

    fn camera(&self) -> &Camera {
        &self.camera
    }

    fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    fn time_in_seconds(&self) -> f32 {
        self.time_seconds
    }

    fn instances_by_mesh_id(&self, mesh_id: MeshId) -> &[InstanceId] {
        self.instances_by_mesh
            .get(&mesh_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn instance_by_id(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(&id)
    }

    fn material_by_id(&self, id: MaterialId) -> Option<&Material> {
        self.material_index.get(&id).map(|&i| &self.materials[i])
    }
}
