use glam::Mat4;
use vista_common::Viewport;
use vista_scene::{Material, SceneProvider};

use crate::camera::CameraMatrices;
use crate::device::{
    IndexType, ProgramDesc, RenderDevice, ShaderSource, TextureUnit, Topology, UniformValue,
};
use crate::lights::LightSlots;
use crate::mesh_store::MeshStore;
use crate::settings::RendererSettings;
use crate::texture_cache::{ImageDecoder, TextureCache};
use crate::uniforms::{upload, UniformTable};
use crate::vertex::Vertex;
use crate::RenderError;

/// Texture unit sampled as the diffuse map.
pub const DIFFUSE_UNIT: TextureUnit = TextureUnit(0);
/// Texture unit sampled as the specular map.
pub const SPECULAR_UNIT: TextureUnit = TextureUnit(1);

/// Counts from a completed setup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetupStats {
    pub meshes: usize,
    pub textures: usize,
    pub missing_textures: usize,
}

/// Counts from one rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: usize,
    /// Light array slots written this frame (scene lights plus extras).
    pub light_slots: usize,
    /// Instances skipped because their instance or material lookup failed.
    pub instances_skipped: usize,
}

/// View-side window callbacks. Implementors receive the device and scene
/// from the event dispatcher that owns both.
pub trait WindowView<D: RenderDevice> {
    fn view_will_start(
        &mut self,
        device: &mut D,
        scene: &dyn SceneProvider,
    ) -> Result<SetupStats, RenderError>;

    fn view_did_reset(&mut self, device: &mut D, viewport: Viewport) {
        device.set_viewport(viewport);
    }

    fn view_did_stop(&mut self, _device: &mut D) {}

    fn view_render(&mut self, device: &mut D, scene: &dyn SceneProvider) -> FrameStats;
}

/// Forward renderer for a static scene: one program, one draw per instance.
pub struct SceneRenderer<D: RenderDevice> {
    settings: RendererSettings,
    slots: LightSlots,
    shader: ShaderSource,
    decoder: Box<dyn ImageDecoder>,
    program: Option<D::Program>,
    uniforms: UniformTable,
    meshes: MeshStore<D>,
    textures: TextureCache<D>,
}

impl<D: RenderDevice> SceneRenderer<D> {
    pub fn new(
        settings: RendererSettings,
        shader: ShaderSource,
        decoder: Box<dyn ImageDecoder>,
    ) -> Result<Self, RenderError> {
        let slots = settings.light_slots()?;
        Ok(Self {
            uniforms: UniformTable::unresolved(slots.max_lights()),
            settings,
            slots,
            shader,
            decoder,
            program: None,
            meshes: MeshStore::new(),
            textures: TextureCache::default(),
        })
    }

    /// Compile and link the scene program and resolve its uniforms.
    ///
    /// A build failure is logged and leaves the renderer without a usable
    /// program; frames still run but draw nothing visible.
    pub fn build_program(&mut self, device: &mut D) -> bool {
        let desc = ProgramDesc {
            source: &self.shader,
            attributes: &Vertex::ATTRIBUTE_BINDINGS,
            light_capacity: self.slots.max_lights(),
        };
        match device.create_program(&desc) {
            Ok(program) => {
                self.uniforms = UniformTable::resolve(device, &program, self.slots.max_lights());
                self.program = Some(program);
                tracing::info!("scene program linked");
                true
            }
            Err(e) => {
                tracing::error!("{e}");
                self.uniforms = UniformTable::unresolved(self.slots.max_lights());
                self.program = None;
                false
            }
        }
    }

    /// Upload every scene mesh and every referenced texture.
    ///
    /// Malformed meshes abort setup; missing textures do not.
    pub fn load_scene(
        &mut self,
        device: &mut D,
        scene: &dyn SceneProvider,
    ) -> Result<SetupStats, RenderError> {
        self.slots.check_scene_lights(scene.lights().len())?;

        for source in scene.meshes() {
            self.meshes.build_from_source(device, source)?;
        }

        let mut missing = 0;
        for material in scene.materials() {
            for path in [&material.diffuse_texture, &material.specular_texture] {
                if path.is_empty() {
                    continue;
                }
                if self
                    .textures
                    .get_or_create(device, self.decoder.as_ref(), path)
                    .is_none()
                {
                    missing += 1;
                }
            }
        }

        let stats = SetupStats {
            meshes: self.meshes.len(),
            textures: self.textures.len(),
            missing_textures: missing,
        };
        tracing::info!(
            meshes = stats.meshes,
            textures = stats.textures,
            missing_textures = stats.missing_textures,
            "scene uploaded"
        );
        Ok(stats)
    }

    pub fn meshes(&self) -> &MeshStore<D> {
        &self.meshes
    }

    pub fn textures(&self) -> &TextureCache<D> {
        &self.textures
    }

    pub fn has_program(&self) -> bool {
        self.program.is_some()
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Render one frame of `scene`.
    pub fn render_frame(&self, device: &mut D, scene: &dyn SceneProvider) -> FrameStats {
        let mut stats = FrameStats::default();

        device.begin_frame(&self.settings.frame);
        device.use_program(self.program.as_ref());

        let aspect = device.viewport().aspect_ratio();
        let camera = CameraMatrices::new(scene.camera(), aspect);
        let u = &self.uniforms;

        upload(device, u.view, UniformValue::Mat4(camera.view));
        upload(device, u.projection, UniformValue::Mat4(camera.projection));

        stats.light_slots += self.upload_scene_lights(device, scene);
        stats.light_slots += self.upload_extra_lights(device, scene.time_in_seconds());

        upload(
            device,
            u.ambient_intensity,
            UniformValue::Vec3(scene.ambient_light_intensity()),
        );
        upload(device, u.camera_pos, UniformValue::Vec3(camera.eye));

        for mesh in self.meshes.iter() {
            for &instance_id in scene.instances_by_mesh_id(mesh.mesh_id()) {
                let Some(instance) = scene.instance_by_id(instance_id) else {
                    tracing::warn!(%instance_id, "instance listed for {} not found", mesh.mesh_id());
                    stats.instances_skipped += 1;
                    continue;
                };
                let Some(material) = scene.material_by_id(instance.material_id) else {
                    tracing::warn!(%instance_id, "material {} not found", instance.material_id);
                    stats.instances_skipped += 1;
                    continue;
                };

                let model = Mat4::from(instance.transform);
                upload(
                    device,
                    u.projection_view_model,
                    UniformValue::Mat4(camera.view_projection * model),
                );
                upload(device, u.model, UniformValue::Mat4(model));

                self.bind_material(device, material);

                device.draw_indexed(
                    mesh.vertex_layout(),
                    mesh.index_count(),
                    IndexType::U32,
                    Topology::Triangles,
                );
                stats.draw_calls += 1;
            }
        }

        device.end_frame();
        stats
    }

    fn upload_scene_lights(&self, device: &mut D, scene: &dyn SceneProvider) -> usize {
        let lights = scene.lights();
        let count = lights.len().min(self.slots.scene_capacity());
        for (light, slot) in lights[..count].iter().zip(&self.uniforms.lights) {
            upload(device, slot.position, UniformValue::Vec3(light.position));
            upload(device, slot.intensity, UniformValue::Vec3(light.intensity));
            upload(device, slot.range, UniformValue::Float(light.range));
            if let Some(direction) = light.direction {
                upload(device, slot.direction, UniformValue::Vec3(direction));
            }
        }
        count
    }

    fn upload_extra_lights(&self, device: &mut D, time_seconds: f32) -> usize {
        for (k, light) in self.settings.extra_lights.iter().enumerate() {
            let slot = &self.uniforms.lights[self.slots.extra_slot(k)];
            upload(device, slot.position, UniformValue::Vec3(light.position));
            upload(device, slot.intensity, UniformValue::Vec3(light.intensity));
            if let Some(range) = light.range {
                upload(device, slot.range, UniformValue::Float(range));
            }
            upload(
                device,
                slot.direction,
                UniformValue::Vec3(light.direction_at(time_seconds)),
            );
        }
        self.settings.extra_lights.len()
    }

    fn bind_material(&self, device: &mut D, material: &Material) {
        let m = &self.uniforms.material;
        upload(device, m.ambient_colour, UniformValue::Vec3(material.ambient_colour));
        upload(device, m.diffuse_colour, UniformValue::Vec3(material.diffuse_colour));
        upload(device, m.specular_colour, UniformValue::Vec3(material.specular_colour));
        upload(device, m.shininess, UniformValue::Float(material.shininess));

        device.bind_texture(DIFFUSE_UNIT, None);
        device.bind_texture(SPECULAR_UNIT, None);

        let has_diffuse = self.bind_map(device, DIFFUSE_UNIT, &material.diffuse_texture);
        upload(device, m.has_diffuse, UniformValue::Float(flag(has_diffuse)));
        let has_specular = self.bind_map(device, SPECULAR_UNIT, &material.specular_texture);
        upload(device, m.has_specular, UniformValue::Float(flag(has_specular)));

        upload(device, m.diffuse_sampler, UniformValue::Int(DIFFUSE_UNIT.0 as i32));
        upload(device, m.specular_sampler, UniformValue::Int(SPECULAR_UNIT.0 as i32));
    }

    /// Bind the cached texture for `path` to `unit`. Returns whether one was bound.
    fn bind_map(&self, device: &mut D, unit: TextureUnit, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        match self.textures.get(path).and_then(|h| self.textures.texture(h)) {
            Some(texture) => {
                device.bind_texture(unit, Some(texture));
                true
            }
            None => false,
        }
    }
}

fn flag(value: bool) -> f32 {
    if value { 1.0 } else { 0.0 }
}

impl<D: RenderDevice> WindowView<D> for SceneRenderer<D> {
    fn view_will_start(
        &mut self,
        device: &mut D,
        scene: &dyn SceneProvider,
    ) -> Result<SetupStats, RenderError> {
        self.build_program(device);
        self.load_scene(device, scene)
    }

    fn view_render(&mut self, device: &mut D, scene: &dyn SceneProvider) -> FrameStats {
        self.render_frame(device, scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ShaderError;
    use crate::recording::{DeviceCommand, RecordingDevice};
    use crate::texture_cache::DecodedImage;
    use glam::{Affine3A, Vec2, Vec3};
    use vista_common::{InstanceId, MaterialId, MeshId};
    use vista_scene::{Camera, Instance, Light, Scene, SourceMesh};

    struct OneTexture(&'static str);

    impl ImageDecoder for OneTexture {
        fn decode(&self, path: &str) -> Option<DecodedImage> {
            (path == self.0).then(|| DecodedImage {
                width: 1,
                height: 1,
                components_per_pixel: 4,
                bytes_per_component: 1,
                pixels: vec![255; 4],
            })
        }
    }

    fn shader() -> ShaderSource {
        ShaderSource {
            vertex: "vertex".into(),
            fragment: "fragment".into(),
        }
    }

    fn triangle(id: u32) -> SourceMesh {
        SourceMesh {
            id: MeshId(id),
            positions: vec![Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::Y],
            normals: vec![Vec3::Z; 3],
            uvs: vec![Vec2::ZERO, Vec2::X, Vec2::Y],
            tangents: Vec::new(),
            indices: vec![0, 1, 2],
        }
    }

    fn instance(id: u32, mesh: u32, material: u32, transform: Affine3A) -> Instance {
        Instance {
            id: InstanceId(id),
            mesh_id: MeshId(mesh),
            material_id: MaterialId(material),
            transform,
        }
    }

    /// One triangle, one untextured material, one identity instance, no lights,
    /// camera at (0,0,5) looking at the origin.
    fn triangle_scene() -> Scene {
        let mut scene = Scene::new();
        scene.add_mesh(triangle(1)).unwrap();
        scene
            .add_material(Material::untextured(MaterialId(1), Vec3::new(0.5, 0.5, 0.5)))
            .unwrap();
        scene
            .add_instance(instance(1, 1, 1, Affine3A::IDENTITY))
            .unwrap();
        scene
            .set_camera(Camera {
                position: Vec3::new(0.0, 0.0, 5.0),
                direction: Vec3::NEG_Z,
                ..Camera::default()
            })
            .unwrap();
        scene
    }

    fn renderer(decoder: Box<dyn ImageDecoder>) -> SceneRenderer<RecordingDevice> {
        SceneRenderer::new(RendererSettings::default(), shader(), decoder).unwrap()
    }

    fn started(
        scene: &Scene,
        decoder: Box<dyn ImageDecoder>,
    ) -> (RecordingDevice, SceneRenderer<RecordingDevice>) {
        let mut device = RecordingDevice::default();
        let mut r = renderer(decoder);
        r.view_will_start(&mut device, scene).unwrap();
        device.take_commands();
        (device, r)
    }

    fn draws(commands: &[DeviceCommand]) -> Vec<(u32, u32)> {
        commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::DrawIndexed {
                    layout,
                    index_count,
                    ..
                } => Some((*layout, *index_count)),
                _ => None,
            })
            .collect()
    }

    fn light_slots_written(commands: &[DeviceCommand]) -> std::collections::BTreeSet<usize> {
        commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::SetUniform { name, .. } => name
                    .strip_prefix("Lights[")
                    .and_then(|rest| rest.split(']').next())
                    .and_then(|n| n.parse().ok()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn triangle_scene_end_to_end() {
        let scene = triangle_scene();
        let (mut device, r) = started(&scene, Box::new(OneTexture("none")));

        let stats = r.render_frame(&mut device, &scene);
        let commands = device.commands();

        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.light_slots, 2);
        let draws = draws(&commands);
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].1, 3);
        assert!(commands.iter().any(|c| matches!(
            c,
            DeviceCommand::DrawIndexed {
                index_type: IndexType::U32,
                topology: Topology::Triangles,
                ..
            }
        )));

        assert_eq!(
            device.last_uniform("model_xform"),
            Some(UniformValue::Mat4(Mat4::IDENTITY))
        );
        let camera = CameraMatrices::new(scene.camera(), device.viewport().aspect_ratio());
        assert_eq!(
            device.last_uniform("projection_view_model_xform"),
            Some(UniformValue::Mat4(camera.view_projection))
        );
        assert_eq!(
            light_slots_written(&commands),
            [22usize, 23].into_iter().collect()
        );
    }

    #[test]
    fn frame_protocol_order() {
        let scene = triangle_scene();
        let (mut device, r) = started(&scene, Box::new(OneTexture("none")));
        r.render_frame(&mut device, &scene);
        let commands = device.commands();

        assert!(matches!(commands.first(), Some(DeviceCommand::BeginFrame(_))));
        assert!(matches!(
            commands.get(1),
            Some(DeviceCommand::UseProgram { program: Some(_) })
        ));
        assert!(matches!(commands.last(), Some(DeviceCommand::EndFrame)));

        let pos = |name: &str| {
            commands
                .iter()
                .position(|c| matches!(c, DeviceCommand::SetUniform { name: n, .. } if n == name))
                .unwrap()
        };
        let draw = commands
            .iter()
            .position(|c| matches!(c, DeviceCommand::DrawIndexed { .. }))
            .unwrap();
        assert!(pos("view_xform") < pos("Lights[22].position"));
        assert!(pos("Lights[23].direction") < pos("cameraPos"));
        assert!(pos("cameraPos") < pos("projection_view_model_xform"));
        assert!(pos("mat.specular_sampler") < draw);
    }

    #[test]
    fn clear_state_is_dark_blue_with_depth_and_culling() {
        let scene = triangle_scene();
        let (mut device, r) = started(&scene, Box::new(OneTexture("none")));
        r.render_frame(&mut device, &scene);
        let Some(DeviceCommand::BeginFrame(state)) = device.commands().first().cloned() else {
            panic!("frame did not begin with BeginFrame");
        };
        assert_eq!(state.clear_colour, [0.0, 0.0, 0.25, 0.0]);
        assert!(state.depth_test);
        assert!(state.cull_back_faces);
    }

    #[test]
    fn scene_lights_fill_low_slots() {
        let mut scene = triangle_scene();
        let lights: Vec<Light> = (0..3)
            .map(|i| Light::point(Vec3::new(i as f32, 10.0, 0.0), Vec3::splat(0.5), 20.0 + i as f32))
            .collect();
        for light in &lights {
            scene.add_light(*light);
        }
        let (mut device, r) = started(&scene, Box::new(OneTexture("none")));

        let stats = r.render_frame(&mut device, &scene);
        assert_eq!(stats.light_slots, 5);
        assert_eq!(
            light_slots_written(&device.commands()),
            [0usize, 1, 2, 22, 23].into_iter().collect()
        );
        for (i, light) in lights.iter().enumerate() {
            assert_eq!(
                device.last_uniform(&format!("Lights[{i}].position")),
                Some(UniformValue::Vec3(light.position))
            );
            assert_eq!(
                device.last_uniform(&format!("Lights[{i}].intensity")),
                Some(UniformValue::Vec3(light.intensity))
            );
            assert_eq!(
                device.last_uniform(&format!("Lights[{i}].range")),
                Some(UniformValue::Float(light.range))
            );
        }
    }

    #[test]
    fn extra_lights_follow_scene_time() {
        let mut scene = triangle_scene();
        scene.advance(std::f32::consts::FRAC_PI_2);
        let (mut device, r) = started(&scene, Box::new(OneTexture("none")));
        r.render_frame(&mut device, &scene);

        let Some(UniformValue::Vec3(dir)) = device.last_uniform("Lights[22].direction") else {
            panic!("spot direction not uploaded");
        };
        assert!((dir.x - 45.0).abs() < 1e-3);
        assert_eq!(dir.y, -90.0);
        assert_eq!(
            device.last_uniform("Lights[22].range"),
            Some(UniformValue::Float(25.0))
        );
        assert_eq!(
            device.last_uniform("Lights[23].direction"),
            Some(UniformValue::Vec3(Vec3::new(0.0, -10.0, 75.0)))
        );
        assert_eq!(device.last_uniform("Lights[23].range"), None);
    }

    #[test]
    fn too_many_scene_lights_abort_setup() {
        let mut scene = triangle_scene();
        for _ in 0..23 {
            scene.add_light(Light::point(Vec3::ZERO, Vec3::ONE, 1.0));
        }
        let mut device = RecordingDevice::default();
        let mut r = renderer(Box::new(OneTexture("none")));
        let err = r.view_will_start(&mut device, &scene).unwrap_err();
        assert!(matches!(err, RenderError::LightCapacity { scene_lights: 23, .. }));
    }

    #[test]
    fn untextured_material_binds_nothing() {
        let scene = triangle_scene();
        let (mut device, r) = started(&scene, Box::new(OneTexture("none")));
        r.render_frame(&mut device, &scene);
        let commands = device.commands();

        let binds: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::BindTexture { unit, texture } => Some((*unit, *texture)),
                _ => None,
            })
            .collect();
        assert_eq!(binds, vec![(DIFFUSE_UNIT, None), (SPECULAR_UNIT, None)]);
        assert_eq!(
            device.last_uniform("mat.hasDiffuse"),
            Some(UniformValue::Float(0.0))
        );
        assert_eq!(
            device.last_uniform("mat.hasSpecular"),
            Some(UniformValue::Float(0.0))
        );
        assert_eq!(
            device.last_uniform("mat.diffuse_sampler"),
            Some(UniformValue::Int(0))
        );
        assert_eq!(
            device.last_uniform("mat.specular_sampler"),
            Some(UniformValue::Int(1))
        );
    }

    #[test]
    fn textured_material_binds_cached_texture() {
        let mut scene = Scene::new();
        scene.add_mesh(triangle(1)).unwrap();
        let mut material = Material::untextured(MaterialId(1), Vec3::ONE);
        material.diffuse_texture = "stone.png".into();
        material.specular_texture = "missing.png".into();
        scene.add_material(material).unwrap();
        scene
            .add_instance(instance(1, 1, 1, Affine3A::IDENTITY))
            .unwrap();

        let mut device = RecordingDevice::default();
        let mut r = renderer(Box::new(OneTexture("stone.png")));
        let setup = r.view_will_start(&mut device, &scene).unwrap();
        assert_eq!(setup.textures, 1);
        assert_eq!(setup.missing_textures, 1);
        device.take_commands();

        let handle = r.textures().get("stone.png").unwrap();
        let texture_id = r.textures().texture(handle).unwrap().id();

        r.render_frame(&mut device, &scene);
        let commands = device.commands();
        let binds: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::BindTexture { unit, texture } => Some((*unit, *texture)),
                _ => None,
            })
            .collect();
        assert_eq!(
            binds,
            vec![
                (DIFFUSE_UNIT, None),
                (SPECULAR_UNIT, None),
                (DIFFUSE_UNIT, Some(texture_id)),
            ]
        );
        assert_eq!(
            device.last_uniform("mat.hasDiffuse"),
            Some(UniformValue::Float(1.0))
        );
        assert_eq!(
            device.last_uniform("mat.hasSpecular"),
            Some(UniformValue::Float(0.0))
        );
    }

    #[test]
    fn shared_texture_paths_upload_once() {
        let mut scene = Scene::new();
        for id in 1..=3 {
            let mut material = Material::untextured(MaterialId(id), Vec3::ONE);
            material.diffuse_texture = "stone.png".into();
            material.specular_texture = "stone.png".into();
            scene.add_material(material).unwrap();
        }
        let mut device = RecordingDevice::default();
        let mut r = renderer(Box::new(OneTexture("stone.png")));
        let setup = r.view_will_start(&mut device, &scene).unwrap();
        assert_eq!(setup.textures, 1);
        let uploads = device
            .commands()
            .iter()
            .filter(|c| matches!(c, DeviceCommand::CreateTexture { .. }))
            .count();
        assert_eq!(uploads, 1);
    }

    #[test]
    fn one_draw_per_instance_in_mesh_build_order() {
        let mut scene = Scene::new();
        scene.add_mesh(triangle(7)).unwrap();
        let mut quad = triangle(3);
        quad.positions.push(Vec3::ONE);
        quad.normals.push(Vec3::Z);
        quad.uvs.push(Vec2::ONE);
        quad.indices.extend([2, 1, 3]);
        scene.add_mesh(quad).unwrap();
        scene
            .add_material(Material::untextured(MaterialId(1), Vec3::ONE))
            .unwrap();
        let shifted = Affine3A::from_translation(Vec3::new(2.0, 0.0, 0.0));
        scene.add_instance(instance(1, 3, 1, shifted)).unwrap();
        scene.add_instance(instance(2, 7, 1, Affine3A::IDENTITY)).unwrap();
        scene.add_instance(instance(3, 7, 1, shifted)).unwrap();

        let (mut device, r) = started(&scene, Box::new(OneTexture("none")));
        let stats = r.render_frame(&mut device, &scene);
        assert_eq!(stats.draw_calls, 3);

        let layout_7 = r.meshes().get(MeshId(7)).unwrap().vertex_layout().id();
        let layout_3 = r.meshes().get(MeshId(3)).unwrap().vertex_layout().id();
        assert_eq!(
            draws(&device.commands()),
            vec![(layout_7, 3), (layout_7, 3), (layout_3, 6)]
        );
        assert_eq!(
            device.last_uniform("model_xform"),
            Some(UniformValue::Mat4(Mat4::from(shifted)))
        );
    }

    #[test]
    fn shader_failure_is_not_fatal() {
        let scene = triangle_scene();
        let mut device = RecordingDevice::default().fail_shader_build(ShaderError::Link {
            log: "undefined symbol".into(),
        });
        let mut r = renderer(Box::new(OneTexture("none")));
        r.view_will_start(&mut device, &scene).unwrap();
        assert!(!r.has_program());
        device.take_commands();

        let stats = r.render_frame(&mut device, &scene);
        let commands = device.commands();
        assert_eq!(stats.draw_calls, 1);
        assert!(commands.contains(&DeviceCommand::UseProgram { program: None }));
        assert!(!commands
            .iter()
            .any(|c| matches!(c, DeviceCommand::SetUniform { .. })));
    }

    #[test]
    fn malformed_mesh_aborts_setup() {
        let mut scene = Scene::new();
        let mut broken = triangle(1);
        broken.normals.pop();
        scene.add_mesh(broken).unwrap();
        let mut device = RecordingDevice::default();
        let mut r = renderer(Box::new(OneTexture("none")));
        let err = r.view_will_start(&mut device, &scene).unwrap_err();
        assert!(matches!(err, RenderError::Mesh(_)));
    }

    #[test]
    fn aspect_ratio_comes_from_viewport() {
        let scene = triangle_scene();
        let (mut device, mut r) = started(&scene, Box::new(OneTexture("none")));
        r.view_did_reset(&mut device, Viewport::new(800, 800));
        r.view_render(&mut device, &scene);
        let expected = CameraMatrices::new(scene.camera(), 1.0).projection;
        assert_eq!(
            device.last_uniform("projection_xform"),
            Some(UniformValue::Mat4(expected))
        );
    }
}
