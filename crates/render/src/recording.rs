//! In-memory device that records every command instead of talking to a GPU.
//!
//! Used by the headless CLI and by tests that assert the per-frame protocol.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use vista_common::Viewport;

use crate::device::{
    BufferKind, FrameState, IndexType, PixelFormat, ProgramDesc, RenderDevice, SamplerDesc,
    ShaderError, ShaderStage, TextureUnit, Topology, TextureUpload, UniformLocation,
    UniformValue, VertexLayoutDesc,
};

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    CreateBuffer {
        id: u32,
        kind: BufferKind,
        label: String,
        size: usize,
    },
    CreateVertexLayout {
        id: u32,
        vertex_buffer: u32,
        index_buffer: u32,
        stride: u64,
        locations: Vec<u32>,
    },
    CreateTexture {
        id: u32,
        width: u32,
        height: u32,
        format: PixelFormat,
        sampler: SamplerDesc,
    },
    GenerateMipmaps {
        texture: u32,
    },
    CreateProgram {
        id: u32,
        attributes: Vec<(u32, String)>,
        light_capacity: usize,
    },
    SetViewport(Viewport),
    BeginFrame(FrameState),
    UseProgram {
        program: Option<u32>,
    },
    SetUniform {
        name: String,
        value: UniformValue,
    },
    BindTexture {
        unit: TextureUnit,
        texture: Option<u32>,
    },
    DrawIndexed {
        layout: u32,
        index_count: u32,
        index_type: IndexType,
        topology: Topology,
    },
    EndFrame,
    Release {
        id: u32,
    },
}

#[derive(Debug, Default)]
struct Journal {
    commands: Vec<DeviceCommand>,
    released: BTreeSet<u32>,
}

type SharedJournal = Rc<RefCell<Journal>>;

/// Handle for a recorded resource. Dropping it records a release.
#[derive(Debug)]
pub struct Recorded {
    id: u32,
    journal: SharedJournal,
}

impl Recorded {
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl Drop for Recorded {
    fn drop(&mut self) {
        let mut journal = self.journal.borrow_mut();
        journal.released.insert(self.id);
        journal.commands.push(DeviceCommand::Release { id: self.id });
    }
}

/// Recorded buffer; keeps a copy of its contents for inspection.
#[derive(Debug)]
pub struct RecordedBuffer {
    pub handle: Recorded,
    pub kind: BufferKind,
    pub contents: Vec<u8>,
}

#[derive(Debug)]
pub struct RecordedProgram {
    pub handle: Recorded,
}

/// Device that appends each call to a command journal.
#[derive(Debug)]
pub struct RecordingDevice {
    journal: SharedJournal,
    next_id: u32,
    viewport: Viewport,
    uniform_names: RefCell<Vec<String>>,
    inactive_uniforms: BTreeSet<String>,
    shader_failure: Option<ShaderError>,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new(Viewport::default())
    }
}

impl RecordingDevice {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            journal: SharedJournal::default(),
            next_id: 1,
            viewport,
            uniform_names: RefCell::new(Vec::new()),
            inactive_uniforms: BTreeSet::new(),
            shader_failure: None,
        }
    }

    /// Make `create_program` fail with the given error.
    pub fn fail_shader_build(mut self, error: ShaderError) -> Self {
        self.shader_failure = Some(error);
        self
    }

    /// Treat `name` as optimised out of the program: lookups return `None`.
    pub fn deactivate_uniform(mut self, name: impl Into<String>) -> Self {
        self.inactive_uniforms.insert(name.into());
        self
    }

    /// Copy of every command recorded so far.
    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.journal.borrow().commands.clone()
    }

    /// Remove and return every command recorded so far.
    pub fn take_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.journal.borrow_mut().commands)
    }

    pub fn is_released(&self, id: u32) -> bool {
        self.journal.borrow().released.contains(&id)
    }

    /// Last value uploaded to the named uniform, if any.
    pub fn last_uniform(&self, name: &str) -> Option<UniformValue> {
        self.journal
            .borrow()
            .commands
            .iter()
            .rev()
            .find_map(|c| match c {
                DeviceCommand::SetUniform { name: n, value } if n == name => Some(*value),
                _ => None,
            })
    }

    fn allocate(&mut self) -> Recorded {
        let id = self.next_id;
        self.next_id += 1;
        Recorded {
            id,
            journal: Rc::clone(&self.journal),
        }
    }

    fn record(&self, command: DeviceCommand) {
        self.journal.borrow_mut().commands.push(command);
    }
}

impl RenderDevice for RecordingDevice {
    type Buffer = RecordedBuffer;
    type VertexLayout = Recorded;
    type Texture = Recorded;
    type Program = RecordedProgram;

    fn create_buffer(&mut self, kind: BufferKind, label: &str, contents: &[u8]) -> RecordedBuffer {
        let handle = self.allocate();
        self.record(DeviceCommand::CreateBuffer {
            id: handle.id,
            kind,
            label: label.to_string(),
            size: contents.len(),
        });
        RecordedBuffer {
            handle,
            kind,
            contents: contents.to_vec(),
        }
    }

    fn create_vertex_layout(
        &mut self,
        vertices: &RecordedBuffer,
        indices: &RecordedBuffer,
        layout: &VertexLayoutDesc,
    ) -> Recorded {
        let handle = self.allocate();
        self.record(DeviceCommand::CreateVertexLayout {
            id: handle.id,
            vertex_buffer: vertices.handle.id,
            index_buffer: indices.handle.id,
            stride: layout.stride,
            locations: layout.attributes.iter().map(|a| a.location).collect(),
        });
        handle
    }

    fn create_texture(&mut self, upload: &TextureUpload<'_>, sampler: &SamplerDesc) -> Recorded {
        let handle = self.allocate();
        self.record(DeviceCommand::CreateTexture {
            id: handle.id,
            width: upload.width,
            height: upload.height,
            format: upload.format,
            sampler: *sampler,
        });
        handle
    }

    fn generate_mipmaps(&mut self, texture: &Recorded) {
        self.record(DeviceCommand::GenerateMipmaps {
            texture: texture.id,
        });
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<RecordedProgram, ShaderError> {
        if let Some(err) = &self.shader_failure {
            return Err(err.clone());
        }
        if desc.source.vertex.trim().is_empty() {
            return Err(ShaderError::Compile {
                stage: ShaderStage::Vertex,
                log: "empty vertex shader source".into(),
            });
        }
        if desc.source.fragment.trim().is_empty() {
            return Err(ShaderError::Compile {
                stage: ShaderStage::Fragment,
                log: "empty fragment shader source".into(),
            });
        }
        let handle = self.allocate();
        self.record(DeviceCommand::CreateProgram {
            id: handle.id,
            attributes: desc
                .attributes
                .iter()
                .map(|a| (a.location, a.name.to_string()))
                .collect(),
            light_capacity: desc.light_capacity,
        });
        Ok(RecordedProgram { handle })
    }

    fn uniform_location(&self, _program: &RecordedProgram, name: &str) -> Option<UniformLocation> {
        if self.inactive_uniforms.contains(name) {
            return None;
        }
        let mut names = self.uniform_names.borrow_mut();
        let index = match names.iter().position(|n| n == name) {
            Some(i) => i,
            None => {
                names.push(name.to_string());
                names.len() - 1
            }
        };
        Some(UniformLocation(index as u32))
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.record(DeviceCommand::SetViewport(viewport));
    }

    fn begin_frame(&mut self, state: &FrameState) {
        self.record(DeviceCommand::BeginFrame(*state));
    }

    fn use_program(&mut self, program: Option<&RecordedProgram>) {
        self.record(DeviceCommand::UseProgram {
            program: program.map(|p| p.handle.id),
        });
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let name = self
            .uniform_names
            .borrow()
            .get(location.0 as usize)
            .cloned()
            .unwrap_or_else(|| format!("<location {}>", location.0));
        self.record(DeviceCommand::SetUniform { name, value });
    }

    fn bind_texture(&mut self, unit: TextureUnit, texture: Option<&Recorded>) {
        self.record(DeviceCommand::BindTexture {
            unit,
            texture: texture.map(|t| t.id),
        });
    }

    fn draw_indexed(
        &mut self,
        layout: &Recorded,
        index_count: u32,
        index_type: IndexType,
        topology: Topology,
    ) {
        self.record(DeviceCommand::DrawIndexed {
            layout: layout.id,
            index_count,
            index_type,
            topology,
        });
    }

    fn end_frame(&mut self) {
        self.record(DeviceCommand::EndFrame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_a_resource_records_release() {
        let mut device = RecordingDevice::default();
        let buffer = device.create_buffer(BufferKind::Vertex, "vb", &[0u8; 16]);
        let id = buffer.handle.id();
        assert!(!device.is_released(id));
        drop(buffer);
        assert!(device.is_released(id));
        assert_eq!(
            device.commands().last(),
            Some(&DeviceCommand::Release { id })
        );
    }

    #[test]
    fn uniform_locations_are_stable_per_name() {
        let mut device = RecordingDevice::default();
        let source = crate::device::ShaderSource {
            vertex: "vs".into(),
            fragment: "fs".into(),
        };
        let program = device
            .create_program(&ProgramDesc {
                source: &source,
                attributes: &[],
                light_capacity: 4,
            })
            .unwrap();
        let a = device.uniform_location(&program, "view_xform");
        let b = device.uniform_location(&program, "view_xform");
        let c = device.uniform_location(&program, "model_xform");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn deactivated_uniform_has_no_location() {
        let mut device = RecordingDevice::default().deactivate_uniform("cameraPos");
        let source = crate::device::ShaderSource {
            vertex: "vs".into(),
            fragment: "fs".into(),
        };
        let program = device
            .create_program(&ProgramDesc {
                source: &source,
                attributes: &[],
                light_capacity: 4,
            })
            .unwrap();
        assert!(device.uniform_location(&program, "cameraPos").is_none());
    }

    #[test]
    fn empty_shader_source_fails_to_compile() {
        let mut device = RecordingDevice::default();
        let source = crate::device::ShaderSource {
            vertex: "vs".into(),
            fragment: "   ".into(),
        };
        let err = device
            .create_program(&ProgramDesc {
                source: &source,
                attributes: &[],
                light_capacity: 4,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Compile {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
    }
}
