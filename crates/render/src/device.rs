use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use vista_common::Viewport;

/// What a buffer is used for once uploaded. Contents are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// One float vertex attribute inside an interleaved vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    /// Number of f32 components (2 or 3 here).
    pub components: u32,
    /// Byte offset from the start of the vertex.
    pub offset: u64,
}

/// Byte layout of one interleaved vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayoutDesc {
    pub stride: u64,
    pub attributes: &'static [VertexAttribute],
}

/// Binds a shader input name to an attribute location before linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeBinding {
    pub location: u32,
    pub name: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    pub fn size_bytes(self) -> usize {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Triangles,
}

/// Channel layout of uploaded pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    R,
    Rg,
    Rgb,
    Rgba,
}

impl Channels {
    pub fn from_count(count: u8) -> Option<Self> {
        match count {
            1 => Some(Channels::R),
            2 => Some(Channels::Rg),
            3 => Some(Channels::Rgb),
            4 => Some(Channels::Rgba),
            _ => None,
        }
    }

    pub fn count(self) -> usize {
        match self {
            Channels::R => 1,
            Channels::Rg => 2,
            Channels::Rgb => 3,
            Channels::Rgba => 4,
        }
    }
}

/// Width of one colour component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    U8,
    U16,
}

impl ComponentType {
    pub fn from_bytes(bytes: u8) -> Option<Self> {
        match bytes {
            1 => Some(ComponentType::U8),
            2 => Some(ComponentType::U16),
            _ => None,
        }
    }

    pub fn size_bytes(self) -> usize {
        match self {
            ComponentType::U8 => 1,
            ComponentType::U16 => 2,
        }
    }
}

/// Source pixel format of a texture upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub channels: Channels,
    pub component: ComponentType,
}

impl PixelFormat {
    /// Pick the format from decoded channel count and component width.
    pub fn from_layout(components_per_pixel: u8, bytes_per_component: u8) -> Option<Self> {
        Some(Self {
            channels: Channels::from_count(components_per_pixel)?,
            component: ComponentType::from_bytes(bytes_per_component)?,
        })
    }

    pub fn bytes_per_pixel(self) -> usize {
        self.channels.count() * self.component.size_bytes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrap {
    Repeat,
    ClampToEdge,
}

/// Sampling state attached to a texture at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerDesc {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    /// Filter between mip levels; `None` disables mipmapped minification.
    pub mipmap_filter: Option<Filter>,
    pub wrap_u: Wrap,
    pub wrap_v: Wrap,
}

impl SamplerDesc {
    /// Linear magnification, linear-mipmap-linear minification, repeat on both axes.
    pub const TRILINEAR_REPEAT: SamplerDesc = SamplerDesc {
        mag_filter: Filter::Linear,
        min_filter: Filter::Linear,
        mipmap_filter: Some(Filter::Linear),
        wrap_u: Wrap::Repeat,
        wrap_v: Wrap::Repeat,
    };
}

/// Pixel data handed to the device for a 2D texture upload.
#[derive(Debug, Clone, Copy)]
pub struct TextureUpload<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: &'a [u8],
}

/// Shader program source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub vertex: String,
    pub fragment: String,
}

/// Everything a device needs to build the scene program.
#[derive(Debug, Clone, Copy)]
pub struct ProgramDesc<'a> {
    pub source: &'a ShaderSource,
    pub attributes: &'a [AttributeBinding],
    /// Size of the shader-side light array.
    pub light_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Shader build failure carrying the compiler or linker info log.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ShaderError {
    #[error("{stage:?} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("program failed to link:\n{log}")]
    Link { log: String },
}

/// Opaque uniform slot resolved once after linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Mat4(Mat4),
    Vec3(Vec3),
    Float(f32),
    Int(i32),
}

/// Texture unit index a sampler reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureUnit(pub u32);

/// Fixed-function state applied at the start of each frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameState {
    pub clear_colour: [f32; 4],
    pub depth_test: bool,
    pub cull_back_faces: bool,
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            clear_colour: [0.0, 0.0, 0.25, 0.0],
            depth_test: true,
            cull_back_faces: true,
        }
    }
}

/// GPU command surface the viewer renders through.
///
/// Resource types are owned values: dropping one releases its GPU state.
/// All calls happen on the single thread that owns the context.
pub trait RenderDevice {
    type Buffer;
    type VertexLayout;
    type Texture;
    type Program;

    /// Create an immutable buffer initialised with `contents`.
    fn create_buffer(&mut self, kind: BufferKind, label: &str, contents: &[u8]) -> Self::Buffer;

    /// Bind an index buffer and an interleaved vertex buffer under one layout object.
    fn create_vertex_layout(
        &mut self,
        vertices: &Self::Buffer,
        indices: &Self::Buffer,
        layout: &VertexLayoutDesc,
    ) -> Self::VertexLayout;

    /// Upload a 2D texture with the given sampling state. Only level 0 is filled.
    fn create_texture(&mut self, upload: &TextureUpload<'_>, sampler: &SamplerDesc) -> Self::Texture;

    /// Fill the mip chain of `texture` from level 0.
    fn generate_mipmaps(&mut self, texture: &Self::Texture);

    /// Compile and link the scene program.
    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<Self::Program, ShaderError>;

    /// Look up a uniform by name. `None` when the program has no such active uniform.
    fn uniform_location(&self, program: &Self::Program, name: &str) -> Option<UniformLocation>;

    fn viewport(&self) -> Viewport;

    fn set_viewport(&mut self, viewport: Viewport);

    /// Apply depth/cull state and clear colour and depth.
    fn begin_frame(&mut self, state: &FrameState);

    /// Make `program` current. `None` leaves no usable program bound.
    fn use_program(&mut self, program: Option<&Self::Program>);

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);

    /// Bind `texture` to `unit`, or unbind the unit with `None`.
    fn bind_texture(&mut self, unit: TextureUnit, texture: Option<&Self::Texture>);

    fn draw_indexed(
        &mut self,
        layout: &Self::VertexLayout,
        index_count: u32,
        index_type: IndexType,
        topology: Topology,
    );

    /// Flush the frame's commands.
    fn end_frame(&mut self);
}
