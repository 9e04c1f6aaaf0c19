use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::device::{AttributeBinding, VertexAttribute, VertexLayoutDesc};
use crate::MeshError;

/// Attribute location of `vertex_position`.
pub const ATTRIB_POSITION: u32 = 0;
/// Attribute location of `vertex_normal`.
pub const ATTRIB_NORMAL: u32 = 1;
/// Attribute location of `vertex_uv`. Location 2 is left unused.
pub const ATTRIB_UV: u32 = 3;

/// Interleaved vertex as stored in a mesh's single vertex buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

const ATTRIBUTES: [VertexAttribute; 3] = [
    VertexAttribute {
        location: ATTRIB_POSITION,
        components: 3,
        offset: 0,
    },
    VertexAttribute {
        location: ATTRIB_NORMAL,
        components: 3,
        offset: std::mem::size_of::<[f32; 3]>() as u64,
    },
    VertexAttribute {
        location: ATTRIB_UV,
        components: 2,
        offset: std::mem::size_of::<[f32; 6]>() as u64,
    },
];

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.into(),
            normal: normal.into(),
            uv: uv.into(),
        }
    }

    /// Layout of the interleaved buffer: position, normal, uv.
    pub const LAYOUT: VertexLayoutDesc = VertexLayoutDesc {
        stride: std::mem::size_of::<Vertex>() as u64,
        attributes: &ATTRIBUTES,
    };

    /// Shader input names bound before the program is linked.
    pub const ATTRIBUTE_BINDINGS: [AttributeBinding; 3] = [
        AttributeBinding {
            location: ATTRIB_POSITION,
            name: "vertex_position",
        },
        AttributeBinding {
            location: ATTRIB_NORMAL,
            name: "vertex_normal",
        },
        AttributeBinding {
            location: ATTRIB_UV,
            name: "vertex_uv",
        },
    ];
}

/// Zip parallel attribute arrays into interleaved vertices, index for index.
///
/// Fails when the arrays disagree in length; that is a malformed source mesh.
pub fn interleave(
    positions: &[Vec3],
    normals: &[Vec3],
    uvs: &[Vec2],
) -> Result<Vec<Vertex>, MeshError> {
    if normals.len() != positions.len() || uvs.len() != positions.len() {
        return Err(MeshError::AttributeLengthMismatch {
            positions: positions.len(),
            normals: normals.len(),
            uvs: uvs.len(),
        });
    }

    Ok(positions
        .iter()
        .zip(normals)
        .zip(uvs)
        .map(|((&p, &n), &uv)| Vertex::new(p, n, uv))
        .collect())
}
