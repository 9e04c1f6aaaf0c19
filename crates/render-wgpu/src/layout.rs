//! Byte layout of the scene shader's uniform blocks.
//!
//! The scene program reads per-frame state from one uniform block and
//! per-draw state from a second, dynamically offset block. Named uniforms map
//! to a block and a byte offset inside it; offsets follow WGSL uniform layout
//! rules for the structs declared in [`crate::shaders::SCENE_PRELUDE`].

use std::collections::HashMap;
use vista_render::uniforms::{self, light_field};
use vista_render::{ComponentType, PixelFormat, UniformLocation, UniformValue, VertexLayoutDesc};

/// Size of one `Light` element.
pub const LIGHT_STRIDE: u32 = 48;
/// Offset of `lights[0]` in the frame block.
pub const LIGHTS_OFFSET: u32 = 160;
/// Size of the per-draw block as declared in WGSL.
pub const DRAW_BLOCK_SIZE: u32 = 192;

pub fn frame_block_size(light_capacity: usize) -> u32 {
    LIGHTS_OFFSET + LIGHT_STRIDE * light_capacity.max(1) as u32
}

/// Round `size` up to a multiple of `alignment`.
pub fn align_to(size: u32, alignment: u32) -> u32 {
    let alignment = alignment.max(1);
    size.div_ceil(alignment) * alignment
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    Frame,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Mat4,
    Vec3,
    Float,
    Int,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    pub block: Block,
    pub offset: u32,
    pub kind: SlotKind,
}

/// Name to slot table for one linked scene program.
#[derive(Debug, Clone, Default)]
pub struct UniformReflection {
    slots: Vec<UniformSlot>,
    by_name: HashMap<String, UniformLocation>,
}

impl UniformReflection {
    pub fn scene(light_capacity: usize) -> Self {
        let mut table = Self::default();
        use Block::{Draw, Frame};
        use SlotKind::*;

        table.insert(uniforms::VIEW_XFORM, Frame, 0, Mat4);
        table.insert(uniforms::PROJECTION_XFORM, Frame, 64, Mat4);
        table.insert(uniforms::AMBIENT_INTENSITY, Frame, 128, Vec3);
        table.insert(uniforms::CAMERA_POS, Frame, 144, Vec3);
        for i in 0..light_capacity {
            let base = LIGHTS_OFFSET + LIGHT_STRIDE * i as u32;
            table.insert(&light_field(i, "position"), Frame, base, Vec3);
            table.insert(&light_field(i, "range"), Frame, base + 12, Float);
            table.insert(&light_field(i, "intensity"), Frame, base + 16, Vec3);
            table.insert(&light_field(i, "direction"), Frame, base + 32, Vec3);
        }

        table.insert(uniforms::PROJECTION_VIEW_MODEL_XFORM, Draw, 0, Mat4);
        table.insert(uniforms::MODEL_XFORM, Draw, 64, Mat4);
        table.insert(uniforms::MAT_AMBIENT, Draw, 128, Vec3);
        table.insert(uniforms::MAT_SHININESS, Draw, 140, Float);
        table.insert(uniforms::MAT_DIFFUSE, Draw, 144, Vec3);
        table.insert(uniforms::MAT_HAS_DIFFUSE, Draw, 156, Float);
        table.insert(uniforms::MAT_SPECULAR, Draw, 160, Vec3);
        table.insert(uniforms::MAT_HAS_SPECULAR, Draw, 172, Float);
        table.insert(uniforms::MAT_DIFFUSE_SAMPLER, Draw, 176, Int);
        table.insert(uniforms::MAT_SPECULAR_SAMPLER, Draw, 180, Int);
        table
    }

    fn insert(&mut self, name: &str, block: Block, offset: u32, kind: SlotKind) {
        let location = UniformLocation(self.slots.len() as u32);
        self.slots.push(UniformSlot {
            block,
            offset,
            kind,
        });
        self.by_name.insert(name.to_string(), location);
    }

    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        self.by_name.get(name).copied()
    }

    pub fn slot(&self, location: UniformLocation) -> Option<UniformSlot> {
        self.slots.get(location.0 as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Write `value` into `block` at the slot's offset.
///
/// Returns false and leaves `block` untouched when the value kind does not
/// match the slot or the slot lies outside the block.
pub fn write_slot(block: &mut [u8], slot: UniformSlot, value: UniformValue) -> bool {
    let start = slot.offset as usize;
    let write = |block: &mut [u8], bytes: &[u8]| match block.get_mut(start..start + bytes.len()) {
        Some(dst) => {
            dst.copy_from_slice(bytes);
            true
        }
        None => false,
    };
    match (slot.kind, value) {
        (SlotKind::Mat4, UniformValue::Mat4(m)) => write(block, bytemuck::cast_slice(&m.to_cols_array())),
        (SlotKind::Vec3, UniformValue::Vec3(v)) => write(block, bytemuck::cast_slice(&v.to_array())),
        (SlotKind::Float, UniformValue::Float(f)) => write(block, bytemuck::bytes_of(&f)),
        (SlotKind::Int, UniformValue::Int(i)) => write(block, bytemuck::bytes_of(&i)),
        _ => false,
    }
}

/// Vertex attributes for the pipeline, restricted to the bound locations.
pub fn vertex_attributes(layout: &VertexLayoutDesc, bound: &[u32]) -> Vec<wgpu::VertexAttribute> {
    layout
        .attributes
        .iter()
        .filter(|a| bound.contains(&a.location))
        .filter_map(|a| {
            let format = match a.components {
                1 => wgpu::VertexFormat::Float32,
                2 => wgpu::VertexFormat::Float32x2,
                3 => wgpu::VertexFormat::Float32x3,
                4 => wgpu::VertexFormat::Float32x4,
                _ => return None,
            };
            Some(wgpu::VertexAttribute {
                format,
                offset: a.offset,
                shader_location: a.location,
            })
        })
        .collect()
}

/// Expand pixels of any supported layout to tightly packed RGBA8.
///
/// Single-channel data lands in red, two-channel in red and green, with the
/// remaining colour channels zero and alpha one. 16-bit components keep
/// their high byte.
pub fn expand_to_rgba8(format: PixelFormat, pixels: &[u8]) -> Vec<u8> {
    let channels = format.channels.count();
    let component_bytes = format.component.size_bytes();
    let component = |c: &[u8]| -> u8 {
        match format.component {
            ComponentType::U8 => c[0],
            ComponentType::U16 => (u16::from_ne_bytes([c[0], c[1]]) >> 8) as u8,
        }
    };

    let mut out = Vec::with_capacity(pixels.len() / (channels * component_bytes) * 4);
    for pixel in pixels.chunks_exact(channels * component_bytes) {
        let mut rgba = [0, 0, 0, 255];
        for (i, c) in pixel.chunks_exact(component_bytes).enumerate() {
            rgba[i] = component(c);
        }
        out.extend_from_slice(&rgba);
    }
    out
}

/// Number of mip levels in a full chain down to 1x1.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};
    use vista_render::Vertex;

    #[test]
    fn light_fields_follow_wgsl_layout() {
        let table = UniformReflection::scene(24);
        let slot = |name: &str| table.slot(table.location(name).unwrap()).unwrap();
        assert_eq!(slot("Lights[0].position").offset, 160);
        assert_eq!(slot("Lights[0].range").offset, 172);
        assert_eq!(slot("Lights[0].intensity").offset, 176);
        assert_eq!(slot("Lights[0].direction").offset, 192);
        assert_eq!(slot("Lights[23].position").offset, 160 + 23 * 48);
        assert!(table.location("Lights[24].position").is_none());
        assert_eq!(frame_block_size(24), 160 + 24 * 48);
    }

    #[test]
    fn every_renderer_uniform_has_a_slot() {
        let table = UniformReflection::scene(2);
        assert_eq!(table.len(), 14 + 2 * 4);
        for name in [
            uniforms::MAT_HAS_DIFFUSE,
            uniforms::MAT_SPECULAR_SAMPLER,
            uniforms::CAMERA_POS,
        ] {
            assert!(table.location(name).is_some(), "{name}");
        }
        let sampler = table
            .slot(table.location(uniforms::MAT_SPECULAR_SAMPLER).unwrap())
            .unwrap();
        assert!(sampler.offset + 4 <= DRAW_BLOCK_SIZE);
    }

    #[test]
    fn write_slot_checks_kind_and_bounds() {
        let mut block = vec![0u8; 16];
        let vec_slot = UniformSlot {
            block: Block::Frame,
            offset: 4,
            kind: SlotKind::Vec3,
        };
        assert!(write_slot(&mut block, vec_slot, UniformValue::Vec3(Vec3::new(1.0, 2.0, 3.0))));
        let floats: &[f32] = bytemuck::cast_slice(&block);
        assert_eq!(floats, &[0.0, 1.0, 2.0, 3.0]);

        assert!(!write_slot(&mut block, vec_slot, UniformValue::Float(9.0)));
        let mat_slot = UniformSlot {
            block: Block::Draw,
            offset: 0,
            kind: SlotKind::Mat4,
        };
        assert!(!write_slot(&mut block, mat_slot, UniformValue::Mat4(Mat4::IDENTITY)));
    }

    #[test]
    fn scene_vertex_attributes_keep_location_gap() {
        let attrs = vertex_attributes(&Vertex::LAYOUT, &[0, 1, 3]);
        let locations: Vec<u32> = attrs.iter().map(|a| a.shader_location).collect();
        assert_eq!(locations, vec![0, 1, 3]);
        assert_eq!(attrs[2].format, wgpu::VertexFormat::Float32x2);
        assert_eq!(attrs[2].offset, 24);

        let only_position = vertex_attributes(&Vertex::LAYOUT, &[0]);
        assert_eq!(only_position.len(), 1);
    }

    #[test]
    fn single_channel_lands_in_red() {
        let format = PixelFormat::from_layout(1, 1).unwrap();
        assert_eq!(expand_to_rgba8(format, &[10, 20]), vec![10, 0, 0, 255, 20, 0, 0, 255]);
    }

    #[test]
    fn sixteen_bit_keeps_high_byte() {
        let format = PixelFormat::from_layout(3, 2).unwrap();
        let samples: [u16; 3] = [0xff00, 0x8000, 0x00ff];
        let rgba = expand_to_rgba8(format, bytemuck::cast_slice(&samples));
        assert_eq!(rgba, vec![0xff, 0x80, 0x00, 255]);
    }

    #[test]
    fn mip_chain_length() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(256, 64), 9);
        assert_eq!(mip_level_count(300, 2), 9);
    }

    #[test]
    fn dynamic_stride_is_aligned() {
        assert_eq!(align_to(DRAW_BLOCK_SIZE, 256), 256);
        assert_eq!(align_to(DRAW_BLOCK_SIZE, 64), 192);
    }

    #[test]
    fn largest_light_array_fits_a_uniform_binding() {
        let limit = wgpu::Limits::default().max_uniform_buffer_binding_size;
        assert!(frame_block_size(vista_render::MAX_LIGHT_ARRAY) <= limit);
    }
}
