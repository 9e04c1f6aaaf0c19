//! wgpu backend for the scene renderer.
//!
//! Emulates named per-draw uniforms on top of wgpu: a frame uniform block,
//! a dynamically offset draw block, and a texture bind group per bound
//! texture pair.
//!
//! # Invariants
//! - The device never reorders draws within a frame.
//! - Frame and draw uniform byte offsets match the WGSL structs in `shaders`.

mod device;
mod layout;
mod mipmap;
mod shaders;

pub use device::{
    WgpuBuffer, WgpuDevice, WgpuProgram, WgpuTexture, WgpuVertexLayout, DEFAULT_DRAW_CAPACITY,
};
pub use shaders::{SCENE_FRAGMENT, SCENE_PRELUDE, SCENE_VERTEX};

use vista_render::ShaderSource;

/// Built-in scene program. The device prepends [`SCENE_PRELUDE`] to each stage.
pub fn scene_shader() -> ShaderSource {
    ShaderSource {
        vertex: SCENE_VERTEX.to_string(),
        fragment: SCENE_FRAGMENT.to_string(),
    }
}
