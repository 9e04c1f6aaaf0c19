//! Shared identifiers and value types used across the viewer crates.

mod types;

pub use types::{InstanceId, MaterialId, MeshId, Viewport};
