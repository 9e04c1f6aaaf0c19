//! Input: window events mapped onto the scene camera.
//!
//! # Invariants
//! - The camera controller is the only writer of camera state.
//! - Input handlers only record intent; the camera moves in `tick`.

mod controller;
mod events;

pub use controller::{CameraController, ControllerSettings};
pub use events::{GamepadAxis, GamepadButton, Key, MouseButton, WindowControl};
