use vista_scene::Camera;

/// Keys the viewer reacts to. Anything else maps to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    A,
    D,
    W,
    S,
    Left,
    Right,
    Up,
    Down,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other,
}

/// Analog gamepad axes, each reported in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamepadAxis {
    LeftStickX,
    LeftStickY,
    RightStickX,
    RightStickY,
    LeftTrigger,
    RightTrigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamepadButton {
    A,
    B,
    X,
    Y,
    Start,
    Back,
    Other,
}

/// Window control delegate. One method per event kind; all default to no-ops
/// so implementors only override what they handle.
pub trait WindowControl {
    fn will_start(&mut self) {}

    fn did_stop(&mut self) {}

    /// Called once per frame before the view renders.
    fn view_will_render(&mut self, _camera: &mut Camera, _dt_seconds: f32) {}

    /// Cursor position in window pixels.
    fn mouse_moved(&mut self, _x: f64, _y: f64) {}

    fn mouse_button_changed(&mut self, _button: MouseButton, _down: bool) {}

    /// Wheel movement in notches; positive is away from the user.
    fn mouse_wheel_moved(&mut self, _notches: f32) {}

    fn keyboard_changed(&mut self, _key: Key, _down: bool) {}

    fn gamepad_axis_moved(&mut self, _gamepad: u32, _axis: GamepadAxis, _pos: f32) {}

    fn gamepad_button_changed(&mut self, _gamepad: u32, _button: GamepadButton, _down: bool) {}
}
