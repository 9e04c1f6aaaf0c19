use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use vista_scene::Camera;

use crate::events::{GamepadAxis, GamepadButton, Key, MouseButton, WindowControl};

const LEFT: usize = 0;
const RIGHT: usize = 1;
const FORWARD: usize = 2;
const BACKWARD: usize = 3;

const YAW: usize = 0;
const PITCH: usize = 1;

const MIN_KEY_SPEED: f32 = 1.0;
const MAX_KEY_SPEED: f32 = 1000.0;
const WHEEL_STEP: f32 = 1.1;

/// Camera controller tuning. Missing YAML fields take defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Translation speed in units per second at full input.
    pub key_speed: f32,
    /// Stick deflection below which input is ignored.
    pub dead_zone: f32,
    /// Radians per second per pixel of mouse movement in turn mode.
    pub mouse_sensitivity: f32,
    /// Radians per second at full right stick deflection.
    pub stick_rotate_speed: f32,
    /// Pitch limit either side of the horizon, in degrees.
    pub max_pitch_degrees: f32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            key_speed: 100.0,
            dead_zone: 0.2,
            mouse_sensitivity: 0.05,
            stick_rotate_speed: 3.0,
            max_pitch_degrees: 89.0,
        }
    }
}

/// Fly-through controller. Input handlers set speeds; `tick` applies them.
#[derive(Debug, Clone)]
pub struct CameraController {
    settings: ControllerSettings,
    move_speed: [f32; 4],
    rotate_speed: [f32; 2],
    mouse_rotate_speed: [f32; 2],
    turn_mode: bool,
    last_cursor: Option<(f64, f64)>,
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(ControllerSettings::default())
    }
}

impl CameraController {
    pub fn new(settings: ControllerSettings) -> Self {
        Self {
            settings,
            move_speed: [0.0; 4],
            rotate_speed: [0.0; 2],
            mouse_rotate_speed: [0.0; 2],
            turn_mode: false,
            last_cursor: None,
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn key_speed(&self) -> f32 {
        self.settings.key_speed
    }

    pub fn turn_mode(&self) -> bool {
        self.turn_mode
    }

    /// Movement components: left, right, forward, backward.
    pub fn move_speed(&self) -> [f32; 4] {
        self.move_speed
    }

    /// Stick rotation rates: yaw, pitch.
    pub fn rotate_speed(&self) -> [f32; 2] {
        self.rotate_speed
    }

    fn set_turn_mode(&mut self, on: bool) {
        if self.turn_mode != on {
            tracing::debug!(turn_mode = on, "camera turn mode changed");
        }
        self.turn_mode = on;
        self.last_cursor = None;
        if !on {
            self.mouse_rotate_speed = [0.0; 2];
        }
    }

    /// Split a stick axis into a negative and a positive component.
    fn split_axis(&self, pos: f32) -> (f32, f32) {
        if pos < -self.settings.dead_zone {
            (-pos, 0.0)
        } else if pos > self.settings.dead_zone {
            (0.0, pos)
        } else {
            (0.0, 0.0)
        }
    }

    fn stick_rate(&self, pos: f32) -> f32 {
        if pos.abs() > self.settings.dead_zone {
            -pos * self.settings.stick_rotate_speed
        } else {
            0.0
        }
    }

    /// Advance the camera by `dt_seconds` using the current input state.
    ///
    /// Mouse rotation is consumed here; stick and key state persist.
    pub fn tick(&mut self, camera: &mut Camera, dt_seconds: f32) {
        let yaw = (self.rotate_speed[YAW] + self.mouse_rotate_speed[YAW]) * dt_seconds;
        let pitch = (self.rotate_speed[PITCH] + self.mouse_rotate_speed[PITCH]) * dt_seconds;
        self.mouse_rotate_speed = [0.0; 2];

        if yaw != 0.0 || pitch != 0.0 {
            camera.direction = rotate_direction(camera.direction, yaw, pitch, self.max_pitch());
        }
        let direction = camera.direction.normalize_or_zero();
        let right = direction.cross(Vec3::Y).normalize_or_zero();

        let speed = self.settings.key_speed;
        let sideward = speed * (self.move_speed[RIGHT] - self.move_speed[LEFT]);
        let forward = speed * (self.move_speed[FORWARD] - self.move_speed[BACKWARD]);

        camera.position += (direction * forward + right * sideward) * dt_seconds;
    }

    fn max_pitch(&self) -> f32 {
        self.settings.max_pitch_degrees.to_radians()
    }
}

/// Apply yaw about world Y, then pitch about the camera right axis.
///
/// Returns a unit vector. The pitch change may not carry the view past
/// `max_pitch` either side of the horizon; a camera already beyond the limit
/// can only turn back towards it. A zero direction is treated as -Z.
fn rotate_direction(direction: Vec3, yaw: f32, pitch: f32, max_pitch: f32) -> Vec3 {
    let direction = direction.try_normalize().unwrap_or(Vec3::NEG_Z);
    let direction = Quat::from_rotation_y(yaw) * direction;

    let current = direction.y.clamp(-1.0, 1.0).asin();
    let target = if pitch > 0.0 {
        (current + pitch).min(max_pitch.max(current))
    } else {
        (current + pitch).max((-max_pitch).min(current))
    };
    let horizontal = Vec3::new(direction.x, 0.0, direction.z)
        .try_normalize()
        .unwrap_or(Vec3::NEG_Z);

    (horizontal * target.cos() + Vec3::Y * target.sin()).normalize()
}

impl WindowControl for CameraController {
    fn will_start(&mut self) {
        tracing::debug!(key_speed = self.settings.key_speed, "camera controller started");
    }

    fn view_will_render(&mut self, camera: &mut Camera, dt_seconds: f32) {
        self.tick(camera, dt_seconds);
    }

    fn mouse_moved(&mut self, x: f64, y: f64) {
        if self.turn_mode {
            if let Some((last_x, last_y)) = self.last_cursor {
                let s = self.settings.mouse_sensitivity;
                self.mouse_rotate_speed[YAW] += -((x - last_x) as f32) * s;
                self.mouse_rotate_speed[PITCH] += -((y - last_y) as f32) * s;
            }
        }
        self.last_cursor = Some((x, y));
    }

    fn mouse_button_changed(&mut self, button: MouseButton, down: bool) {
        if button == MouseButton::Left {
            let last = self.last_cursor;
            self.set_turn_mode(down);
            self.last_cursor = last;
        }
    }

    fn mouse_wheel_moved(&mut self, notches: f32) {
        let speed = self.settings.key_speed * WHEEL_STEP.powf(notches);
        self.settings.key_speed = speed.clamp(MIN_KEY_SPEED, MAX_KEY_SPEED);
        tracing::debug!(key_speed = self.settings.key_speed, "camera speed changed");
    }

    fn keyboard_changed(&mut self, key: Key, down: bool) {
        let value = if down { 1.0 } else { 0.0 };
        let slot = match key {
            Key::A | Key::Left => LEFT,
            Key::D | Key::Right => RIGHT,
            Key::W | Key::Up => FORWARD,
            Key::S | Key::Down => BACKWARD,
            Key::Other => return,
        };
        self.move_speed[slot] = value;
    }

    fn gamepad_axis_moved(&mut self, _gamepad: u32, axis: GamepadAxis, pos: f32) {
        match axis {
            GamepadAxis::LeftStickX => {
                let (left, right) = self.split_axis(pos);
                self.move_speed[LEFT] = left;
                self.move_speed[RIGHT] = right;
            }
            GamepadAxis::LeftStickY => {
                let (backward, forward) = self.split_axis(pos);
                self.move_speed[BACKWARD] = backward;
                self.move_speed[FORWARD] = forward;
            }
            GamepadAxis::RightStickX => self.rotate_speed[YAW] = self.stick_rate(pos),
            GamepadAxis::RightStickY => self.rotate_speed[PITCH] = self.stick_rate(pos),
            GamepadAxis::LeftTrigger | GamepadAxis::RightTrigger => {}
        }
    }

    fn gamepad_button_changed(&mut self, _gamepad: u32, button: GamepadButton, down: bool) {
        if button == GamepadButton::A && down {
            let on = !self.turn_mode;
            self.set_turn_mode(on);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level_camera() -> Camera {
        Camera {
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            ..Camera::default()
        }
    }

    fn close(a: Vec3, b: Vec3) -> bool {
        a.abs_diff_eq(b, 1e-4)
    }

    #[test]
    fn idle_tick_leaves_camera_alone() {
        let mut controller = CameraController::default();
        let mut camera = level_camera();
        controller.tick(&mut camera, 1.0);
        assert_eq!(camera.position, Vec3::ZERO);
        assert!(close(camera.direction, Vec3::NEG_Z));
    }

    #[test]
    fn idle_tick_keeps_a_downward_view() {
        let mut controller = CameraController::default();
        let mut camera = Camera {
            position: Vec3::new(0.0, 10.0, 0.0),
            direction: Vec3::NEG_Y,
            ..Camera::default()
        };
        let before = camera;
        controller.tick(&mut camera, 0.016);
        assert_eq!(camera, before);
    }

    #[test]
    fn pitch_beyond_the_limit_only_turns_back() {
        let mut controller = CameraController::default();
        let steep = Vec3::new(0.0, -0.9999, -0.0141).normalize();
        let mut camera = Camera {
            direction: steep,
            ..level_camera()
        };

        // Pitching further down is held at the current pitch.
        controller.gamepad_axis_moved(0, GamepadAxis::RightStickY, 1.0);
        controller.tick(&mut camera, 0.1);
        assert!((camera.direction.y - steep.y).abs() < 1e-5);

        // Pitching up moves away from the pole.
        controller.gamepad_axis_moved(0, GamepadAxis::RightStickY, -1.0);
        controller.tick(&mut camera, 0.1);
        assert!(camera.direction.y > steep.y);
    }

    #[test]
    fn w_moves_forward_at_key_speed() {
        let mut controller = CameraController::default();
        let mut camera = level_camera();
        controller.keyboard_changed(Key::W, true);
        controller.tick(&mut camera, 0.5);
        assert!(close(camera.position, Vec3::new(0.0, 0.0, -50.0)));

        controller.keyboard_changed(Key::W, false);
        controller.tick(&mut camera, 0.5);
        assert!(close(camera.position, Vec3::new(0.0, 0.0, -50.0)));
    }

    #[test]
    fn arrow_keys_alias_wasd() {
        let mut controller = CameraController::default();
        controller.keyboard_changed(Key::Left, true);
        controller.keyboard_changed(Key::Up, true);
        assert_eq!(controller.move_speed(), [1.0, 0.0, 1.0, 0.0]);
        controller.keyboard_changed(Key::Right, true);
        controller.keyboard_changed(Key::Down, true);
        assert_eq!(controller.move_speed(), [1.0; 4]);
        controller.keyboard_changed(Key::Other, true);
        assert_eq!(controller.move_speed(), [1.0; 4]);
    }

    #[test]
    fn strafe_follows_camera_right() {
        let mut controller = CameraController::default();
        let mut camera = level_camera();
        controller.keyboard_changed(Key::D, true);
        controller.tick(&mut camera, 0.1);
        assert!(close(camera.position, Vec3::new(10.0, 0.0, 0.0)));
    }

    #[test]
    fn opposing_keys_cancel() {
        let mut controller = CameraController::default();
        let mut camera = level_camera();
        controller.keyboard_changed(Key::A, true);
        controller.keyboard_changed(Key::D, true);
        controller.tick(&mut camera, 1.0);
        assert_eq!(camera.position, Vec3::ZERO);
    }

    #[test]
    fn left_stick_respects_dead_zone() {
        let mut controller = CameraController::default();
        controller.gamepad_axis_moved(0, GamepadAxis::LeftStickX, 0.15);
        assert_eq!(controller.move_speed(), [0.0; 4]);
        controller.gamepad_axis_moved(0, GamepadAxis::LeftStickX, -0.6);
        assert_eq!(controller.move_speed()[LEFT], 0.6);
        assert_eq!(controller.move_speed()[RIGHT], 0.0);
        controller.gamepad_axis_moved(0, GamepadAxis::LeftStickY, 0.8);
        assert_eq!(controller.move_speed()[FORWARD], 0.8);
        assert_eq!(controller.move_speed()[BACKWARD], 0.0);
    }

    #[test]
    fn right_stick_sets_rotation_rate() {
        let mut controller = CameraController::default();
        controller.gamepad_axis_moved(0, GamepadAxis::RightStickX, 0.5);
        assert_eq!(controller.rotate_speed(), [-1.5, 0.0]);
        controller.gamepad_axis_moved(0, GamepadAxis::RightStickX, 0.1);
        assert_eq!(controller.rotate_speed(), [0.0, 0.0]);
    }

    #[test]
    fn yaw_turns_about_world_up() {
        let mut controller = CameraController::default();
        let mut camera = level_camera();
        // -pos * 3 rad/s, so full left deflection for pi/6 s is a quarter turn.
        controller.gamepad_axis_moved(0, GamepadAxis::RightStickX, -1.0);
        controller.tick(&mut camera, std::f32::consts::FRAC_PI_6);
        assert!(close(camera.direction, Vec3::NEG_X));
        assert_eq!(camera.position, Vec3::ZERO);
    }

    #[test]
    fn pitch_stops_short_of_the_pole() {
        let mut controller = CameraController::default();
        let mut camera = level_camera();
        controller.gamepad_axis_moved(0, GamepadAxis::RightStickY, -1.0);
        controller.tick(&mut camera, 10.0);
        let limit = 89.0_f32.to_radians();
        assert!((camera.direction.y - limit.sin()).abs() < 1e-4);
        assert!(camera.direction.z < 0.0);
    }

    #[test]
    fn mouse_rotation_needs_turn_mode_and_is_consumed() {
        let mut controller = CameraController::default();
        let mut camera = level_camera();

        controller.mouse_moved(100.0, 100.0);
        controller.mouse_moved(140.0, 100.0);
        controller.tick(&mut camera, 1.0);
        assert!(close(camera.direction, Vec3::NEG_Z));

        controller.mouse_button_changed(MouseButton::Left, true);
        assert!(controller.turn_mode());
        controller.mouse_moved(150.0, 100.0);
        controller.tick(&mut camera, 0.1);
        let turned = camera.direction;
        assert!(!close(turned, Vec3::NEG_Z));

        controller.tick(&mut camera, 0.1);
        assert!(close(camera.direction, turned));
    }

    #[test]
    fn releasing_button_clears_pending_mouse_rotation() {
        let mut controller = CameraController::default();
        let mut camera = level_camera();
        controller.mouse_moved(0.0, 0.0);
        controller.mouse_button_changed(MouseButton::Left, true);
        controller.mouse_moved(30.0, 0.0);
        controller.mouse_button_changed(MouseButton::Left, false);
        controller.tick(&mut camera, 1.0);
        assert!(close(camera.direction, Vec3::NEG_Z));
    }

    #[test]
    fn wheel_scales_speed_within_bounds() {
        let mut controller = CameraController::default();
        controller.mouse_wheel_moved(1.0);
        assert!((controller.key_speed() - 110.0).abs() < 1e-3);
        controller.mouse_wheel_moved(500.0);
        assert_eq!(controller.key_speed(), 1000.0);
        controller.mouse_wheel_moved(-5000.0);
        assert_eq!(controller.key_speed(), 1.0);
    }

    #[test]
    fn gamepad_a_toggles_turn_mode() {
        let mut controller = CameraController::default();
        controller.gamepad_button_changed(0, GamepadButton::A, true);
        controller.gamepad_button_changed(0, GamepadButton::A, false);
        assert!(controller.turn_mode());
        controller.gamepad_button_changed(0, GamepadButton::A, true);
        assert!(!controller.turn_mode());
        controller.gamepad_button_changed(0, GamepadButton::B, true);
        assert!(!controller.turn_mode());
    }

    #[test]
    fn view_will_render_ticks() {
        let mut controller = CameraController::default();
        let mut camera = level_camera();
        controller.keyboard_changed(Key::S, true);
        controller.view_will_render(&mut camera, 0.01);
        assert!(close(camera.position, Vec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn settings_from_partial_yaml() {
        let settings: ControllerSettings = serde_yaml::from_str("key_speed: 25\n").unwrap();
        assert_eq!(settings.key_speed, 25.0);
        assert_eq!(settings.dead_zone, 0.2);
        assert_eq!(settings.stick_rotate_speed, 3.0);
    }
}
