use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use vista_common::Viewport;
use vista_input::{CameraController, ControllerSettings, Key, MouseButton, WindowControl};
use vista_render::{FileImageDecoder, RendererSettings, SceneRenderer, WindowView};
use vista_render_wgpu::WgpuDevice;
use vista_scene::{Scene, SceneProvider};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

/// Scroll distance in pixels treated as one wheel notch.
const PIXELS_PER_NOTCH: f32 = 50.0;

#[derive(Parser)]
#[command(name = "vista-desktop", about = "Real-time scene viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Scene file (.json, .yaml or .yml)
    #[arg(long)]
    scene: PathBuf,

    /// Directory texture paths are resolved against
    #[arg(long, default_value = ".")]
    resources: PathBuf,

    /// Viewer config file with `renderer` and `controller` sections
    #[arg(long)]
    config: Option<PathBuf>,

    /// Initial window width
    #[arg(long, default_value = "1280")]
    width: u32,

    /// Initial window height
    #[arg(long, default_value = "720")]
    height: u32,
}

#[derive(Debug, Default, Deserialize)]
struct ViewerConfig {
    #[serde(default)]
    renderer: RendererSettings,
    #[serde(default)]
    controller: ControllerSettings,
}

impl ViewerConfig {
    fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.renderer.light_slots()?;
        Ok(config)
    }
}

fn map_key(code: KeyCode) -> Key {
    match code {
        KeyCode::KeyA => Key::A,
        KeyCode::KeyD => Key::D,
        KeyCode::KeyW => Key::W,
        KeyCode::KeyS => Key::S,
        KeyCode::ArrowLeft => Key::Left,
        KeyCode::ArrowRight => Key::Right,
        KeyCode::ArrowUp => Key::Up,
        KeyCode::ArrowDown => Key::Down,
        _ => Key::Other,
    }
}

fn map_button(button: winit::event::MouseButton) -> MouseButton {
    match button {
        winit::event::MouseButton::Left => MouseButton::Left,
        winit::event::MouseButton::Right => MouseButton::Right,
        winit::event::MouseButton::Middle => MouseButton::Middle,
        _ => MouseButton::Other,
    }
}

fn wheel_notches(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_NOTCH,
    }
}

/// Window, surface and device. Created on the first `resumed`.
struct Gpu {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    device: WgpuDevice,
}

impl Gpu {
    fn new(event_loop: &ActiveEventLoop, title: &str, size: PhysicalSize<u32>) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title(title)
            .with_inner_size(size);
        let window = Arc::new(event_loop.create_window(attrs)?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow!("no compatible GPU adapter"))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("vista_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))?;

        let size = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or_else(|| anyhow!("surface reports no formats"))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        tracing::info!(
            "GPU initialized with {} backend, surface format {format:?}",
            adapter.get_info().backend.to_str()
        );

        let viewport = Viewport::new(config.width, config.height);
        Ok(Self {
            window,
            surface,
            config,
            device: WgpuDevice::new(device, queue, format, viewport),
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) -> Viewport {
        self.config.width = size.width.max(1);
        self.config.height = size.height.max(1);
        self.surface.configure(self.device.device(), &self.config);
        Viewport::new(self.config.width, self.config.height)
    }
}

/// Event dispatcher: forwards window events to the controller and the view.
struct ViewerApp {
    scene: Scene,
    controller: CameraController,
    renderer: SceneRenderer<WgpuDevice>,
    title: String,
    initial_size: PhysicalSize<u32>,
    gpu: Option<Gpu>,
    last_frame: Instant,
    error: Option<anyhow::Error>,
}

impl ViewerApp {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let mut gpu = Gpu::new(event_loop, &self.title, self.initial_size)?;
        let stats = self.renderer.view_will_start(&mut gpu.device, &self.scene)?;
        tracing::info!(
            meshes = stats.meshes,
            textures = stats.textures,
            missing_textures = stats.missing_textures,
            "viewer started"
        );
        self.controller.will_start();
        self.last_frame = Instant::now();
        self.gpu = Some(gpu);
        Ok(())
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32().min(0.1);
        self.last_frame = now;

        self.controller.view_will_render(self.scene.camera_mut(), dt);
        self.scene.advance(dt);

        let Some(gpu) = &mut self.gpu else {
            return;
        };

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(gpu.device.device(), &gpu.config);
                return;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        gpu.device.set_target(view);
        let stats = self.renderer.view_render(&mut gpu.device, &self.scene);
        tracing::trace!(draw_calls = stats.draw_calls, "frame rendered");

        output.present();
        gpu.window.request_redraw();
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            tracing::error!("viewer failed to start: {e:#}");
            self.error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    let viewport = gpu.resize(new_size);
                    self.renderer.view_did_reset(&mut gpu.device, viewport);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if code == KeyCode::Escape {
                    event_loop.exit();
                    return;
                }
                self.controller
                    .keyboard_changed(map_key(code), state == ElementState::Pressed);
            }
            WindowEvent::MouseInput { button, state, .. } => {
                self.controller
                    .mouse_button_changed(map_button(button), state == ElementState::Pressed);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.controller.mouse_moved(position.x, position.y);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.controller.mouse_wheel_moved(wheel_notches(delta));
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.controller.did_stop();
        if let Some(gpu) = &mut self.gpu {
            self.renderer.view_did_stop(&mut gpu.device);
        }
        tracing::info!("viewer stopped");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("vista-desktop starting");

    let config = ViewerConfig::load(cli.config.as_deref())?;
    let scene = Scene::load(&cli.scene)
        .with_context(|| format!("loading scene {}", cli.scene.display()))?;
    let renderer = SceneRenderer::new(
        config.renderer,
        vista_render_wgpu::scene_shader(),
        Box::new(FileImageDecoder::new(&cli.resources)),
    )?;

    let title = match cli.scene.file_stem() {
        Some(stem) => format!("Vista - {}", stem.to_string_lossy()),
        None => "Vista".to_string(),
    };

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp {
        scene,
        controller: CameraController::new(config.controller),
        renderer,
        title,
        initial_size: PhysicalSize::new(cli.width.max(1), cli.height.max(1)),
        gpu: None,
        last_frame: Instant::now(),
        error: None,
    };
    event_loop.run_app(&mut app)?;

    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_keys_map_to_controller_keys() {
        assert_eq!(map_key(KeyCode::KeyW), Key::W);
        assert_eq!(map_key(KeyCode::ArrowDown), Key::Down);
        assert_eq!(map_key(KeyCode::Space), Key::Other);
    }

    #[test]
    fn wheel_lines_are_notches() {
        assert_eq!(wheel_notches(MouseScrollDelta::LineDelta(0.0, 2.0)), 2.0);
        let pixels = MouseScrollDelta::PixelDelta(winit::dpi::PhysicalPosition::new(0.0, -100.0));
        assert_eq!(wheel_notches(pixels), -2.0);
    }

    #[test]
    fn config_sections_default_independently() {
        let config: ViewerConfig = serde_yaml::from_str("controller:\n  key_speed: 12.0\n").unwrap();
        assert_eq!(config.controller.key_speed, 12.0);
        assert_eq!(config.controller.dead_zone, 0.2);
        assert_eq!(config.renderer, RendererSettings::default());
    }
}
