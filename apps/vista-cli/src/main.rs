use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use vista_common::Viewport;
use vista_render::{
    DeviceCommand, FileImageDecoder, RecordingDevice, RendererSettings, SceneRenderer,
    WindowView,
};
use vista_scene::{Scene, SceneProvider};

#[derive(Parser)]
#[command(name = "vista-cli", about = "Headless tool for vista scenes")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print scene contents
    Inspect {
        /// Scene file (.json, .yaml or .yml)
        #[arg(long)]
        scene: PathBuf,
    },
    /// Load a scene and run renderer setup without a GPU
    Validate {
        #[command(flatten)]
        setup: SetupArgs,
    },
    /// Render one frame into the command recorder and report it
    Frame {
        #[command(flatten)]
        setup: SetupArgs,
        /// Scene time to advance before rendering, in seconds
        #[arg(long, default_value = "0")]
        time: f32,
        /// Framebuffer width
        #[arg(long, default_value = "1280")]
        width: u32,
        /// Framebuffer height
        #[arg(long, default_value = "720")]
        height: u32,
        /// Print every recorded device command
        #[arg(long)]
        dump: bool,
    },
}

#[derive(clap::Args)]
struct SetupArgs {
    /// Scene file (.json, .yaml or .yml)
    #[arg(long)]
    scene: PathBuf,
    /// Directory texture paths are resolved against
    #[arg(long, default_value = ".")]
    resources: PathBuf,
    /// Viewer config file with a `renderer` section
    #[arg(long)]
    config: Option<PathBuf>,
}

/// The part of the viewer config file this tool reads.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    renderer: RendererSettings,
}

fn load_settings(path: Option<&Path>) -> Result<RendererSettings> {
    let Some(path) = path else {
        return Ok(RendererSettings::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: ConfigFile = serde_yaml::from_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    config.renderer.light_slots()?;
    Ok(config.renderer)
}

fn setup(
    args: &SetupArgs,
    viewport: Viewport,
) -> Result<(Scene, RecordingDevice, SceneRenderer<RecordingDevice>)> {
    let scene = Scene::load(&args.scene)
        .with_context(|| format!("loading scene {}", args.scene.display()))?;
    let settings = load_settings(args.config.as_deref())?;
    let decoder = FileImageDecoder::new(&args.resources);
    tracing::debug!(
        scene = %args.scene.display(),
        resources = %decoder.root().display(),
        "running renderer setup"
    );
    let mut renderer = SceneRenderer::new(
        settings,
        vista_render_wgpu::scene_shader(),
        Box::new(decoder),
    )?;
    let mut device = RecordingDevice::new(viewport);
    let stats = renderer.view_will_start(&mut device, &scene)?;
    println!(
        "Setup: meshes={}, textures={}, missing_textures={}, program={}",
        stats.meshes,
        stats.textures,
        stats.missing_textures,
        if renderer.has_program() { "OK" } else { "FAILED" }
    );
    Ok((scene, device, renderer))
}

fn inspect(path: &Path) -> Result<()> {
    let scene =
        Scene::load(path).with_context(|| format!("loading scene {}", path.display()))?;

    println!("Scene: {}", path.display());
    println!(
        "meshes={}, materials={}, lights={}, instances={}",
        scene.meshes().len(),
        scene.materials().len(),
        scene.lights().len(),
        scene.instance_count()
    );
    for mesh in scene.meshes() {
        println!(
            "  {}: vertices={}, indices={}, instances={}",
            mesh.id,
            mesh.positions.len(),
            mesh.indices.len(),
            scene.instances_by_mesh_id(mesh.id).len()
        );
    }
    for material in scene.materials() {
        let texture = |path: &str| {
            if path.is_empty() {
                "-".to_string()
            } else {
                path.to_string()
            }
        };
        println!(
            "  {}: diffuse={}, specular={}",
            material.id,
            texture(&material.diffuse_texture),
            texture(&material.specular_texture)
        );
    }
    let camera = scene.camera();
    println!(
        "camera: position={}, direction={}, fov={}, near={}, far={}",
        camera.position, camera.direction, camera.vertical_fov_degrees, camera.near, camera.far
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Inspect { scene } => inspect(&scene)?,
        Commands::Validate { setup: args } => {
            let (scene, _device, renderer) = setup(&args, Viewport::default())?;
            let capacity = renderer.settings().light_slots()?.scene_capacity();
            println!(
                "Lights: scene={}, capacity={}, extra={}",
                scene.lights().len(),
                capacity,
                renderer.settings().extra_light_slots
            );
            println!("Valid");
        }
        Commands::Frame {
            setup: args,
            time,
            width,
            height,
            dump,
        } => {
            let (mut scene, mut device, mut renderer) =
                setup(&args, Viewport::new(width, height))?;
            device.take_commands();
            scene.advance(time);

            let stats = renderer.view_render(&mut device, &scene);
            renderer.view_did_stop(&mut device);
            println!(
                "Frame: t={:.3}s, draw_calls={}, light_slots={}, instances_skipped={}",
                scene.time_in_seconds(),
                stats.draw_calls,
                stats.light_slots,
                stats.instances_skipped
            );

            let commands = device.take_commands();
            let uniforms = commands
                .iter()
                .filter(|c| matches!(c, DeviceCommand::SetUniform { .. }))
                .count();
            println!("Commands: total={}, uniforms={uniforms}", commands.len());
            if dump {
                for command in &commands {
                    println!("  {command:?}");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn demo_args() -> SetupArgs {
        let demos = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos");
        SetupArgs {
            scene: demos.join("scenes/cubes.yaml"),
            resources: demos.join("scenes"),
            config: Some(demos.join("viewer.yaml")),
        }
    }

    #[test]
    fn demo_scene_renders_one_draw_per_instance() {
        let (scene, mut device, mut renderer) =
            setup(&demo_args(), Viewport::new(640, 480)).unwrap();
        assert!(renderer.has_program());
        assert_eq!(renderer.meshes().len(), 2);

        let stats = renderer.view_render(&mut device, &scene);
        assert_eq!(stats.draw_calls, scene.instance_count());
        assert_eq!(stats.instances_skipped, 0);
        assert_eq!(stats.light_slots, scene.lights().len() + 2);
    }

    #[test]
    fn missing_config_uses_defaults() {
        let settings = load_settings(None).unwrap();
        assert_eq!(settings, RendererSettings::default());
    }

    #[test]
    fn config_reads_renderer_section_only() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "renderer:\n  max_lights: 8\ncontroller:\n  key_speed: 5.0").unwrap();
        let settings = load_settings(Some(file.path())).unwrap();
        assert_eq!(settings.max_lights, 8);
        assert_eq!(settings.extra_light_slots, 2);
    }

    #[test]
    fn config_with_mismatched_extra_lights_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "renderer:\n  extra_light_slots: 3").unwrap();
        assert!(load_settings(Some(file.path())).is_err());
    }
}
