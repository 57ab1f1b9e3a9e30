use clap::Parser;
use crossterm::{
    cursor,
    event::{KeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    execute,
    terminal::{self, ClearType, EnterAlternateScreen},
};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

mod camera;
mod demo;
mod input;
mod math;
mod parser;
mod render;
mod scene;
mod sh;
mod sort;
mod splat;
mod terminal_setup;

use camera::Camera;
use math::Vec3;
use render::frame::run_app_loop;
use render::{
    AppState, Backend, CameraMode, FrameTimer, PointCloudRenderer, RenderState, RendererKind,
    SplatRenderer,
};
use scene::PointCloud;
use terminal_setup::{cleanup_terminal, install_panic_hook};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Debug, Parser)]
#[command(
    name = "terrapin",
    version,
    about = "Terminal-native 3D Gaussian Splatting viewer"
)]
struct Cli {
    /// Path to a .ply or .splat scene file (runs demo if omitted)
    input: Option<PathBuf>,
    #[arg(long, help = "Force CPU rendering")]
    cpu: bool,
    #[cfg(feature = "metal")]
    #[arg(long, help = "Force Metal GPU rendering", conflicts_with = "cpu")]
    metal: bool,
    #[arg(long, help = "Flip Y axis")]
    flip_y: bool,
    #[arg(long, help = "Flip Z axis")]
    flip_z: bool,
    #[arg(long, help = "Run built-in demo scene", conflicts_with = "input")]
    demo: bool,
    #[arg(
        long,
        value_name = "N",
        default_value_t = 1,
        help = "Supersampling factor"
    )]
    supersample: u32,
}

fn load_scene_from_cli(cli: &Cli) -> AppResult<PointCloud> {
    let path = match (&cli.input, cli.demo) {
        (Some(path), false) => path,
        _ => return Ok(demo::generate_demo_scene()),
    };

    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let path_str = path.to_str().ok_or_else(|| {
        format!(
            "Input path contains non-UTF-8 characters: {}",
            path.display()
        )
    })?;

    match ext.as_str() {
        "ply" => parser::ply::load_ply_file(path_str),
        "splat" => parser::dot_splat::load_splat_file(path_str),
        _ => Err(format!(
            "Unsupported input '{}'. Use a .ply, .splat, or --demo",
            path.display()
        )
        .into()),
    }
}

fn main() -> AppResult<()> {
    install_panic_hook();
    let cli = Cli::parse();

    #[cfg(feature = "metal")]
    let mut backend = if cli.cpu {
        Backend::Cpu
    } else {
        Backend::Metal
    };
    #[cfg(not(feature = "metal"))]
    let backend = Backend::Cpu;

    let mut scene = load_scene_from_cli(&cli)?;
    if cli.flip_y || cli.flip_z {
        for splat in &mut scene.splats {
            if cli.flip_y {
                splat.position.y = -splat.position.y;
            }
            if cli.flip_z {
                splat.position.z = -splat.position.z;
            }
        }
    }

    let scene_center = scene.center();

    let use_truecolor = match std::env::var("COLORTERM") {
        Ok(val) => !val.is_empty() && (val == "truecolor" || val == "24bit"),
        Err(_) => match std::env::var("TERM_PROGRAM") {
            Ok(prog) => prog != "Apple_Terminal",
            Err(_) => match std::env::var("TERM") {
                Ok(term) => {
                    term.contains("ghostty") || term.contains("kitty") || term.contains("wezterm")
                }
                Err(_) => false,
            },
        },
    };

    let (cols, rows) = terminal::size().unwrap_or((120, 40));
    let width = cols.max(1) as usize;
    let height = rows.max(1) as usize * 2;

    let camera_start = Vec3::new(scene_center.x, scene_center.y, scene_center.z + 5.0);
    let mut camera = Camera::new(camera_start, -std::f32::consts::FRAC_PI_2, 0.0);
    camera::look_at_target(&mut camera, scene_center);

    // Renderer variants are built up front; the loop dispatches to whichever
    // is selected. The Metal backend takes its device handle here so GPU
    // resource ownership is visible at the call site.
    #[cfg(feature = "metal")]
    let splat_renderer = if backend == Backend::Metal {
        let created = metal::Device::system_default()
            .ok_or_else(|| "No Metal device found".to_string())
            .and_then(|device| {
                render::metal::MetalBackend::new(device, scene.len().max(1))
                    .map_err(|e| e.to_string())
            });
        match created {
            Ok(mut metal_backend) => {
                metal_backend.upload_point_cloud(&scene)?;
                SplatRenderer::with_metal(metal_backend)
            }
            Err(err) => {
                eprintln!(
                    "Warning: Metal initialization failed: {}. Falling back to CPU renderer.",
                    err
                );
                backend = Backend::Cpu;
                SplatRenderer::new()
            }
        }
    } else {
        SplatRenderer::new()
    };
    #[cfg(not(feature = "metal"))]
    let splat_renderer = SplatRenderer::new();

    let mut app_state = AppState {
        camera,
        scene,
        render_state: RenderState {
            framebuffer: vec![[0, 0, 0]; width * height],
            alpha_buffer: vec![0.0; width * height],
            depth_buffer: vec![f32::INFINITY; width * height],
            width,
            height,
        },
        halfblock_cells: Vec::with_capacity(width * rows.max(1) as usize),
        hud_string_buf: String::with_capacity(512),
        input_state: input::state::InputState::default(),
        show_hud: true,
        camera_mode: CameraMode::Free,
        move_speed: 0.15,
        splat_scale: 1.0,
        frame_count: 0,
        last_frame_time: Instant::now(),
        fps: 0.0,
        visible_splat_count: 0,
        frame_timer: FrameTimer::default(),
        orbit_angle: 0.0,
        orbit_radius: 5.0,
        orbit_height: 0.0,
        orbit_target: Vec3::ZERO,
        supersample_factor: cli.supersample.max(1),
        renderer_kind: RendererKind::GaussianSplat,
        splat_renderer,
        point_cloud_renderer: PointCloudRenderer::new(),
        backend,
        use_truecolor,
        scene_center,
    };

    crossterm::terminal::enable_raw_mode()?;
    let input_rx = input::thread::spawn_input_thread();
    let mut stdout = BufWriter::with_capacity(1024 * 1024, io::stdout());

    execute!(
        stdout,
        EnterAlternateScreen,
        cursor::Hide,
        terminal::Clear(ClearType::All)
    )?;
    // Request key event kinds so key releases are observable for held-key movement.
    let _ = execute!(
        stdout,
        PushKeyboardEnhancementFlags(
            KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
        )
    );
    stdout.flush()?;

    let run_result = run_app_loop(&mut app_state, &input_rx, &mut stdout);
    #[cfg(feature = "metal")]
    let cleanup_result = cleanup_terminal(
        &mut stdout,
        app_state.splat_renderer.last_gpu_error.as_deref(),
    );
    #[cfg(not(feature = "metal"))]
    let cleanup_result = cleanup_terminal(&mut stdout, None);

    run_result?;
    cleanup_result
}
