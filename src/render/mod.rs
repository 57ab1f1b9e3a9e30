pub mod frame;
pub mod halfblock;
pub mod hud;
#[cfg(feature = "metal")]
pub mod metal;
pub mod pipeline;
pub mod point_cloud;
pub mod rasterizer;
pub mod splat_renderer;

use std::time::Instant;

use crate::camera::Camera;
use crate::math::Vec3;
use crate::scene::PointCloud;
use crossterm::style::Color;

pub use point_cloud::PointCloudRenderer;
pub use splat_renderer::SplatRenderer;

pub fn rgb_to_ansi256(r: u8, g: u8, b: u8) -> u8 {
    if r == g && g == b {
        if r < 8 {
            return 16;
        }
        if r > 248 {
            return 231;
        }
        return 232 + ((r as f32 - 8.0) / 247.0 * 24.0) as u8;
    }
    let ri = (r as f32 / 255.0 * 5.0 + 0.5) as u8;
    let gi = (g as f32 / 255.0 * 5.0 + 0.5) as u8;
    let bi = (b as f32 / 255.0 * 5.0 + 0.5) as u8;
    16 + 36 * ri + 6 * gi + bi
}

pub fn make_color(r: u8, g: u8, b: u8, use_truecolor: bool) -> Color {
    if use_truecolor {
        Color::Rgb { r, g, b }
    } else {
        Color::AnsiValue(rgb_to_ansi256(r, g, b))
    }
}

pub type AppResult<T> = Result<T, Box<dyn std::error::Error>>;
pub type HalfblockCell = ([u8; 3], [u8; 3]);

pub const HALF_BLOCK: char = '\u{2584}';
pub const FRAME_TARGET: std::time::Duration = std::time::Duration::from_millis(8);

#[derive(Debug)]
pub struct RenderState {
    pub framebuffer: Vec<[u8; 3]>,
    pub alpha_buffer: Vec<f32>,
    pub depth_buffer: Vec<f32>,
    pub width: usize,
    pub height: usize,
}

/// Optional per-frame device timing, filled in by renderers that can
/// measure it (the Metal backend brackets its command buffer).
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameTimer {
    pub gpu_ms: Option<f64>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FrameStats {
    pub visible_count: usize,
}

/// One operation: render a frame of the scene into the pixel target.
/// Implemented by the two renderer variants the orchestrator selects
/// between.
pub trait Renderer {
    fn render(
        &mut self,
        scene: &PointCloud,
        camera: &Camera,
        target: &mut RenderState,
        timer: Option<&mut FrameTimer>,
    ) -> AppResult<FrameStats>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RendererKind {
    GaussianSplat,
    PointCloud,
}

impl RendererKind {
    pub fn next(self) -> Self {
        match self {
            Self::GaussianSplat => Self::PointCloud,
            Self::PointCloud => Self::GaussianSplat,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GaussianSplat => "Gaussian",
            Self::PointCloud => "PointCloud",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backend {
    Cpu,
    #[cfg(feature = "metal")]
    Metal,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            #[cfg(feature = "metal")]
            Self::Metal => "Metal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraMode {
    Free,
    Orbit,
}

impl CameraMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Orbit => "Orbit",
        }
    }
}

#[derive(Debug)]
pub struct AppState {
    pub camera: Camera,
    pub scene: PointCloud,
    pub render_state: RenderState,
    pub halfblock_cells: Vec<HalfblockCell>,
    pub hud_string_buf: String,
    pub input_state: crate::input::state::InputState,
    pub show_hud: bool,
    pub camera_mode: CameraMode,
    pub move_speed: f32,
    pub splat_scale: f32,
    pub frame_count: u64,
    pub last_frame_time: Instant,
    pub fps: f32,
    pub visible_splat_count: usize,
    pub frame_timer: FrameTimer,
    pub orbit_angle: f32,
    pub orbit_radius: f32,
    pub orbit_height: f32,
    pub orbit_target: Vec3,
    pub supersample_factor: u32,
    pub renderer_kind: RendererKind,
    pub splat_renderer: SplatRenderer,
    pub point_cloud_renderer: PointCloudRenderer,
    pub backend: Backend,
    pub use_truecolor: bool,
    pub scene_center: Vec3,
}
