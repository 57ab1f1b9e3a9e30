mod buffers;
mod draw;
mod error;
mod pipeline;
mod preprocess;
mod render;
mod sort;
mod sync;
mod types;

use metal::{Buffer, CommandQueue, ComputePipelineState, Device, RenderPipelineState, Texture};

pub use error::MetalRenderError;

/// The GPU rendition of the splat pipeline: one command buffer per frame
/// runs preprocess, the radix sort (sized by an on-device dispatch buffer),
/// and a single indirect draw. The only host wait is the presentation
/// readback at the end of the frame.
pub struct MetalBackend {
    pub(super) device: Device,
    pub(super) command_queue: CommandQueue,

    pub(super) preprocess_pipeline: ComputePipelineState,
    pub(super) sort_dispatch_pipeline: ComputePipelineState,
    pub(super) histogram_pipeline: ComputePipelineState,
    pub(super) scan_pipeline: ComputePipelineState,
    pub(super) scatter_pipeline: ComputePipelineState,
    pub(super) draw_pipeline: RenderPipelineState,

    // Preprocess resources: gaussian inputs, splat outputs, visible count.
    pub(super) gaussian_buffer: Buffer,
    pub(super) sh_buffer: Buffer,
    pub(super) camera_buffer: Buffer,
    pub(super) settings_buffer: Buffer,
    pub(super) splat_buffer: Buffer,
    pub(super) sort_info_buffer: Buffer,

    // Sort resources: ping-pong pairs, histograms, dispatch sizing.
    pub(super) sort_keys: [Buffer; 2],
    pub(super) sort_indices: [Buffer; 2],
    pub(super) histogram_buffer: Buffer,
    pub(super) sort_dispatch_buffer: Buffer,

    // Draw resources: indirect arguments, target, presentation readback.
    pub(super) draw_args_buffer: Buffer,
    pub(super) target_texture: Texture,
    pub(super) readback_buffer: Buffer,

    pub(super) max_splats: usize,
    pub(super) max_blocks: usize,
    pub(super) uploaded_count: u32,
    pub(super) sh_degree: u32,
    pub(super) sh_coeff_count: u32,
    pub(super) target_width: usize,
    pub(super) target_height: usize,

    pub(super) splats_uploaded: bool,
    pub(super) gpu_disabled: bool,
    pub(super) last_visible_count: u32,
    pub(super) last_gpu_time_ms: Option<f64>,
}

impl MetalBackend {
    pub fn is_ready(&self) -> bool {
        self.splats_uploaded
    }

    /// Visible count of the most recent completed frame, read back after the
    /// command buffer finished (never used for sizing).
    pub fn last_visible_count(&self) -> u32 {
        self.last_visible_count
    }

    pub fn last_gpu_time_ms(&self) -> Option<f64> {
        self.last_gpu_time_ms
    }
}

impl std::fmt::Debug for MetalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetalBackend")
            .field("max_splats", &self.max_splats)
            .field("max_blocks", &self.max_blocks)
            .field("uploaded_count", &self.uploaded_count)
            .field("sh_degree", &self.sh_degree)
            .field("splats_uploaded", &self.splats_uploaded)
            .field("gpu_disabled", &self.gpu_disabled)
            .finish()
    }
}
