use std::{ffi::c_void, mem};

use metal::{
    Buffer, CompileOptions, ComputePipelineState, Device, Library, MTLBlendFactor,
    MTLBlendOperation, MTLPixelFormat, MTLResourceOptions, RenderPipelineDescriptor,
    RenderPipelineState,
};

use crate::scene::PointCloud;

use super::buffers::{bytes_for_u32_elems, make_target_texture};
use super::error::MetalRenderError;
use super::types::{
    DrawArguments, DispatchArguments, GpuCameraData, GpuGaussian, GpuSplat, RenderSettings,
    SortInfo, QUAD_VERTEX_COUNT, RADIX_BUCKETS, SORT_BLOCK_SIZE,
};
use super::MetalBackend;

impl MetalBackend {
    /// Builds every pipeline and buffer up front; failures here are fatal
    /// and never retried. The caller supplies the device so GPU ownership
    /// is visible at the call site.
    pub fn new(device: Device, max_splats: usize) -> Result<Self, MetalRenderError> {
        let command_queue = device.new_command_queue();

        let preprocess_library =
            compile_library(&device, include_str!("../../../shaders/preprocess.metal"))?;
        let radix_sort_library =
            compile_library(&device, include_str!("../../../shaders/radix_sort.metal"))?;
        let gaussian_draw_library =
            compile_library(&device, include_str!("../../../shaders/gaussian_draw.metal"))?;

        let preprocess_pipeline =
            create_pipeline(&device, &preprocess_library, "preprocess_gaussians")?;
        let sort_dispatch_pipeline =
            create_pipeline(&device, &radix_sort_library, "write_sort_dispatch")?;
        let histogram_pipeline = create_pipeline(&device, &radix_sort_library, "radix_histogram")?;
        let scan_pipeline = create_pipeline(&device, &radix_sort_library, "radix_scan")?;
        let scatter_pipeline = create_pipeline(&device, &radix_sort_library, "radix_scatter")?;
        let draw_pipeline = create_draw_pipeline(&device, &gaussian_draw_library)?;

        let max_blocks = max_splats.div_ceil(SORT_BLOCK_SIZE as usize).max(1);

        let gaussian_buffer = new_shared_buffer(
            &device,
            max_splats
                .checked_mul(mem::size_of::<GpuGaussian>())
                .ok_or_else(|| {
                    MetalRenderError::Other("gaussian buffer size overflow".to_string())
                })?,
        );
        let splat_buffer = new_private_buffer(
            &device,
            max_splats
                .checked_mul(mem::size_of::<GpuSplat>())
                .ok_or_else(|| MetalRenderError::Other("splat buffer size overflow".to_string()))?,
        );
        // SH coefficients are sized at upload time, once the degree is known.
        let sh_buffer = new_shared_buffer(&device, mem::size_of::<f32>());

        let camera_buffer = new_shared_buffer(&device, mem::size_of::<GpuCameraData>());
        let settings_buffer = new_shared_buffer(&device, mem::size_of::<RenderSettings>());
        let sort_info_buffer = new_shared_buffer(&device, mem::size_of::<SortInfo>());
        let sort_dispatch_buffer =
            new_private_buffer(&device, mem::size_of::<DispatchArguments>());

        let key_bytes = bytes_for_u32_elems(max_splats)?;
        let sort_keys = [
            new_private_buffer(&device, key_bytes),
            new_private_buffer(&device, key_bytes),
        ];
        let sort_indices = [
            new_private_buffer(&device, key_bytes),
            new_private_buffer(&device, key_bytes),
        ];
        let histogram_buffer = new_private_buffer(
            &device,
            bytes_for_u32_elems(
                max_blocks
                    .checked_mul(RADIX_BUCKETS as usize)
                    .ok_or_else(|| {
                        MetalRenderError::Other("histogram buffer size overflow".to_string())
                    })?,
            )?,
        );

        let draw_args_buffer = new_shared_buffer(&device, mem::size_of::<DrawArguments>());
        write_shared_struct(
            &draw_args_buffer,
            &DrawArguments {
                vertex_count: QUAD_VERTEX_COUNT,
                instance_count: 0,
                vertex_start: 0,
                base_instance: 0,
            },
        );

        let target_texture = make_target_texture(&device, 1, 1);
        let readback_buffer = new_shared_buffer(&device, mem::size_of::<u32>());

        Ok(Self {
            device,
            command_queue,
            preprocess_pipeline,
            sort_dispatch_pipeline,
            histogram_pipeline,
            scan_pipeline,
            scatter_pipeline,
            draw_pipeline,
            gaussian_buffer,
            sh_buffer,
            camera_buffer,
            settings_buffer,
            splat_buffer,
            sort_info_buffer,
            sort_keys,
            sort_indices,
            histogram_buffer,
            sort_dispatch_buffer,
            draw_args_buffer,
            target_texture,
            readback_buffer,
            max_splats,
            max_blocks,
            uploaded_count: 0,
            sh_degree: 0,
            sh_coeff_count: 1,
            target_width: 0,
            target_height: 0,
            splats_uploaded: false,
            gpu_disabled: false,
            last_visible_count: 0,
            last_gpu_time_ms: None,
        })
    }

    pub fn upload_point_cloud(&mut self, scene: &PointCloud) -> Result<(), MetalRenderError> {
        if scene.len() > self.max_splats {
            return Err("Too many splats for GPU buffers".into());
        }

        let contents = self.gaussian_buffer.contents() as *mut GpuGaussian;
        for (i, splat) in scene.splats.iter().enumerate() {
            let gpu = GpuGaussian {
                pos_x: splat.position.x,
                pos_y: splat.position.y,
                pos_z: splat.position.z,
                scale_x: splat.scale.x,
                scale_y: splat.scale.y,
                scale_z: splat.scale.z,
                rot_w: splat.rotation[0],
                rot_x: splat.rotation[1],
                rot_y: splat.rotation[2],
                rot_z: splat.rotation[3],
                opacity: splat.opacity,
            };

            unsafe {
                *contents.add(i) = gpu;
            }
        }

        let float_count = scene
            .sh
            .len()
            .checked_mul(3)
            .ok_or_else(|| MetalRenderError::Other("SH buffer size overflow".to_string()))?;
        let sh_bytes = float_count
            .checked_mul(mem::size_of::<f32>())
            .ok_or_else(|| MetalRenderError::Other("SH buffer size overflow".to_string()))?;
        self.sh_buffer = new_shared_buffer(&self.device, sh_bytes);
        let sh_contents = self.sh_buffer.contents() as *mut f32;
        for (i, triple) in scene.sh.iter().enumerate() {
            for (c, &value) in triple.iter().enumerate() {
                unsafe {
                    *sh_contents.add(i * 3 + c) = value;
                }
            }
        }

        self.uploaded_count = u32::try_from(scene.len())?;
        self.sh_degree = u32::from(scene.sh_degree);
        self.sh_coeff_count = u32::try_from(scene.coeffs_per_splat())?;
        self.splats_uploaded = true;
        Ok(())
    }
}

pub(super) fn compile_library(device: &Device, source: &str) -> Result<Library, MetalRenderError> {
    device
        .new_library_with_source(source, &CompileOptions::new())
        .map_err(|e| MetalRenderError::Other(e.to_string()))
}

pub(super) fn create_pipeline(
    device: &Device,
    library: &Library,
    function_name: &str,
) -> Result<ComputePipelineState, MetalRenderError> {
    let function = library
        .get_function(function_name, None)
        .map_err(|e| MetalRenderError::Other(e.to_string()))?;

    device
        .new_compute_pipeline_state_with_function(&function)
        .map_err(|e| MetalRenderError::Other(e.to_string()))
}

/// The indirect draw pipeline: billboard quads composited with
/// (add, one, one-minus-source-alpha) on both color and alpha.
fn create_draw_pipeline(
    device: &Device,
    library: &Library,
) -> Result<RenderPipelineState, MetalRenderError> {
    let vertex_fn = library
        .get_function("vs_main", None)
        .map_err(|e| MetalRenderError::Other(e.to_string()))?;
    let fragment_fn = library
        .get_function("fs_main", None)
        .map_err(|e| MetalRenderError::Other(e.to_string()))?;

    let descriptor = RenderPipelineDescriptor::new();
    descriptor.set_vertex_function(Some(&vertex_fn));
    descriptor.set_fragment_function(Some(&fragment_fn));

    let attachment = descriptor
        .color_attachments()
        .object_at(0)
        .ok_or_else(|| MetalRenderError::Other("missing color attachment slot".to_string()))?;
    attachment.set_pixel_format(MTLPixelFormat::RGBA8Unorm);
    attachment.set_blending_enabled(true);
    attachment.set_rgb_blend_operation(MTLBlendOperation::Add);
    attachment.set_alpha_blend_operation(MTLBlendOperation::Add);
    attachment.set_source_rgb_blend_factor(MTLBlendFactor::One);
    attachment.set_source_alpha_blend_factor(MTLBlendFactor::One);
    attachment.set_destination_rgb_blend_factor(MTLBlendFactor::OneMinusSourceAlpha);
    attachment.set_destination_alpha_blend_factor(MTLBlendFactor::OneMinusSourceAlpha);

    device
        .new_render_pipeline_state(&descriptor)
        .map_err(|e| MetalRenderError::Other(e.to_string()))
}

pub(super) fn new_shared_buffer(device: &Device, size_bytes: usize) -> Buffer {
    device.new_buffer(
        size_bytes.max(mem::size_of::<u32>()) as u64,
        MTLResourceOptions::StorageModeShared,
    )
}

pub(super) fn new_private_buffer(device: &Device, size_bytes: usize) -> Buffer {
    device.new_buffer(
        size_bytes.max(mem::size_of::<u32>()) as u64,
        MTLResourceOptions::StorageModePrivate,
    )
}

pub(super) fn write_shared_struct<T: Copy>(buffer: &Buffer, value: &T) {
    unsafe {
        *(buffer.contents() as *mut T) = *value;
    }
}

pub(super) fn read_shared_u32(buffer: &Buffer) -> u32 {
    unsafe { *(buffer.contents() as *const u32) }
}

pub(super) fn set_bytes_u32(encoder: &metal::ComputeCommandEncoderRef, index: u64, value: u32) {
    encoder.set_bytes(
        index,
        mem::size_of::<u32>() as u64,
        &value as *const _ as *const c_void,
    );
}
