pub(super) const THREADS_PER_GROUP_1D: u32 = 256;
pub(super) const SORT_BLOCK_SIZE: u32 = 256;
pub(super) const RADIX_BUCKETS: u32 = 256;
pub(super) const RADIX_PASSES: u32 = 4;
pub(super) const QUAD_VERTEX_COUNT: u32 = 6;

/// One immutable gaussian as uploaded to the device. Color lives in the
/// separate SH coefficient buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GpuGaussian {
    pub pos_x: f32,
    pub pos_y: f32,
    pub pos_z: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub scale_z: f32,
    pub rot_w: f32,
    pub rot_x: f32,
    pub rot_y: f32,
    pub rot_z: f32,
    pub opacity: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GpuCameraData {
    pub pos_x: f32,
    pub pos_y: f32,
    pub pos_z: f32,
    pub right_x: f32,
    pub right_y: f32,
    pub right_z: f32,
    pub up_x: f32,
    pub up_y: f32,
    pub up_z: f32,
    pub forward_x: f32,
    pub forward_y: f32,
    pub forward_z: f32,
    pub fx: f32,
    pub fy: f32,
    pub half_w: f32,
    pub half_h: f32,
    pub near_plane: f32,
    pub far_plane: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RenderSettings {
    pub splat_scale: f32,
    pub sh_degree: u32,
    pub sh_coeff_count: u32,
    pub gaussian_count: u32,
}

/// One projected splat, rewritten every frame into a prefix of the splat
/// storage buffer. Axes are the 2D covariance eigenvectors scaled to one
/// standard deviation, in pixels.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GpuSplat {
    pub center_x: f32,
    pub center_y: f32,
    pub axis1_x: f32,
    pub axis1_y: f32,
    pub axis2_x: f32,
    pub axis2_y: f32,
    pub color_r: f32,
    pub color_g: f32,
    pub color_b: f32,
    pub opacity: f32,
}

/// MTLDrawPrimitivesIndirectArguments. `instance_count` is overwritten each
/// frame by a blit copy from the visible-count buffer; the other fields are
/// set once at startup.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DrawArguments {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub vertex_start: u32,
    pub base_instance: u32,
}

/// MTLDispatchThreadgroupsIndirectArguments, written on-device by the
/// sizing kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DispatchArguments {
    pub threadgroups_x: u32,
    pub threadgroups_y: u32,
    pub threadgroups_z: u32,
}

/// The visible-count counter the preprocess kernel bumps atomically.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SortInfo {
    pub visible_count: u32,
}

const _: [(); 44] = [(); std::mem::size_of::<GpuGaussian>()];
const _: [(); 72] = [(); std::mem::size_of::<GpuCameraData>()];
const _: [(); 16] = [(); std::mem::size_of::<RenderSettings>()];
const _: [(); 40] = [(); std::mem::size_of::<GpuSplat>()];
const _: [(); 16] = [(); std::mem::size_of::<DrawArguments>()];
const _: [(); 12] = [(); std::mem::size_of::<DispatchArguments>()];
const _: [(); 4] = [(); std::mem::size_of::<SortInfo>()];
