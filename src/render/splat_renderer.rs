use crate::camera::Camera;
use crate::scene::PointCloud;
use crate::sort::sort_by_depth;
use crate::splat::ProjectedSplat;

use super::{pipeline, rasterizer, AppResult, FrameStats, FrameTimer, RenderState, Renderer};

/// The gaussian-splat renderer variant: project, cull, depth-sort, and
/// composite with order-dependent blending. Prefers the Metal backend when
/// one was attached and healthy; otherwise runs the same pipeline on the
/// CPU.
#[derive(Debug)]
pub struct SplatRenderer {
    projected: Vec<ProjectedSplat>,
    scaling: f32,
    #[cfg(feature = "metal")]
    metal: Option<super::metal::MetalBackend>,
    #[cfg(feature = "metal")]
    pub last_gpu_error: Option<String>,
    #[cfg(feature = "metal")]
    pub gpu_fallback_active: bool,
}

impl SplatRenderer {
    pub fn new() -> Self {
        Self {
            projected: Vec::with_capacity(32_768),
            scaling: 1.0,
            #[cfg(feature = "metal")]
            metal: None,
            #[cfg(feature = "metal")]
            last_gpu_error: None,
            #[cfg(feature = "metal")]
            gpu_fallback_active: false,
        }
    }

    #[cfg(feature = "metal")]
    pub fn with_metal(backend: super::metal::MetalBackend) -> Self {
        let mut renderer = Self::new();
        renderer.metal = Some(backend);
        renderer
    }

    #[cfg(feature = "metal")]
    pub fn has_metal(&self) -> bool {
        self.metal.is_some()
    }

    /// Global splat scale control, settable at any time between frames.
    pub fn set_scaling(&mut self, scaling: f32) {
        self.scaling = scaling.clamp(0.0, 1.5);
    }

    pub fn scaling(&self) -> f32 {
        self.scaling
    }
}

impl Default for SplatRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for SplatRenderer {
    fn render(
        &mut self,
        scene: &PointCloud,
        camera: &Camera,
        target: &mut RenderState,
        timer: Option<&mut FrameTimer>,
    ) -> AppResult<FrameStats> {
        let width = target.width;
        let height = target.height;

        #[cfg(feature = "metal")]
        if !self.gpu_fallback_active {
            if let Some(backend) = self.metal.as_mut() {
                if backend.is_ready() {
                    match backend.render(camera, self.scaling, width, height) {
                        Ok(()) => {
                            backend.copy_framebuffer_into(&mut target.framebuffer);
                            if let Some(t) = timer {
                                t.gpu_ms = backend.last_gpu_time_ms();
                            }
                            return Ok(FrameStats {
                                visible_count: backend.last_visible_count() as usize,
                            });
                        }
                        Err(err) => {
                            if err.should_disable_gpu() {
                                self.gpu_fallback_active = true;
                            }
                            self.last_gpu_error = Some(err.to_string());
                        }
                    }
                }
            }
        }

        #[cfg(not(feature = "metal"))]
        let _ = timer;

        let mut visible_count = 0usize;
        pipeline::project_and_cull_splats(
            scene,
            &mut self.projected,
            camera,
            width,
            height,
            self.scaling,
            &mut visible_count,
        );
        sort_by_depth(&mut self.projected);
        rasterizer::rasterize_splats(&self.projected, target, width, height);

        Ok(FrameStats { visible_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::look_at_target;
    use crate::math::Vec3;
    use crate::splat::Splat;

    fn make_test_camera() -> Camera {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), -std::f32::consts::FRAC_PI_2, 0.0);
        look_at_target(&mut camera, Vec3::ZERO);
        camera
    }

    fn make_render_state(width: usize, height: usize) -> RenderState {
        RenderState {
            framebuffer: vec![[0, 0, 0]; width * height],
            alpha_buffer: vec![0.0; width * height],
            depth_buffer: vec![f32::INFINITY; width * height],
            width,
            height,
        }
    }

    #[test]
    fn cpu_frame_draws_a_centered_splat() {
        let scene = PointCloud::from_splats(vec![Splat {
            position: Vec3::ZERO,
            color: [255, 0, 0],
            opacity: 1.0,
            scale: Vec3::new(0.5, 0.5, 0.5),
            rotation: [1.0, 0.0, 0.0, 0.0],
        }]);
        let camera = make_test_camera();
        let mut target = make_render_state(64, 64);
        let mut renderer = SplatRenderer::new();

        let stats = renderer
            .render(&scene, &camera, &mut target, None)
            .expect("CPU render should succeed");
        assert_eq!(stats.visible_count, 1);

        let center = target.framebuffer[32 * 64 + 32];
        assert!(center[0] > 100, "center pixel was {center:?}");
    }

    #[test]
    fn empty_scene_renders_an_empty_valid_frame() {
        let scene = PointCloud::default();
        let camera = make_test_camera();
        let mut target = make_render_state(32, 32);
        let mut renderer = SplatRenderer::new();

        let stats = renderer
            .render(&scene, &camera, &mut target, None)
            .expect("empty render should succeed");
        assert_eq!(stats.visible_count, 0);
        assert!(target.framebuffer.iter().all(|&p| p == [0, 0, 0]));
    }

    #[test]
    fn zero_scaling_culls_everything() {
        let scene = PointCloud::from_splats(vec![Splat {
            position: Vec3::ZERO,
            color: [255, 255, 255],
            opacity: 1.0,
            scale: Vec3::new(0.5, 0.5, 0.5),
            rotation: [1.0, 0.0, 0.0, 0.0],
        }]);
        let camera = make_test_camera();
        let mut target = make_render_state(32, 32);
        let mut renderer = SplatRenderer::new();
        renderer.set_scaling(0.0);

        let stats = renderer
            .render(&scene, &camera, &mut target, None)
            .expect("render should succeed");
        assert_eq!(stats.visible_count, 0);
    }
}
