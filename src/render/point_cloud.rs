use crate::camera::Camera;
use crate::scene::PointCloud;

use super::{AppResult, FrameStats, FrameTimer, RenderState, Renderer};

/// The unsorted fallback variant: every gaussian becomes a single pixel,
/// nearest depth wins, no blending and no sort. Shares the camera and scene
/// resources with the gaussian renderer but none of its pipeline.
#[derive(Debug, Default)]
pub struct PointCloudRenderer;

impl PointCloudRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for PointCloudRenderer {
    fn render(
        &mut self,
        scene: &PointCloud,
        camera: &Camera,
        target: &mut RenderState,
        _timer: Option<&mut FrameTimer>,
    ) -> AppResult<FrameStats> {
        let width = target.width;
        let height = target.height;
        if width == 0 || height == 0 {
            return Ok(FrameStats::default());
        }

        let (fx, fy) = camera.focal_lengths(width, height);
        let half_w = width as f32 * 0.5;
        let half_h = height as f32 * 0.5;
        let mut visible_count = 0usize;

        for splat in &scene.splats {
            let view_pos = camera.world_to_view(splat.position);
            if view_pos.z < camera.near || view_pos.z > camera.far {
                continue;
            }

            let inv_z = 1.0 / view_pos.z.max(1e-5);
            let screen_x = half_w + view_pos.x * fx * inv_z;
            let screen_y = half_h - view_pos.y * fy * inv_z;
            if !screen_x.is_finite() || !screen_y.is_finite() {
                continue;
            }

            let x = screen_x.floor();
            let y = screen_y.floor();
            if x < 0.0 || y < 0.0 || x >= width as f32 || y >= height as f32 {
                continue;
            }
            visible_count += 1;

            let idx = y as usize * width + x as usize;
            if view_pos.z < target.depth_buffer[idx] {
                target.depth_buffer[idx] = view_pos.z;
                target.framebuffer[idx] = splat.color;
            }
        }

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

    fn splat_at(position: Vec3, color: [u8; 3]) -> Splat {
        Splat {
            position,
            color,
            opacity: 1.0,
            scale: Vec3::new(0.1, 0.1, 0.1),
            rotation: [1.0, 0.0, 0.0, 0.0],
        }
    }

    #[test]
    fn nearest_point_wins_the_pixel() {
        // Same line of sight: red sits closer to the camera at z=5.
        let scene = PointCloud::from_splats(vec![
            splat_at(Vec3::new(0.0, 0.0, -1.0), [0, 0, 255]),
            splat_at(Vec3::new(0.0, 0.0, 1.0), [255, 0, 0]),
        ]);
        let camera = make_test_camera();
        let mut target = make_render_state(33, 33);

        let stats = PointCloudRenderer::new()
            .render(&scene, &camera, &mut target, None)
            .expect("render should succeed");
        assert_eq!(stats.visible_count, 2);

        let colored: Vec<[u8; 3]> = target
            .framebuffer
            .iter()
            .copied()
            .filter(|&p| p != [0, 0, 0])
            .collect();
        assert_eq!(colored, vec![[255, 0, 0]]);
    }

    #[test]
    fn behind_camera_points_are_skipped() {
        let scene = PointCloud::from_splats(vec![splat_at(Vec3::new(0.0, 0.0, 20.0), [255; 3])]);
        let camera = make_test_camera();
        let mut target = make_render_state(16, 16);

        let stats = PointCloudRenderer::new()
            .render(&scene, &camera, &mut target, None)
            .expect("render should succeed");
        assert_eq!(stats.visible_count, 0);
        assert!(target.framebuffer.iter().all(|&p| p == [0, 0, 0]));
    }
}
