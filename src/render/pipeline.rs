use crate::camera::Camera;
use crate::scene::PointCloud;
use crate::sh;
use crate::splat::{
    compute_2d_axes, compute_3d_covariance, invert_2x2_covariance, project_covariance_to_2d,
    ProjectedSplat, GAUSSIAN_SIGMA_CUTOFF, MIN_SPLAT_RADIUS,
};
use rayon::prelude::*;

// --- Framebuffer ---

pub fn resize_render_state(render_state: &mut super::RenderState, width: usize, height: usize) {
    if render_state.width == width && render_state.height == height {
        return;
    }

    render_state.width = width;
    render_state.height = height;
    let len = width.saturating_mul(height);
    render_state.framebuffer.resize(len, [0, 0, 0]);
    render_state.alpha_buffer.resize(len, 0.0);
    render_state.depth_buffer.resize(len, f32::INFINITY);
}

pub fn clear_framebuffer(render_state: &mut super::RenderState) {
    render_state.framebuffer.fill([0, 0, 0]);
    render_state.alpha_buffer.fill(0.0);
    render_state.depth_buffer.fill(f32::INFINITY);
}

// --- Projection ---

/// Project every candidate gaussian into a screen-space splat, rejecting the
/// ones that fail the culling chain. Each candidate is independent; the
/// visible count is re-derived from scratch every call. The Metal preprocess
/// kernel implements the same chain with an atomic slot counter standing in
/// for the collect.
pub fn project_and_cull_splats(
    scene: &PointCloud,
    projected_splats: &mut Vec<ProjectedSplat>,
    camera: &Camera,
    screen_width: usize,
    screen_height: usize,
    scaling: f32,
    visible_count: &mut usize,
) {
    let (fx, fy) = camera.focal_lengths(screen_width, screen_height);
    let half_w = screen_width as f32 * 0.5;
    let half_h = screen_height as f32 * 0.5;
    let sw = screen_width as f32;
    let sh_px = screen_height as f32;
    let degree = scene.sh_degree;

    let result: Vec<ProjectedSplat> = scene
        .splats
        .par_iter()
        .enumerate()
        .filter_map(|(i, splat)| {
            let view_pos = camera.world_to_view(splat.position);
            if view_pos.z < camera.near || view_pos.z > camera.far {
                return None;
            }

            let inv_z = 1.0 / view_pos.z.max(1e-5);
            let screen_x = half_w + view_pos.x * fx * inv_z;
            let screen_y = half_h - view_pos.y * fy * inv_z;

            if !screen_x.is_finite() || !screen_y.is_finite() {
                return None;
            }

            const BROAD_MARGIN: f32 = 120.0;
            if screen_x < -BROAD_MARGIN
                || screen_x > sw + BROAD_MARGIN
                || screen_y < -BROAD_MARGIN
                || screen_y > sh_px + BROAD_MARGIN
            {
                return None;
            }

            let cov_3d = compute_3d_covariance(splat.scale * scaling, splat.rotation);
            let (cov_a, cov_b, cov_c) = project_covariance_to_2d(cov_3d, camera, view_pos, fx, fy);

            if cov_a <= 0.0 || cov_c <= 0.0 {
                return None;
            }

            // Collapsed ellipses (non-positive determinant or eigenvalue)
            // cull here, exactly as the quad-expansion path does.
            let (axis1, _) = compute_2d_axes(cov_a, cov_b, cov_c)?;
            let radius =
                GAUSSIAN_SIGMA_CUTOFF * (axis1[0] * axis1[0] + axis1[1] * axis1[1]).sqrt();
            let (radius_x, radius_y) = (radius, radius);
            if radius_x < MIN_SPLAT_RADIUS || radius_y < MIN_SPLAT_RADIUS {
                return None;
            }

            if screen_x + radius_x < 0.0
                || screen_x - radius_x > sw
                || screen_y + radius_y < 0.0
                || screen_y - radius_y > sh_px
            {
                return None;
            }

            let (inv_cov_a, inv_cov_b, inv_cov_c) = invert_2x2_covariance(cov_a, cov_b, cov_c)?;

            let view_dir = (splat.position - camera.position).normalize();
            let rgb = sh::eval_sh_color(scene.sh_for(i), degree, view_dir);
            let color = [
                (rgb[0] * 255.0).clamp(0.0, 255.0) as u8,
                (rgb[1] * 255.0).clamp(0.0, 255.0) as u8,
                (rgb[2] * 255.0).clamp(0.0, 255.0) as u8,
            ];

            Some(ProjectedSplat {
                screen_x,
                screen_y,
                depth: view_pos.z,
                radius_x,
                radius_y,
                color,
                opacity: splat.opacity,
                inv_cov_a,
                inv_cov_b,
                inv_cov_c,
                original_index: i,
            })
        })
        .collect();

    *visible_count = result.len();
    *projected_splats = result;
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

    fn splat_at(position: Vec3, scale: f32) -> Splat {
        Splat {
            position,
            color: [200, 100, 50],
            opacity: 0.9,
            scale: Vec3::new(scale, scale, scale),
            rotation: [1.0, 0.0, 0.0, 0.0],
        }
    }

    fn project(scene: &PointCloud) -> (Vec<ProjectedSplat>, usize) {
        let camera = make_test_camera();
        let mut projected = Vec::new();
        let mut visible = 0usize;
        project_and_cull_splats(scene, &mut projected, &camera, 128, 128, 1.0, &mut visible);
        (projected, visible)
    }

    #[test]
    fn visible_count_is_bounded_by_total() {
        let scene = PointCloud::from_splats(vec![
            splat_at(Vec3::ZERO, 0.3),
            splat_at(Vec3::new(0.5, 0.0, 0.0), 0.3),
            splat_at(Vec3::new(0.0, 0.0, 100.0), 0.3), // behind the camera
        ]);
        let (projected, visible) = project(&scene);
        assert_eq!(projected.len(), visible);
        assert!(visible <= scene.len());
        assert_eq!(visible, 2);
    }

    #[test]
    fn behind_camera_gaussians_are_rejected() {
        let scene = PointCloud::from_splats(vec![splat_at(Vec3::new(0.0, 0.0, 20.0), 0.3)]);
        let (_, visible) = project(&scene);
        assert_eq!(visible, 0);
    }

    #[test]
    fn all_culled_matches_empty_input() {
        let empty = PointCloud::default();
        let (projected_empty, visible_empty) = project(&empty);

        let culled = PointCloud::from_splats(vec![
            splat_at(Vec3::new(0.0, 0.0, 20.0), 0.3),
            splat_at(Vec3::new(0.0, 0.0, 30.0), 0.3),
        ]);
        let (projected_culled, visible_culled) = project(&culled);

        assert_eq!(visible_empty, 0);
        assert_eq!(visible_culled, 0);
        assert_eq!(projected_empty.len(), projected_culled.len());
    }

    #[test]
    fn degenerate_footprint_is_excluded() {
        // Sub-pixel covariance collapses below the minimum splat radius.
        let scene = PointCloud::from_splats(vec![splat_at(Vec3::ZERO, 1e-6)]);
        let (_, visible) = project(&scene);
        assert_eq!(visible, 0);
    }

    #[test]
    fn original_indices_address_the_source_set() {
        let scene = PointCloud::from_splats(vec![
            splat_at(Vec3::new(0.0, 0.0, 100.0), 0.3), // culled
            splat_at(Vec3::ZERO, 0.3),
        ]);
        let (projected, _) = project(&scene);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected[0].original_index, 1);
    }
}
