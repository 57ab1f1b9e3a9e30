use crate::math::clamp_u8;
use crate::splat::{
    evaluate_2d_gaussian, ProjectedSplat, MIN_GAUSSIAN_CONTRIBUTION, SATURATION_EPSILON,
};
use rayon::prelude::*;

// --- Rasterizer ---

pub fn blend_component(existing: u8, new: u8, weight: f32) -> u8 {
    clamp_u8(existing as f32 + new as f32 * weight)
}

/// Composite sorted splats into the framebuffer. The input arrives in draw
/// order (farthest first); each band bins in reverse and walks nearest-first
/// with transmittance weighting, which produces the same image as
/// back-to-front `over` blending but can stop once a pixel saturates.
pub fn rasterize_splats(
    projected_splats: &[ProjectedSplat],
    render_state: &mut super::RenderState,
    width: usize,
    height: usize,
) {
    if width == 0 || height == 0 || projected_splats.is_empty() {
        return;
    }

    let num_bands = rayon::current_num_threads();
    let band_height = height.div_ceil(num_bands);
    let actual_bands = height.div_ceil(band_height);

    // Phase 1: Pre-bin splat indices into bands.
    // Each splat goes into every band its bounding box overlaps.
    // Uses per-band Vec to avoid synchronization.
    let mut bins: Vec<Vec<usize>> = vec![Vec::new(); actual_bands];
    for (si, splat) in projected_splats.iter().enumerate().rev() {
        let splat_min_y = (splat.screen_y - splat.radius_y).floor().max(0.0) as usize;
        let splat_max_y = (splat.screen_y + splat.radius_y)
            .ceil()
            .min(height.saturating_sub(1) as f32) as usize;

        let band_start = splat_min_y / band_height;
        let band_end = (splat_max_y / band_height).min(actual_bands - 1);
        for bin in &mut bins[band_start..=band_end] {
            bin.push(si);
        }
    }

    // Phase 2: Parallel rasterization -- each band processes only its binned splats.
    let fb_chunks: Vec<&mut [[u8; 3]]> = render_state
        .framebuffer
        .chunks_mut(band_height * width)
        .collect();
    let alpha_chunks: Vec<&mut [f32]> = render_state
        .alpha_buffer
        .chunks_mut(band_height * width)
        .collect();
    let depth_chunks: Vec<&mut [f32]> = render_state
        .depth_buffer
        .chunks_mut(band_height * width)
        .collect();

    fb_chunks
        .into_par_iter()
        .zip(alpha_chunks.into_par_iter())
        .zip(depth_chunks.into_par_iter())
        .zip(bins.par_iter())
        .enumerate()
        .for_each(|(band_idx, (((fb_band, alpha_band), depth_band), bin))| {
            let y_start = band_idx * band_height;
            let band_rows = fb_band.len() / width;
            let y_end = y_start + band_rows;

            for &si in bin {
                let splat = &projected_splats[si];

                let min_x = (splat.screen_x - splat.radius_x).floor().max(0.0) as usize;
                let max_x = (splat.screen_x + splat.radius_x)
                    .ceil()
                    .min((width.saturating_sub(1)) as f32) as usize;
                let min_y = (splat.screen_y - splat.radius_y)
                    .floor()
                    .max(y_start as f32) as usize;
                let max_y = (splat.screen_y + splat.radius_y)
                    .ceil()
                    .min((y_end - 1) as f32) as usize;

                if min_x > max_x || min_y > max_y {
                    continue;
                }

                let inv_cov_a = splat.inv_cov_a;
                let inv_cov_b = splat.inv_cov_b;
                let inv_cov_c = splat.inv_cov_c;

                for y in min_y..=max_y {
                    let local_y = y - y_start;
                    let row = local_y * width;
                    for x in min_x..=max_x {
                        let idx = row + x;
                        let existing_alpha = alpha_band[idx];
                        if existing_alpha >= SATURATION_EPSILON {
                            continue;
                        }

                        let dx = x as f32 + 0.5 - splat.screen_x;
                        let dy = y as f32 + 0.5 - splat.screen_y;
                        let gaussian =
                            evaluate_2d_gaussian(dx, dy, inv_cov_a, inv_cov_b, inv_cov_c);

                        if gaussian < MIN_GAUSSIAN_CONTRIBUTION {
                            continue;
                        }

                        let alpha = splat.opacity * gaussian;
                        if alpha <= 0.0 {
                            continue;
                        }

                        let weight = alpha * (1.0 - existing_alpha);
                        if weight < 1e-4 {
                            continue;
                        }

                        let pixel = &mut fb_band[idx];
                        pixel[0] = blend_component(pixel[0], splat.color[0], weight);
                        pixel[1] = blend_component(pixel[1], splat.color[1], weight);
                        pixel[2] = blend_component(pixel[2], splat.color[2], weight);

                        let new_alpha = (existing_alpha + weight).min(1.0);
                        alpha_band[idx] = new_alpha;
                        if new_alpha >= SATURATION_EPSILON {
                            depth_band[idx] = splat.depth;
                        }
                    }
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderState;

    fn make_render_state(width: usize, height: usize) -> RenderState {
        RenderState {
            framebuffer: vec![[0, 0, 0]; width * height],
            alpha_buffer: vec![0.0; width * height],
            depth_buffer: vec![f32::INFINITY; width * height],
            width,
            height,
        }
    }

    fn centered_splat(depth: f32, color: [u8; 3], opacity: f32) -> ProjectedSplat {
        ProjectedSplat {
            screen_x: 8.0,
            screen_y: 8.0,
            depth,
            radius_x: 4.0,
            radius_y: 4.0,
            color,
            opacity,
            inv_cov_a: 0.5,
            inv_cov_b: 0.0,
            inv_cov_c: 0.5,
            original_index: 0,
        }
    }

    #[test]
    fn single_splat_colors_its_center() {
        let mut rs = make_render_state(16, 16);
        rasterize_splats(&[centered_splat(2.0, [250, 0, 0], 1.0)], &mut rs, 16, 16);
        let center = rs.framebuffer[8 * 16 + 8];
        assert!(center[0] > 200, "center red channel was {}", center[0]);
        assert_eq!(center[1], 0);
    }

    #[test]
    fn near_splat_dominates_far_splat() {
        // Draw order is farthest-first: far blue, then near red.
        let splats = [
            centered_splat(5.0, [0, 0, 250], 1.0),
            centered_splat(1.0, [250, 0, 0], 1.0),
        ];
        let mut rs = make_render_state(16, 16);
        rasterize_splats(&splats, &mut rs, 16, 16);
        let center = rs.framebuffer[8 * 16 + 8];
        assert!(
            center[0] > center[2],
            "near red {} should dominate far blue {}",
            center[0],
            center[2]
        );
    }

    #[test]
    fn empty_input_leaves_framebuffer_black() {
        let mut rs = make_render_state(8, 8);
        rasterize_splats(&[], &mut rs, 8, 8);
        assert!(rs.framebuffer.iter().all(|&p| p == [0, 0, 0]));
    }
}
