use std::time::Duration;

use objc::rc::autoreleasepool;

use crate::camera::Camera;

use super::error::MetalRenderError;
use super::pipeline::{read_shared_u32, write_shared_struct};
use super::sync::{commit_and_wait_or_disable_gpu, gpu_time_ms};
use super::types::{GpuCameraData, RenderSettings};
use super::MetalBackend;

const GPU_WAIT_TIMEOUT: Duration = Duration::from_millis(500);

impl MetalBackend {
    /// Render one frame. The whole frame is a single command buffer --
    /// preprocess, dispatch sizing, four sort passes, indirect draw,
    /// presentation blit -- so the only wait is for the finished image.
    pub fn render(
        &mut self,
        camera: &Camera,
        scaling: f32,
        screen_width: usize,
        screen_height: usize,
    ) -> Result<(), MetalRenderError> {
        autoreleasepool(|| {
            if self.gpu_disabled {
                return Err(MetalRenderError::GpuDisabled);
            }

            if !self.splats_uploaded {
                return Err("No splats uploaded to Metal backend".into());
            }

            if screen_width == 0 || screen_height == 0 {
                self.target_width = screen_width;
                self.target_height = screen_height;
                return Ok(());
            }

            self.ensure_target_capacity(screen_width, screen_height)?;

            let (fx, fy) = camera.focal_lengths(screen_width, screen_height);
            let gpu_camera = GpuCameraData {
                pos_x: camera.position.x,
                pos_y: camera.position.y,
                pos_z: camera.position.z,
                right_x: camera.right.x,
                right_y: camera.right.y,
                right_z: camera.right.z,
                up_x: camera.up.x,
                up_y: camera.up.y,
                up_z: camera.up.z,
                forward_x: camera.forward.x,
                forward_y: camera.forward.y,
                forward_z: camera.forward.z,
                fx,
                fy,
                half_w: screen_width as f32 * 0.5,
                half_h: screen_height as f32 * 0.5,
                near_plane: camera.near,
                far_plane: camera.far,
            };
            write_shared_struct(&self.camera_buffer, &gpu_camera);
            write_shared_struct(
                &self.settings_buffer,
                &RenderSettings {
                    splat_scale: scaling,
                    sh_degree: self.sh_degree,
                    sh_coeff_count: self.sh_coeff_count,
                    gaussian_count: self.uploaded_count,
                },
            );

            let command_buffer = self.command_queue.new_command_buffer();
            self.encode_preprocess(command_buffer);
            self.encode_radix_sort(command_buffer)?;
            self.encode_draw(command_buffer, screen_width, screen_height)?;
            commit_and_wait_or_disable_gpu(
                command_buffer,
                "frame",
                GPU_WAIT_TIMEOUT,
                &mut self.gpu_disabled,
            )?;

            self.last_gpu_time_ms = gpu_time_ms(command_buffer);
            self.last_visible_count = read_shared_u32(&self.sort_info_buffer);
            Ok(())
        })
    }
}
