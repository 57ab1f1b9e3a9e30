use std::mem;

use metal::{MTLSize, NSRange};

use super::sort::dispatch_1d;
use super::types::THREADS_PER_GROUP_1D;
use super::MetalBackend;

impl MetalBackend {
    /// Encode the per-frame front half: clear the transient counters, run
    /// the preprocess kernel over every candidate gaussian, derive the sort
    /// dispatch size on-device, and publish the visible count as the
    /// indirect draw's instance count. No host readback anywhere.
    pub(super) fn encode_preprocess(&self, command_buffer: &metal::CommandBufferRef) {
        let blit = command_buffer.new_blit_command_encoder();
        blit.fill_buffer(
            &self.sort_info_buffer,
            NSRange::new(0, mem::size_of::<u32>() as u64),
            0,
        );
        blit.fill_buffer(
            &self.sort_dispatch_buffer,
            NSRange::new(0, 3 * mem::size_of::<u32>() as u64),
            0,
        );
        blit.end_encoding();

        let encoder = command_buffer.new_compute_command_encoder();
        encoder.set_compute_pipeline_state(&self.preprocess_pipeline);
        encoder.set_buffer(0, Some(&self.gaussian_buffer), 0);
        encoder.set_buffer(1, Some(&self.sh_buffer), 0);
        encoder.set_buffer(2, Some(&self.camera_buffer), 0);
        encoder.set_buffer(3, Some(&self.settings_buffer), 0);
        encoder.set_buffer(4, Some(&self.splat_buffer), 0);
        encoder.set_buffer(5, Some(&self.sort_info_buffer), 0);
        encoder.set_buffer(6, Some(&self.sort_keys[0]), 0);
        encoder.set_buffer(7, Some(&self.sort_indices[0]), 0);
        dispatch_1d(encoder, self.uploaded_count, THREADS_PER_GROUP_1D);
        encoder.end_encoding();

        // One thread turns the visible count into threadgroup counts for the
        // sort's indirect dispatches.
        let encoder = command_buffer.new_compute_command_encoder();
        encoder.set_compute_pipeline_state(&self.sort_dispatch_pipeline);
        encoder.set_buffer(0, Some(&self.sort_info_buffer), 0);
        encoder.set_buffer(1, Some(&self.sort_dispatch_buffer), 0);
        encoder.dispatch_thread_groups(MTLSize::new(1, 1, 1), MTLSize::new(1, 1, 1));
        encoder.end_encoding();

        // instance_count sits at offset 4 of the draw-argument record.
        let blit = command_buffer.new_blit_command_encoder();
        blit.copy_from_buffer(
            &self.sort_info_buffer,
            0,
            &self.draw_args_buffer,
            mem::size_of::<u32>() as u64,
            mem::size_of::<u32>() as u64,
        );
        blit.end_encoding();
    }
}
