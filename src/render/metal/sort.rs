use metal::{MTLSize, NSRange};

use super::buffers::bytes_for_u32_elems;
use super::error::MetalRenderError;
use super::pipeline::set_bytes_u32;
use super::types::{RADIX_BUCKETS, RADIX_PASSES, SORT_BLOCK_SIZE};
use super::MetalBackend;

pub fn div_ceil_u32(value: u32, divisor: u32) -> u32 {
    value.div_ceil(divisor)
}

pub fn dispatch_1d(encoder: &metal::ComputeCommandEncoderRef, count: u32, threads_per_group: u32) {
    if count == 0 {
        return;
    }

    let groups = u64::from(div_ceil_u32(count, threads_per_group));
    encoder.dispatch_thread_groups(
        MTLSize::new(groups, 1, 1),
        MTLSize::new(u64::from(threads_per_group), 1, 1),
    );
}

impl MetalBackend {
    /// Encode the four radix passes. The element count is only known on the
    /// device, so histogram and scatter read their threadgroup counts from
    /// the dispatch-size buffer at execution time; the scan is a single
    /// fixed threadgroup that loops over the histogram table. Pairs
    /// ping-pong between the two buffer sets and, with an even pass count,
    /// finish back in set 0 for the draw stage.
    pub(super) fn encode_radix_sort(
        &self,
        command_buffer: &metal::CommandBufferRef,
    ) -> Result<(), MetalRenderError> {
        let histogram_count = self
            .max_blocks
            .checked_mul(RADIX_BUCKETS as usize)
            .ok_or_else(|| MetalRenderError::Other("histogram count overflow".to_string()))?;
        let histogram_bytes = bytes_for_u32_elems(histogram_count)? as u64;
        let threads = MTLSize::new(u64::from(SORT_BLOCK_SIZE), 1, 1);

        let mut keys_in_a = true;
        for pass in 0..RADIX_PASSES {
            let bit_shift = pass * 8;

            let blit = command_buffer.new_blit_command_encoder();
            blit.fill_buffer(&self.histogram_buffer, NSRange::new(0, histogram_bytes), 0);
            blit.end_encoding();

            let (keys_in, indices_in, keys_out, indices_out) = if keys_in_a {
                (
                    &self.sort_keys[0],
                    &self.sort_indices[0],
                    &self.sort_keys[1],
                    &self.sort_indices[1],
                )
            } else {
                (
                    &self.sort_keys[1],
                    &self.sort_indices[1],
                    &self.sort_keys[0],
                    &self.sort_indices[0],
                )
            };

            let encoder = command_buffer.new_compute_command_encoder();
            encoder.set_compute_pipeline_state(&self.histogram_pipeline);
            encoder.set_buffer(0, Some(keys_in), 0);
            encoder.set_buffer(1, Some(&self.histogram_buffer), 0);
            encoder.set_buffer(2, Some(&self.sort_info_buffer), 0);
            encoder.set_buffer(3, Some(&self.sort_dispatch_buffer), 0);
            set_bytes_u32(encoder, 4, bit_shift);
            encoder.dispatch_thread_groups_indirect(&self.sort_dispatch_buffer, 0, threads);
            encoder.end_encoding();

            let encoder = command_buffer.new_compute_command_encoder();
            encoder.set_compute_pipeline_state(&self.scan_pipeline);
            encoder.set_buffer(0, Some(&self.histogram_buffer), 0);
            encoder.set_buffer(1, Some(&self.sort_dispatch_buffer), 0);
            encoder.dispatch_thread_groups(MTLSize::new(1, 1, 1), threads);
            encoder.end_encoding();

            let encoder = command_buffer.new_compute_command_encoder();
            encoder.set_compute_pipeline_state(&self.scatter_pipeline);
            encoder.set_buffer(0, Some(keys_in), 0);
            encoder.set_buffer(1, Some(indices_in), 0);
            encoder.set_buffer(2, Some(keys_out), 0);
            encoder.set_buffer(3, Some(indices_out), 0);
            encoder.set_buffer(4, Some(&self.histogram_buffer), 0);
            encoder.set_buffer(5, Some(&self.sort_info_buffer), 0);
            encoder.set_buffer(6, Some(&self.sort_dispatch_buffer), 0);
            set_bytes_u32(encoder, 7, bit_shift);
            encoder.dispatch_thread_groups_indirect(&self.sort_dispatch_buffer, 0, threads);
            encoder.end_encoding();

            keys_in_a = !keys_in_a;
        }

        debug_assert!(keys_in_a, "even pass count must land pairs back in set 0");
        Ok(())
    }
}
