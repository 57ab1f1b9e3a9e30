use metal::{
    MTLBlitOption, MTLClearColor, MTLLoadAction, MTLOrigin, MTLPrimitiveType, MTLSize,
    MTLStoreAction, RenderPassDescriptor,
};

use super::error::MetalRenderError;
use super::MetalBackend;

impl MetalBackend {
    /// Encode the render pass: one indirect draw whose instance count lives
    /// in the draw-argument buffer, expanding each sorted splat into a
    /// blended billboard quad, then blit the target into the readback
    /// buffer for the terminal presenter.
    pub(super) fn encode_draw(
        &self,
        command_buffer: &metal::CommandBufferRef,
        width: usize,
        height: usize,
    ) -> Result<(), MetalRenderError> {
        let descriptor = RenderPassDescriptor::new();
        let attachment = descriptor
            .color_attachments()
            .object_at(0)
            .ok_or_else(|| MetalRenderError::Other("missing render pass attachment".to_string()))?;
        attachment.set_texture(Some(&self.target_texture));
        attachment.set_load_action(MTLLoadAction::Clear);
        attachment.set_clear_color(MTLClearColor::new(0.0, 0.0, 0.0, 0.0));
        attachment.set_store_action(MTLStoreAction::Store);

        let encoder = command_buffer.new_render_command_encoder(&descriptor);
        encoder.set_render_pipeline_state(&self.draw_pipeline);
        encoder.set_vertex_buffer(0, Some(&self.splat_buffer), 0);
        encoder.set_vertex_buffer(1, Some(&self.sort_indices[0]), 0);
        encoder.set_vertex_buffer(2, Some(&self.camera_buffer), 0);
        encoder.draw_primitives_indirect(MTLPrimitiveType::Triangle, &self.draw_args_buffer, 0);
        encoder.end_encoding();

        let bytes_per_row = width
            .checked_mul(4)
            .ok_or_else(|| MetalRenderError::Other("readback row size overflow".to_string()))?
            as u64;
        let blit = command_buffer.new_blit_command_encoder();
        blit.copy_from_texture_to_buffer(
            &self.target_texture,
            0,
            0,
            MTLOrigin { x: 0, y: 0, z: 0 },
            MTLSize::new(width as u64, height as u64, 1),
            &self.readback_buffer,
            0,
            bytes_per_row,
            0,
            MTLBlitOption::empty(),
        );
        blit.end_encoding();

        Ok(())
    }
}
