use std::mem;

use metal::{Device, MTLPixelFormat, MTLStorageMode, MTLTextureUsage, Texture, TextureDescriptor};

use super::error::MetalRenderError;
use super::pipeline::new_shared_buffer;
use super::MetalBackend;

impl MetalBackend {
    /// Recreate the render target and its readback buffer when the
    /// presentation size changes. Everything else is fixed at `max_splats`
    /// capacity from construction.
    pub(super) fn ensure_target_capacity(
        &mut self,
        width: usize,
        height: usize,
    ) -> Result<(), MetalRenderError> {
        if width == self.target_width && height == self.target_height {
            return Ok(());
        }

        let pixels = width
            .checked_mul(height)
            .ok_or_else(|| MetalRenderError::Other("target pixel count overflow".to_string()))?;
        let bytes = pixels
            .checked_mul(mem::size_of::<u32>())
            .ok_or_else(|| MetalRenderError::Other("readback size overflow".to_string()))?;

        self.target_texture = make_target_texture(&self.device, width, height);
        self.readback_buffer = new_shared_buffer(&self.device, bytes);
        self.target_width = width;
        self.target_height = height;
        Ok(())
    }

    /// Packed RGBA pixels of the most recent completed frame.
    pub fn framebuffer_slice(&self) -> &[u32] {
        let pixel_count = self.target_width.saturating_mul(self.target_height);
        if pixel_count == 0 {
            return &[];
        }

        let src = self.readback_buffer.contents() as *const u32;
        unsafe { std::slice::from_raw_parts(src, pixel_count) }
    }

    /// Unpack the readback image into the shared pixel target.
    pub fn copy_framebuffer_into(&self, framebuffer: &mut [[u8; 3]]) {
        for (dst, &packed) in framebuffer.iter_mut().zip(self.framebuffer_slice()) {
            *dst = [
                (packed & 0xFF) as u8,
                ((packed >> 8) & 0xFF) as u8,
                ((packed >> 16) & 0xFF) as u8,
            ];
        }
    }
}

pub(super) fn bytes_for_u32_elems(count: usize) -> Result<usize, MetalRenderError> {
    count
        .checked_mul(mem::size_of::<u32>())
        .ok_or_else(|| MetalRenderError::Other("buffer size overflow".to_string()))
}

pub(super) fn make_target_texture(device: &Device, width: usize, height: usize) -> Texture {
    let descriptor = TextureDescriptor::new();
    descriptor.set_pixel_format(MTLPixelFormat::RGBA8Unorm);
    descriptor.set_width(width.max(1) as u64);
    descriptor.set_height(height.max(1) as u64);
    descriptor.set_usage(MTLTextureUsage::RenderTarget);
    descriptor.set_storage_mode(MTLStorageMode::Private);
    device.new_texture(&descriptor)
}
