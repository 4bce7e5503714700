use std::sync::Arc;

use anyhow::Context;

use crate::compositor::request::PixelBuffer;
use crate::foundation::error::{CompositorError, CompositorResult};
use crate::foundation::math::{premultiply_rgba8_in_place, swap_red_blue};

#[derive(Clone, Debug)]
/// Decoded raster image in premultiplied RGBA8 form.
pub struct DecodedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl DecodedImage {
    /// Decode any format supported by the `image` crate.
    pub fn decode(bytes: &[u8]) -> CompositorResult<Self> {
        let dyn_img = ::image::load_from_memory(bytes).context("decode image from memory")?;
        let rgba = dyn_img.to_rgba8();
        let (width, height) = rgba.dimensions();

        let mut rgba8_premul = rgba.into_raw();
        premultiply_rgba8_in_place(&mut rgba8_premul);

        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba8_premul),
        })
    }

    /// Wrap already-premultiplied RGBA8 bytes.
    pub fn from_rgba8_premul(width: u32, height: u32, data: Vec<u8>) -> CompositorResult<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return Err(CompositorError::validation(format!(
                "image byte length {} does not match {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(data),
        })
    }

    /// Copy a packed BGRA source frame into RGBA order.
    pub fn from_pixel_buffer(buf: &PixelBuffer) -> CompositorResult<Self> {
        let mut rgba = vec![0u8; buf.data.len()];
        swap_red_blue(&buf.data, &mut rgba);
        Self::from_rgba8_premul(buf.width, buf.height, rgba)
    }

    /// Single-color image, mostly useful for tests and placeholders.
    pub fn solid(width: u32, height: u32, rgba8_premul: [u8; 4]) -> Self {
        let n = width as usize * height as usize;
        let mut data = Vec::with_capacity(n * 4);
        for _ in 0..n {
            data.extend_from_slice(&rgba8_premul);
        }
        Self {
            width,
            height,
            rgba8_premul: Arc::new(data),
        }
    }

    /// `(width, height)` as floats.
    pub fn size(&self) -> (f64, f64) {
        (f64::from(self.width), f64::from(self.height))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/image.rs"]
mod tests;
