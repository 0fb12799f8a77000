//! Image codecs for captured frames.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::util::{Error, Result};

/// Turns staged RGBA8 pixels into file bytes.
pub trait FrameEncoder: Send + Sync {
    /// File extension without the dot.
    fn extension(&self) -> &str;

    /// Encode `rgba` (tightly packed, `width * height * 4` bytes) into `out`.
    fn encode(&self, rgba: &[u8], width: u32, height: u32, out: &mut Vec<u8>) -> Result<()>;
}

/// PNG via the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngFrameEncoder;

impl FrameEncoder for PngFrameEncoder {
    fn extension(&self) -> &str {
        "png"
    }

    fn encode(&self, rgba: &[u8], width: u32, height: u32, out: &mut Vec<u8>) -> Result<()> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(Error::other(format!(
                "staging buffer has {} bytes, expected {expected} for {width}x{height}",
                rgba.len()
            )));
        }
        out.clear();
        PngEncoder::new(&mut *out).write_image(rgba, width, height, ExtendedColorType::Rgba8)?;
        Ok(())
    }
}
