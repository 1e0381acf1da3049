use crate::codec::{PixelCodec, codec_for};
use crate::error::{Error, Result};
use crate::sys;
use crate::types::{DecodedImage, PixelFormat};
use std::ffi::c_int;

/// Stateful WebP decoder producing packed RGBA or RGB pixels.
pub struct Decoder {
    format: PixelFormat,
    codec: Option<&'static dyn PixelCodec>,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            format: PixelFormat::default(),
            codec: None,
        }
    }

    /// Output format used by the next [`Decoder::init`]. Never fails.
    pub fn set_output_pixel_format(&mut self, format: PixelFormat) {
        self.format = format;
    }

    pub fn output_pixel_format(&self) -> PixelFormat {
        self.format
    }

    /// Bind the decode codec for the current output format.
    pub fn init(&mut self) {
        self.codec = Some(codec_for(self.format));
    }

    pub fn is_initialized(&self) -> bool {
        self.codec.is_some()
    }

    /// Decode a complete WebP bitstream. The returned pixels belong to the caller.
    pub fn decode(&self, data: &[u8]) -> Result<DecodedImage> {
        let codec = self.codec.ok_or(Error::NotInitialized)?;
        codec.decode(data)
    }

    /// Width and height from the bitstream header, without decoding pixels.
    pub fn probe(data: &[u8]) -> Result<(u32, u32)> {
        if data.is_empty() {
            return Err(Error::EmptyInput);
        }
        let mut width: c_int = 0;
        let mut height: c_int = 0;
        // SAFETY: libwebp reads at most data.len() bytes.
        let ok = unsafe { sys::WebPGetInfo(data.as_ptr(), data.len(), &mut width, &mut height) };
        if ok == 0 || width <= 0 || height <= 0 {
            return Err(Error::invalid_buffer("not a WebP header"));
        }
        Ok((width as u32, height as u32))
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
