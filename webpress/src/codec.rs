//! Per-format codec capability.
//!
//! Each [`PixelFormat`] maps to one [`PixelCodec`] implementation that knows
//! the matching libwebp entry points. [`codec_for`] is the only place that
//! maps formats to codecs.

use crate::error::{Error, Result};
use crate::picture::{Picture, to_c_int};
use crate::sys;
use crate::types::{DecodedImage, EncodedBuffer, PixelBuffer, PixelFormat};
use std::ffi::{c_int, c_void};
use std::ptr::{self, NonNull};

/// Encode/decode capability for one pixel format.
pub trait PixelCodec: Send + Sync {
    fn format(&self) -> PixelFormat;

    /// One-shot lossy encode at `quality` (0-100).
    fn encode(&self, pixels: &PixelBuffer<'_>, quality: f32) -> Result<EncodedBuffer>;

    /// One-shot lossless encode.
    fn encode_lossless(&self, pixels: &PixelBuffer<'_>) -> Result<EncodedBuffer>;

    fn decode(&self, data: &[u8]) -> Result<DecodedImage>;

    /// Copy `pixels` into a libwebp picture for the full pipeline.
    fn import(&self, picture: &mut Picture, pixels: &PixelBuffer<'_>) -> Result<()>;
}

/// Select the codec for `format`.
pub fn codec_for(format: PixelFormat) -> &'static dyn PixelCodec {
    match format {
        PixelFormat::Rgba => &Rgba8,
        PixelFormat::Rgb => &Rgb8,
    }
}

/// RGBA, 4 bytes per pixel.
#[derive(Debug, Copy, Clone, Default)]
pub struct Rgba8;

/// RGB, 3 bytes per pixel.
#[derive(Debug, Copy, Clone, Default)]
pub struct Rgb8;

impl PixelCodec for Rgba8 {
    fn format(&self) -> PixelFormat {
        PixelFormat::Rgba
    }

    fn encode(&self, pixels: &PixelBuffer<'_>, quality: f32) -> Result<EncodedBuffer> {
        let entry = EncodeEntry::Lossy(sys::WebPEncodeRGBA, quality);
        encode_with(self.format(), entry, pixels)
    }

    fn encode_lossless(&self, pixels: &PixelBuffer<'_>) -> Result<EncodedBuffer> {
        let entry = EncodeEntry::Lossless(sys::WebPEncodeLosslessRGBA);
        encode_with(self.format(), entry, pixels)
    }

    fn decode(&self, data: &[u8]) -> Result<DecodedImage> {
        decode_with(self.format(), sys::WebPDecodeRGBA, data)
    }

    fn import(&self, picture: &mut Picture, pixels: &PixelBuffer<'_>) -> Result<()> {
        pixels.expect_format(self.format())?;
        picture.import_with(
            self.format(),
            sys::WebPPictureImportRGBA,
            pixels.data(),
            pixels.stride(),
        )
    }
}

impl PixelCodec for Rgb8 {
    fn format(&self) -> PixelFormat {
        PixelFormat::Rgb
    }

    fn encode(&self, pixels: &PixelBuffer<'_>, quality: f32) -> Result<EncodedBuffer> {
        let entry = EncodeEntry::Lossy(sys::WebPEncodeRGB, quality);
        encode_with(self.format(), entry, pixels)
    }

    fn encode_lossless(&self, pixels: &PixelBuffer<'_>) -> Result<EncodedBuffer> {
        let entry = EncodeEntry::Lossless(sys::WebPEncodeLosslessRGB);
        encode_with(self.format(), entry, pixels)
    }

    fn decode(&self, data: &[u8]) -> Result<DecodedImage> {
        decode_with(self.format(), sys::WebPDecodeRGB, data)
    }

    fn import(&self, picture: &mut Picture, pixels: &PixelBuffer<'_>) -> Result<()> {
        pixels.expect_format(self.format())?;
        picture.import_with(
            self.format(),
            sys::WebPPictureImportRGB,
            pixels.data(),
            pixels.stride(),
        )
    }
}

type LossyFn = unsafe extern "C" fn(*const u8, c_int, c_int, c_int, f32, *mut *mut u8) -> usize;
type LosslessFn = unsafe extern "C" fn(*const u8, c_int, c_int, c_int, *mut *mut u8) -> usize;
type DecodeFn = unsafe extern "C" fn(*const u8, usize, *mut c_int, *mut c_int) -> *mut u8;

enum EncodeEntry {
    Lossy(LossyFn, f32),
    Lossless(LosslessFn),
}

fn encode_with(
    format: PixelFormat,
    entry: EncodeEntry,
    pixels: &PixelBuffer<'_>,
) -> Result<EncodedBuffer> {
    pixels.expect_format(format)?;
    let width = to_c_int(pixels.width())?;
    let height = to_c_int(pixels.height())?;
    let stride = to_c_int(pixels.stride())?;
    let mut out: *mut u8 = ptr::null_mut();
    // SAFETY: PixelBuffer guarantees `height` rows of `stride` bytes (the last
    // row may be short of padding) are readable.
    let len = unsafe {
        match entry {
            EncodeEntry::Lossy(f, quality) => {
                f(pixels.data().as_ptr(), width, height, stride, quality, &mut out)
            }
            EncodeEntry::Lossless(f) => f(pixels.data().as_ptr(), width, height, stride, &mut out),
        }
    };
    let alloc = WebPAlloc::new(out, len).ok_or(Error::EntryPointFailed(format))?;
    if alloc.len == 0 {
        return Err(Error::EntryPointFailed(format));
    }
    Ok(EncodedBuffer::new(alloc.as_slice().to_vec()))
}

fn decode_with(format: PixelFormat, entry: DecodeFn, data: &[u8]) -> Result<DecodedImage> {
    if data.is_empty() {
        return Err(Error::EmptyInput);
    }
    let mut width: c_int = 0;
    let mut height: c_int = 0;
    // SAFETY: libwebp reads at most data.len() bytes and writes the two ints.
    let out = unsafe { entry(data.as_ptr(), data.len(), &mut width, &mut height) };
    let len = if width > 0 && height > 0 {
        width as usize * height as usize * format.bytes_per_pixel()
    } else {
        0
    };
    let alloc = WebPAlloc::new(out, len).ok_or(Error::Decode(format))?;
    if alloc.len == 0 {
        return Err(Error::Decode(format));
    }
    Ok(DecodedImage {
        format,
        width: width as u32,
        height: height as u32,
        data: alloc.as_slice().to_vec(),
    })
}

/// libwebp-owned allocation, released with `WebPFree`.
struct WebPAlloc {
    ptr: NonNull<u8>,
    len: usize,
}

impl WebPAlloc {
    /// Takes ownership of `ptr`; `None` only when it is null.
    fn new(ptr: *mut u8, len: usize) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr, len })
    }

    fn as_slice(&self) -> &[u8] {
        // SAFETY: libwebp returned `len` initialised bytes at `ptr`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for WebPAlloc {
    fn drop(&mut self) {
        unsafe { sys::WebPFree(self.ptr.as_ptr().cast::<c_void>()) }
    }
}
