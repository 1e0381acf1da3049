//! Safe, pixel-format-directed encode/decode facade over
//! [`libwebp`](https://chromium.googlesource.com/webm/libwebp).
//!
//! The crate keeps a small, stateful API while handling ownership of every
//! libwebp allocation for you:
//! - [`Encoder`] binds a codec for its [`PixelFormat`] at [`Encoder::init`],
//!   validates a [`CompressionConfig`], and encodes either through libwebp's
//!   one-shot entry points or through the full picture pipeline with optional
//!   [`Preprocess`] steps (alpha blend, crop, rescale).
//! - [`Decoder`] binds the decode entry point for its output format and returns
//!   caller-owned [`DecodedImage`]s.
//! - [`PixelCodec`] is the per-format capability both facades dispatch through.
//!
//! ```no_run
//! use webpress::{CompressionConfig, Decoder, Encoder, PixelBuffer, PixelFormat};
//!
//! let pixels = vec![255u8; 16 * 16 * 4];
//! let mut enc = Encoder::new();
//! enc.set_pixel_format(PixelFormat::Rgba);
//! enc.init(&CompressionConfig::new().with_quality(80.0))?;
//! let webp = enc.encode(&PixelBuffer::new(&pixels, 16, 16, 4)?)?;
//!
//! let mut dec = Decoder::new();
//! dec.init();
//! let image = dec.decode(webp.as_bytes())?;
//! assert_eq!((image.width, image.height), (16, 16));
//! # Ok::<(), webpress::Error>(())
//! ```

/// Low-level bindings to libwebp. Most users should favor the safe wrappers
/// re-exported from this crate.
pub use libwebp_sys as sys;

mod codec;
mod config;
mod decoder;
mod encoder;
mod error;
mod picture;
mod types;

pub use codec::{PixelCodec, Rgb8, Rgba8, codec_for};
pub use config::{CompressionConfig, Preprocess};
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{EncodeErrorCode, Error, Result};
pub use picture::{FileSink, MemorySink, Picture, Sink};
pub use types::*;

/// libwebp encoder version as `(major, minor, patch)`.
pub fn version() -> (u32, u32, u32) {
    let v = unsafe { sys::WebPGetEncoderVersion() } as u32;
    ((v >> 16) & 0xff, (v >> 8) & 0xff, v & 0xff)
}
