use crate::error::{Error, Result};

/// Byte layout of a packed 8-bit image buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 4 bytes per pixel, with alpha.
    #[default]
    Rgba,
    /// 3 bytes per pixel, no alpha.
    Rgb,
}

impl PixelFormat {
    /// Resolve a raw format value (`0` = RGBA, `1` = RGB).
    ///
    /// Anything else selects RGBA. This is the default branch of the format
    /// table rather than an error, so callers holding values from older
    /// enumerations always end up with a bound codec.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => PixelFormat::Rgba,
            1 => PixelFormat::Rgb,
            _ => PixelFormat::Rgba,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba => 4,
            PixelFormat::Rgb => 3,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, PixelFormat::Rgba)
    }
}

/// Borrowed view over caller-owned packed pixels.
#[derive(Debug, Copy, Clone)]
pub struct PixelBuffer<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
    bytes_per_pixel: usize,
}

impl<'a> PixelBuffer<'a> {
    /// Tightly packed rows: stride is `width * bytes_per_pixel`.
    pub fn new(data: &'a [u8], width: u32, height: u32, bytes_per_pixel: usize) -> Result<Self> {
        let stride = (width as usize)
            .checked_mul(bytes_per_pixel)
            .ok_or_else(|| Error::invalid_buffer("stride overflow"))?;
        Self::with_stride(data, width, height, stride, bytes_per_pixel)
    }

    pub fn with_stride(
        data: &'a [u8],
        width: u32,
        height: u32,
        stride: usize,
        bytes_per_pixel: usize,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::invalid_buffer(format!(
                "zero-sized image {width}x{height}"
            )));
        }
        if bytes_per_pixel != 3 && bytes_per_pixel != 4 {
            return Err(Error::invalid_buffer(format!(
                "unsupported bytes per pixel {bytes_per_pixel}"
            )));
        }
        let row_bytes = (width as usize)
            .checked_mul(bytes_per_pixel)
            .ok_or_else(|| Error::invalid_buffer("row overflow"))?;
        if stride < row_bytes {
            return Err(Error::invalid_buffer("stride smaller than width*bytes_per_pixel"));
        }
        let needed = stride
            .checked_mul(height as usize - 1)
            .and_then(|v| v.checked_add(row_bytes))
            .ok_or_else(|| Error::invalid_buffer("buffer size overflow"))?;
        if data.len() < needed {
            return Err(Error::invalid_buffer(format!(
                "buffer holds {} bytes, need {needed}",
                data.len()
            )));
        }
        if i32::try_from(width).is_err()
            || i32::try_from(height).is_err()
            || i32::try_from(stride).is_err()
        {
            return Err(Error::invalid_buffer("dimensions exceed codec range"));
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
            bytes_per_pixel,
        })
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }

    /// Fails unless this buffer's layout matches `format`.
    pub(crate) fn expect_format(&self, format: PixelFormat) -> Result<()> {
        if self.bytes_per_pixel != format.bytes_per_pixel() {
            return Err(Error::invalid_buffer(format!(
                "{format:?} expects {} bytes per pixel, buffer has {}",
                format.bytes_per_pixel(),
                self.bytes_per_pixel
            )));
        }
        Ok(())
    }
}

/// Compressed WebP bitstream owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncodedBuffer {
    data: Vec<u8>,
}

impl EncodedBuffer {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl AsRef<[u8]> for EncodedBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Tightly packed pixels produced by the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl DecodedImage {
    pub fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel()
    }

    pub fn stride(&self) -> usize {
        self.width as usize * self.bytes_per_pixel()
    }

    /// Borrow the decoded pixels as an encoder input.
    pub fn as_pixel_buffer(&self) -> Result<PixelBuffer<'_>> {
        PixelBuffer::new(&self.data, self.width, self.height, self.bytes_per_pixel())
    }
}

/// Crop rectangle in source pixel coordinates.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True when the rectangle is non-empty and lies inside `width` x `height`.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        self.width > 0
            && self.height > 0
            && matches!(right, Some(r) if r <= width)
            && matches!(bottom, Some(b) if b <= height)
    }
}

/// Rescale target. A zero dimension is derived from the aspect ratio.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ScaleSpec {
    pub width: u32,
    pub height: u32,
}

impl ScaleSpec {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Both dimensions zero: nothing to do.
    pub fn is_noop(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    /// Target for a uniform scale factor applied to a `width` x `height` source.
    pub fn from_factor(width: u32, height: u32, factor: f32) -> Self {
        let scale = |v: u32| ((v as f64 * factor as f64).round() as u32).max(1);
        Self {
            width: scale(width),
            height: scale(height),
        }
    }
}

/// Background used to flatten alpha, packed as `0xRRGGBB`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AlphaBlendSpec {
    pub background: u32,
}

impl AlphaBlendSpec {
    pub fn new(background: u32) -> Self {
        Self {
            background: background & 0x00ff_ffff,
        }
    }
}

impl Default for AlphaBlendSpec {
    fn default() -> Self {
        Self::new(0x00ff_ffff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_raw_format_falls_back_to_rgba() {
        assert_eq!(PixelFormat::from_raw(0), PixelFormat::Rgba);
        assert_eq!(PixelFormat::from_raw(1), PixelFormat::Rgb);
        assert_eq!(PixelFormat::from_raw(2), PixelFormat::Rgba);
        assert_eq!(PixelFormat::from_raw(u32::MAX), PixelFormat::Rgba);
    }

    #[test]
    fn pixel_buffer_checks_length() {
        let data = vec![0u8; 4 * 4 * 4];
        let buf = PixelBuffer::new(&data, 4, 4, 4).unwrap();
        assert_eq!(buf.stride(), 16);

        assert!(matches!(
            PixelBuffer::new(&data[..63], 4, 4, 4),
            Err(Error::InvalidBuffer(_))
        ));
        assert!(matches!(
            PixelBuffer::new(&data, 0, 4, 4),
            Err(Error::InvalidBuffer(_))
        ));
        assert!(matches!(
            PixelBuffer::new(&data, 4, 4, 2),
            Err(Error::InvalidBuffer(_))
        ));
    }

    #[test]
    fn padded_stride_only_needs_short_last_row() {
        // 3 rows of 2 RGB pixels with 8-byte stride: 8 + 8 + 6 bytes.
        let data = vec![0u8; 22];
        let buf = PixelBuffer::with_stride(&data, 2, 3, 8, 3).unwrap();
        assert_eq!(buf.stride(), 8);
        assert!(PixelBuffer::with_stride(&data, 2, 3, 5, 3).is_err());
    }

    #[test]
    fn crop_bounds() {
        assert!(CropRegion::new(0, 0, 4, 4).fits_within(4, 4));
        assert!(CropRegion::new(1, 1, 2, 2).fits_within(4, 4));
        assert!(!CropRegion::new(2, 0, 3, 1).fits_within(4, 4));
        assert!(!CropRegion::new(0, 0, 0, 1).fits_within(4, 4));
        assert!(!CropRegion::new(u32::MAX, 0, 2, 1).fits_within(4, 4));
    }

    #[test]
    fn scale_from_factor_rounds_and_never_hits_zero() {
        assert_eq!(ScaleSpec::from_factor(10, 6, 0.5), ScaleSpec::new(5, 3));
        assert_eq!(ScaleSpec::from_factor(3, 3, 0.1), ScaleSpec::new(1, 1));
        assert!(ScaleSpec::default().is_noop());
    }

    #[test]
    fn blend_background_is_masked_to_rgb() {
        assert_eq!(AlphaBlendSpec::new(0xff12_3456).background, 0x0012_3456);
        assert_eq!(AlphaBlendSpec::default().background, 0x00ff_ffff);
    }
}
