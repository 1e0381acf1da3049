use crate::codec::{PixelCodec, codec_for};
use crate::config::{CompressionConfig, Preprocess, check_quality};
use crate::error::{Error, Result};
use crate::picture::{FileSink, MemorySink, Picture, Sink};
use crate::sys;
use crate::types::{EncodedBuffer, PixelBuffer, PixelFormat, ScaleSpec};
use std::fs;
use std::path::Path;

/// Stateful WebP encoder.
///
/// Call [`Encoder::init`] before encoding. `init` binds the codec for the
/// current pixel format, so changing the format requires another `init`.
pub struct Encoder {
    format: PixelFormat,
    preprocess: Preprocess,
    bound: Option<Bound>,
}

struct Bound {
    codec: &'static dyn PixelCodec,
    config: CompressionConfig,
    webp: sys::WebPConfig,
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            format: PixelFormat::default(),
            preprocess: Preprocess::default(),
            bound: None,
        }
    }

    /// Pixel format used by the next [`Encoder::init`]. Never fails.
    pub fn set_pixel_format(&mut self, format: PixelFormat) {
        self.format = format;
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    /// Bind the codec for the current format and build the libwebp settings.
    ///
    /// On error the encoder is left unbound.
    pub fn init(&mut self, config: &CompressionConfig) -> Result<()> {
        self.bound = None;
        let webp = config.to_libwebp()?;
        self.bound = Some(Bound {
            codec: codec_for(self.format),
            config: config.clone(),
            webp,
        });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.bound.is_some()
    }

    /// Format of the currently bound codec.
    pub fn bound_format(&self) -> Option<PixelFormat> {
        self.bound.as_ref().map(|b| b.codec.format())
    }

    pub fn set_preprocess(&mut self, preprocess: Preprocess) {
        self.preprocess = preprocess;
    }

    pub fn preprocess(&self) -> &Preprocess {
        &self.preprocess
    }

    /// Encode through the bound one-shot entry point.
    ///
    /// `quality` overrides the configured quality for this call. It is range
    /// checked in every mode, but lossless configurations do not use it.
    /// Pre-processing does not apply here.
    pub fn encode_simple(
        &self,
        pixels: &PixelBuffer<'_>,
        quality: Option<f32>,
    ) -> Result<EncodedBuffer> {
        let bound = self.bound()?;
        let quality = quality.unwrap_or(bound.config.quality);
        check_quality(quality)?;
        if bound.config.lossless {
            return bound.codec.encode_lossless(pixels);
        }
        bound.codec.encode(pixels, quality)
    }

    /// Full pipeline (import, pre-process, encode) into memory.
    pub fn encode(&self, pixels: &PixelBuffer<'_>) -> Result<EncodedBuffer> {
        let bound = self.bound()?;
        let mut sink = MemorySink::new();
        self.run_pipeline(bound, pixels, &mut sink)?;
        Ok(EncodedBuffer::new(sink.bytes().to_vec()))
    }

    /// Full pipeline streamed into a new file at `path`.
    ///
    /// Input that cannot be encoded is rejected before `path` is touched. A file
    /// left behind by a failed encode is removed.
    pub fn encode_to_file(&self, pixels: &PixelBuffer<'_>, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bound = self.bound()?;
        self.check_input(bound, pixels)?;
        let mut sink = FileSink::create(path)?;
        let result = self
            .run_pipeline(bound, pixels, &mut sink)
            .and_then(|()| sink.finish());
        if result.is_err() {
            let _ = fs::remove_file(path);
        }
        result
    }

    fn bound(&self) -> Result<&Bound> {
        self.bound.as_ref().ok_or(Error::NotInitialized)
    }

    /// Checks that need no libwebp work: buffer layout and crop bounds.
    fn check_input(&self, bound: &Bound, pixels: &PixelBuffer<'_>) -> Result<()> {
        pixels.expect_format(bound.codec.format())?;
        let (width, height) = (pixels.width(), pixels.height());
        if let Some(region) = self.preprocess.crop.filter(|_| self.preprocess.enabled) {
            if !region.fits_within(width, height) {
                return Err(Error::CropOutOfBounds {
                    region,
                    width,
                    height,
                });
            }
        }
        Ok(())
    }

    fn run_pipeline(&self, bound: &Bound, pixels: &PixelBuffer<'_>, sink: &mut dyn Sink) -> Result<()> {
        // ARGB keeps crop offsets exact; YUV views snap them to even values.
        // WebPEncode converts to YUV itself for lossy output.
        let mut picture = Picture::new(pixels.width(), pixels.height(), true)?;
        bound.codec.import(&mut picture, pixels)?;
        self.apply_preprocess(bound, &mut picture)?;
        picture.encode_into(&bound.webp, sink)
    }

    fn apply_preprocess(&self, bound: &Bound, picture: &mut Picture) -> Result<()> {
        let pre = &self.preprocess;
        if !pre.enabled {
            return Ok(());
        }
        if let Some(blend) = pre.blend {
            if bound.codec.format().has_alpha() {
                picture.blend_alpha(blend);
            }
        }
        if let Some(crop) = pre.crop {
            picture.crop(crop)?;
        }
        let scale = pre.scale.or_else(|| {
            let cfg = &bound.config;
            (cfg.scale_image && cfg.scale_factor != 1.0)
                .then(|| ScaleSpec::from_factor(picture.width(), picture.height(), cfg.scale_factor))
        });
        if let Some(scale) = scale {
            picture.rescale(scale)?;
        }
        Ok(())
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CropRegion;

    fn rgba_4x4() -> Vec<u8> {
        (0..16u8)
            .flat_map(|i| [i * 15, 255 - i * 15, i * 7, 255])
            .collect()
    }

    fn initialized(format: PixelFormat, config: &CompressionConfig) -> Encoder {
        let mut enc = Encoder::new();
        enc.set_pixel_format(format);
        enc.init(config).unwrap();
        enc
    }

    #[test]
    fn encode_before_init_is_reported() {
        let pixels = rgba_4x4();
        let buf = PixelBuffer::new(&pixels, 4, 4, 4).unwrap();
        let enc = Encoder::new();
        assert!(matches!(enc.encode(&buf), Err(Error::NotInitialized)));
        assert!(matches!(enc.encode_simple(&buf, None), Err(Error::NotInitialized)));
        let path = std::env::temp_dir().join("webpress-never-written.webp");
        assert!(matches!(enc.encode_to_file(&buf, &path), Err(Error::NotInitialized)));
        assert!(!path.exists());
    }

    #[test]
    fn negative_quality_fails_init_and_unbinds() {
        let mut enc = initialized(PixelFormat::Rgba, &CompressionConfig::default());
        assert!(enc.is_initialized());

        let bad = CompressionConfig::new().with_quality(-1.0);
        assert!(matches!(enc.init(&bad), Err(Error::InvalidConfig(_))));
        assert!(!enc.is_initialized());
    }

    #[test]
    fn rgba_4x4_quality_75_is_deterministic() {
        let pixels = rgba_4x4();
        let buf = PixelBuffer::new(&pixels, 4, 4, 4).unwrap();
        let enc = initialized(PixelFormat::Rgba, &CompressionConfig::default());

        let first = enc.encode(&buf).unwrap();
        let second = enc.encode(&buf).unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, second);

        let simple = enc.encode_simple(&buf, None).unwrap();
        assert!(simple.len() > 0);
        assert_eq!(simple, enc.encode_simple(&buf, Some(75.0)).unwrap());
    }

    #[test]
    fn reinit_with_same_config_is_idempotent() {
        let pixels = rgba_4x4();
        let buf = PixelBuffer::new(&pixels, 4, 4, 4).unwrap();
        let config = CompressionConfig::new().with_quality(50.0);
        let mut enc = initialized(PixelFormat::Rgba, &config);
        let before = enc.encode(&buf).unwrap();
        enc.init(&config).unwrap();
        assert_eq!(before, enc.encode(&buf).unwrap());
    }

    #[test]
    fn format_change_takes_effect_at_init() {
        let mut enc = initialized(PixelFormat::Rgba, &CompressionConfig::default());
        enc.set_pixel_format(PixelFormat::Rgb);
        assert_eq!(enc.bound_format(), Some(PixelFormat::Rgba));

        enc.init(&CompressionConfig::default()).unwrap();
        assert_eq!(enc.bound_format(), Some(PixelFormat::Rgb));

        let rgb = vec![90u8; 4 * 4 * 3];
        let buf = PixelBuffer::new(&rgb, 4, 4, 3).unwrap();
        assert!(enc.encode(&buf).is_ok());

        let rgba = rgba_4x4();
        let buf = PixelBuffer::new(&rgba, 4, 4, 4).unwrap();
        assert!(matches!(enc.encode(&buf), Err(Error::InvalidBuffer(_))));
    }

    #[test]
    fn unrecognized_format_matches_rgba() {
        let pixels = rgba_4x4();
        let buf = PixelBuffer::new(&pixels, 4, 4, 4).unwrap();
        let config = CompressionConfig::default();
        let fallback = initialized(PixelFormat::from_raw(17), &config);
        let rgba = initialized(PixelFormat::Rgba, &config);
        assert_eq!(fallback.bound_format(), Some(PixelFormat::Rgba));
        assert_eq!(fallback.encode(&buf).unwrap(), rgba.encode(&buf).unwrap());
    }

    #[test]
    fn quality_override_is_range_checked() {
        let pixels = rgba_4x4();
        let buf = PixelBuffer::new(&pixels, 4, 4, 4).unwrap();
        let enc = initialized(PixelFormat::Rgba, &CompressionConfig::default());
        assert!(matches!(
            enc.encode_simple(&buf, Some(101.0)),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn lossless_still_range_checks_quality_override() {
        let pixels = rgba_4x4();
        let buf = PixelBuffer::new(&pixels, 4, 4, 4).unwrap();
        let enc = initialized(PixelFormat::Rgba, &CompressionConfig::new().with_lossless(true));
        assert!(matches!(
            enc.encode_simple(&buf, Some(150.0)),
            Err(Error::InvalidConfig(_))
        ));
        assert!(enc.encode_simple(&buf, Some(30.0)).is_ok());
    }

    #[test]
    fn rejected_input_leaves_existing_file_alone() {
        let pixels = rgba_4x4();
        let buf = PixelBuffer::new(&pixels, 4, 4, 4).unwrap();
        let path = std::env::temp_dir().join(format!(
            "webpress-{}-keep-existing.webp",
            std::process::id()
        ));
        fs::write(&path, b"previous contents").unwrap();

        let mut enc = initialized(PixelFormat::Rgba, &CompressionConfig::default());
        enc.set_preprocess(Preprocess::enabled().with_crop(CropRegion::new(2, 2, 4, 4)));
        assert!(matches!(
            enc.encode_to_file(&buf, &path),
            Err(Error::CropOutOfBounds { .. })
        ));
        assert_eq!(fs::read(&path).unwrap(), b"previous contents");

        let rgb = initialized(PixelFormat::Rgb, &CompressionConfig::default());
        assert!(matches!(
            rgb.encode_to_file(&buf, &path),
            Err(Error::InvalidBuffer(_))
        ));
        assert_eq!(fs::read(&path).unwrap(), b"previous contents");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn crop_outside_source_fails_cleanly() {
        let pixels = rgba_4x4();
        let buf = PixelBuffer::new(&pixels, 4, 4, 4).unwrap();
        let mut enc = initialized(PixelFormat::Rgba, &CompressionConfig::default());
        enc.set_preprocess(Preprocess::enabled().with_crop(CropRegion::new(3, 3, 2, 2)));
        assert!(matches!(enc.encode(&buf), Err(Error::CropOutOfBounds { .. })));

        // Directives are inert while pre-processing is switched off.
        enc.set_preprocess(Preprocess {
            enabled: false,
            ..*enc.preprocess()
        });
        assert!(enc.encode(&buf).is_ok());
    }

    #[test]
    fn unwritable_path_reports_output_file() {
        let pixels = rgba_4x4();
        let buf = PixelBuffer::new(&pixels, 4, 4, 4).unwrap();
        let enc = initialized(PixelFormat::Rgba, &CompressionConfig::default());
        let path = std::env::temp_dir()
            .join("webpress-missing-dir")
            .join("nested")
            .join("out.webp");
        assert!(matches!(
            enc.encode_to_file(&buf, &path),
            Err(Error::OutputFile { .. })
        ));
    }

    #[test]
    fn encoder_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Encoder>();
    }
}
