//! Compression settings and pre-processing directives.

use crate::error::{Error, Result};
use crate::sys;
use crate::types::{AlphaBlendSpec, CropRegion, ScaleSpec};

/// Caller-facing compression settings.
///
/// Only quality, alpha quality, lossless and method reach libwebp. The scale
/// fields drive the rescale step of the encode pipeline. The remaining flags
/// are carried for callers that record them but do not change encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionConfig {
    /// 0-100. For lossless encoding this is the compression effort.
    pub quality: f32,
    pub lossless: bool,
    /// 0-100.
    pub alpha_quality: u8,
    /// Speed/quality trade-off, 0 (fast) to 6 (slow).
    pub method: u8,
    pub scale_factor: f32,
    pub scale_image: bool,
    pub retain_alpha: bool,
    pub bit_rate: u32,
    pub gamma_correction: bool,
    pub histogram_equalization: bool,
    pub use_simd: bool,
    pub use_parallel: bool,
    pub use_gpu: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            quality: 75.0,
            lossless: false,
            alpha_quality: 100,
            method: 4,
            scale_factor: 1.0,
            scale_image: false,
            retain_alpha: false,
            bit_rate: 0,
            gamma_correction: false,
            histogram_equalization: false,
            use_simd: true,
            use_parallel: true,
            use_gpu: true,
        }
    }
}

impl CompressionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_lossless(mut self, lossless: bool) -> Self {
        self.lossless = lossless;
        self
    }

    pub fn with_alpha_quality(mut self, alpha_quality: u8) -> Self {
        self.alpha_quality = alpha_quality;
        self
    }

    pub fn with_method(mut self, method: u8) -> Self {
        self.method = method;
        self
    }

    /// Enable uniform rescaling by `factor` (used when no explicit target is set).
    pub fn with_scale_factor(mut self, factor: f32) -> Self {
        self.scale_factor = factor;
        self.scale_image = true;
        self
    }

    pub fn with_hardware_hints(mut self, simd: bool, parallel: bool, gpu: bool) -> Self {
        self.use_simd = simd;
        self.use_parallel = parallel;
        self.use_gpu = gpu;
        self
    }

    /// Range checks that do not need libwebp.
    pub fn validate(&self) -> Result<()> {
        check_quality(self.quality)?;
        if self.alpha_quality > 100 {
            return Err(Error::invalid_config(format!(
                "alpha quality {} outside 0..=100",
                self.alpha_quality
            )));
        }
        if self.method > 6 {
            return Err(Error::invalid_config(format!(
                "method {} outside 0..=6",
                self.method
            )));
        }
        if self.scale_image && !(self.scale_factor.is_finite() && self.scale_factor > 0.0) {
            return Err(Error::invalid_config(format!(
                "scale factor {} must be positive",
                self.scale_factor
            )));
        }
        Ok(())
    }

    /// Build the libwebp configuration.
    ///
    /// The text preset is applied first so that the caller's values and the
    /// fixed overrides below are what libwebp actually sees.
    pub(crate) fn to_libwebp(&self) -> Result<sys::WebPConfig> {
        self.validate()?;

        let mut config =
            sys::WebPConfig::new_with_preset(sys::WebPPreset::WEBP_PRESET_TEXT, self.quality)
                .map_err(|_| Error::invalid_config("text preset rejected"))?;

        config.quality = self.quality;
        config.alpha_quality = self.alpha_quality as i32;
        config.lossless = self.lossless as i32;
        config.method = self.method as i32;

        config.alpha_compression = 0;
        config.alpha_filtering = 0;
        config.sns_strength = 0;
        config.use_sharp_yuv = 0;
        config.autofilter = 0;
        config.filter_type = 0;
        config.filter_sharpness = 0;
        config.filter_strength = 0;
        // 100 turns near-lossless preprocessing off.
        config.near_lossless = 100;
        config.thread_level = 1;

        // SAFETY: config is a fully initialised value on our stack.
        if unsafe { sys::WebPValidateConfig(&config) } == 0 {
            return Err(Error::invalid_config("libwebp validation failed"));
        }
        Ok(config)
    }
}

pub(crate) fn check_quality(quality: f32) -> Result<()> {
    if !(0.0..=100.0).contains(&quality) {
        return Err(Error::invalid_config(format!(
            "quality {quality} outside 0..=100"
        )));
    }
    Ok(())
}

/// Picture pre-processing applied by the full encode pipeline.
///
/// Nothing runs unless `enabled` is set. Steps run in order: blend, crop,
/// rescale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Preprocess {
    pub enabled: bool,
    pub blend: Option<AlphaBlendSpec>,
    pub crop: Option<CropRegion>,
    pub scale: Option<ScaleSpec>,
}

impl Preprocess {
    /// Pre-processing switched on, with no directives yet.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn with_blend(mut self, blend: AlphaBlendSpec) -> Self {
        self.blend = Some(blend);
        self
    }

    pub fn with_crop(mut self, crop: CropRegion) -> Self {
        self.crop = Some(crop);
        self
    }

    pub fn with_scale(mut self, scale: ScaleSpec) -> Self {
        self.scale = Some(scale);
        self
    }
}
