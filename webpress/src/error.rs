use crate::sys;
use crate::types::{CropRegion, PixelFormat};
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error produced by the encoder and decoder facades.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The configuration was rejected by range checks, the preset or libwebp's validator.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// `init` has not bound a codec yet, or the last `init` failed.
    #[error("codec not bound; call init() first")]
    NotInitialized,

    /// The pixel buffer does not describe a usable image.
    #[error("invalid pixel buffer: {0}")]
    InvalidBuffer(String),

    /// Decode was handed zero bytes.
    #[error("empty input")]
    EmptyInput,

    /// The crop rectangle does not fit inside the source picture.
    #[error("crop region {region:?} exceeds {width}x{height} source")]
    CropOutOfBounds {
        region: CropRegion,
        width: u32,
        height: u32,
    },

    /// libwebp could not rescale the picture.
    #[error("cannot rescale {from_width}x{from_height} picture to {width}x{height}")]
    RescaleFailed {
        from_width: u32,
        from_height: u32,
        width: u32,
        height: u32,
    },

    /// libwebp could not allocate or import into a picture.
    #[error("cannot import {0:?} pixels into picture")]
    PictureAlloc(PixelFormat),

    /// The full encode pipeline failed with a code from libwebp's catalog.
    #[error("encode failed: {0}")]
    Encode(EncodeErrorCode),

    /// A one-shot encode entry point returned no data.
    #[error("{0:?} encode entry point returned no data")]
    EntryPointFailed(PixelFormat),

    /// The bitstream could not be decoded into the requested format.
    #[error("cannot decode bitstream as {0:?}")]
    Decode(PixelFormat),

    /// The output file could not be created.
    #[error("cannot open output file {}", .path.display())]
    OutputFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing or flushing encoded bytes failed.
    #[error("write failed")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    pub(crate) fn invalid_buffer(msg: impl Into<String>) -> Self {
        Error::InvalidBuffer(msg.into())
    }

    /// Catalog entry for libwebp encode failures, when this error carries one.
    pub fn code(&self) -> Option<EncodeErrorCode> {
        match self {
            Error::Encode(code) => Some(*code),
            _ => None,
        }
    }
}

/// Named failure reasons reported by `WebPEncode`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EncodeErrorCode {
    OutOfMemory,
    BitstreamOutOfMemory,
    NullParameter,
    InvalidConfiguration,
    BadDimension,
    Partition0Overflow,
    PartitionOverflow,
    BadWrite,
    FileTooBig,
    UserAbort,
    /// A value outside the catalog, kept for diagnostics.
    Unknown(i32),
}

impl EncodeErrorCode {
    /// Map the numeric `WebPEncodingError` value onto the catalog.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => EncodeErrorCode::OutOfMemory,
            2 => EncodeErrorCode::BitstreamOutOfMemory,
            3 => EncodeErrorCode::NullParameter,
            4 => EncodeErrorCode::InvalidConfiguration,
            5 => EncodeErrorCode::BadDimension,
            6 => EncodeErrorCode::Partition0Overflow,
            7 => EncodeErrorCode::PartitionOverflow,
            8 => EncodeErrorCode::BadWrite,
            9 => EncodeErrorCode::FileTooBig,
            10 => EncodeErrorCode::UserAbort,
            other => EncodeErrorCode::Unknown(other),
        }
    }

    pub(crate) fn from_sys(code: sys::WebPEncodingError) -> Self {
        Self::from_raw(code as i32)
    }

    /// Human-readable explanation of the failure.
    pub fn message(&self) -> &'static str {
        match self {
            EncodeErrorCode::OutOfMemory => "out of memory allocating objects",
            EncodeErrorCode::BitstreamOutOfMemory => "out of memory re-allocating byte buffer",
            EncodeErrorCode::NullParameter => "null parameter passed to function",
            EncodeErrorCode::InvalidConfiguration => "configuration is invalid",
            EncodeErrorCode::BadDimension => {
                "bad picture dimension; width and height are limited to 16383 pixels"
            }
            EncodeErrorCode::Partition0Overflow => "partition #0 does not fit in 512k",
            EncodeErrorCode::PartitionOverflow => "partition does not fit in 16M",
            EncodeErrorCode::BadWrite => "picture writer returned an I/O error",
            EncodeErrorCode::FileTooBig => "file would not fit in 4G",
            EncodeErrorCode::UserAbort => "encoding aborted by user",
            EncodeErrorCode::Unknown(_) => "unknown encoder error",
        }
    }
}

impl fmt::Display for EncodeErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeErrorCode::Unknown(raw) => write!(f, "{} ({})", self.message(), raw),
            _ => write!(f, "{:?}: {}", self, self.message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_libwebp_codes() {
        assert_eq!(EncodeErrorCode::from_raw(1), EncodeErrorCode::OutOfMemory);
        assert_eq!(EncodeErrorCode::from_raw(5), EncodeErrorCode::BadDimension);
        assert_eq!(EncodeErrorCode::from_raw(8), EncodeErrorCode::BadWrite);
        assert_eq!(EncodeErrorCode::from_raw(10), EncodeErrorCode::UserAbort);
        assert_eq!(EncodeErrorCode::from_raw(42), EncodeErrorCode::Unknown(42));
    }

    #[test]
    fn display_includes_catalog_message() {
        let err = Error::Encode(EncodeErrorCode::BadDimension);
        let text = err.to_string();
        assert!(text.contains("BadDimension"), "{text}");
        assert!(text.contains("16383"), "{text}");
        assert_eq!(err.code(), Some(EncodeErrorCode::BadDimension));
        assert_eq!(Error::NotInitialized.code(), None);
    }
}
