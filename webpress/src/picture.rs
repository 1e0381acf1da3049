use crate::error::{EncodeErrorCode, Error, Result};
use crate::sys;
use crate::types::{AlphaBlendSpec, CropRegion, PixelFormat, ScaleSpec};
use std::ffi::{c_int, c_void};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::mem::MaybeUninit;
use std::path::Path;

/// Owns a `WebPPicture` and frees its pixel storage on drop.
pub struct Picture {
    inner: Box<sys::WebPPicture>,
}

impl Picture {
    /// Empty picture sized `width` x `height`, not yet holding pixels.
    ///
    /// `use_argb` keeps samples in ARGB so lossless encoding never round-trips
    /// through YUV.
    pub fn new(width: u32, height: u32, use_argb: bool) -> Result<Self> {
        let mut raw = MaybeUninit::<sys::WebPPicture>::zeroed();
        // SAFETY: WebPPictureInit fully initialises the struct it is given.
        if !unsafe { sys::WebPPictureInit(raw.as_mut_ptr()) } {
            return Err(Error::invalid_config("libwebp ABI mismatch"));
        }
        let mut inner = Box::new(unsafe { raw.assume_init() });
        inner.width = to_c_int(width)?;
        inner.height = to_c_int(height)?;
        inner.use_argb = use_argb as c_int;
        Ok(Self { inner })
    }

    pub fn width(&self) -> u32 {
        self.inner.width as u32
    }

    pub fn height(&self) -> u32 {
        self.inner.height as u32
    }

    /// Copy packed pixels into the picture through a libwebp import function.
    pub(crate) fn import_with(
        &mut self,
        format: PixelFormat,
        import: ImportEntry,
        pixels: &[u8],
        stride: usize,
    ) -> Result<()> {
        let stride = to_c_int(stride)?;
        // SAFETY: the caller validated `pixels` against width/height/stride.
        let ok = unsafe { import(self.as_mut_ptr(), pixels.as_ptr(), stride) };
        if ok == 0 {
            return Err(Error::PictureAlloc(format));
        }
        Ok(())
    }

    /// Flatten alpha against `spec.background`.
    pub fn blend_alpha(&mut self, spec: AlphaBlendSpec) {
        unsafe { sys::WebPBlendAlpha(self.as_mut_ptr(), spec.background) }
    }

    /// Crop in place through a self-referencing view.
    pub fn crop(&mut self, region: CropRegion) -> Result<()> {
        let (width, height) = (self.width(), self.height());
        let out_of_bounds = Error::CropOutOfBounds {
            region,
            width,
            height,
        };
        if !region.fits_within(width, height) {
            return Err(out_of_bounds);
        }
        let ptr = self.as_mut_ptr();
        // SAFETY: libwebp documents src == dst as in-place cropping; the picture
        // keeps ownership of its memory.
        let ok = unsafe {
            sys::WebPPictureView(
                ptr,
                region.x as c_int,
                region.y as c_int,
                region.width as c_int,
                region.height as c_int,
                ptr,
            )
        };
        if ok == 0 {
            return Err(out_of_bounds);
        }
        Ok(())
    }

    /// Rescale to `spec`; `(0, 0)` leaves the picture untouched.
    pub fn rescale(&mut self, spec: ScaleSpec) -> Result<()> {
        if spec.is_noop() {
            return Ok(());
        }
        let (from_width, from_height) = (self.width(), self.height());
        let failed = Error::RescaleFailed {
            from_width,
            from_height,
            width: spec.width,
            height: spec.height,
        };
        let (Ok(w), Ok(h)) = (c_int::try_from(spec.width), c_int::try_from(spec.height)) else {
            return Err(failed);
        };
        if unsafe { sys::WebPPictureRescale(self.as_mut_ptr(), w, h) } == 0 {
            return Err(failed);
        }
        Ok(())
    }

    /// Run `WebPEncode`, streaming the bitstream into `sink`.
    pub fn encode_into(&mut self, config: &sys::WebPConfig, sink: &mut dyn Sink) -> Result<()> {
        sink.attach(&mut self.inner);
        // SAFETY: writer and custom_ptr were just set by the sink, which outlives
        // this call.
        let ok = unsafe { sys::WebPEncode(config, self.as_mut_ptr()) };
        self.inner.writer = None;
        self.inner.custom_ptr = std::ptr::null_mut();
        if ok == 0 {
            return Err(sink
                .take_error()
                .map(Error::Io)
                .unwrap_or_else(|| Error::Encode(EncodeErrorCode::from_sys(self.inner.error_code))));
        }
        Ok(())
    }

    fn as_mut_ptr(&mut self) -> *mut sys::WebPPicture {
        &mut *self.inner
    }
}

impl Drop for Picture {
    fn drop(&mut self) {
        unsafe { sys::WebPPictureFree(self.as_mut_ptr()) }
    }
}

pub(crate) type ImportEntry = unsafe extern "C" fn(*mut sys::WebPPicture, *const u8, c_int) -> c_int;

/// Destination for encoded bytes.
pub trait Sink {
    /// Bind libwebp's writer callback and its context pointer.
    fn attach(&mut self, picture: &mut sys::WebPPicture);

    /// I/O failure recorded by the writer, if any.
    fn take_error(&mut self) -> Option<io::Error> {
        None
    }
}

/// Growable in-memory output backed by `WebPMemoryWriter`.
pub struct MemorySink {
    inner: Box<sys::WebPMemoryWriter>,
}

impl MemorySink {
    pub fn new() -> Self {
        let mut raw = MaybeUninit::<sys::WebPMemoryWriter>::zeroed();
        // SAFETY: WebPMemoryWriterInit sets every field.
        unsafe { sys::WebPMemoryWriterInit(raw.as_mut_ptr()) };
        Self {
            inner: Box::new(unsafe { raw.assume_init() }),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        if self.inner.mem.is_null() || self.inner.size == 0 {
            return &[];
        }
        // SAFETY: libwebp keeps `size` initialised bytes at `mem`.
        unsafe { std::slice::from_raw_parts(self.inner.mem, self.inner.size) }
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for MemorySink {
    fn attach(&mut self, picture: &mut sys::WebPPicture) {
        picture.writer = Some(sys::WebPMemoryWrite);
        picture.custom_ptr = (&mut *self.inner as *mut sys::WebPMemoryWriter).cast::<c_void>();
    }
}

impl Drop for MemorySink {
    fn drop(&mut self) {
        unsafe { sys::WebPMemoryWriterClear(&mut *self.inner) }
    }
}

/// Buffered file output driven by libwebp's writer callback.
pub struct FileSink {
    state: Box<FileState>,
}

struct FileState {
    out: BufWriter<File>,
    error: Option<io::Error>,
}

impl FileSink {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|source| Error::OutputFile {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            state: Box::new(FileState {
                out: BufWriter::new(file),
                error: None,
            }),
        })
    }

    pub fn finish(mut self) -> Result<()> {
        self.state.out.flush()?;
        Ok(())
    }
}

impl Sink for FileSink {
    fn attach(&mut self, picture: &mut sys::WebPPicture) {
        picture.writer = Some(write_to_file);
        picture.custom_ptr = (&mut *self.state as *mut FileState).cast::<c_void>();
    }

    fn take_error(&mut self) -> Option<io::Error> {
        self.state.error.take()
    }
}

unsafe extern "C" fn write_to_file(
    data: *const u8,
    data_size: usize,
    picture: *const sys::WebPPicture,
) -> c_int {
    if data_size == 0 {
        return 1;
    }
    // SAFETY: custom_ptr was set by FileSink::attach and the FileState is alive
    // for the duration of WebPEncode.
    let state = unsafe { &mut *((*picture).custom_ptr as *mut FileState) };
    let chunk = unsafe { std::slice::from_raw_parts(data, data_size) };
    match state.out.write_all(chunk) {
        Ok(()) => 1,
        Err(err) => {
            state.error = Some(err);
            0
        }
    }
}

pub(crate) fn to_c_int(v: impl TryInto<c_int>) -> Result<c_int> {
    v.try_into()
        .map_err(|_| Error::invalid_buffer("value exceeds codec range"))
}
