//! Safe wrapper around FFmpeg hardware frames context
//!
//! A frames context describes a pool of device-resident frame buffers tied
//! to a hardware device. It can be created for a device, or adopted from an
//! upstream frame that already carries one.

use crate::ffi::{
  self, AVBufferRef, AVPixelFormat,
  accessors::{
    ffhwframes_get_format, ffhwframes_get_sw_format, ffhwframes_set_format,
    ffhwframes_set_height, ffhwframes_set_initial_pool_size, ffhwframes_set_sw_format,
    ffhwframes_set_width,
  },
  avutil::{av_buffer_ref, av_buffer_unref},
  hwaccel::{av_hwframe_ctx_alloc, av_hwframe_ctx_init, av_hwframe_get_buffer},
};
use std::ptr::NonNull;

use super::{CodecError, CodecResult, Frame, HwDeviceContext};

/// Safe wrapper around an FFmpeg hardware frames context reference
pub struct HwFramesContext {
  ptr: NonNull<AVBufferRef>,
}

impl HwFramesContext {
  /// Create and initialize a frames pool on the given device
  ///
  /// `format` is the device pixel format, `sw_format` the software layout
  /// of the underlying surfaces.
  pub fn new(
    device: &HwDeviceContext,
    format: AVPixelFormat,
    sw_format: AVPixelFormat,
    width: i32,
    height: i32,
    pool_size: i32,
  ) -> CodecResult<Self> {
    let frames_ref = unsafe { av_hwframe_ctx_alloc(device.as_ptr()) };
    let frames_ref = NonNull::new(frames_ref)
      .ok_or(CodecError::AllocationFailed("AVHWFramesContext"))?;

    unsafe {
      ffhwframes_set_format(frames_ref.as_ptr(), format.as_raw());
      ffhwframes_set_sw_format(frames_ref.as_ptr(), sw_format.as_raw());
      ffhwframes_set_width(frames_ref.as_ptr(), width);
      ffhwframes_set_height(frames_ref.as_ptr(), height);
      ffhwframes_set_initial_pool_size(frames_ref.as_ptr(), pool_size);
    }

    let ctx = Self { ptr: frames_ref };
    let ret = unsafe { av_hwframe_ctx_init(ctx.ptr.as_ptr()) };
    ffi::check_error(ret)?;
    Ok(ctx)
  }

  /// Adopt a frames context from a borrowed reference (e.g. one observed on
  /// an upstream frame), taking a new reference
  pub fn from_borrowed_ref(frames_ref: NonNull<AVBufferRef>) -> CodecResult<Self> {
    let new_ref = unsafe { av_buffer_ref(frames_ref.as_ptr()) };
    NonNull::new(new_ref)
      .map(|ptr| Self { ptr })
      .ok_or(CodecError::AllocationFailed("AVHWFramesContext ref"))
  }

  /// Get the raw buffer reference (owned by this wrapper)
  #[inline]
  pub fn as_ptr(&self) -> *mut AVBufferRef {
    self.ptr.as_ptr()
  }

  /// Device pixel format of frames in this pool
  pub fn format(&self) -> AVPixelFormat {
    AVPixelFormat(unsafe { ffhwframes_get_format(self.ptr.as_ptr()) })
  }

  /// Software layout of the underlying surfaces
  pub fn sw_format(&self) -> AVPixelFormat {
    AVPixelFormat(unsafe { ffhwframes_get_sw_format(self.ptr.as_ptr()) })
  }

  /// Allocate a frame backed by this pool
  pub fn alloc_frame(&self) -> CodecResult<Frame> {
    let mut frame = Frame::new()?;
    let ret = unsafe { av_hwframe_get_buffer(self.ptr.as_ptr(), frame.as_mut_ptr(), 0) };
    ffi::check_error(ret)?;
    Ok(frame)
  }
}

impl Clone for HwFramesContext {
  fn clone(&self) -> Self {
    Self::from_borrowed_ref(self.ptr).expect("hw frames context ref")
  }
}

impl Drop for HwFramesContext {
  fn drop(&mut self) {
    unsafe {
      let mut ptr = self.ptr.as_ptr();
      av_buffer_unref(&mut ptr);
    }
  }
}

// Frames contexts are reference-counted and safe to move across threads
unsafe impl Send for HwFramesContext {}
unsafe impl Sync for HwFramesContext {}

impl std::fmt::Debug for HwFramesContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("HwFramesContext")
      .field("format", &self.format())
      .field("sw_format", &self.sw_format())
      .finish()
  }
}
