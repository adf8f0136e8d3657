//! Owned copy of FFmpeg AVCodecParameters
//!
//! Stream snapshots and lazily-initialized muxer streams both need codec
//! parameters that outlive the format context they came from, so this
//! wrapper always owns a deep copy.

use crate::ffi::{
  self,
  accessors::{
    ffcodecpar_get_bit_rate, ffcodecpar_get_channel_layout_mask, ffcodecpar_get_codec_id,
    ffcodecpar_get_codec_type, ffcodecpar_get_format, ffcodecpar_get_frame_size,
    ffcodecpar_get_height, ffcodecpar_get_sample_rate, ffcodecpar_get_width,
    ffcodecpar_set_codec_tag,
  },
  avformat::{
    avcodec_parameters_alloc, avcodec_parameters_copy, avcodec_parameters_free,
    avcodec_parameters_from_context, AVCodecParameters,
  },
  AVCodecID, AVPixelFormat, AVSampleFormat,
};
use std::ptr::NonNull;

use super::{CodecContext, CodecError};

/// Owned AVCodecParameters with RAII cleanup
pub struct CodecParameters {
  ptr: NonNull<AVCodecParameters>,
}

impl CodecParameters {
  /// Allocate empty parameters
  pub fn new() -> Result<Self, CodecError> {
    let ptr = unsafe { avcodec_parameters_alloc() };
    NonNull::new(ptr)
      .map(|ptr| Self { ptr })
      .ok_or(CodecError::AllocationFailed("AVCodecParameters"))
  }

  /// Deep-copy parameters from a raw pointer (e.g. a stream's codecpar)
  ///
  /// # Safety
  /// `src` must point to valid AVCodecParameters
  pub unsafe fn from_raw_copy(src: *const AVCodecParameters) -> Result<Self, CodecError> {
    let params = Self::new()?;
    let ret = unsafe { avcodec_parameters_copy(params.ptr.as_ptr(), src) };
    ffi::check_error(ret)?;
    Ok(params)
  }

  /// Capture the parameters of an opened codec context
  pub fn from_context(ctx: &CodecContext) -> Result<Self, CodecError> {
    let params = Self::new()?;
    let ret = unsafe { avcodec_parameters_from_context(params.ptr.as_ptr(), ctx.as_ptr()) };
    ffi::check_error(ret)?;
    Ok(params)
  }

  /// Get the raw pointer (for FFmpeg API calls)
  #[inline]
  pub fn as_ptr(&self) -> *const AVCodecParameters {
    self.ptr.as_ptr()
  }

  /// Get the mutable raw pointer
  #[inline]
  pub fn as_mut_ptr(&mut self) -> *mut AVCodecParameters {
    self.ptr.as_ptr()
  }

  /// Media type of the stream (see `ffi::avformat::media_type`)
  pub fn codec_type(&self) -> i32 {
    unsafe { ffcodecpar_get_codec_type(self.as_ptr()) }
  }

  /// Codec identifier
  pub fn codec_id(&self) -> AVCodecID {
    AVCodecID(unsafe { ffcodecpar_get_codec_id(self.as_ptr()) })
  }

  /// Clear the container-specific codec tag
  ///
  /// Required when copying a stream into a different container family.
  pub fn clear_codec_tag(&mut self) {
    unsafe { ffcodecpar_set_codec_tag(self.as_mut_ptr(), 0) }
  }

  pub fn width(&self) -> i32 {
    unsafe { ffcodecpar_get_width(self.as_ptr()) }
  }

  pub fn height(&self) -> i32 {
    unsafe { ffcodecpar_get_height(self.as_ptr()) }
  }

  /// Pixel format for video parameters
  pub fn pixel_format(&self) -> AVPixelFormat {
    AVPixelFormat(unsafe { ffcodecpar_get_format(self.as_ptr()) })
  }

  /// Sample format for audio parameters
  pub fn sample_format(&self) -> AVSampleFormat {
    AVSampleFormat(unsafe { ffcodecpar_get_format(self.as_ptr()) })
  }

  pub fn bit_rate(&self) -> i64 {
    unsafe { ffcodecpar_get_bit_rate(self.as_ptr()) }
  }

  pub fn sample_rate(&self) -> i32 {
    unsafe { ffcodecpar_get_sample_rate(self.as_ptr()) }
  }

  pub fn channel_layout(&self) -> u64 {
    unsafe { ffcodecpar_get_channel_layout_mask(self.as_ptr()) }
  }

  pub fn frame_size(&self) -> i32 {
    unsafe { ffcodecpar_get_frame_size(self.as_ptr()) }
  }

  /// Deep-copy these parameters into a destination owned by someone else
  /// (e.g. a muxer stream's codecpar)
  ///
  /// # Safety
  /// `dst` must point to valid AVCodecParameters
  pub unsafe fn copy_to_raw(&self, dst: *mut AVCodecParameters) -> Result<(), CodecError> {
    let ret = unsafe { avcodec_parameters_copy(dst, self.as_ptr()) };
    ffi::check_error(ret)?;
    Ok(())
  }
}

impl Clone for CodecParameters {
  fn clone(&self) -> Self {
    unsafe { Self::from_raw_copy(self.as_ptr()) }.expect("Failed to clone codec parameters")
  }
}

impl Drop for CodecParameters {
  fn drop(&mut self) {
    unsafe {
      let mut ptr = self.ptr.as_ptr();
      avcodec_parameters_free(&mut ptr);
    }
  }
}

unsafe impl Send for CodecParameters {}

impl std::fmt::Debug for CodecParameters {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CodecParameters")
      .field("codec_type", &self.codec_type())
      .field("codec_id", &self.codec_id())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parameters_allocation() {
    let params = CodecParameters::new().unwrap();
    assert_eq!(params.codec_id(), AVCodecID::NONE);
  }

  #[test]
  fn test_parameters_clone() {
    let params = CodecParameters::new().unwrap();
    let cloned = params.clone();
    assert_eq!(cloned.codec_id(), AVCodecID::NONE);
  }
}
