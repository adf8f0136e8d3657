//! Bitstream filter context wrapper for FFmpeg libavcodec
//!
//! Packet-in/packet-out transforms such as "h264_mp4toannexb". The wrapper
//! is created initialized: input parameters and time base are copied in
//! before av_bsf_init runs.

use super::{CodecError, CodecParameters, CodecResult, Packet};
use crate::ffi::accessors::{
  ffbsf_get_par_in, ffbsf_get_par_out, ffbsf_get_time_base_out, ffbsf_set_time_base_in,
};
use crate::ffi::avcodec::{
  av_bsf_alloc, av_bsf_flush, av_bsf_free, av_bsf_get_by_name, av_bsf_init, av_bsf_receive_packet,
  av_bsf_send_packet,
};
use crate::ffi::avformat::avcodec_parameters_copy;
use crate::ffi::error::{AVERROR_EAGAIN, AVERROR_EOF};
use crate::ffi::{AVBSFContext, AVRational, FFmpegError};
use std::ffi::CString;
use std::ptr::{self, NonNull};

/// Safe wrapper around AVBSFContext
pub struct BsfContext {
  ptr: NonNull<AVBSFContext>,
  name: String,
}

impl BsfContext {
  /// Locate a bitstream filter by name and initialize a context for it
  /// with the given input parameters and time base
  pub fn new(
    name: &str,
    params: &CodecParameters,
    time_base: AVRational,
  ) -> CodecResult<Self> {
    let c_name =
      CString::new(name).map_err(|_| CodecError::InvalidConfig("Invalid filter name".into()))?;

    let filter = unsafe { av_bsf_get_by_name(c_name.as_ptr()) };
    if filter.is_null() {
      return Err(CodecError::BsfNotFound(name.to_string()));
    }

    let mut ctx_ptr: *mut AVBSFContext = ptr::null_mut();
    let ret = unsafe { av_bsf_alloc(filter, &mut ctx_ptr) };
    if ret < 0 || ctx_ptr.is_null() {
      return Err(CodecError::AllocationFailed("AVBSFContext"));
    }

    let mut ctx = Self {
      ptr: unsafe { NonNull::new_unchecked(ctx_ptr) },
      name: name.to_string(),
    };

    unsafe {
      let par_in = ffbsf_get_par_in(ctx.as_mut_ptr());
      let ret = avcodec_parameters_copy(par_in, params.as_ptr());
      if ret < 0 {
        return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
      }
      ffbsf_set_time_base_in(ctx.as_mut_ptr(), time_base.num, time_base.den);
    }

    let ret = unsafe { av_bsf_init(ctx.as_mut_ptr()) };
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }

    Ok(ctx)
  }

  /// Short name the filter was located by
  pub fn name(&self) -> &str {
    &self.name
  }

  #[inline]
  pub fn as_mut_ptr(&mut self) -> *mut AVBSFContext {
    self.ptr.as_ptr()
  }

  /// Output codec parameters, observable after initialization
  pub fn output_parameters(&self) -> CodecResult<CodecParameters> {
    let par_out = unsafe { ffbsf_get_par_out(self.ptr.as_ptr()) };
    if par_out.is_null() {
      return Err(CodecError::InvalidState("No output parameters".into()));
    }
    unsafe { CodecParameters::from_raw_copy(par_out) }
  }

  /// Output time base, observable after initialization
  pub fn output_time_base(&self) -> AVRational {
    let mut num = 0;
    let mut den = 0;
    unsafe { ffbsf_get_time_base_out(self.ptr.as_ptr(), &mut num, &mut den) };
    AVRational::new(num, den)
  }

  /// Submit a packet for filtering; None signals end of stream
  ///
  /// The filter takes ownership of the packet payload on success.
  /// Returns Ok(false) when output must be drained first (EAGAIN).
  pub fn send_packet(&mut self, packet: Option<&mut Packet>) -> CodecResult<bool> {
    let pkt_ptr = match packet {
      Some(packet) => packet.as_mut_ptr(),
      None => ptr::null_mut(),
    };
    let ret = unsafe { av_bsf_send_packet(self.ptr.as_ptr(), pkt_ptr) };
    if ret == AVERROR_EAGAIN {
      return Ok(false);
    }
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }
    Ok(true)
  }

  /// Retrieve one filtered packet
  ///
  /// Returns Ok(None) on EAGAIN (more input needed) or EOF (drained).
  pub fn receive_packet(&mut self) -> CodecResult<Option<Packet>> {
    let mut pkt = Packet::new()?;
    let ret = unsafe { av_bsf_receive_packet(self.ptr.as_ptr(), pkt.as_mut_ptr()) };
    if ret == AVERROR_EAGAIN || ret == AVERROR_EOF {
      return Ok(None);
    }
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }
    Ok(Some(pkt))
  }

  /// Reset internal state, discarding any buffered packets
  pub fn reset(&mut self) {
    unsafe { av_bsf_flush(self.ptr.as_ptr()) };
  }
}

impl Drop for BsfContext {
  fn drop(&mut self) {
    unsafe {
      let mut ptr = self.ptr.as_ptr();
      av_bsf_free(&mut ptr);
    }
  }
}

unsafe impl Send for BsfContext {}

impl std::fmt::Debug for BsfContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BsfContext").field("name", &self.name).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_unknown_bsf_name() {
    let params = CodecParameters::new().unwrap();
    let err = BsfContext::new("no_such_bsf", &params, AVRational::new(1, 90000)).unwrap_err();
    assert!(matches!(err, CodecError::BsfNotFound(_)));
  }

  #[test]
  fn test_null_bsf_passthrough() {
    let params = CodecParameters::new().unwrap();
    let mut bsf = BsfContext::new("null", &params, AVRational::new(1, 90000)).unwrap();
    assert_eq!(bsf.output_time_base(), AVRational::new(1, 90000));

    // EOS with no packets in flight drains to nothing
    assert!(bsf.send_packet(None).unwrap());
    assert!(bsf.receive_packet().unwrap().is_none());
  }

  #[test]
  fn test_reset_twice_is_idempotent() {
    let params = CodecParameters::new().unwrap();
    let mut bsf = BsfContext::new("null", &params, AVRational::new(1, 1000)).unwrap();
    bsf.reset();
    bsf.reset();
  }
}
