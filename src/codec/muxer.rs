//! Muxer context wrapper for FFmpeg libavformat
//!
//! Provides RAII wrapper around AVFormatContext for muxing operations.
//! Streams are added from codec parameters; header/trailer bookkeeping and
//! the higher-level lazy-initialization logic live in
//! [`crate::pipeline::MediaOutput`].

use super::avio_context::{CustomIOContext, IoCallbacks};
use super::{CodecError, CodecParameters, CodecResult, Packet};
use crate::ffi::accessors::{
  fffmt_get_oformat_flags, fffmt_get_stream, fffmt_set_metadata, fffmt_set_pb,
  ffstream_get_codecpar, ffstream_get_index, ffstream_get_time_base, ffstream_set_time_base,
};
use crate::ffi::avformat::{
  av_interleaved_write_frame, av_write_trailer, avfmt_flag, avformat_alloc_output_context2,
  avformat_free_context, avformat_new_stream, avformat_write_header, avio_flag, avio_open2,
  avio_closep, AVFormatContext, AVIOContext,
};
use crate::ffi::avutil::{av_dict_free, av_dict_set};
use crate::ffi::{AVDictionary, AVRational, FFmpegError};
use std::ffi::CString;
use std::ptr::{self, NonNull};

/// Muxer context wrapper
pub struct MuxerContext {
  /// Pointer to AVFormatContext
  ptr: NonNull<AVFormatContext>,
  /// Custom I/O context (buffer or callback output)
  io_ctx: Option<CustomIOContext>,
  /// File I/O handle opened by us (avio_open2), if any
  file_pb: *mut AVIOContext,
  /// Whether header has been written
  header_written: bool,
  /// Whether trailer has been written
  trailer_written: bool,
  /// Number of streams added
  nb_streams: usize,
}

impl MuxerContext {
  /// Create a muxer writing to a file path or URL
  ///
  /// The container format is guessed from `format_name` when given, else
  /// from the target's extension. The muxer opens its own I/O unless the
  /// format needs none.
  pub fn new_for_path(format_name: Option<&str>, target: &str) -> CodecResult<Self> {
    let c_target =
      CString::new(target).map_err(|_| CodecError::InvalidConfig("Invalid output path".into()))?;
    let c_format = match format_name {
      Some(name) => Some(
        CString::new(name)
          .map_err(|_| CodecError::InvalidConfig("Invalid format name".into()))?,
      ),
      None => None,
    };

    let mut ctx_ptr: *mut AVFormatContext = ptr::null_mut();
    let ret = unsafe {
      avformat_alloc_output_context2(
        &mut ctx_ptr,
        ptr::null(),
        c_format.as_ref().map(|c| c.as_ptr()).unwrap_or(ptr::null()),
        c_target.as_ptr(),
      )
    };
    if ret < 0 || ctx_ptr.is_null() {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }

    let mut muxer = Self {
      ptr: unsafe { NonNull::new_unchecked(ctx_ptr) },
      io_ctx: None,
      file_pb: ptr::null_mut(),
      header_written: false,
      trailer_written: false,
      nb_streams: 0,
    };

    // Formats like image2 handle their own I/O
    let flags = unsafe { fffmt_get_oformat_flags(ctx_ptr) };
    if (flags & avfmt_flag::NOFILE) == 0 {
      let mut pb: *mut AVIOContext = ptr::null_mut();
      let ret = unsafe {
        avio_open2(
          &mut pb,
          c_target.as_ptr(),
          avio_flag::WRITE,
          ptr::null(),
          ptr::null_mut(),
        )
      };
      if ret < 0 {
        return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
      }
      unsafe { fffmt_set_pb(ctx_ptr, pb) };
      muxer.file_pb = pb;
    }

    Ok(muxer)
  }

  /// Create a muxer writing through user callbacks
  pub fn new_with_callbacks(
    format_name: &str,
    callbacks: IoCallbacks,
    buffer_size: usize,
  ) -> CodecResult<Self> {
    let io_ctx = CustomIOContext::new_callback_write(callbacks, buffer_size)
      .map_err(CodecError::InvalidConfig)?;
    Self::with_custom_io(format_name, io_ctx)
  }

  /// Create a muxer collecting output into an in-memory buffer
  pub fn new_to_buffer(format_name: &str) -> CodecResult<Self> {
    let io_ctx = CustomIOContext::new_memory_write().map_err(CodecError::InvalidConfig)?;
    Self::with_custom_io(format_name, io_ctx)
  }

  fn with_custom_io(format_name: &str, io_ctx: CustomIOContext) -> CodecResult<Self> {
    let c_format = CString::new(format_name)
      .map_err(|_| CodecError::InvalidConfig("Invalid format name".into()))?;

    let mut ctx_ptr: *mut AVFormatContext = ptr::null_mut();
    let ret = unsafe {
      avformat_alloc_output_context2(&mut ctx_ptr, ptr::null(), c_format.as_ptr(), ptr::null())
    };
    if ret < 0 || ctx_ptr.is_null() {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }

    unsafe { fffmt_set_pb(ctx_ptr, io_ctx.as_ptr()) };

    Ok(Self {
      ptr: unsafe { NonNull::new_unchecked(ctx_ptr) },
      io_ctx: Some(io_ctx),
      file_pb: ptr::null_mut(),
      header_written: false,
      trailer_written: false,
      nb_streams: 0,
    })
  }

  // ========================================================================
  // Streams
  // ========================================================================

  /// Add an output stream with the given codec parameters and time base
  ///
  /// Must be called before `write_header`. Returns the new stream's index.
  pub fn add_stream(
    &mut self,
    params: &CodecParameters,
    time_base: AVRational,
  ) -> CodecResult<usize> {
    if self.header_written {
      return Err(CodecError::InvalidState(
        "Cannot add stream after header is written".to_string(),
      ));
    }

    let stream = unsafe { avformat_new_stream(self.ptr.as_ptr(), ptr::null()) };
    if stream.is_null() {
      return Err(CodecError::AllocationFailed("AVStream"));
    }

    let codecpar = unsafe { ffstream_get_codecpar(stream) };
    if codecpar.is_null() {
      return Err(CodecError::AllocationFailed("AVCodecParameters"));
    }

    unsafe {
      params.copy_to_raw(codecpar)?;
      ffstream_set_time_base(stream, time_base.num, time_base.den);
    }

    let index = unsafe { ffstream_get_index(stream) } as usize;
    self.nb_streams += 1;
    Ok(index)
  }

  /// Add a placeholder stream whose parameters arrive later
  /// (encoder-sourced streams before the encoder has opened)
  pub fn add_pending_stream(&mut self) -> CodecResult<usize> {
    if self.header_written {
      return Err(CodecError::InvalidState(
        "Cannot add stream after header is written".to_string(),
      ));
    }

    let stream = unsafe { avformat_new_stream(self.ptr.as_ptr(), ptr::null()) };
    if stream.is_null() {
      return Err(CodecError::AllocationFailed("AVStream"));
    }

    let index = unsafe { ffstream_get_index(stream) } as usize;
    self.nb_streams += 1;
    Ok(index)
  }

  /// Install codec parameters on an existing stream (late initialization)
  pub fn set_stream_parameters(
    &mut self,
    index: usize,
    params: &CodecParameters,
  ) -> CodecResult<()> {
    let stream = self.stream_ptr(index)?;
    let codecpar = unsafe { ffstream_get_codecpar(stream) };
    if codecpar.is_null() {
      return Err(CodecError::AllocationFailed("AVCodecParameters"));
    }
    unsafe { params.copy_to_raw(codecpar) }
  }

  /// Set the declared time base of an output stream
  pub fn set_stream_time_base(&mut self, index: usize, time_base: AVRational) -> CodecResult<()> {
    let stream = self.stream_ptr(index)?;
    unsafe { ffstream_set_time_base(stream, time_base.num, time_base.den) };
    Ok(())
  }

  /// Read back a stream's effective time base
  ///
  /// After `write_header` the muxer may have re-negotiated it.
  pub fn stream_time_base(&self, index: usize) -> CodecResult<AVRational> {
    let stream = self.stream_ptr(index)?;
    let mut num = 0;
    let mut den = 0;
    unsafe { ffstream_get_time_base(stream, &mut num, &mut den) };
    Ok(AVRational::new(num, den))
  }

  fn stream_ptr(&self, index: usize) -> CodecResult<*mut crate::ffi::avformat::AVStream> {
    let stream = unsafe { fffmt_get_stream(self.ptr.as_ptr(), index as u32) };
    if stream.is_null() {
      return Err(CodecError::InvalidState(format!(
        "No stream with index {index}"
      )));
    }
    Ok(stream)
  }

  /// Number of streams added so far
  pub fn stream_count(&self) -> usize {
    self.nb_streams
  }

  /// Check if the output format wants codec global headers in extradata
  pub fn needs_global_header(&self) -> bool {
    let flags = unsafe { fffmt_get_oformat_flags(self.ptr.as_ptr()) };
    (flags & avfmt_flag::GLOBALHEADER) != 0
  }

  /// Set a container metadata tag; only effective before the header write
  pub fn set_metadata(&mut self, key: &str, value: &str) -> CodecResult<()> {
    if self.header_written {
      return Err(CodecError::InvalidState(
        "Cannot set metadata after header is written".to_string(),
      ));
    }
    let c_key =
      CString::new(key).map_err(|_| CodecError::InvalidConfig("Invalid metadata key".into()))?;
    let c_value = CString::new(value)
      .map_err(|_| CodecError::InvalidConfig("Invalid metadata value".into()))?;
    let ret = unsafe { fffmt_set_metadata(self.ptr.as_ptr(), c_key.as_ptr(), c_value.as_ptr()) };
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }
    Ok(())
  }

  // ========================================================================
  // Muxing
  // ========================================================================

  /// Write the container header, exactly once
  pub fn write_header(&mut self, options: &[(String, String)]) -> CodecResult<()> {
    if self.header_written {
      return Err(CodecError::InvalidState("Header already written".to_string()));
    }
    if self.nb_streams == 0 {
      return Err(CodecError::InvalidConfig("No streams added".to_string()));
    }

    let mut dict: *mut AVDictionary = ptr::null_mut();
    for (key, value) in options {
      let c_key = CString::new(key.as_str())
        .map_err(|_| CodecError::InvalidConfig(format!("Invalid option key: {key}")))?;
      let c_value = CString::new(value.as_str())
        .map_err(|_| CodecError::InvalidConfig(format!("Invalid option value: {value}")))?;
      unsafe { av_dict_set(&mut dict, c_key.as_ptr(), c_value.as_ptr(), 0) };
    }

    let ret = unsafe { avformat_write_header(self.ptr.as_ptr(), &mut dict) };

    if !dict.is_null() {
      unsafe { av_dict_free(&mut dict) };
    }

    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }

    self.header_written = true;
    Ok(())
  }

  /// Write a packet through the interleaving queue
  ///
  /// The packet's stream_index must name a stream of this muxer. The
  /// payload reference is consumed; the caller still owns the shell.
  pub fn write_packet(&mut self, packet: &mut Packet) -> CodecResult<()> {
    if !self.header_written {
      return Err(CodecError::InvalidState("Header not written".to_string()));
    }
    if self.trailer_written {
      return Err(CodecError::InvalidState(
        "Muxer already finalized".to_string(),
      ));
    }

    let ret = unsafe { av_interleaved_write_frame(self.ptr.as_ptr(), packet.as_mut_ptr()) };
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }
    Ok(())
  }

  /// Write the container trailer
  pub fn write_trailer(&mut self) -> CodecResult<()> {
    if !self.header_written {
      return Err(CodecError::InvalidState("Header not written".to_string()));
    }
    if self.trailer_written {
      return Ok(());
    }

    let ret = unsafe { av_write_trailer(self.ptr.as_ptr()) };
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }

    self.trailer_written = true;

    if let Some(ref io) = self.io_ctx {
      io.flush();
    }
    Ok(())
  }

  /// Check if header has been written
  pub fn header_written(&self) -> bool {
    self.header_written
  }

  /// Check if trailer has been written
  pub fn trailer_written(&self) -> bool {
    self.trailer_written
  }

  /// Take the collected output bytes (buffer mode only)
  pub fn take_buffer(&mut self) -> Option<Vec<u8>> {
    self.io_ctx.as_mut().and_then(|io| io.take_buffer())
  }
}

impl Drop for MuxerContext {
  fn drop(&mut self) {
    // Best-effort trailer if the owner never finalized
    if self.header_written && !self.trailer_written {
      let _ = self.write_trailer();
    }

    unsafe {
      // Detach pb before freeing the context to avoid a double free; the
      // custom io context (if any) is freed by its own Drop
      fffmt_set_pb(self.ptr.as_ptr(), ptr::null_mut());

      if !self.file_pb.is_null() {
        let mut pb = self.file_pb;
        avio_closep(&mut pb);
      }

      avformat_free_context(self.ptr.as_ptr());
    }
  }
}

// SAFETY: MuxerContext owns all its resources and can move between threads
unsafe impl Send for MuxerContext {}

impl std::fmt::Debug for MuxerContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MuxerContext")
      .field("streams", &self.nb_streams)
      .field("header_written", &self.header_written)
      .field("trailer_written", &self.trailer_written)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_buffer_muxer_creation() {
    let muxer = MuxerContext::new_to_buffer("mp4");
    assert!(muxer.is_ok());
  }

  #[test]
  fn test_unknown_format_fails() {
    assert!(MuxerContext::new_to_buffer("not_a_container").is_err());
  }

  #[test]
  fn test_header_requires_streams() {
    let mut muxer = MuxerContext::new_to_buffer("mp4").unwrap();
    assert!(matches!(
      muxer.write_header(&[]),
      Err(CodecError::InvalidConfig(_))
    ));
  }
}
