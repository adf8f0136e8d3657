//! Demuxer context wrapper for FFmpeg libavformat
//!
//! Provides RAII wrapper around AVFormatContext for demuxing operations.
//! Streams are exposed as owned value snapshots so they stay valid after
//! the demuxer is gone.

use super::avio_context::CustomIOContext;
use super::{CodecError, CodecParameters, CodecResult, Packet};
use crate::ffi::accessors::{
  fffmt_get_duration, fffmt_get_iformat_name, fffmt_get_nb_streams, fffmt_get_stream,
  fffmt_set_pb, ffstream_get_avg_frame_rate, ffstream_get_codecpar_const, ffstream_get_duration,
  ffstream_get_index, ffstream_get_r_frame_rate, ffstream_get_time_base,
};
use crate::ffi::avcodec::av_packet_alloc;
use crate::ffi::avformat::{
  av_find_best_stream, av_read_frame, av_seek_frame, avformat_alloc_context,
  avformat_close_input, avformat_find_stream_info, avformat_open_input, media_type, seek_flag,
  AVFormatContext,
};
use crate::ffi::error::AVERROR_EOF;
use crate::ffi::{AVRational, FFmpegError};
use std::ffi::{CStr, CString};
use std::os::raw::c_int;
use std::ptr::{self, NonNull};

/// Media type for stream classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
  /// Video stream
  Video,
  /// Audio stream
  Audio,
  /// Subtitle stream
  Subtitle,
  /// Data stream
  Data,
  /// Anything this crate does not classify
  Unknown,
}

impl MediaType {
  /// Convert to FFmpeg media type constant
  pub fn as_ffmpeg(&self) -> c_int {
    match self {
      MediaType::Video => media_type::VIDEO,
      MediaType::Audio => media_type::AUDIO,
      MediaType::Subtitle => media_type::SUBTITLE,
      MediaType::Data => media_type::DATA,
      MediaType::Unknown => media_type::UNKNOWN,
    }
  }

  /// Convert from FFmpeg media type constant
  pub fn from_ffmpeg(value: c_int) -> Self {
    match value {
      x if x == media_type::VIDEO => MediaType::Video,
      x if x == media_type::AUDIO => MediaType::Audio,
      x if x == media_type::SUBTITLE => MediaType::Subtitle,
      x if x == media_type::DATA => MediaType::Data,
      _ => MediaType::Unknown,
    }
  }
}

/// Value snapshot of a demuxed elementary stream
///
/// Carries an owned copy of the codec parameters, so it can outlive the
/// demuxer and be handed to decoders and muxers freely.
#[derive(Debug, Clone)]
pub struct Stream {
  /// Stream index within its container
  pub index: i32,
  /// Media type (video, audio, ...)
  pub media_type: MediaType,
  /// Owned copy of the stream codec parameters
  pub codec_parameters: CodecParameters,
  /// Stream time base
  pub time_base: AVRational,
  /// Average frame rate (0/0 when unknown)
  pub avg_frame_rate: AVRational,
  /// Base frame rate (0/0 when unknown)
  pub r_frame_rate: AVRational,
  /// Stream duration in time_base units (AV_NOPTS_VALUE when unknown)
  pub duration: i64,
}

/// Demuxer context wrapper
///
/// Provides RAII wrapper around AVFormatContext for demuxing operations.
pub struct DemuxerContext {
  /// Pointer to AVFormatContext
  ptr: NonNull<AVFormatContext>,
  /// Custom I/O context (for buffer input)
  custom_io: Option<CustomIOContext>,
  /// Cached stream snapshots
  streams: Vec<Stream>,
}

impl DemuxerContext {
  /// Open a file or URL for demuxing
  pub fn open(url: &str) -> CodecResult<Self> {
    let c_url =
      CString::new(url).map_err(|_| CodecError::InvalidConfig("Invalid input path".into()))?;

    let mut ctx_ptr: *mut AVFormatContext = ptr::null_mut();
    let ret =
      unsafe { avformat_open_input(&mut ctx_ptr, c_url.as_ptr(), ptr::null(), ptr::null_mut()) };

    if ret < 0 || ctx_ptr.is_null() {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }

    let mut ctx = Self {
      ptr: unsafe { NonNull::new_unchecked(ctx_ptr) },
      custom_io: None,
      streams: Vec::new(),
    };

    ctx.find_stream_info()?;
    Ok(ctx)
  }

  /// Open an in-memory buffer for demuxing
  pub fn open_buffer(data: Vec<u8>) -> CodecResult<Self> {
    let custom_io = CustomIOContext::new_memory_read(data).map_err(CodecError::InvalidConfig)?;

    let ctx_ptr = unsafe { avformat_alloc_context() };
    if ctx_ptr.is_null() {
      return Err(CodecError::AllocationFailed("AVFormatContext"));
    }

    unsafe { fffmt_set_pb(ctx_ptr, custom_io.as_ptr()) };

    let mut ctx_ptr_mut = ctx_ptr;
    let ret =
      unsafe { avformat_open_input(&mut ctx_ptr_mut, ptr::null(), ptr::null(), ptr::null_mut()) };

    if ret < 0 {
      // On failure avformat_open_input frees the context; the io context is
      // dropped with custom_io
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }

    let mut ctx = Self {
      ptr: unsafe { NonNull::new_unchecked(ctx_ptr_mut) },
      custom_io: Some(custom_io),
      streams: Vec::new(),
    };

    ctx.find_stream_info()?;
    Ok(ctx)
  }

  /// Find and snapshot stream information
  fn find_stream_info(&mut self) -> CodecResult<()> {
    let ret = unsafe { avformat_find_stream_info(self.ptr.as_ptr(), ptr::null_mut()) };
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }

    let nb_streams = unsafe { fffmt_get_nb_streams(self.ptr.as_ptr()) };
    self.streams.clear();
    self.streams.reserve(nb_streams as usize);

    for i in 0..nb_streams {
      let stream = unsafe { fffmt_get_stream(self.ptr.as_ptr(), i) };
      if stream.is_null() {
        continue;
      }

      let codecpar = unsafe { ffstream_get_codecpar_const(stream) };
      if codecpar.is_null() {
        continue;
      }

      let codec_parameters = unsafe { CodecParameters::from_raw_copy(codecpar) }?;
      let media_type = MediaType::from_ffmpeg(codec_parameters.codec_type());

      let mut tb_num = 0;
      let mut tb_den = 0;
      let mut avg_num = 0;
      let mut avg_den = 0;
      let mut r_num = 0;
      let mut r_den = 0;
      unsafe {
        ffstream_get_time_base(stream, &mut tb_num, &mut tb_den);
        ffstream_get_avg_frame_rate(stream, &mut avg_num, &mut avg_den);
        ffstream_get_r_frame_rate(stream, &mut r_num, &mut r_den);
      }

      self.streams.push(Stream {
        index: unsafe { ffstream_get_index(stream) },
        media_type,
        codec_parameters,
        time_base: AVRational::new(tb_num, tb_den),
        avg_frame_rate: AVRational::new(avg_num, avg_den),
        r_frame_rate: AVRational::new(r_num, r_den),
        duration: unsafe { ffstream_get_duration(stream) },
      });
    }

    Ok(())
  }

  /// Stream snapshots, in container order
  pub fn streams(&self) -> &[Stream] {
    &self.streams
  }

  /// Find the "best" stream of the given media type
  pub fn best_stream(&self, media_type: MediaType) -> Option<&Stream> {
    let index = unsafe {
      av_find_best_stream(
        self.ptr.as_ptr(),
        media_type.as_ffmpeg(),
        -1,
        -1,
        ptr::null_mut(),
        0,
      )
    };
    if index < 0 {
      return None;
    }
    self.streams.iter().find(|s| s.index == index)
  }

  /// Read the next packet from the container
  ///
  /// Returns Ok(None) at end of input.
  pub fn read_packet(&mut self) -> CodecResult<Option<Packet>> {
    let pkt_ptr = unsafe { av_packet_alloc() };
    let mut packet = unsafe { Packet::from_raw(pkt_ptr) }
      .ok_or(CodecError::AllocationFailed("AVPacket"))?;

    let ret = unsafe { av_read_frame(self.ptr.as_ptr(), packet.as_mut_ptr()) };
    if ret == AVERROR_EOF {
      return Ok(None);
    }
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }
    Ok(Some(packet))
  }

  /// Seek to the keyframe at or before `timestamp` (stream time base units)
  pub fn seek(&mut self, stream_index: i32, timestamp: i64) -> CodecResult<()> {
    let ret = unsafe {
      av_seek_frame(
        self.ptr.as_ptr(),
        stream_index,
        timestamp,
        seek_flag::BACKWARD,
      )
    };
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }
    Ok(())
  }

  /// Container duration in AV_TIME_BASE units (microseconds)
  pub fn duration(&self) -> i64 {
    unsafe { fffmt_get_duration(self.ptr.as_ptr()) }
  }

  /// Short name of the detected input format
  pub fn format_name(&self) -> Option<String> {
    let name = unsafe { fffmt_get_iformat_name(self.ptr.as_ptr()) };
    if name.is_null() {
      return None;
    }
    Some(unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
  }
}

impl Drop for DemuxerContext {
  fn drop(&mut self) {
    unsafe {
      // Detach custom I/O before closing; CustomIOContext owns it
      if self.custom_io.is_some() {
        fffmt_set_pb(self.ptr.as_ptr(), ptr::null_mut());
      }
      let mut ptr = self.ptr.as_ptr();
      avformat_close_input(&mut ptr);
    }
  }
}

// SAFETY: DemuxerContext owns all its resources and can move between threads
unsafe impl Send for DemuxerContext {}

impl std::fmt::Debug for DemuxerContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DemuxerContext")
      .field("streams", &self.streams.len())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_media_type_round_trip() {
    for mt in [
      MediaType::Video,
      MediaType::Audio,
      MediaType::Subtitle,
      MediaType::Data,
    ] {
      assert_eq!(MediaType::from_ffmpeg(mt.as_ffmpeg()), mt);
    }
    assert_eq!(MediaType::from_ffmpeg(99), MediaType::Unknown);
  }

  #[test]
  fn test_open_missing_file_fails() {
    assert!(DemuxerContext::open("/nonexistent/input.mp4").is_err());
  }

  #[test]
  fn test_open_garbage_buffer_fails() {
    assert!(DemuxerContext::open_buffer(vec![0u8; 64]).is_err());
  }
}
