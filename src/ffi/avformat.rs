//! libavformat function declarations
//!
//! Provides muxing and demuxing functionality for container formats.

use super::types::*;
use std::os::raw::{c_char, c_int, c_void};

// ============================================================================
// Opaque Types (format-specific)
// ============================================================================

/// Opaque AVFormatContext structure (muxer/demuxer context)
#[repr(C)]
pub struct AVFormatContext {
  _opaque: [u8; 0],
  _marker: std::marker::PhantomData<(*mut u8, std::marker::PhantomPinned)>,
}

/// Opaque AVOutputFormat structure (output format descriptor)
#[repr(C)]
pub struct AVOutputFormat {
  _opaque: [u8; 0],
  _marker: std::marker::PhantomData<(*mut u8, std::marker::PhantomPinned)>,
}

/// Opaque AVInputFormat structure (input format descriptor)
#[repr(C)]
pub struct AVInputFormat {
  _opaque: [u8; 0],
  _marker: std::marker::PhantomData<(*mut u8, std::marker::PhantomPinned)>,
}

/// Opaque AVIOContext structure (I/O abstraction)
#[repr(C)]
pub struct AVIOContext {
  _opaque: [u8; 0],
  _marker: std::marker::PhantomData<(*mut u8, std::marker::PhantomPinned)>,
}

/// Opaque AVStream structure (stream within container)
#[repr(C)]
pub struct AVStream {
  _opaque: [u8; 0],
  _marker: std::marker::PhantomData<(*mut u8, std::marker::PhantomPinned)>,
}

/// Opaque AVCodecParameters structure (stream codec parameters)
#[repr(C)]
pub struct AVCodecParameters {
  _opaque: [u8; 0],
  _marker: std::marker::PhantomData<(*mut u8, std::marker::PhantomPinned)>,
}

// ============================================================================
// Callback Types for Custom I/O
// ============================================================================

/// Read callback for custom I/O
///
/// Returns the number of bytes read, AVERROR_EOF at end of input, or a
/// negative AVERROR on failure
pub type ReadPacketFn =
  unsafe extern "C" fn(opaque: *mut c_void, buf: *mut u8, buf_size: c_int) -> c_int;

/// Write callback for custom I/O
///
/// Returns the number of bytes written, or a negative AVERROR on failure
pub type WritePacketFn =
  unsafe extern "C" fn(opaque: *mut c_void, buf: *const u8, buf_size: c_int) -> c_int;

/// Seek callback for custom I/O
///
/// `whence` is SEEK_SET/SEEK_CUR/SEEK_END or AVSEEK_SIZE; returns the new
/// position, or a negative AVERROR on failure
pub type SeekFn = unsafe extern "C" fn(opaque: *mut c_void, offset: i64, whence: c_int) -> i64;

unsafe extern "C" {
  // ========================================================================
  // Output Context (Muxing)
  // ========================================================================

  /// Allocate an AVFormatContext for output
  ///
  /// Either `format_name` or `filename` must identify a muxer.
  pub fn avformat_alloc_output_context2(
    ctx: *mut *mut AVFormatContext,
    oformat: *const AVOutputFormat,
    format_name: *const c_char,
    filename: *const c_char,
  ) -> c_int;

  /// Allocate an AVFormatContext
  pub fn avformat_alloc_context() -> *mut AVFormatContext;

  /// Free an AVFormatContext and all its streams
  pub fn avformat_free_context(ctx: *mut AVFormatContext);

  // ========================================================================
  // Stream Management
  // ========================================================================

  /// Add a new stream to the format context
  pub fn avformat_new_stream(ctx: *mut AVFormatContext, codec: *const AVCodec) -> *mut AVStream;

  // ========================================================================
  // Muxing Operations
  // ========================================================================

  /// Write the container header
  ///
  /// May re-negotiate stream time bases (e.g. MP4 rounds to 1/timescale);
  /// read them back after this call.
  pub fn avformat_write_header(ctx: *mut AVFormatContext, options: *mut *mut AVDictionary)
  -> c_int;

  /// Write a packet, buffering internally for correct interleaving
  ///
  /// Takes ownership of the packet reference on success. Pass NULL to flush
  /// the interleaving queue.
  pub fn av_interleaved_write_frame(ctx: *mut AVFormatContext, pkt: *mut AVPacket) -> c_int;

  /// Write the container trailer; valid only after a successful header write
  pub fn av_write_trailer(ctx: *mut AVFormatContext) -> c_int;

  // ========================================================================
  // Input Context (Demuxing)
  // ========================================================================

  /// Open an input stream and read the header
  pub fn avformat_open_input(
    ps: *mut *mut AVFormatContext,
    url: *const c_char,
    fmt: *const AVInputFormat,
    options: *mut *mut AVDictionary,
  ) -> c_int;

  /// Close an opened input AVFormatContext and set *s to NULL
  pub fn avformat_close_input(s: *mut *mut AVFormatContext);

  /// Read packets of a media file to get stream information
  pub fn avformat_find_stream_info(
    ic: *mut AVFormatContext,
    options: *mut *mut AVDictionary,
  ) -> c_int;

  /// Find the "best" stream of the given media type
  ///
  /// # Returns
  /// * >= 0 on success (stream index)
  /// * AVERROR_STREAM_NOT_FOUND if no stream of that type exists
  pub fn av_find_best_stream(
    ic: *mut AVFormatContext,
    type_: c_int,
    wanted_stream_nb: c_int,
    related_stream: c_int,
    decoder_ret: *mut *const AVCodec,
    flags: c_int,
  ) -> c_int;

  /// Return the next packet of a stream
  ///
  /// # Returns
  /// * 0 on success
  /// * AVERROR_EOF at end of file
  pub fn av_read_frame(s: *mut AVFormatContext, pkt: *mut AVPacket) -> c_int;

  /// Seek to a keyframe at the given timestamp
  ///
  /// `timestamp` is in stream time base units, or AV_TIME_BASE units when
  /// `stream_index` is -1.
  pub fn av_seek_frame(
    s: *mut AVFormatContext,
    stream_index: c_int,
    timestamp: i64,
    flags: c_int,
  ) -> c_int;

  // ========================================================================
  // Custom I/O
  // ========================================================================

  /// Allocate and initialize an AVIOContext for custom I/O
  ///
  /// # Safety
  /// The buffer must be allocated with av_malloc and is owned by the
  /// AVIOContext afterwards.
  pub fn avio_alloc_context(
    buffer: *mut u8,
    buffer_size: c_int,
    write_flag: c_int,
    opaque: *mut c_void,
    read_packet: Option<ReadPacketFn>,
    write_packet: Option<WritePacketFn>,
    seek: Option<SeekFn>,
  ) -> *mut AVIOContext;

  /// Free the AVIOContext and its internal buffer, setting *s to NULL
  pub fn avio_context_free(s: *mut *mut AVIOContext);

  /// Force flushing of buffered data to the output
  pub fn avio_flush(s: *mut AVIOContext);

  /// Open a URL/file for I/O
  pub fn avio_open2(
    s: *mut *mut AVIOContext,
    url: *const c_char,
    flags: c_int,
    int_cb: *const c_void,
    options: *mut *mut AVDictionary,
  ) -> c_int;

  /// Close an I/O context opened by avio_open2 and set *s to NULL
  pub fn avio_closep(s: *mut *mut AVIOContext) -> c_int;

  // ========================================================================
  // Codec Parameters
  // ========================================================================

  /// Allocate a new AVCodecParameters and set its fields to default values
  pub fn avcodec_parameters_alloc() -> *mut AVCodecParameters;

  /// Free an AVCodecParameters instance
  pub fn avcodec_parameters_free(par: *mut *mut AVCodecParameters);

  /// Copy codec parameters from a codec context to AVCodecParameters
  pub fn avcodec_parameters_from_context(
    par: *mut AVCodecParameters,
    codec: *const AVCodecContext,
  ) -> c_int;

  /// Fill a codec context with codec parameters
  pub fn avcodec_parameters_to_context(
    codec: *mut AVCodecContext,
    par: *const AVCodecParameters,
  ) -> c_int;

  /// Copy the contents of src to dst
  pub fn avcodec_parameters_copy(
    dst: *mut AVCodecParameters,
    src: *const AVCodecParameters,
  ) -> c_int;
}

// ============================================================================
// Constants
// ============================================================================

/// Seek flags
pub mod seek_flag {
  use std::os::raw::c_int;

  /// Seek backward
  pub const BACKWARD: c_int = 1;
  /// Seeking based on position in bytes
  pub const BYTE: c_int = 2;
  /// Seek to any frame (not just keyframes)
  pub const ANY: c_int = 4;
  /// Seeking based on frame number
  pub const FRAME: c_int = 8;
}

/// Seek whence values
pub mod seek_whence {
  use std::os::raw::c_int;

  /// Seek from beginning
  pub const SEEK_SET: c_int = 0;
  /// Seek from current position
  pub const SEEK_CUR: c_int = 1;
  /// Seek from end
  pub const SEEK_END: c_int = 2;
  /// Return stream size (special whence value for seek callback)
  pub const AVSEEK_SIZE: c_int = 0x10000;
}

/// AVIO flags
pub mod avio_flag {
  use std::os::raw::c_int;

  /// Read-only
  pub const READ: c_int = 1;
  /// Write-only
  pub const WRITE: c_int = 2;
  /// Read-write
  pub const READ_WRITE: c_int = READ | WRITE;
}

/// Media types (codec parameter / stream classification)
pub mod media_type {
  use std::os::raw::c_int;

  pub const UNKNOWN: c_int = -1;
  pub const VIDEO: c_int = 0;
  pub const AUDIO: c_int = 1;
  pub const DATA: c_int = 2;
  pub const SUBTITLE: c_int = 3;
  pub const ATTACHMENT: c_int = 4;
}

/// Output format flags
pub mod avfmt_flag {
  use std::os::raw::c_int;

  /// Muxer handles its own I/O; no pb required
  pub const NOFILE: c_int = 0x0001;
  /// Needs global header
  pub const GLOBALHEADER: c_int = 0x0040;
}
