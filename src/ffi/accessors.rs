//! Rust declarations for C accessor functions
//!
//! These functions provide access to FFmpeg struct fields via the thin C
//! accessor library (accessors.c). Every FFmpeg struct stays opaque on the
//! Rust side; the shim is rebuilt against whatever headers the build links.

use super::avfilter::{AVBufferSrcParameters, AVFilter, AVFilterContext, AVFilterGraph};
use super::avformat::{AVCodecParameters, AVFormatContext, AVIOContext, AVStream};
use super::types::*;
use std::os::raw::{c_char, c_int, c_uint};

/// `AVIOContext.seekable` value for ordinary seekable I/O
pub const AVIO_SEEKABLE_NORMAL: c_int = 1;

unsafe extern "C" {
  // ========================================================================
  // AVCodecContext Setters
  // ========================================================================

  pub fn ffctx_set_width(ctx: *mut AVCodecContext, width: c_int);
  pub fn ffctx_set_height(ctx: *mut AVCodecContext, height: c_int);
  pub fn ffctx_set_pix_fmt(ctx: *mut AVCodecContext, pix_fmt: c_int);
  pub fn ffctx_set_sample_aspect_ratio(ctx: *mut AVCodecContext, num: c_int, den: c_int);
  pub fn ffctx_set_time_base(ctx: *mut AVCodecContext, num: c_int, den: c_int);
  pub fn ffctx_set_framerate(ctx: *mut AVCodecContext, num: c_int, den: c_int);
  pub fn ffctx_set_bit_rate(ctx: *mut AVCodecContext, bit_rate: i64);
  pub fn ffctx_set_rc_min_rate(ctx: *mut AVCodecContext, rc_min_rate: i64);
  pub fn ffctx_set_rc_max_rate(ctx: *mut AVCodecContext, rc_max_rate: i64);
  pub fn ffctx_set_rc_buffer_size(ctx: *mut AVCodecContext, rc_buffer_size: c_int);
  pub fn ffctx_set_gop_size(ctx: *mut AVCodecContext, gop_size: c_int);
  pub fn ffctx_set_max_b_frames(ctx: *mut AVCodecContext, max_b_frames: c_int);
  pub fn ffctx_set_thread_count(ctx: *mut AVCodecContext, thread_count: c_int);
  pub fn ffctx_set_flags(ctx: *mut AVCodecContext, flags: c_int);

  /// Installs a fresh reference; the caller keeps ownership of `device_ctx`
  pub fn ffctx_set_hw_device_ctx(ctx: *mut AVCodecContext, device_ctx: *mut AVBufferRef) -> c_int;
  /// Installs a fresh reference; the caller keeps ownership of `frames_ctx`
  pub fn ffctx_set_hw_frames_ctx(ctx: *mut AVCodecContext, frames_ctx: *mut AVBufferRef) -> c_int;

  // ========================================================================
  // AVCodecContext Audio Setters
  // ========================================================================

  pub fn ffctx_set_sample_rate(ctx: *mut AVCodecContext, sample_rate: c_int);
  pub fn ffctx_set_sample_fmt(ctx: *mut AVCodecContext, sample_fmt: c_int);
  /// Channel layout by native mask; shimmed over both the AVChannelLayout
  /// and the legacy uint64 APIs
  pub fn ffctx_set_channel_layout_mask(ctx: *mut AVCodecContext, mask: u64);

  // ========================================================================
  // AVCodecContext Getters
  // ========================================================================

  pub fn ffctx_get_width(ctx: *const AVCodecContext) -> c_int;
  pub fn ffctx_get_height(ctx: *const AVCodecContext) -> c_int;
  pub fn ffctx_get_pix_fmt(ctx: *const AVCodecContext) -> c_int;
  pub fn ffctx_get_flags(ctx: *const AVCodecContext) -> c_int;
  pub fn ffctx_get_time_base(ctx: *const AVCodecContext, num: *mut c_int, den: *mut c_int);
  pub fn ffctx_get_framerate(ctx: *const AVCodecContext, num: *mut c_int, den: *mut c_int);
  pub fn ffctx_get_sample_rate(ctx: *const AVCodecContext) -> c_int;
  pub fn ffctx_get_sample_fmt(ctx: *const AVCodecContext) -> c_int;
  pub fn ffctx_get_channel_layout_mask(ctx: *const AVCodecContext) -> u64;
  pub fn ffctx_get_frame_size(ctx: *const AVCodecContext) -> c_int;
  /// Borrowed reference owned by the context; do not unref
  pub fn ffctx_get_hw_frames_ctx(ctx: *const AVCodecContext) -> *mut AVBufferRef;

  // ========================================================================
  // AVCodec Getters
  // ========================================================================

  pub fn ffcodec_get_name(codec: *const AVCodec) -> *const c_char;
  pub fn ffcodec_get_capabilities(codec: *const AVCodec) -> c_int;
  pub fn ffcodec_get_type(codec: *const AVCodec) -> c_int;
  pub fn ffcodec_get_id(codec: *const AVCodec) -> c_int;

  // ========================================================================
  // AVFrame
  // ========================================================================

  pub fn ffframe_get_width(frame: *const AVFrame) -> c_int;
  pub fn ffframe_set_width(frame: *mut AVFrame, width: c_int);
  pub fn ffframe_get_height(frame: *const AVFrame) -> c_int;
  pub fn ffframe_set_height(frame: *mut AVFrame, height: c_int);
  pub fn ffframe_get_format(frame: *const AVFrame) -> c_int;
  pub fn ffframe_set_format(frame: *mut AVFrame, format: c_int);
  pub fn ffframe_get_pts(frame: *const AVFrame) -> i64;
  pub fn ffframe_set_pts(frame: *mut AVFrame, pts: i64);
  pub fn ffframe_get_duration(frame: *const AVFrame) -> i64;
  pub fn ffframe_set_duration(frame: *mut AVFrame, duration: i64);
  pub fn ffframe_get_best_effort_timestamp(frame: *const AVFrame) -> i64;
  pub fn ffframe_get_sample_rate(frame: *const AVFrame) -> c_int;
  pub fn ffframe_set_sample_rate(frame: *mut AVFrame, sample_rate: c_int);
  pub fn ffframe_get_nb_samples(frame: *const AVFrame) -> c_int;
  pub fn ffframe_set_nb_samples(frame: *mut AVFrame, nb_samples: c_int);
  pub fn ffframe_get_channel_layout_mask(frame: *const AVFrame) -> u64;
  pub fn ffframe_set_channel_layout_mask(frame: *mut AVFrame, mask: u64);
  pub fn ffframe_get_sample_aspect_ratio(
    frame: *const AVFrame,
    num: *mut c_int,
    den: *mut c_int,
  );
  pub fn ffframe_set_sample_aspect_ratio(frame: *mut AVFrame, num: c_int, den: c_int);
  /// Borrowed reference owned by the frame; do not unref
  pub fn ffframe_get_hw_frames_ctx(frame: *const AVFrame) -> *mut AVBufferRef;
  /// Installs a fresh reference; the caller keeps ownership of `frames_ctx`
  pub fn ffframe_set_hw_frames_ctx(frame: *mut AVFrame, frames_ctx: *mut AVBufferRef) -> c_int;
  pub fn ffframe_data(frame: *const AVFrame, plane: c_int) -> *mut u8;
  pub fn ffframe_linesize(frame: *const AVFrame, plane: c_int) -> c_int;

  // ========================================================================
  // AVPacket
  // ========================================================================

  pub fn ffpkt_data(pkt: *const AVPacket) -> *const u8;
  pub fn ffpkt_size(pkt: *const AVPacket) -> c_int;
  pub fn ffpkt_pts(pkt: *const AVPacket) -> i64;
  pub fn ffpkt_set_pts(pkt: *mut AVPacket, pts: i64);
  pub fn ffpkt_dts(pkt: *const AVPacket) -> i64;
  pub fn ffpkt_set_dts(pkt: *mut AVPacket, dts: i64);
  pub fn ffpkt_duration(pkt: *const AVPacket) -> i64;
  pub fn ffpkt_set_duration(pkt: *mut AVPacket, duration: i64);
  pub fn ffpkt_flags(pkt: *const AVPacket) -> c_int;
  pub fn ffpkt_set_flags(pkt: *mut AVPacket, flags: c_int);
  pub fn ffpkt_stream_index(pkt: *const AVPacket) -> c_int;
  pub fn ffpkt_set_stream_index(pkt: *mut AVPacket, stream_index: c_int);

  // ========================================================================
  // AVStream
  // ========================================================================

  pub fn ffstream_get_index(stream: *const AVStream) -> c_int;
  pub fn ffstream_get_codecpar(stream: *mut AVStream) -> *mut AVCodecParameters;
  pub fn ffstream_get_codecpar_const(stream: *const AVStream) -> *const AVCodecParameters;
  pub fn ffstream_get_time_base(stream: *const AVStream, num: *mut c_int, den: *mut c_int);
  pub fn ffstream_set_time_base(stream: *mut AVStream, num: c_int, den: c_int);
  pub fn ffstream_get_avg_frame_rate(stream: *const AVStream, num: *mut c_int, den: *mut c_int);
  pub fn ffstream_get_r_frame_rate(stream: *const AVStream, num: *mut c_int, den: *mut c_int);
  pub fn ffstream_get_duration(stream: *const AVStream) -> i64;

  // ========================================================================
  // AVCodecParameters
  // ========================================================================

  pub fn ffcodecpar_get_codec_type(par: *const AVCodecParameters) -> c_int;
  pub fn ffcodecpar_get_codec_id(par: *const AVCodecParameters) -> c_int;
  pub fn ffcodecpar_set_codec_tag(par: *mut AVCodecParameters, codec_tag: u32);
  pub fn ffcodecpar_get_width(par: *const AVCodecParameters) -> c_int;
  pub fn ffcodecpar_get_height(par: *const AVCodecParameters) -> c_int;
  pub fn ffcodecpar_get_format(par: *const AVCodecParameters) -> c_int;
  pub fn ffcodecpar_get_bit_rate(par: *const AVCodecParameters) -> i64;
  pub fn ffcodecpar_get_sample_rate(par: *const AVCodecParameters) -> c_int;
  pub fn ffcodecpar_get_channel_layout_mask(par: *const AVCodecParameters) -> u64;
  pub fn ffcodecpar_get_frame_size(par: *const AVCodecParameters) -> c_int;

  // ========================================================================
  // AVFormatContext
  // ========================================================================

  pub fn fffmt_get_nb_streams(ctx: *const AVFormatContext) -> c_uint;
  pub fn fffmt_get_stream(ctx: *const AVFormatContext, index: c_uint) -> *mut AVStream;
  pub fn fffmt_set_pb(ctx: *mut AVFormatContext, pb: *mut AVIOContext);
  pub fn fffmt_get_pb(ctx: *const AVFormatContext) -> *mut AVIOContext;
  pub fn fffmt_get_oformat_flags(ctx: *const AVFormatContext) -> c_int;
  pub fn fffmt_get_duration(ctx: *const AVFormatContext) -> i64;
  pub fn fffmt_get_iformat_name(ctx: *const AVFormatContext) -> *const c_char;
  pub fn fffmt_set_metadata(
    ctx: *mut AVFormatContext,
    key: *const c_char,
    value: *const c_char,
  ) -> c_int;

  // ========================================================================
  // AVIOContext
  // ========================================================================

  pub fn fffio_set_seekable(io: *mut AVIOContext, seekable: c_int);

  /// Free the context's internal buffer, which may have been reallocated
  /// since avio_alloc_context. Must run before avio_context_free.
  pub fn fffio_free_buffer(io: *mut AVIOContext);

  // ========================================================================
  // AVFilter / AVFilterContext / AVFilterGraph
  // ========================================================================

  pub fn fffilter_get_flags(filter: *const AVFilter) -> c_int;
  pub fn fffilterctx_get_filter(ctx: *const AVFilterContext) -> *const AVFilter;
  /// Installs a fresh reference; the caller keeps ownership of `device_ctx`
  pub fn fffilterctx_set_hw_device_ctx(
    ctx: *mut AVFilterContext,
    device_ctx: *mut AVBufferRef,
  ) -> c_int;
  pub fn fffiltergraph_set_nb_threads(graph: *mut AVFilterGraph, nb_threads: c_int);
  pub fn fffiltergraph_set_scale_sws_opts(graph: *mut AVFilterGraph, opts: *const c_char) -> c_int;
  pub fn fffiltergraph_get_nb_filters(graph: *const AVFilterGraph) -> c_uint;
  pub fn fffiltergraph_get_filter(
    graph: *const AVFilterGraph,
    index: c_uint,
  ) -> *mut AVFilterContext;

  /// Allocate a single AVFilterInOut with a duplicated label, bound to
  /// pad `pad_idx` of `ctx`. Returns NULL on allocation failure.
  pub fn ffinout_alloc_labeled(
    name: *const c_char,
    ctx: *mut AVFilterContext,
    pad_idx: c_int,
  ) -> *mut super::avfilter::AVFilterInOut;

  // ========================================================================
  // AVBufferSrcParameters
  // ========================================================================

  pub fn ffbuffersrc_par_set_format(par: *mut AVBufferSrcParameters, format: c_int);
  pub fn ffbuffersrc_par_set_width(par: *mut AVBufferSrcParameters, width: c_int);
  pub fn ffbuffersrc_par_set_height(par: *mut AVBufferSrcParameters, height: c_int);
  pub fn ffbuffersrc_par_set_time_base(par: *mut AVBufferSrcParameters, num: c_int, den: c_int);
  pub fn ffbuffersrc_par_set_frame_rate(par: *mut AVBufferSrcParameters, num: c_int, den: c_int);
  pub fn ffbuffersrc_par_set_sample_aspect_ratio(
    par: *mut AVBufferSrcParameters,
    num: c_int,
    den: c_int,
  );
  /// Installs a fresh reference; the caller keeps ownership of `frames_ctx`
  pub fn ffbuffersrc_par_set_hw_frames_ctx(
    par: *mut AVBufferSrcParameters,
    frames_ctx: *mut AVBufferRef,
  ) -> c_int;

  // ========================================================================
  // AVBSFContext
  // ========================================================================

  pub fn ffbsf_get_par_in(ctx: *mut AVBSFContext) -> *mut AVCodecParameters;
  pub fn ffbsf_get_par_out(ctx: *const AVBSFContext) -> *const AVCodecParameters;
  pub fn ffbsf_set_time_base_in(ctx: *mut AVBSFContext, num: c_int, den: c_int);
  pub fn ffbsf_get_time_base_out(ctx: *const AVBSFContext, num: *mut c_int, den: *mut c_int);

  // ========================================================================
  // AVHWFramesContext (behind an AVBufferRef)
  // ========================================================================

  pub fn ffhwframes_set_format(frames_ref: *mut AVBufferRef, format: c_int);
  pub fn ffhwframes_set_sw_format(frames_ref: *mut AVBufferRef, sw_format: c_int);
  pub fn ffhwframes_set_width(frames_ref: *mut AVBufferRef, width: c_int);
  pub fn ffhwframes_set_height(frames_ref: *mut AVBufferRef, height: c_int);
  pub fn ffhwframes_set_initial_pool_size(frames_ref: *mut AVBufferRef, size: c_int);
  pub fn ffhwframes_get_format(frames_ref: *const AVBufferRef) -> c_int;
  pub fn ffhwframes_get_sw_format(frames_ref: *const AVBufferRef) -> c_int;
  pub fn ffhwframes_get_device_ctx(frames_ref: *const AVBufferRef) -> *mut AVBufferRef;
}
