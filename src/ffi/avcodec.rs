//! libavcodec function declarations
//!
//! Codec discovery, the send/receive state machines, packet management and
//! bitstream filters.

use super::types::*;
use std::os::raw::{c_char, c_int};

unsafe extern "C" {
  // ========================================================================
  // Codec Discovery
  // ========================================================================

  /// Find an encoder by codec ID
  pub fn avcodec_find_encoder(id: c_int) -> *const AVCodec;

  /// Find an encoder by name (e.g., "libx264", "h264_videotoolbox")
  pub fn avcodec_find_encoder_by_name(name: *const c_char) -> *const AVCodec;

  /// Find a decoder by codec ID
  pub fn avcodec_find_decoder(id: c_int) -> *const AVCodec;

  /// Find a decoder by name
  pub fn avcodec_find_decoder_by_name(name: *const c_char) -> *const AVCodec;

  // ========================================================================
  // Codec Context Lifecycle
  // ========================================================================

  /// Allocate an AVCodecContext and set its fields to default values
  pub fn avcodec_alloc_context3(codec: *const AVCodec) -> *mut AVCodecContext;

  /// Free the codec context and everything associated with it
  pub fn avcodec_free_context(avctx: *mut *mut AVCodecContext);

  /// Initialize the AVCodecContext to use the given AVCodec
  pub fn avcodec_open2(
    avctx: *mut AVCodecContext,
    codec: *const AVCodec,
    options: *mut *mut AVDictionary,
  ) -> c_int;

  // ========================================================================
  // Encoding (send frame, receive packet)
  // ========================================================================

  /// Supply a raw frame to the encoder
  ///
  /// # Returns
  /// * 0 on success
  /// * AVERROR(EAGAIN) - output not available, must read with receive_packet first
  /// * AVERROR_EOF - encoder has been flushed, no more input accepted
  /// * AVERROR(EINVAL) - codec not opened, or it is a decoder
  /// * AVERROR(ENOMEM) - failed to add frame to internal queue
  pub fn avcodec_send_frame(avctx: *mut AVCodecContext, frame: *const AVFrame) -> c_int;

  /// Read encoded data from the encoder
  ///
  /// # Returns
  /// * 0 on success
  /// * AVERROR(EAGAIN) - output not available, must send more input
  /// * AVERROR_EOF - encoder has been fully flushed
  pub fn avcodec_receive_packet(avctx: *mut AVCodecContext, avpkt: *mut AVPacket) -> c_int;

  // ========================================================================
  // Decoding (send packet, receive frame)
  // ========================================================================

  /// Supply raw packet data to the decoder
  ///
  /// # Returns
  /// * 0 on success
  /// * AVERROR(EAGAIN) - output not available, must read with receive_frame first
  /// * AVERROR_EOF - decoder has been flushed, no more input accepted
  pub fn avcodec_send_packet(avctx: *mut AVCodecContext, avpkt: *const AVPacket) -> c_int;

  /// Return decoded output data from the decoder
  ///
  /// # Returns
  /// * 0 on success
  /// * AVERROR(EAGAIN) - output not available, must send more input
  /// * AVERROR_EOF - decoder has been fully flushed
  pub fn avcodec_receive_frame(avctx: *mut AVCodecContext, frame: *mut AVFrame) -> c_int;

  // ========================================================================
  // Codec Control
  // ========================================================================

  /// Reset the internal codec state / flush internal buffers
  pub fn avcodec_flush_buffers(avctx: *mut AVCodecContext);

  // ========================================================================
  // Packet Management
  // ========================================================================

  /// Allocate an AVPacket and set its fields to default values
  pub fn av_packet_alloc() -> *mut AVPacket;

  /// Free the packet and any reference it holds
  pub fn av_packet_free(pkt: *mut *mut AVPacket);

  /// Set up a new reference to the data described by src
  pub fn av_packet_ref(dst: *mut AVPacket, src: *const AVPacket) -> c_int;

  /// Wipe the packet and unreference its payload
  pub fn av_packet_unref(pkt: *mut AVPacket);
}

// Bitstream filters moved to their own header (libavcodec/bsf.h) in FFmpeg 5,
// but stay part of libavcodec
unsafe extern "C" {
  /// Look up a bitstream filter by short name (e.g. "h264_mp4toannexb")
  pub fn av_bsf_get_by_name(name: *const c_char) -> *const AVBitStreamFilter;

  /// Allocate a bitstream filter context for the given filter
  pub fn av_bsf_alloc(filter: *const AVBitStreamFilter, ctx: *mut *mut AVBSFContext) -> c_int;

  /// Prepare the filter for use after par_in/time_base_in have been set
  pub fn av_bsf_init(ctx: *mut AVBSFContext) -> c_int;

  /// Free the context and everything associated with it
  pub fn av_bsf_free(ctx: *mut *mut AVBSFContext);

  /// Submit a packet for filtering; NULL signals end of stream
  ///
  /// # Returns
  /// * 0 on success (the filter takes ownership of the payload)
  /// * AVERROR(EAGAIN) - drain with av_bsf_receive_packet first
  pub fn av_bsf_send_packet(ctx: *mut AVBSFContext, pkt: *mut AVPacket) -> c_int;

  /// Retrieve a filtered packet
  ///
  /// # Returns
  /// * 0 on success
  /// * AVERROR(EAGAIN) - more input needed
  /// * AVERROR_EOF - no further output after a flush
  pub fn av_bsf_receive_packet(ctx: *mut AVBSFContext, pkt: *mut AVPacket) -> c_int;

  /// Reset internal state; packets buffered inside the filter are discarded
  pub fn av_bsf_flush(ctx: *mut AVBSFContext);
}
