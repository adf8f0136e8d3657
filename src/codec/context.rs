//! Safe wrapper around FFmpeg AVCodecContext
//!
//! One wrapper drives both directions of the codec protocol:
//! send-packet/receive-frame for decoders and send-frame/receive-packet for
//! encoders. The context is opened at most once.

use crate::ffi::{
    self,
    accessors::{
        ffcodec_get_capabilities, ffcodec_get_name, ffcodec_get_type, ffctx_get_channel_layout_mask,
        ffctx_get_flags, ffctx_get_frame_size, ffctx_get_height, ffctx_get_hw_frames_ctx,
        ffctx_get_pix_fmt, ffctx_get_sample_fmt, ffctx_get_sample_rate, ffctx_get_time_base,
        ffctx_get_width, ffctx_set_bit_rate, ffctx_set_channel_layout_mask, ffctx_set_flags,
        ffctx_set_framerate, ffctx_set_gop_size, ffctx_set_height, ffctx_set_hw_device_ctx,
        ffctx_set_hw_frames_ctx, ffctx_set_max_b_frames, ffctx_set_pix_fmt, ffctx_set_rc_buffer_size,
        ffctx_set_rc_max_rate, ffctx_set_rc_min_rate, ffctx_set_sample_aspect_ratio,
        ffctx_set_sample_fmt, ffctx_set_sample_rate, ffctx_set_thread_count, ffctx_set_time_base,
        ffctx_set_width,
    },
    avcodec::{
        avcodec_alloc_context3, avcodec_find_decoder, avcodec_find_decoder_by_name,
        avcodec_find_encoder, avcodec_find_encoder_by_name, avcodec_flush_buffers,
        avcodec_free_context, avcodec_open2, avcodec_receive_frame, avcodec_receive_packet,
        avcodec_send_frame, avcodec_send_packet,
    },
    avutil::{av_dict_free, av_dict_set},
    codec_cap, codec_flag,
    error::{AVERROR_EAGAIN, AVERROR_EOF},
    AVBufferRef, AVCodec, AVCodecContext, AVCodecID, AVDictionary, AVPixelFormat, AVRational,
    AVSampleFormat,
};
use std::ffi::{CStr, CString};
use std::ptr::NonNull;

use super::{CodecError, CodecParameters, CodecResult, Frame, HwDeviceContext, Packet};

/// Type of codec (encoder or decoder)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecType {
    Encoder,
    Decoder,
}

/// Safe wrapper around AVCodecContext
pub struct CodecContext {
    ptr: NonNull<AVCodecContext>,
    codec: *const AVCodec,
    codec_type: CodecType,
    opened: bool,
}

impl CodecContext {
    // ========================================================================
    // Creation
    // ========================================================================

    /// Create a new encoder context for the given codec ID
    pub fn new_encoder(codec_id: AVCodecID) -> CodecResult<Self> {
        let codec = unsafe { avcodec_find_encoder(codec_id.as_raw()) };
        if codec.is_null() {
            return Err(CodecError::CodecNotFound(format!("{:?}", codec_id)));
        }
        Self::from_codec(codec, CodecType::Encoder)
    }

    /// Create a new encoder context by codec name (e.g., "libx264", "h264_videotoolbox")
    pub fn new_encoder_by_name(name: &str) -> CodecResult<Self> {
        let c_name =
            CString::new(name).map_err(|_| CodecError::InvalidConfig("Invalid codec name".into()))?;
        let codec = unsafe { avcodec_find_encoder_by_name(c_name.as_ptr()) };
        if codec.is_null() {
            return Err(CodecError::CodecNotFound(name.to_string()));
        }
        Self::from_codec(codec, CodecType::Encoder)
    }

    /// Create a new decoder context for the given codec ID
    pub fn new_decoder(codec_id: AVCodecID) -> CodecResult<Self> {
        let codec = unsafe { avcodec_find_decoder(codec_id.as_raw()) };
        if codec.is_null() {
            return Err(CodecError::CodecNotFound(format!("{:?}", codec_id)));
        }
        Self::from_codec(codec, CodecType::Decoder)
    }

    /// Create a new decoder context by codec name
    pub fn new_decoder_by_name(name: &str) -> CodecResult<Self> {
        let c_name =
            CString::new(name).map_err(|_| CodecError::InvalidConfig("Invalid codec name".into()))?;
        let codec = unsafe { avcodec_find_decoder_by_name(c_name.as_ptr()) };
        if codec.is_null() {
            return Err(CodecError::CodecNotFound(name.to_string()));
        }
        Self::from_codec(codec, CodecType::Decoder)
    }

    fn from_codec(codec: *const AVCodec, codec_type: CodecType) -> CodecResult<Self> {
        let ptr = unsafe { avcodec_alloc_context3(codec) };
        NonNull::new(ptr)
            .map(|ptr| Self {
                ptr,
                codec,
                codec_type,
                opened: false,
            })
            .ok_or(CodecError::AllocationFailed("AVCodecContext"))
    }

    // ========================================================================
    // Codec Introspection
    // ========================================================================

    /// Short name of the resolved codec implementation
    pub fn codec_name(&self) -> &str {
        let name = unsafe { ffcodec_get_name(self.codec) };
        if name.is_null() {
            return "unknown";
        }
        unsafe { CStr::from_ptr(name) }.to_str().unwrap_or("unknown")
    }

    /// Media type of the codec (see `ffi::avformat::media_type`)
    pub fn media_type(&self) -> i32 {
        unsafe { ffcodec_get_type(self.codec) }
    }

    /// Whether the resolved codec is backed by a hardware implementation
    pub fn is_hardware_codec(&self) -> bool {
        let caps = unsafe { ffcodec_get_capabilities(self.codec) };
        (caps & (codec_cap::HARDWARE | codec_cap::HYBRID)) != 0
    }

    /// Get codec type
    #[inline]
    pub fn codec_type(&self) -> CodecType {
        self.codec_type
    }

    // ========================================================================
    // Configuration (before open)
    // ========================================================================

    /// Fill the context from stream codec parameters
    pub fn apply_parameters(&mut self, params: &CodecParameters) -> CodecResult<()> {
        let ret = unsafe {
            crate::ffi::avformat::avcodec_parameters_to_context(self.as_mut_ptr(), params.as_ptr())
        };
        ffi::check_error(ret)?;
        Ok(())
    }

    pub fn set_dimensions(&mut self, width: i32, height: i32) {
        unsafe {
            ffctx_set_width(self.as_mut_ptr(), width);
            ffctx_set_height(self.as_mut_ptr(), height);
        }
    }

    pub fn set_pixel_format(&mut self, format: AVPixelFormat) {
        unsafe { ffctx_set_pix_fmt(self.as_mut_ptr(), format.as_raw()) }
    }

    pub fn set_sample_aspect_ratio(&mut self, sar: AVRational) {
        unsafe { ffctx_set_sample_aspect_ratio(self.as_mut_ptr(), sar.num, sar.den) }
    }

    pub fn set_time_base(&mut self, time_base: AVRational) {
        unsafe { ffctx_set_time_base(self.as_mut_ptr(), time_base.num, time_base.den) }
    }

    pub fn set_frame_rate(&mut self, frame_rate: AVRational) {
        unsafe { ffctx_set_framerate(self.as_mut_ptr(), frame_rate.num, frame_rate.den) }
    }

    pub fn set_bit_rate(&mut self, bit_rate: i64) {
        unsafe { ffctx_set_bit_rate(self.as_mut_ptr(), bit_rate) }
    }

    pub fn set_min_rate(&mut self, min_rate: i64) {
        unsafe { ffctx_set_rc_min_rate(self.as_mut_ptr(), min_rate) }
    }

    pub fn set_max_rate(&mut self, max_rate: i64) {
        unsafe { ffctx_set_rc_max_rate(self.as_mut_ptr(), max_rate) }
    }

    pub fn set_buffer_size(&mut self, buffer_size: i32) {
        unsafe { ffctx_set_rc_buffer_size(self.as_mut_ptr(), buffer_size) }
    }

    pub fn set_gop_size(&mut self, gop_size: i32) {
        unsafe { ffctx_set_gop_size(self.as_mut_ptr(), gop_size) }
    }

    pub fn set_max_b_frames(&mut self, max_b_frames: i32) {
        unsafe { ffctx_set_max_b_frames(self.as_mut_ptr(), max_b_frames) }
    }

    pub fn set_thread_count(&mut self, thread_count: i32) {
        unsafe { ffctx_set_thread_count(self.as_mut_ptr(), thread_count) }
    }

    pub fn set_sample_rate(&mut self, sample_rate: i32) {
        unsafe { ffctx_set_sample_rate(self.as_mut_ptr(), sample_rate) }
    }

    pub fn set_sample_format(&mut self, format: AVSampleFormat) {
        unsafe { ffctx_set_sample_fmt(self.as_mut_ptr(), format.as_raw()) }
    }

    pub fn set_channel_layout(&mut self, mask: u64) {
        unsafe { ffctx_set_channel_layout_mask(self.as_mut_ptr(), mask) }
    }

    /// Ask the encoder to place global headers in extradata (required by
    /// formats like MP4)
    pub fn enable_global_header(&mut self) {
        let flags = unsafe { ffctx_get_flags(self.as_ptr()) };
        unsafe { ffctx_set_flags(self.as_mut_ptr(), flags | codec_flag::GLOBAL_HEADER) };
    }

    /// Set hardware device context for hardware-accelerated coding
    ///
    /// The context takes its own reference; the caller keeps ownership.
    pub fn set_hw_device(&mut self, hw_device: &HwDeviceContext) -> CodecResult<()> {
        let ret = unsafe { ffctx_set_hw_device_ctx(self.as_mut_ptr(), hw_device.as_ptr()) };
        ffi::check_error(ret)?;
        Ok(())
    }

    /// Set the hardware frames context from a raw buffer reference
    /// (e.g. one borrowed from an upstream frame)
    pub fn set_hw_frames_ref(&mut self, frames_ref: NonNull<AVBufferRef>) -> CodecResult<()> {
        let ret = unsafe { ffctx_set_hw_frames_ctx(self.as_mut_ptr(), frames_ref.as_ptr()) };
        ffi::check_error(ret)?;
        Ok(())
    }

    // ========================================================================
    // Open
    // ========================================================================

    /// Open the codec with optional codec-specific key/value options
    ///
    /// A context can be opened at most once; a second call is a state error.
    pub fn open(&mut self, options: &[(String, String)]) -> CodecResult<()> {
        if self.opened {
            return Err(CodecError::InvalidState("Codec already opened".into()));
        }

        let mut dict: *mut AVDictionary = std::ptr::null_mut();
        for (key, value) in options {
            let c_key = CString::new(key.as_str())
                .map_err(|_| CodecError::InvalidConfig(format!("Invalid option key: {key}")))?;
            let c_value = CString::new(value.as_str())
                .map_err(|_| CodecError::InvalidConfig(format!("Invalid option value: {value}")))?;
            unsafe { av_dict_set(&mut dict, c_key.as_ptr(), c_value.as_ptr(), 0) };
        }

        let ret = unsafe { avcodec_open2(self.as_mut_ptr(), self.codec, &mut dict) };

        if !dict.is_null() {
            unsafe { av_dict_free(&mut dict) };
        }

        ffi::check_error(ret)?;
        self.opened = true;
        Ok(())
    }

    /// Whether the codec has been opened
    #[inline]
    pub fn is_open(&self) -> bool {
        self.opened
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Send a frame to the encoder; None flushes
    ///
    /// Returns Ok(true) if the frame was accepted, Ok(false) if the encoder
    /// needs its output drained first (EAGAIN)
    pub fn send_frame(&mut self, frame: Option<&Frame>) -> CodecResult<bool> {
        let frame_ptr = frame.map(|f| f.as_ptr()).unwrap_or(std::ptr::null());
        let ret = unsafe { avcodec_send_frame(self.as_mut_ptr(), frame_ptr) };

        if ret == AVERROR_EAGAIN {
            return Ok(false);
        }
        ffi::check_error(ret)?;
        Ok(true)
    }

    /// Receive an encoded packet from the encoder
    ///
    /// Returns Ok(Some(packet)) if a packet is available, Ok(None) on
    /// EAGAIN (more input needed) or EOF (fully drained)
    pub fn receive_packet(&mut self) -> CodecResult<Option<Packet>> {
        let mut pkt = Packet::new()?;
        let ret = unsafe { avcodec_receive_packet(self.as_mut_ptr(), pkt.as_mut_ptr()) };

        if ret == AVERROR_EAGAIN || ret == AVERROR_EOF {
            return Ok(None);
        }
        ffi::check_error(ret)?;
        Ok(Some(pkt))
    }

    // ========================================================================
    // Decoding
    // ========================================================================

    /// Send a packet to the decoder; None flushes
    ///
    /// Returns Ok(true) if the packet was accepted, Ok(false) if the decoder
    /// needs its output drained first (EAGAIN)
    pub fn send_packet(&mut self, packet: Option<&Packet>) -> CodecResult<bool> {
        let pkt_ptr = packet.map(|p| p.as_ptr()).unwrap_or(std::ptr::null());
        let ret = unsafe { avcodec_send_packet(self.as_mut_ptr(), pkt_ptr) };

        if ret == AVERROR_EAGAIN {
            return Ok(false);
        }
        ffi::check_error(ret)?;
        Ok(true)
    }

    /// Receive a decoded frame from the decoder
    ///
    /// Returns Ok(Some(frame)) if a frame is available, Ok(None) on
    /// EAGAIN (more input needed) or EOF (fully drained)
    pub fn receive_frame(&mut self) -> CodecResult<Option<Frame>> {
        let mut frame = Frame::new()?;
        let ret = unsafe { avcodec_receive_frame(self.as_mut_ptr(), frame.as_mut_ptr()) };

        if ret == AVERROR_EAGAIN || ret == AVERROR_EOF {
            return Ok(None);
        }
        ffi::check_error(ret)?;
        Ok(Some(frame))
    }

    // ========================================================================
    // Getters
    // ========================================================================

    /// Reset internal codec buffers (e.g. after a seek)
    pub fn flush_buffers(&mut self) {
        unsafe { avcodec_flush_buffers(self.as_mut_ptr()) }
    }

    /// Get raw pointer (for FFmpeg API calls)
    #[inline]
    pub fn as_ptr(&self) -> *const AVCodecContext {
        self.ptr.as_ptr()
    }

    /// Get mutable raw pointer
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut AVCodecContext {
        self.ptr.as_ptr()
    }

    pub fn width(&self) -> i32 {
        unsafe { ffctx_get_width(self.as_ptr()) }
    }

    pub fn height(&self) -> i32 {
        unsafe { ffctx_get_height(self.as_ptr()) }
    }

    pub fn pixel_format(&self) -> AVPixelFormat {
        AVPixelFormat(unsafe { ffctx_get_pix_fmt(self.as_ptr()) })
    }

    pub fn time_base(&self) -> AVRational {
        let mut num = 0;
        let mut den = 0;
        unsafe { ffctx_get_time_base(self.as_ptr(), &mut num, &mut den) };
        AVRational::new(num, den)
    }

    pub fn sample_rate(&self) -> i32 {
        unsafe { ffctx_get_sample_rate(self.as_ptr()) }
    }

    pub fn sample_format(&self) -> AVSampleFormat {
        AVSampleFormat(unsafe { ffctx_get_sample_fmt(self.as_ptr()) })
    }

    pub fn channel_layout(&self) -> u64 {
        unsafe { ffctx_get_channel_layout_mask(self.as_ptr()) }
    }

    /// Audio frame size required by the encoder (0 when unconstrained)
    pub fn frame_size(&self) -> i32 {
        unsafe { ffctx_get_frame_size(self.as_ptr()) }
    }

    /// Borrow the hardware frames context installed on the context, if any
    pub fn hw_frames_ctx(&self) -> Option<NonNull<AVBufferRef>> {
        NonNull::new(unsafe { ffctx_get_hw_frames_ctx(self.as_ptr()) })
    }
}

impl Drop for CodecContext {
    fn drop(&mut self) {
        unsafe {
            let mut ptr = self.ptr.as_ptr();
            avcodec_free_context(&mut ptr);
        }
    }
}

// CodecContext is NOT Sync - FFmpeg contexts are not thread-safe
unsafe impl Send for CodecContext {}

impl std::fmt::Debug for CodecContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecContext")
            .field("codec", &self.codec_name())
            .field("type", &self.codec_type)
            .field("opened", &self.opened)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_codec_name() {
        let err = CodecContext::new_encoder_by_name("definitely_not_a_codec").unwrap_err();
        assert!(matches!(err, CodecError::CodecNotFound(_)));
    }

    #[test]
    fn test_open_twice_is_a_state_error() {
        // The raw "mjpeg" encoder ships with every FFmpeg build
        let mut ctx = CodecContext::new_encoder_by_name("mjpeg").unwrap();
        ctx.set_dimensions(64, 64);
        ctx.set_pixel_format(crate::ffi::AVPixelFormat(12)); // yuvj420p
        ctx.set_time_base(AVRational::new(1, 25));
        ctx.open(&[]).unwrap();
        assert!(ctx.is_open());
        assert!(matches!(
            ctx.open(&[]),
            Err(CodecError::InvalidState(_))
        ));
    }
}
