//! Encoder driver: frame in, packet out
//!
//! The codec context is created eagerly but opened lazily from the first
//! frame, so frame-observable properties (dimensions, formats, hardware
//! frames context) can finish the configuration. Packet timestamps are left
//! exactly as the codec produced them; rescaling to the output stream time
//! base belongs to the muxer.

use crate::codec::{CodecContext, CodecError, CodecParameters, Frame, Packet};
use crate::ffi::avformat::media_type;
use crate::ffi::AVRational;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::bitrate::Bitrate;
use super::error::{Error, Result};
use super::{CodecSelector, FrameStream, HardwareContext, PacketStream};

/// Encoder creation options
///
/// `time_base` is required; everything else is optional. Rate fields accept
/// either raw bits per second or human-readable strings ("5M").
pub struct EncoderOptions {
    /// Codec context time base (required)
    pub time_base: AVRational,
    /// Frame rate hint (video only)
    pub frame_rate: Option<AVRational>,
    /// Max GOP length in frames
    pub gop_size: Option<i32>,
    /// Max consecutive B-frames
    pub max_b_frames: Option<i32>,
    /// Target bit rate
    pub bit_rate: Option<Bitrate>,
    /// Minimum rate-control rate
    pub min_rate: Option<Bitrate>,
    /// Maximum rate-control rate
    pub max_rate: Option<Bitrate>,
    /// Rate-control buffer size (bits)
    pub buf_size: Option<Bitrate>,
    /// Worker thread count
    pub threads: Option<i32>,
    /// Codec-specific key/value options applied at open
    pub options: Vec<(String, String)>,
    /// Hardware context; required for hardware codecs
    pub hardware: Option<HardwareContext>,
}

impl EncoderOptions {
    pub fn new(time_base: AVRational) -> Self {
        Self {
            time_base,
            frame_rate: None,
            gop_size: None,
            max_b_frames: None,
            bit_rate: None,
            min_rate: None,
            max_rate: None,
            buf_size: None,
            threads: None,
            options: Vec::new(),
            hardware: None,
        }
    }
}

/// Rate fields resolved to raw bits at creation time
#[derive(Clone)]
struct ResolvedOptions {
    time_base: AVRational,
    frame_rate: Option<AVRational>,
    gop_size: Option<i32>,
    max_b_frames: Option<i32>,
    bit_rate: Option<i64>,
    min_rate: Option<i64>,
    max_rate: Option<i64>,
    buf_size: Option<i64>,
    threads: Option<i32>,
    options: Vec<(String, String)>,
}

struct EncoderInner {
    /// None once closed or after a failed open
    ctx: Option<CodecContext>,
    options: ResolvedOptions,
    hardware: Option<HardwareContext>,
    global_header: bool,
    eof_sent: bool,
}

impl EncoderInner {
    fn ctx_mut(&mut self) -> Result<&mut CodecContext> {
        self.ctx
            .as_mut()
            .ok_or_else(|| Error::State("encoder is closed".into()))
    }

    fn is_open(&self) -> bool {
        self.ctx.as_ref().is_some_and(|ctx| ctx.is_open())
    }

    /// Configure the context from the first frame's observable properties
    /// and open the codec
    fn open_from_frame(&mut self, frame: &Frame) -> Result<()> {
        let hardware = self.hardware.clone();
        let global_header = self.global_header;
        let opts = self.options.clone();

        let ctx = self
            .ctx
            .as_mut()
            .ok_or_else(|| Error::State("encoder is closed".into()))?;

        match ctx.media_type() {
            t if t == media_type::VIDEO => {
                ctx.set_dimensions(frame.width(), frame.height());
                ctx.set_pixel_format(frame.pixel_format());
                ctx.set_sample_aspect_ratio(frame.sample_aspect_ratio());

                if let Some(frames_ref) = frame.hw_frames_ctx() {
                    // Zero-copy: adopt the pool the upstream frames live in
                    ctx.set_hw_frames_ref(frames_ref)?;
                    if let Some(hw) = &hardware {
                        ctx.set_hw_device(hw.device())?;
                    }
                } else if let Some(hw) = &hardware {
                    ctx.set_hw_device(hw.device())?;
                    if let Some(frames) = hw.frames_context() {
                        ctx.set_hw_frames_ref(
                            std::ptr::NonNull::new(frames.as_ptr())
                                .ok_or_else(|| Error::State("null frames context".into()))?,
                        )?;
                    }
                }
            }
            t if t == media_type::AUDIO => {
                ctx.set_sample_rate(frame.sample_rate());
                ctx.set_sample_format(frame.sample_format());
                ctx.set_channel_layout(frame.channel_layout());
            }
            other => {
                return Err(Error::ConfigInvalid(format!(
                    "cannot encode media type {other}"
                )));
            }
        }

        ctx.set_time_base(opts.time_base);
        if let Some(frame_rate) = opts.frame_rate {
            ctx.set_frame_rate(frame_rate);
        }
        if let Some(gop_size) = opts.gop_size {
            ctx.set_gop_size(gop_size);
        }
        if let Some(max_b_frames) = opts.max_b_frames {
            ctx.set_max_b_frames(max_b_frames);
        }
        if let Some(bit_rate) = opts.bit_rate {
            ctx.set_bit_rate(bit_rate);
        }
        if let Some(min_rate) = opts.min_rate {
            ctx.set_min_rate(min_rate);
        }
        if let Some(max_rate) = opts.max_rate {
            ctx.set_max_rate(max_rate);
        }
        if let Some(buf_size) = opts.buf_size {
            ctx.set_buffer_size(buf_size as i32);
        }
        if let Some(threads) = opts.threads {
            ctx.set_thread_count(threads);
        }
        if global_header {
            ctx.enable_global_header();
        }

        let codec_options = opts.options.clone();
        match ctx.open(&codec_options) {
            Ok(()) => {
                debug!(codec = %ctx.codec_name(), "encoder opened");
                Ok(())
            }
            Err(e) => {
                // A context that failed to open is unusable; release it
                self.ctx = None;
                Err(e.into())
            }
        }
    }

    /// Feed one frame (or EOS) and attempt one receive
    fn encode_step(&mut self, frame: Option<&Frame>) -> Result<Option<Packet>> {
        match frame {
            Some(frame) => {
                if !self.is_open() {
                    self.open_from_frame(frame)?;
                }
                let ctx = self.ctx_mut()?;
                let accepted = ctx.send_frame(Some(frame))?;
                if !accepted {
                    return ctx.receive_packet().map_err(Error::from);
                }
            }
            None => {
                // EOS on a never-initialized encoder is a no-op
                if !self.is_open() {
                    return Ok(None);
                }
                self.mark_eof()?;
            }
        }
        self.ctx_mut()?.receive_packet().map_err(Error::from)
    }

    /// Feed one frame and drain every immediately-available packet
    fn encode_burst(&mut self, frame: &Frame) -> Result<Vec<Packet>> {
        if !self.is_open() {
            self.open_from_frame(frame)?;
        }
        let ctx = self.ctx_mut()?;
        let mut packets = Vec::new();

        if !ctx.send_frame(Some(frame))? {
            while let Some(packet) = ctx.receive_packet()? {
                packets.push(packet);
            }
            ctx.send_frame(Some(frame))?;
        }

        while let Some(packet) = ctx.receive_packet()? {
            packets.push(packet);
        }
        Ok(packets)
    }

    fn mark_eof(&mut self) -> Result<()> {
        if self.eof_sent {
            return Ok(());
        }
        match self.ctx_mut()?.send_frame(None) {
            Ok(_) => {}
            Err(CodecError::Ffmpeg(e)) if e.is_eof() => {}
            Err(e) => return Err(e.into()),
        }
        self.eof_sent = true;
        Ok(())
    }

    fn receive_one(&mut self) -> Result<Option<Packet>> {
        if !self.is_open() {
            return Ok(None);
        }
        self.ctx_mut()?.receive_packet().map_err(Error::from)
    }
}

/// Encoder driver
///
/// Cloning shares the underlying codec context; a muxing sink holds a clone
/// to observe the lazy open.
#[derive(Clone)]
pub struct Encoder {
    inner: Arc<Mutex<EncoderInner>>,
    codec_name: String,
    is_hardware: bool,
}

impl Encoder {
    /// Resolve the codec and validate options; the codec opens on the
    /// first encoded frame
    pub fn new(selector: impl Into<CodecSelector>, options: EncoderOptions) -> Result<Self> {
        let ctx = match selector.into() {
            CodecSelector::Name(name) => CodecContext::new_encoder_by_name(&name)?,
            CodecSelector::Id(id) => CodecContext::new_encoder(id)?,
        };

        if !options.time_base.is_valid() {
            return Err(Error::ConfigInvalid("encoder time_base is required".into()));
        }

        let is_hardware = ctx.is_hardware_codec();
        if is_hardware && options.hardware.is_none() {
            return Err(Error::ConfigInvalid(format!(
                "hardware encoder {} requires a HardwareContext",
                ctx.codec_name()
            )));
        }

        let resolve = |b: &Option<Bitrate>| -> Result<Option<i64>> {
            b.as_ref().map(|b| b.resolve()).transpose()
        };

        let resolved = ResolvedOptions {
            time_base: options.time_base,
            frame_rate: options.frame_rate,
            gop_size: options.gop_size,
            max_b_frames: options.max_b_frames,
            bit_rate: resolve(&options.bit_rate)?,
            min_rate: resolve(&options.min_rate)?,
            max_rate: resolve(&options.max_rate)?,
            buf_size: resolve(&options.buf_size)?,
            threads: options.threads,
            options: options.options,
        };

        let codec_name = ctx.codec_name().to_string();
        Ok(Self {
            inner: Arc::new(Mutex::new(EncoderInner {
                ctx: Some(ctx),
                options: resolved,
                hardware: options.hardware,
                global_header: false,
                eof_sent: false,
            })),
            codec_name,
            is_hardware,
        })
    }

    /// Short name of the resolved codec
    pub fn codec_name(&self) -> &str {
        &self.codec_name
    }

    /// Whether the codec is a hardware encoder
    pub fn is_hardware(&self) -> bool {
        self.is_hardware
    }

    /// Whether the codec has been opened (happens on the first frame)
    pub fn is_open(&self) -> bool {
        self.inner.lock().unwrap().is_open()
    }

    /// Ask the encoder to emit global headers (set by muxing sinks whose
    /// container requires it; effective only before the codec opens)
    pub fn request_global_header(&self) {
        self.inner.lock().unwrap().global_header = true;
    }

    /// The codec time base (meaningful once the codec is open)
    pub fn time_base(&self) -> AVRational {
        let inner = self.inner.lock().unwrap();
        inner
            .ctx
            .as_ref()
            .map(|ctx| ctx.time_base())
            .unwrap_or(inner.options.time_base)
    }

    /// Snapshot codec parameters once the encoder has opened
    ///
    /// Returns Ok(None) while the lazy open has not happened yet.
    pub fn capture_parameters(&self) -> Result<Option<(CodecParameters, AVRational)>> {
        let inner = self.inner.lock().unwrap();
        let Some(ctx) = inner.ctx.as_ref() else {
            return Ok(None);
        };
        if !ctx.is_open() {
            return Ok(None);
        }
        let params = CodecParameters::from_context(ctx)?;
        Ok(Some((params, ctx.time_base())))
    }

    /// Feed one frame (None marks end of stream) and attempt one receive
    ///
    /// The frame is freed after processing.
    pub async fn encode(&self, frame: Option<Frame>) -> Result<Option<Packet>> {
        let mut inner = self.inner.lock().unwrap();
        inner.encode_step(frame.as_ref())
    }

    /// Single-packet flush step after end of stream
    pub async fn flush(&self) -> Result<Option<Packet>> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.is_open() {
            return Ok(None);
        }
        inner.mark_eof()?;
        inner.receive_one()
    }

    /// Lazy packet sequence over a frame sequence
    ///
    /// Input frames are freed after processing; the encoder drains (with
    /// EOS flush) when the input ends.
    pub fn packets(&self, frames: FrameStream) -> PacketStream {
        enum Phase {
            Feeding,
            Draining,
        }
        struct State {
            inner: Arc<Mutex<EncoderInner>>,
            input: FrameStream,
            pending: VecDeque<Packet>,
            phase: Phase,
        }

        let state = State {
            inner: self.inner.clone(),
            input: frames,
            pending: VecDeque::new(),
            phase: Phase::Feeding,
        };

        Box::pin(stream::try_unfold(state, |mut st| async move {
            loop {
                if let Some(packet) = st.pending.pop_front() {
                    return Ok(Some((packet, st)));
                }
                match st.phase {
                    Phase::Feeding => match st.input.next().await {
                        Some(Ok(frame)) => {
                            let packets = st.inner.lock().unwrap().encode_burst(&frame)?;
                            // frame dropped (freed) here
                            st.pending.extend(packets);
                        }
                        Some(Err(e)) => return Err(e),
                        None => {
                            let mut inner = st.inner.lock().unwrap();
                            if inner.is_open() {
                                inner.mark_eof()?;
                            }
                            st.phase = Phase::Draining;
                        }
                    },
                    Phase::Draining => {
                        return match st.inner.lock().unwrap().receive_one()? {
                            Some(packet) => Ok(Some((packet, st))),
                            None => Ok(None),
                        };
                    }
                }
            }
        }))
    }

    /// Lazy sequence draining the encoder after end of stream
    pub fn flush_packets(&self) -> PacketStream {
        let inner = self.inner.clone();
        Box::pin(stream::try_unfold(inner, |inner| async move {
            let next = {
                let mut guard = inner.lock().unwrap();
                if guard.is_open() {
                    guard.mark_eof()?;
                }
                guard.receive_one()?
            };
            Ok(next.map(|packet| (packet, inner)))
        }))
    }

    /// Close the encoder and release the codec context; idempotent
    pub async fn close(&self) {
        self.inner.lock().unwrap().ctx = None;
    }
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("codec", &self.codec_name)
            .field("hardware", &self.is_hardware)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_time_base_is_rejected() {
        let err = Encoder::new("mjpeg", EncoderOptions::new(AVRational::new(0, 0))).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }

    #[test]
    fn bad_bitrate_string_is_rejected_at_create() {
        let mut options = EncoderOptions::new(AVRational::new(1, 25));
        options.bit_rate = Some(Bitrate::from("5X"));
        let err = Encoder::new("mjpeg", options).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }

    #[tokio::test]
    async fn eos_before_any_frame_is_a_noop() {
        let encoder = Encoder::new("mjpeg", EncoderOptions::new(AVRational::new(1, 25))).unwrap();
        assert!(!encoder.is_open());
        assert!(encoder.encode(None).await.unwrap().is_none());
        // Still lazily initializable afterwards
        assert!(!encoder.is_open());
    }

    #[test]
    fn parameters_unavailable_before_open() {
        let encoder = Encoder::new("mjpeg", EncoderOptions::new(AVRational::new(1, 25))).unwrap();
        assert!(encoder.capture_parameters().unwrap().is_none());
    }
}
