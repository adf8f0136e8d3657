//! Decoder driver: packet in, frame out
//!
//! Wraps a [`CodecContext`] opened from a demuxed stream (or a value
//! description) and drives the send-packet/receive-frame protocol,
//! including lazy frame sequences and end-of-stream draining.

use crate::codec::{CodecContext, CodecError, Frame, Packet, Stream};
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::error::{Error, Result};
use super::info::StreamInfo;
use super::{CodecSelector, FrameStream, HardwareContext, PacketStream};

/// Decoder creation options
#[derive(Default)]
pub struct DecoderOptions {
    /// Worker thread count (0 = auto)
    pub threads: Option<i32>,
    /// Codec-specific key/value options applied at open
    pub options: Vec<(String, String)>,
    /// Hardware device to attach for hardware-assisted decoding
    pub hardware: Option<HardwareContext>,
}

struct DecoderInner {
    /// None once the decoder has been closed
    ctx: Option<CodecContext>,
    eof_sent: bool,
}

impl DecoderInner {
    fn ctx_mut(&mut self) -> Result<&mut CodecContext> {
        self.ctx
            .as_mut()
            .ok_or_else(|| Error::State("decoder is closed".into()))
    }

    /// Feed one packet (or EOS) and attempt one receive
    fn decode_step(&mut self, packet: Option<&Packet>) -> Result<Option<Frame>> {
        let ctx = self.ctx_mut()?;
        match packet {
            Some(packet) => {
                let accepted = ctx.send_packet(Some(packet)).map_err(Error::from)?;
                if !accepted {
                    // Codec buffer full; one opportunistic receive, the
                    // packet is dropped either way (best-effort contract)
                    return ctx.receive_frame().map_err(Error::from);
                }
            }
            None => self.mark_eof()?,
        }
        self.ctx_mut()?.receive_frame().map_err(Error::from)
    }

    /// Feed one packet and drain every immediately-available frame
    fn decode_burst(&mut self, packet: &Packet) -> Result<Vec<Frame>> {
        let ctx = self.ctx_mut()?;
        let mut frames = Vec::new();

        if !ctx.send_packet(Some(packet))? {
            // Drain, then retry the send once
            while let Some(frame) = ctx.receive_frame()? {
                frames.push(frame);
            }
            ctx.send_packet(Some(packet))?;
        }

        while let Some(frame) = ctx.receive_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn mark_eof(&mut self) -> Result<()> {
        if self.eof_sent {
            return Ok(());
        }
        match self.ctx_mut()?.send_packet(None) {
            Ok(_) => {}
            // Sending the marker twice reports EOF; treat as already done
            Err(CodecError::Ffmpeg(e)) if e.is_eof() => {}
            Err(e) => return Err(e.into()),
        }
        self.eof_sent = true;
        Ok(())
    }

    fn receive_one(&mut self) -> Result<Option<Frame>> {
        self.ctx_mut()?.receive_frame().map_err(Error::from)
    }
}

/// Decoder driver
///
/// Cloning shares the underlying codec context.
#[derive(Clone)]
pub struct Decoder {
    inner: Arc<Mutex<DecoderInner>>,
    stream: Option<Stream>,
    codec_name: String,
}

impl Decoder {
    /// Create a decoder for a demuxed stream
    ///
    /// The codec context is populated from the stream's codec parameters
    /// and opened immediately.
    pub fn new(
        selector: impl Into<CodecSelector>,
        stream: &Stream,
        options: DecoderOptions,
    ) -> Result<Self> {
        let mut ctx = Self::resolve(selector.into())?;
        ctx.apply_parameters(&stream.codec_parameters)?;
        Self::finish_open(ctx, options, Some(stream.clone()))
    }

    /// Create a decoder from a value description instead of a stream
    pub fn from_info(
        selector: impl Into<CodecSelector>,
        info: &StreamInfo,
        options: DecoderOptions,
    ) -> Result<Self> {
        let mut ctx = Self::resolve(selector.into())?;
        match info {
            StreamInfo::Video {
                width,
                height,
                pixel_format,
                time_base,
                ..
            } => {
                ctx.set_dimensions(*width, *height);
                ctx.set_pixel_format(*pixel_format);
                ctx.set_time_base(*time_base);
            }
            StreamInfo::Audio {
                sample_rate,
                sample_format,
                channel_layout,
                time_base,
                ..
            } => {
                ctx.set_sample_rate(*sample_rate);
                ctx.set_sample_format(*sample_format);
                ctx.set_channel_layout(*channel_layout);
                ctx.set_time_base(*time_base);
            }
        }
        Self::finish_open(ctx, options, None)
    }

    fn resolve(selector: CodecSelector) -> Result<CodecContext> {
        let ctx = match selector {
            CodecSelector::Name(name) => CodecContext::new_decoder_by_name(&name)?,
            CodecSelector::Id(id) => CodecContext::new_decoder(id)?,
        };
        Ok(ctx)
    }

    fn finish_open(
        mut ctx: CodecContext,
        options: DecoderOptions,
        stream: Option<Stream>,
    ) -> Result<Self> {
        if let Some(threads) = options.threads {
            ctx.set_thread_count(threads);
        }
        if let Some(hardware) = &options.hardware {
            ctx.set_hw_device(hardware.device())?;
        }
        ctx.open(&options.options)?;

        let codec_name = ctx.codec_name().to_string();
        debug!(codec = %codec_name, "decoder opened");

        Ok(Self {
            inner: Arc::new(Mutex::new(DecoderInner {
                ctx: Some(ctx),
                eof_sent: false,
            })),
            stream,
            codec_name,
        })
    }

    /// Whether the decoder is open and usable
    pub fn is_ready(&self) -> bool {
        self.inner.lock().unwrap().ctx.is_some()
    }

    /// The demuxed stream this decoder was created from, if any
    pub fn stream(&self) -> Option<&Stream> {
        self.stream.as_ref()
    }

    /// Short name of the resolved codec
    pub fn codec_name(&self) -> &str {
        &self.codec_name
    }

    /// Feed one packet (None marks end of stream) and attempt one receive
    ///
    /// The packet is freed after its send attempt.
    pub async fn decode(&self, packet: Option<Packet>) -> Result<Option<Frame>> {
        let mut inner = self.inner.lock().unwrap();
        inner.decode_step(packet.as_ref())
    }

    /// Single-frame flush step after end of stream
    pub async fn flush(&self) -> Result<Option<Frame>> {
        let mut inner = self.inner.lock().unwrap();
        inner.mark_eof()?;
        inner.receive_one()
    }

    /// Lazy frame sequence over a packet sequence
    ///
    /// Input packets are freed after their send attempt; buffered frames
    /// are drained after the input ends. A fatal error terminates the
    /// sequence with that error.
    pub fn frames(&self, packets: PacketStream) -> FrameStream {
        enum Phase {
            Feeding,
            Draining,
        }
        struct State {
            inner: Arc<Mutex<DecoderInner>>,
            input: PacketStream,
            pending: VecDeque<Frame>,
            phase: Phase,
        }

        let state = State {
            inner: self.inner.clone(),
            input: packets,
            pending: VecDeque::new(),
            phase: Phase::Feeding,
        };

        Box::pin(stream::try_unfold(state, |mut st| async move {
            loop {
                if let Some(frame) = st.pending.pop_front() {
                    return Ok(Some((frame, st)));
                }
                match st.phase {
                    Phase::Feeding => match st.input.next().await {
                        Some(Ok(packet)) => {
                            let frames = st.inner.lock().unwrap().decode_burst(&packet)?;
                            // packet dropped (freed) here, after the send
                            st.pending.extend(frames);
                        }
                        Some(Err(e)) => return Err(e),
                        None => {
                            st.inner.lock().unwrap().mark_eof()?;
                            st.phase = Phase::Draining;
                        }
                    },
                    Phase::Draining => {
                        return match st.inner.lock().unwrap().receive_one()? {
                            Some(frame) => Ok(Some((frame, st))),
                            None => Ok(None),
                        };
                    }
                }
            }
        }))
    }

    /// Lazy sequence draining the decoder after end of stream
    pub fn flush_frames(&self) -> FrameStream {
        let inner = self.inner.clone();
        Box::pin(stream::try_unfold(inner, |inner| async move {
            let next = {
                let mut guard = inner.lock().unwrap();
                guard.mark_eof()?;
                guard.receive_one()?
            };
            Ok(next.map(|frame| (frame, inner)))
        }))
    }

    /// Close the decoder and release the codec context; idempotent
    pub async fn close(&self) {
        self.inner.lock().unwrap().ctx = None;
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("codec", &self.codec_name)
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::{AVPixelFormat, AVRational};

    fn raw_video_info() -> StreamInfo {
        StreamInfo::Video {
            width: 64,
            height: 64,
            pixel_format: AVPixelFormat::YUV420P,
            time_base: AVRational::new(1, 25),
            frame_rate: Some(AVRational::new(25, 1)),
            sample_aspect_ratio: None,
        }
    }

    #[test]
    fn unknown_decoder_fails_with_not_found() {
        let err = Decoder::from_info("no_such_codec", &raw_video_info(), DecoderOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn decode_after_close_is_a_state_error() {
        let decoder =
            Decoder::from_info("rawvideo", &raw_video_info(), DecoderOptions::default()).unwrap();
        assert!(decoder.is_ready());
        decoder.close().await;
        assert!(!decoder.is_ready());
        let err = decoder.decode(None).await.unwrap_err();
        assert!(matches!(err, Error::State(_)));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let decoder =
            Decoder::from_info("rawvideo", &raw_video_info(), DecoderOptions::default()).unwrap();
        decoder.close().await;
        decoder.close().await;
    }
}
