//! Bitstream filter driver: packet in, packet out
//!
//! Drives transforms like "h264_mp4toannexb". One input packet may produce
//! zero, one, or many outputs; end of stream flushes whatever the filter
//! buffered internally.

use crate::codec::{BsfContext, Packet, Stream};
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::error::Result;
use super::PacketStream;

struct BsfInner {
    ctx: BsfContext,
    eof_sent: bool,
}

impl BsfInner {
    /// Submit one packet (or EOS) and drain all available outputs
    fn process(&mut self, packet: Option<Packet>) -> Result<Vec<Packet>> {
        let mut outputs = Vec::new();

        match packet {
            Some(mut packet) => {
                let accepted = self.ctx.send_packet(Some(&mut packet))?;
                if !accepted {
                    // Drain, then retry the send once
                    while let Some(out) = self.ctx.receive_packet()? {
                        outputs.push(out);
                    }
                    self.ctx.send_packet(Some(&mut packet))?;
                }
                // packet shell dropped here; the filter took the payload
            }
            None => {
                if !self.eof_sent {
                    self.ctx.send_packet(None)?;
                    self.eof_sent = true;
                }
            }
        }

        while let Some(out) = self.ctx.receive_packet()? {
            outputs.push(out);
        }
        Ok(outputs)
    }

    fn reset(&mut self) {
        self.ctx.reset();
        self.eof_sent = false;
    }
}

/// Bitstream filter driver
#[derive(Clone)]
pub struct BitStreamFilter {
    inner: Arc<Mutex<BsfInner>>,
    stream: Stream,
}

impl BitStreamFilter {
    /// Locate a bitstream filter by name and bind it to a stream
    ///
    /// Input codec parameters and time base are copied from the stream;
    /// the returned driver's [`stream`](Self::stream) reflects the filter's
    /// output parameters.
    pub fn new(name: &str, stream: &Stream) -> Result<Self> {
        let ctx = BsfContext::new(name, &stream.codec_parameters, stream.time_base)?;

        let out_stream = Stream {
            index: stream.index,
            media_type: stream.media_type,
            codec_parameters: ctx.output_parameters()?,
            time_base: ctx.output_time_base(),
            avg_frame_rate: stream.avg_frame_rate,
            r_frame_rate: stream.r_frame_rate,
            duration: stream.duration,
        };

        debug!(filter = name, stream = stream.index, "bitstream filter bound");
        Ok(Self {
            inner: Arc::new(Mutex::new(BsfInner {
                ctx,
                eof_sent: false,
            })),
            stream: out_stream,
        })
    }

    /// The output-side stream description (post-filter codec parameters)
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Short name of the filter
    pub fn name(&self) -> String {
        self.inner.lock().unwrap().ctx.name().to_string()
    }

    /// Submit one packet (None marks end of stream) and collect every
    /// packet the filter can produce right now
    ///
    /// The input packet is consumed.
    pub async fn process(&self, packet: Option<Packet>) -> Result<Vec<Packet>> {
        self.inner.lock().unwrap().process(packet)
    }

    /// Submit EOS, drain residual packets, and reset internal state
    pub async fn flush(&self) -> Result<Vec<Packet>> {
        let mut inner = self.inner.lock().unwrap();
        let outputs = inner.process(None)?;
        inner.reset();
        Ok(outputs)
    }

    /// Clear internal state without draining; idempotent
    pub async fn reset(&self) {
        self.inner.lock().unwrap().reset();
    }

    /// Lazy filtered-packet sequence over an input packet sequence
    ///
    /// Inputs are freed as they are consumed; the filter flushes when the
    /// input ends. On error the filter's internal state is reset before
    /// the error surfaces.
    pub fn packets(&self, packets: PacketStream) -> PacketStream {
        enum Phase {
            Feeding,
            Drained,
        }
        struct State {
            inner: Arc<Mutex<BsfInner>>,
            input: PacketStream,
            pending: VecDeque<Packet>,
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
                if let Some(packet) = st.pending.pop_front() {
                    return Ok(Some((packet, st)));
                }
                match st.phase {
                    Phase::Feeding => {
                        let step = match st.input.next().await {
                            Some(Ok(packet)) => {
                                st.inner.lock().unwrap().process(Some(packet))
                            }
                            Some(Err(e)) => {
                                st.inner.lock().unwrap().reset();
                                return Err(e);
                            }
                            None => {
                                st.phase = Phase::Drained;
                                st.inner.lock().unwrap().process(None)
                            }
                        };
                        match step {
                            Ok(outputs) => st.pending.extend(outputs),
                            Err(e) => {
                                st.inner.lock().unwrap().reset();
                                return Err(e);
                            }
                        }
                    }
                    Phase::Drained => return Ok(None),
                }
            }
        }))
    }
}

impl std::fmt::Debug for BitStreamFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitStreamFilter")
            .field("stream", &self.stream.index)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecParameters, MediaType};
    use crate::ffi::AVRational;
    use crate::pipeline::Error;

    fn dummy_stream() -> Stream {
        Stream {
            index: 0,
            media_type: MediaType::Data,
            codec_parameters: CodecParameters::new().unwrap(),
            time_base: AVRational::new(1, 90000),
            avg_frame_rate: AVRational::new(0, 0),
            r_frame_rate: AVRational::new(0, 0),
            duration: 0,
        }
    }

    #[test]
    fn unknown_filter_is_not_found() {
        let err = BitStreamFilter::new("definitely_missing", &dummy_stream()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn null_filter_keeps_time_base() {
        let bsf = BitStreamFilter::new("null", &dummy_stream()).unwrap();
        assert_eq!(bsf.stream().time_base, AVRational::new(1, 90000));
    }

    #[tokio::test]
    async fn flush_without_input_yields_nothing() {
        let bsf = BitStreamFilter::new("null", &dummy_stream()).unwrap();
        assert!(bsf.flush().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reset_twice_is_idempotent() {
        let bsf = BitStreamFilter::new("null", &dummy_stream()).unwrap();
        bsf.reset().await;
        bsf.reset().await;
    }
}
