//! Media output: muxing sink
//!
//! Sink for encoded or copied packets. Manages output streams (with
//! deferred initialization for encoder-sourced streams), the one-shot
//! header write, per-stream timestamp rescaling, interleaved writing, and
//! the trailer on close.

use crate::codec::{IoCallbacks, MuxerContext, Packet, Stream};
use crate::ffi::AVRational;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::encoder::Encoder;
use super::error::{Error, Result};

/// Default AVIO buffer size for callback outputs
const DEFAULT_CALLBACK_BUFFER_SIZE: usize = 4096;

/// Default cap on packets held back per stream while encoder-sourced
/// streams finish initializing; encoders normally open within one GOP
const DEFAULT_MAX_BUFFERED_PACKETS: usize = 1024;

/// Options for opening a media output
#[derive(Default)]
pub struct MediaOutputOptions {
    /// Container format short name; required for callback and buffer
    /// targets, optional for paths (guessed from the extension)
    pub format: Option<String>,
    /// AVIO buffer size for callback targets
    pub buffer_size: Option<usize>,
    /// Muxer options applied at header write (e.g. movflags)
    pub header_options: Vec<(String, String)>,
    /// Cap on packets held back per stream during lazy initialization
    pub max_buffered_packets: Option<usize>,
}

/// Options for adding an output stream
#[derive(Default)]
pub struct AddStreamOptions {
    /// Override for the output stream time base; the muxer may still
    /// re-negotiate it at header write
    pub time_base: Option<AVRational>,
}

/// Source feeding an output stream
pub enum StreamSource<'a> {
    /// Packets come from this encoder; codec parameters are copied once
    /// the encoder's lazy open has happened
    Encoder(&'a Encoder),
    /// Stream copy: codec parameters are copied immediately
    Copy(&'a Stream),
}

enum DescSource {
    Encoder(Encoder),
    Copy,
}

struct OutputStreamDesc {
    initialized: bool,
    /// Stream copy or lazily-initialized encoder source
    source: DescSource,
    /// User override for the output time base
    output_time_base: Option<AVRational>,
    /// Time base packets from the source are stamped in
    source_time_base: Option<AVRational>,
    /// Packets held back while other streams finish initializing
    buffered: VecDeque<Packet>,
}

struct OutputInner {
    /// None after close
    muxer: Option<MuxerContext>,
    streams: Vec<OutputStreamDesc>,
    header_written: bool,
    closed: bool,
    header_options: Vec<(String, String)>,
    max_buffered_packets: usize,
    /// Collected bytes for buffer targets, captured at close
    collected: Option<Vec<u8>>,
}

impl OutputInner {
    fn muxer_mut(&mut self) -> Result<&mut MuxerContext> {
        self.muxer
            .as_mut()
            .ok_or_else(|| Error::State("media output is closed".into()))
    }

    /// Copy codec parameters and time bases from every encoder that has
    /// opened since the last call
    fn refresh_pending_streams(&mut self) -> Result<()> {
        let muxer = self
            .muxer
            .as_mut()
            .ok_or_else(|| Error::State("media output is closed".into()))?;

        for (index, desc) in self.streams.iter_mut().enumerate() {
            if desc.initialized {
                continue;
            }
            let DescSource::Encoder(encoder) = &desc.source else {
                continue;
            };
            let Some((params, encoder_tb)) = encoder.capture_parameters()? else {
                continue;
            };
            muxer.set_stream_parameters(index, &params)?;
            let out_tb = desc.output_time_base.unwrap_or(encoder_tb);
            muxer.set_stream_time_base(index, out_tb)?;
            desc.source_time_base = Some(encoder_tb);
            desc.initialized = true;
            debug!(stream = index, "encoder-sourced stream initialized");
        }
        Ok(())
    }

    fn all_initialized(&self) -> bool {
        self.streams.iter().all(|desc| desc.initialized)
    }

    /// Rescale to the effective output time base, fix the stream index,
    /// and hand the packet to the interleaved writer
    fn write_one(&mut self, index: usize, mut packet: Packet) -> Result<()> {
        let source_tb = self.streams[index].source_time_base;
        let muxer = self.muxer_mut()?;
        let out_tb = muxer.stream_time_base(index)?;
        if let Some(src_tb) = source_tb {
            if src_tb != out_tb {
                packet.rescale_ts(src_tb, out_tb);
            }
        }
        packet.set_stream_index(index as i32);
        muxer.write_packet(&mut packet)?;
        // packet shell dropped (freed) here
        Ok(())
    }
}

/// Muxing sink
///
/// Cloning shares the underlying muxer; the mutex around it is the single
/// synchronization point concurrent writers contend on, which also makes
/// the header write a one-shot.
#[derive(Clone)]
pub struct MediaOutput {
    inner: Arc<Mutex<OutputInner>>,
}

impl MediaOutput {
    /// Open an output file or URL
    ///
    /// URL-shaped targets pass through verbatim; plain paths resolve
    /// against the working directory and missing parent directories are
    /// created first.
    pub async fn open(target: &str, options: MediaOutputOptions) -> Result<Self> {
        let format = options.format.clone();
        let target = if is_url(target) {
            target.to_string()
        } else {
            let mut path = PathBuf::from(target);
            if path.is_relative() {
                path = std::env::current_dir()?.join(path);
            }
            let parent = path.parent().map(|p| p.to_path_buf());
            if let Some(parent) = parent {
                tokio::task::spawn_blocking(move || std::fs::create_dir_all(parent))
                    .await
                    .map_err(|e| Error::Fatal(format!("mkdir task failed: {e}")))??;
            }
            path.to_string_lossy().into_owned()
        };

        let muxer = tokio::task::spawn_blocking(move || {
            MuxerContext::new_for_path(format.as_deref(), &target)
        })
        .await
        .map_err(|e| Error::Fatal(format!("muxer open task failed: {e}")))??;

        Ok(Self::from_muxer(muxer, options))
    }

    /// Open an output over user write/seek callbacks; `format` is required
    pub fn open_callbacks(callbacks: IoCallbacks, options: MediaOutputOptions) -> Result<Self> {
        let format = options.format.as_deref().ok_or_else(|| {
            Error::ConfigInvalid("callback output requires an explicit format".into())
        })?;
        let buffer_size = options.buffer_size.unwrap_or(DEFAULT_CALLBACK_BUFFER_SIZE);
        let muxer = MuxerContext::new_with_callbacks(format, callbacks, buffer_size)?;
        Ok(Self::from_muxer(muxer, options))
    }

    /// Open an output collecting the muxed bytes in memory
    ///
    /// Retrieve them with [`take_buffer`](Self::take_buffer) after close.
    pub fn open_buffer(format: &str, options: MediaOutputOptions) -> Result<Self> {
        let muxer = MuxerContext::new_to_buffer(format)?;
        Ok(Self::from_muxer(muxer, options))
    }

    fn from_muxer(muxer: MuxerContext, options: MediaOutputOptions) -> Self {
        Self {
            inner: Arc::new(Mutex::new(OutputInner {
                muxer: Some(muxer),
                streams: Vec::new(),
                header_written: false,
                closed: false,
                header_options: options.header_options,
                max_buffered_packets: options
                    .max_buffered_packets
                    .unwrap_or(DEFAULT_MAX_BUFFERED_PACKETS),
                collected: None,
            })),
        }
    }

    /// Add an output stream; fails once the header has been written
    ///
    /// Stream-copy sources initialize immediately; encoder sources defer
    /// codec parameter copy until the encoder's lazy open.
    pub fn add_stream(&self, source: StreamSource<'_>, options: AddStreamOptions) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(Error::State("media output is closed".into()));
        }
        if inner.header_written {
            return Err(Error::State("header already written".into()));
        }

        let muxer = inner.muxer_mut()?;
        let index;
        let desc = match source {
            StreamSource::Copy(stream) => {
                let mut params = stream.codec_parameters.clone();
                // The tag is container-specific; let the muxer pick its own
                params.clear_codec_tag();
                let time_base = options.time_base.unwrap_or(stream.time_base);
                index = muxer.add_stream(&params, time_base)?;
                OutputStreamDesc {
                    initialized: true,
                    source: DescSource::Copy,
                    output_time_base: options.time_base,
                    source_time_base: Some(stream.time_base),
                    buffered: VecDeque::new(),
                }
            }
            StreamSource::Encoder(encoder) => {
                index = muxer.add_pending_stream()?;
                if muxer.needs_global_header() {
                    encoder.request_global_header();
                }
                OutputStreamDesc {
                    initialized: false,
                    source: DescSource::Encoder(encoder.clone()),
                    output_time_base: options.time_base,
                    source_time_base: None,
                    buffered: VecDeque::new(),
                }
            }
        };

        debug_assert_eq!(index, inner.streams.len());
        inner.streams.push(desc);
        Ok(index)
    }

    /// Write one packet to the given output stream
    ///
    /// While any encoder-sourced stream is still uninitialized the packet
    /// is buffered; the header is written exactly once, right before the
    /// first real write.
    pub async fn write_packet(&self, packet: Packet, stream_index: usize) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(Error::State("media output is closed".into()));
        }
        if stream_index >= inner.streams.len() {
            return Err(Error::State(format!(
                "stream index {stream_index} not registered with this output"
            )));
        }

        inner.refresh_pending_streams()?;

        if !inner.all_initialized() {
            if inner.streams[stream_index].buffered.len() >= inner.max_buffered_packets {
                return Err(Error::ResourceExhausted(format!(
                    "stream {stream_index} buffered {} packets while waiting for \
                     lazy stream initialization",
                    inner.max_buffered_packets
                )));
            }
            // Hold the packet until the stragglers have opened; cloning
            // detaches it from the caller's buffer lifecycle
            let held = packet.try_clone()?;
            inner.streams[stream_index].buffered.push_back(held);
            // original packet dropped (freed) here
            return Ok(());
        }

        if !inner.header_written {
            let header_options = inner.header_options.clone();
            inner.muxer_mut()?.write_header(&header_options)?;
            inner.header_written = true;
            debug!("container header written");
        }

        // FIFO-drain packets buffered for this stream before the new one
        while let Some(buffered) = inner.streams[stream_index].buffered.pop_front() {
            inner.write_one(stream_index, buffered)?;
        }
        inner.write_one(stream_index, packet)
    }

    /// Write the header now if every stream is ready for it
    ///
    /// Returns true when the header has been written (now or earlier);
    /// false when an encoder-sourced stream is still uninitialized.
    pub async fn ensure_header(&self) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(Error::State("media output is closed".into()));
        }
        if inner.header_written {
            return Ok(true);
        }
        inner.refresh_pending_streams()?;
        if !inner.all_initialized() {
            return Ok(false);
        }
        let header_options = inner.header_options.clone();
        inner.muxer_mut()?.write_header(&header_options)?;
        inner.header_written = true;
        debug!("container header written");
        Ok(true)
    }

    /// Set a container metadata tag; only effective before the header write
    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.muxer_mut()?.set_metadata(key, value)?;
        Ok(())
    }

    /// Whether the container header has been written
    pub fn header_written(&self) -> bool {
        self.inner.lock().unwrap().header_written
    }

    /// Number of streams added
    pub fn stream_count(&self) -> usize {
        self.inner.lock().unwrap().streams.len()
    }

    /// Close the output; idempotent
    ///
    /// Writes the trailer if the header was written. Teardown errors are
    /// swallowed so close always completes.
    pub async fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;

        for desc in &mut inner.streams {
            desc.buffered.clear();
        }

        if let Some(mut muxer) = inner.muxer.take() {
            if inner.header_written {
                if let Err(e) = muxer.write_trailer() {
                    debug!(error = %e, "trailer write failed during close");
                }
            }
            inner.collected = muxer.take_buffer();
            // muxer drop detaches the io context and frees the format
            // context; errors there cannot surface
        }
        Ok(())
    }

    /// Take the muxed bytes of a buffer output after close
    pub fn take_buffer(&self) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().collected.take()
    }
}

impl std::fmt::Debug for MediaOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("MediaOutput")
            .field("streams", &inner.streams.len())
            .field("header_written", &inner.header_written)
            .field("closed", &inner.closed)
            .finish()
    }
}

/// Whether a target string is a URL (`scheme://...`)
fn is_url(target: &str) -> bool {
    let Some((scheme, _)) = target.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_detection() {
        assert!(is_url("rtmp://example.com/live"));
        assert!(is_url("http://host/path.mp4"));
        assert!(is_url("x-proto+v2://x"));
        assert!(!is_url("output.mp4"));
        assert!(!is_url("/tmp/output.mp4"));
        assert!(!is_url("3abc://x"));
        assert!(!is_url("://x"));
    }

    #[tokio::test]
    async fn callback_output_requires_format() {
        let callbacks = IoCallbacks {
            write: Box::new(|buf| Ok(buf.len())),
            seek: None,
            read: None,
        };
        let err = MediaOutput::open_callbacks(callbacks, MediaOutputOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }

    #[tokio::test]
    async fn path_open_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/deeper/out.mp4");
        let output = MediaOutput::open(target.to_str().unwrap(), MediaOutputOptions::default())
            .await
            .unwrap();
        assert!(target.parent().unwrap().is_dir());
        output.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let output = MediaOutput::open_buffer("mp4", MediaOutputOptions::default()).unwrap();
        output.close().await.unwrap();
        output.close().await.unwrap();
    }

    #[tokio::test]
    async fn write_after_close_is_a_state_error() {
        let output = MediaOutput::open_buffer("mp4", MediaOutputOptions::default()).unwrap();
        output.close().await.unwrap();
        let packet = Packet::new().unwrap();
        let err = output.write_packet(packet, 0).await.unwrap_err();
        assert!(matches!(err, Error::State(_)));
    }

    #[tokio::test]
    async fn unknown_stream_index_is_rejected() {
        let output = MediaOutput::open_buffer("mp4", MediaOutputOptions::default()).unwrap();
        let packet = Packet::new().unwrap();
        let err = output.write_packet(packet, 3).await.unwrap_err();
        assert!(matches!(err, Error::State(_)));
    }

    #[tokio::test]
    async fn header_waits_for_every_encoder_to_initialize() {
        use super::super::{Encoder, EncoderOptions};
        use crate::codec::Frame;
        use crate::ffi::{AVPixelFormat, AVRational};

        async fn one_packet(encoder: &Encoder, pts: i64) -> Packet {
            let mut frame = Frame::new_video(64, 64, AVPixelFormat(12)).unwrap();
            frame.set_pts(pts);
            match encoder.encode(Some(frame)).await.unwrap() {
                Some(packet) => packet,
                None => encoder.flush().await.unwrap().expect("flushed packet"),
            }
        }

        let slow = Encoder::new("mjpeg", EncoderOptions::new(AVRational::new(1, 25))).unwrap();
        let fast = Encoder::new("mjpeg", EncoderOptions::new(AVRational::new(1, 25))).unwrap();
        let output = MediaOutput::open_buffer("mp4", MediaOutputOptions::default()).unwrap();

        let fast_index = output
            .add_stream(StreamSource::Encoder(&fast), AddStreamOptions::default())
            .unwrap();
        let slow_index = output
            .add_stream(StreamSource::Encoder(&slow), AddStreamOptions::default())
            .unwrap();

        // The fast encoder produces before the slow one has even opened;
        // its packet must be buffered, not written
        let early = one_packet(&fast, 0).await;
        output.write_packet(early, fast_index).await.unwrap();
        assert!(!output.header_written());

        // Once the slow encoder opens, its write initializes every stream
        // and the header goes out exactly once
        let late = one_packet(&slow, 0).await;
        output.write_packet(late, slow_index).await.unwrap();
        assert!(output.header_written());

        // The buffered packet drains ahead of the next one on its stream
        let next = one_packet(&fast, 1).await;
        output.write_packet(next, fast_index).await.unwrap();

        output.close().await.unwrap();
        assert!(output.take_buffer().is_some_and(|bytes| !bytes.is_empty()));
    }
}
