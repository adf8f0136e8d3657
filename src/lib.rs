#![deny(clippy::all)]

//! avpipe: a composable media pipeline runtime on FFmpeg
//!
//! The crate is layered: hand-written FFmpeg bindings ([`ffi`]), RAII
//! wrappers over the native objects ([`codec`]), and the high-level
//! pipeline runtime ([`pipeline`]) of decoders, encoders, filter graphs,
//! bitstream filters, demuxed inputs and muxing sinks, composed through
//! lazy async sequences.
//!
//! A transcode is a source, a stage list, and a sink:
//!
//! ```no_run
//! use avpipe::{
//!     Decoder, DecoderOptions, Encoder, EncoderOptions, MediaInput, MediaOutput,
//!     MediaOutputOptions, Pipeline, Rational,
//! };
//!
//! # async fn transcode() -> avpipe::Result<()> {
//! let input = MediaInput::open("input.mp4").await?;
//! let stream = input.best_stream(avpipe::MediaType::Video).unwrap();
//!
//! let decoder = Decoder::new("h264", &stream, DecoderOptions::default())?;
//! let mut options = EncoderOptions::new(Rational::new(1, 30));
//! options.bit_rate = Some("1M".into());
//! let encoder = Encoder::new("libx264", options)?;
//!
//! let output = MediaOutput::open("output.mp4", MediaOutputOptions::default()).await?;
//! Pipeline::new(input)
//!     .stage(decoder)
//!     .stage(encoder)
//!     .run(&output)
//!     .await?;
//! # Ok(())
//! # }
//! ```

// FFmpeg C bindings (hand-written, no bindgen)
pub mod ffi;

// Safe RAII wrappers
pub mod codec;

// High-level pipeline runtime
pub mod pipeline;

// Re-export the public API at the crate root
pub use codec::{
    CodecParameters, Frame, HwDeviceContext, HwFramesContext, IoCallbacks, MediaType, Packet,
    SeekWhence, Stream,
};
pub use ffi::types::{AVHWDeviceType as HwDeviceType, AVPixelFormat as PixelFormat,
    AVRational as Rational, AVSampleFormat as SampleFormat};
pub use pipeline::{
    parse_bitrate, AddStreamOptions, Bitrate, BitStreamFilter, CodecSelector, Decoder,
    DecoderOptions, Encoder, EncoderOptions, Error, Filter, FilterOptions,
    FilterOutputConstraints, FrameStream, HardwareContext, MediaInput, MediaOutput,
    MediaOutputOptions, MediaStream, NamedPipeline, PacketStream, Pipeline, PipelineControl,
    PipelineState, Result, RolePlan, Source, Stage, StreamInfo, StreamRole, StreamSource,
};
