//! Safe Rust wrappers for FFmpeg objects
//!
//! This module provides RAII wrappers around FFmpeg's C structures,
//! ensuring proper resource cleanup and memory safety. The high-level
//! pipeline drivers in [`crate::pipeline`] are built on top of these.

pub mod avio_context;
pub mod bsf;
pub mod codec_params;
pub mod context;
pub mod demuxer;
pub mod filter_graph;
pub mod frame;
pub mod hwdevice;
pub mod hwframes;
pub mod muxer;
pub mod packet;

pub use avio_context::{CustomIOContext, IoCallbacks, SeekWhence};
pub use bsf::BsfContext;
pub use codec_params::CodecParameters;
pub use context::{CodecContext, CodecType};
pub use demuxer::{DemuxerContext, MediaType, Stream};
pub use filter_graph::FilterGraph;
pub use frame::Frame;
pub use hwdevice::HwDeviceContext;
pub use hwframes::HwFramesContext;
pub use muxer::MuxerContext;
pub use packet::Packet;

/// Codec error type
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
  #[error("FFmpeg error: {0}")]
  Ffmpeg(#[from] crate::ffi::FFmpegError),

  #[error("Codec not found: {0}")]
  CodecNotFound(String),

  #[error("Bitstream filter not found: {0}")]
  BsfNotFound(String),

  #[error("Filter not found: {0}")]
  FilterNotFound(String),

  #[error("Failed to allocate {0}")]
  AllocationFailed(&'static str),

  #[error("Invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("Invalid state: {0}")]
  InvalidState(String),

  #[error("Hardware acceleration error: {0}")]
  HardwareError(String),
}

pub type CodecResult<T> = Result<T, CodecError>;
