//! High-level media pipeline runtime
//!
//! Composable, resource-safe stages for reading, decoding, filtering,
//! encoding, bitstream-filtering, and muxing media streams, driven through
//! lazy async sequences:
//!
//! ```text
//! MediaInput -> [BSF*] -> Decoder -> [Filter*] -> Encoder -> [BSF*] -> MediaOutput
//! ```
//!
//! Each driver owns its native state behind an `Arc<Mutex<_>>`, so lazy
//! sequences can carry it across suspension points, and sinks can observe
//! encoders that initialize lazily from their first frame.

pub mod bitrate;
pub mod bsf;
pub mod compose;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod filter;
pub mod hardware;
pub mod info;
pub mod input;
pub mod output;

pub use bitrate::{parse_bitrate, Bitrate};
pub use bsf::BitStreamFilter;
pub use compose::{
    MediaStream, NamedPipeline, Pipeline, PipelineControl, PipelineState, RolePlan, Source, Stage,
    StreamRole,
};
pub use decoder::{Decoder, DecoderOptions};
pub use encoder::{Encoder, EncoderOptions};
pub use error::{Error, Result};
pub use filter::{Filter, FilterOptions, FilterOutputConstraints};
pub use hardware::HardwareContext;
pub use info::StreamInfo;
pub use input::MediaInput;
pub use output::{AddStreamOptions, MediaOutput, MediaOutputOptions, StreamSource};

use crate::codec::{Frame, Packet};
use crate::ffi::AVCodecID;
use futures::stream::BoxStream;

/// Lazy sequence of packets
pub type PacketStream = BoxStream<'static, Result<Packet>>;

/// Lazy sequence of frames
pub type FrameStream = BoxStream<'static, Result<Frame>>;

/// How a codec is resolved: by short name or by numeric ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecSelector {
    Name(String),
    Id(AVCodecID),
}

impl From<&str> for CodecSelector {
    fn from(name: &str) -> Self {
        CodecSelector::Name(name.to_string())
    }
}

impl From<String> for CodecSelector {
    fn from(name: String) -> Self {
        CodecSelector::Name(name)
    }
}

impl From<AVCodecID> for CodecSelector {
    fn from(id: AVCodecID) -> Self {
        CodecSelector::Id(id)
    }
}

impl From<i32> for CodecSelector {
    fn from(id: i32) -> Self {
        CodecSelector::Id(AVCodecID(id))
    }
}
