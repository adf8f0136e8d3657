//! Value descriptions of media streams
//!
//! [`StreamInfo`] describes an input source without holding any native
//! state; drivers accept it wherever a demuxed [`Stream`] is not available
//! (e.g. feeding raw frames into an encoder or filter).

use crate::codec::{MediaType, Stream};
use crate::ffi::{AVPixelFormat, AVRational, AVSampleFormat};

use super::error::{Error, Result};

/// Description of an elementary media source
#[derive(Debug, Clone, PartialEq)]
pub enum StreamInfo {
    Video {
        width: i32,
        height: i32,
        pixel_format: AVPixelFormat,
        time_base: AVRational,
        frame_rate: Option<AVRational>,
        sample_aspect_ratio: Option<AVRational>,
    },
    Audio {
        sample_rate: i32,
        sample_format: AVSampleFormat,
        channel_layout: u64,
        time_base: AVRational,
        frame_size: Option<i32>,
    },
}

impl StreamInfo {
    /// Derive a description from a demuxed stream snapshot
    pub fn from_stream(stream: &Stream) -> Result<Self> {
        let params = &stream.codec_parameters;
        match stream.media_type {
            MediaType::Video => Ok(StreamInfo::Video {
                width: params.width(),
                height: params.height(),
                pixel_format: params.pixel_format(),
                time_base: stream.time_base,
                frame_rate: if stream.avg_frame_rate.num != 0 {
                    Some(stream.avg_frame_rate)
                } else if stream.r_frame_rate.num != 0 {
                    Some(stream.r_frame_rate)
                } else {
                    None
                },
                sample_aspect_ratio: None,
            }),
            MediaType::Audio => Ok(StreamInfo::Audio {
                sample_rate: params.sample_rate(),
                sample_format: params.sample_format(),
                channel_layout: params.channel_layout(),
                time_base: stream.time_base,
                frame_size: match params.frame_size() {
                    0 => None,
                    size => Some(size),
                },
            }),
            other => Err(Error::ConfigInvalid(format!(
                "cannot build stream info for {other:?} stream {}",
                stream.index
            ))),
        }
    }

    /// The source time base
    pub fn time_base(&self) -> AVRational {
        match self {
            StreamInfo::Video { time_base, .. } => *time_base,
            StreamInfo::Audio { time_base, .. } => *time_base,
        }
    }

    /// Whether this describes a video source
    pub fn is_video(&self) -> bool {
        matches!(self, StreamInfo::Video { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_info_reports_time_base() {
        let info = StreamInfo::Video {
            width: 1280,
            height: 720,
            pixel_format: AVPixelFormat::YUV420P,
            time_base: AVRational::new(1, 30),
            frame_rate: Some(AVRational::new(30, 1)),
            sample_aspect_ratio: None,
        };
        assert!(info.is_video());
        assert_eq!(info.time_base(), AVRational::new(1, 30));
    }
}
