//! Media input: demuxed packet source
//!
//! Opens a container from a path, URL or in-memory buffer and exposes its
//! elementary streams plus lazy packet sequences. The blocking probe runs
//! off the async loop.

use crate::codec::{DemuxerContext, MediaType, Stream};
use futures::stream;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::error::{Error, Result};
use super::PacketStream;

/// Demuxed media input
///
/// Cloning shares the underlying demuxer; packet sequences taken from any
/// clone advance the same read position.
#[derive(Clone)]
pub struct MediaInput {
    demuxer: Arc<Mutex<DemuxerContext>>,
    streams: Vec<Stream>,
}

impl MediaInput {
    /// Open a file path or URL for reading
    pub async fn open(target: &str) -> Result<Self> {
        let target = target.to_string();
        let demuxer = tokio::task::spawn_blocking(move || DemuxerContext::open(&target))
            .await
            .map_err(|e| Error::Fatal(format!("demuxer open task failed: {e}")))??;
        Ok(Self::from_demuxer(demuxer))
    }

    /// Open an in-memory buffer for reading
    pub async fn open_buffer(data: Vec<u8>) -> Result<Self> {
        let demuxer = tokio::task::spawn_blocking(move || DemuxerContext::open_buffer(data))
            .await
            .map_err(|e| Error::Fatal(format!("demuxer open task failed: {e}")))??;
        Ok(Self::from_demuxer(demuxer))
    }

    fn from_demuxer(demuxer: DemuxerContext) -> Self {
        let streams = demuxer.streams().to_vec();
        debug!(
            streams = streams.len(),
            format = demuxer.format_name().as_deref().unwrap_or("unknown"),
            "opened media input"
        );
        Self {
            demuxer: Arc::new(Mutex::new(demuxer)),
            streams,
        }
    }

    /// Stream snapshots, in container order
    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    /// The "best" stream of the given media type, if any
    pub fn best_stream(&self, media_type: MediaType) -> Option<Stream> {
        self.demuxer
            .lock()
            .unwrap()
            .best_stream(media_type)
            .cloned()
    }

    /// Container duration in microseconds, when known
    pub fn duration(&self) -> Option<i64> {
        let duration = self.demuxer.lock().unwrap().duration();
        (duration > 0).then_some(duration)
    }

    /// Short name of the detected container format
    pub fn format_name(&self) -> Option<String> {
        self.demuxer.lock().unwrap().format_name()
    }

    /// Seek to the keyframe at or before `timestamp` (stream time base units)
    pub async fn seek(&self, stream_index: i32, timestamp: i64) -> Result<()> {
        let demuxer = self.demuxer.clone();
        tokio::task::spawn_blocking(move || demuxer.lock().unwrap().seek(stream_index, timestamp))
            .await
            .map_err(|e| Error::Fatal(format!("seek task failed: {e}")))??;
        Ok(())
    }

    /// Lazy sequence over every packet in the container
    pub fn packets(&self) -> PacketStream {
        let demuxer = self.demuxer.clone();
        Box::pin(stream::try_unfold(demuxer, |demuxer| async move {
            let next = demuxer.lock().unwrap().read_packet();
            match next {
                Ok(Some(packet)) => Ok(Some((packet, demuxer))),
                Ok(None) => Ok(None),
                Err(e) => Err(Error::from(e)),
            }
        }))
    }

    /// Lazy sequence over the packets of a single stream
    ///
    /// Packets of other streams are read and freed along the way.
    pub fn packets_for_stream(&self, stream_index: i32) -> PacketStream {
        let demuxer = self.demuxer.clone();
        Box::pin(stream::try_unfold(demuxer, move |demuxer| async move {
            loop {
                let next = demuxer.lock().unwrap().read_packet();
                match next {
                    Ok(Some(packet)) if packet.stream_index() == stream_index => {
                        return Ok(Some((packet, demuxer)));
                    }
                    // Foreign stream; the packet drops (and frees) here
                    Ok(Some(_)) => continue,
                    Ok(None) => return Ok(None),
                    Err(e) => return Err(Error::from(e)),
                }
            }
        }))
    }
}

impl std::fmt::Debug for MediaInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaInput")
            .field("streams", &self.streams.len())
            .finish()
    }
}
