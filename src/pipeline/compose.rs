//! Pipeline composer
//!
//! Wires Input → Decoder → Filter* → Encoder → BSF* → Output into a
//! runnable dataflow. Stages are a closed sum type; composition is plain
//! function application over lazy sequences. A named multi-stream form
//! merges several roles into one sink ordered by decode timestamp.

use crate::codec::{MediaType, Packet, Stream};
use crate::ffi::AV_NOPTS_VALUE;
use futures::stream::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use super::bsf::BitStreamFilter;
use super::decoder::Decoder;
use super::encoder::Encoder;
use super::error::{Error, Result};
use super::filter::Filter;
use super::input::MediaInput;
use super::output::{AddStreamOptions, MediaOutput, StreamSource};
use super::{FrameStream, PacketStream};

// ============================================================================
// Sources and Stages
// ============================================================================

/// Head of a pipeline: a demuxed input or a raw frame sequence
pub enum Source {
    Input(MediaInput),
    Frames(FrameStream),
}

impl From<MediaInput> for Source {
    fn from(input: MediaInput) -> Self {
        Source::Input(input)
    }
}

impl From<FrameStream> for Source {
    fn from(frames: FrameStream) -> Self {
        Source::Frames(frames)
    }
}

/// One processing stage of a pipeline
///
/// A closed sum type; each variant wraps the corresponding driver. Filter
/// and bitstream-filter chains are flattened in order.
pub enum Stage {
    Decode(Decoder),
    Filter(Filter),
    FilterChain(Vec<Filter>),
    Encode(Encoder),
    BitStream(BitStreamFilter),
    BitStreamChain(Vec<BitStreamFilter>),
}

impl From<Decoder> for Stage {
    fn from(decoder: Decoder) -> Self {
        Stage::Decode(decoder)
    }
}

impl From<Filter> for Stage {
    fn from(filter: Filter) -> Self {
        Stage::Filter(filter)
    }
}

impl From<Vec<Filter>> for Stage {
    fn from(filters: Vec<Filter>) -> Self {
        Stage::FilterChain(filters)
    }
}

impl From<Encoder> for Stage {
    fn from(encoder: Encoder) -> Self {
        Stage::Encode(encoder)
    }
}

impl From<BitStreamFilter> for Stage {
    fn from(bsf: BitStreamFilter) -> Self {
        Stage::BitStream(bsf)
    }
}

impl From<Vec<BitStreamFilter>> for Stage {
    fn from(bsfs: Vec<BitStreamFilter>) -> Self {
        Stage::BitStreamChain(bsfs)
    }
}

/// Either kind of lazy sequence flowing between stages
pub enum MediaStream {
    Packets(PacketStream),
    Frames(FrameStream),
}

/// What the sink stream is keyed on when a pipeline ends in an output
enum SinkKey {
    /// Encoder-sourced stream, initialized lazily
    Encoder(Encoder),
    /// Stream copy from this source description
    CopyStream(Stream),
}

// ============================================================================
// Pipeline Control
// ============================================================================

/// Observable pipeline state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed(String),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Completed | PipelineState::Cancelled | PipelineState::Failed(_)
        )
    }
}

/// Handle to a started pipeline
///
/// `stop` requests cooperative cancellation: the pipeline checks the flag
/// at every packet/frame dispatch, frees in-flight items, and unwinds
/// without forcing a trailer.
#[derive(Clone)]
pub struct PipelineControl {
    stopped: Arc<AtomicBool>,
    state: watch::Receiver<PipelineState>,
}

impl PipelineControl {
    /// Request cancellation; idempotent
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Wait for a terminal state
    pub async fn completion(&self) -> PipelineState {
        let mut state = self.state.clone();
        loop {
            if state.borrow().is_terminal() {
                return state.borrow().clone();
            }
            if state.changed().await.is_err() {
                return state.borrow().clone();
            }
        }
    }
}

/// Internal cancellation token shared with unstarted pipelines
#[derive(Clone, Default)]
struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Simple Pipeline
// ============================================================================

/// Linear pipeline: one source, a stage list, optionally one sink
pub struct Pipeline {
    source: Source,
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(source: impl Into<Source>) -> Self {
        Self {
            source: source.into(),
            stages: Vec::new(),
        }
    }

    /// Append a stage
    pub fn stage(mut self, stage: impl Into<Stage>) -> Self {
        self.stages.push(stage.into());
        self
    }

    /// Compose into a lazy packet sequence (no sink)
    ///
    /// Fails if the final stage produces frames.
    pub fn packets(self) -> Result<PacketStream> {
        match self.compose()?.0 {
            MediaStream::Packets(packets) => Ok(packets),
            MediaStream::Frames(_) => Err(Error::ConfigInvalid(
                "pipeline ends in frames; add an encoder or use frames()".into(),
            )),
        }
    }

    /// Compose into a lazy frame sequence (no sink)
    ///
    /// Fails if the final stage produces packets.
    pub fn frames(self) -> Result<FrameStream> {
        match self.compose()?.0 {
            MediaStream::Frames(frames) => Ok(frames),
            MediaStream::Packets(_) => Err(Error::ConfigInvalid(
                "pipeline ends in packets; use packets()".into(),
            )),
        }
    }

    /// Compose into either kind of sequence
    pub fn into_stream(self) -> Result<MediaStream> {
        Ok(self.compose()?.0)
    }

    /// Run to completion into a sink
    ///
    /// With no stages and a demuxed source this is the stream-copy
    /// shortcut: every input stream is forwarded.
    pub async fn run(self, output: &MediaOutput) -> Result<()> {
        let stop = StopFlag::default();
        match self.drive(output, &stop).await? {
            PipelineState::Failed(msg) => Err(Error::Fatal(msg)),
            _ => Ok(()),
        }
    }

    /// Spawn the pipeline and return a control handle
    pub fn start(self, output: MediaOutput) -> PipelineControl {
        let stopped = Arc::new(AtomicBool::new(false));
        let (tx, rx) = watch::channel(PipelineState::Running);
        let stop = StopFlag(stopped.clone());

        tokio::spawn(async move {
            let state = match self.drive(&output, &stop).await {
                Ok(state) => state,
                Err(e) => PipelineState::Failed(e.to_string()),
            };
            let _ = tx.send(state);
        });

        PipelineControl {
            stopped,
            state: rx,
        }
    }

    async fn drive(self, output: &MediaOutput, stop: &StopFlag) -> Result<PipelineState> {
        if self.stages.is_empty() {
            return match self.source {
                Source::Input(input) => stream_copy(input, output, stop).await,
                Source::Frames(_) => Err(Error::ConfigInvalid(
                    "a frame source needs at least an encoder stage before a sink".into(),
                )),
            };
        }

        let (stream, sink_key) = self.compose()?;
        let MediaStream::Packets(packets) = stream else {
            return Err(Error::ConfigInvalid(
                "only encoded packets can be muxed; the pipeline still yields frames".into(),
            ));
        };

        let sink_key = sink_key.ok_or_else(|| {
            Error::ConfigInvalid("pipeline has no stage to key an output stream on".into())
        })?;
        let index = match &sink_key {
            SinkKey::Encoder(encoder) => {
                output.add_stream(StreamSource::Encoder(encoder), AddStreamOptions::default())?
            }
            SinkKey::CopyStream(stream) => {
                output.add_stream(StreamSource::Copy(stream), AddStreamOptions::default())?
            }
        };

        drain_into(packets, output, index, stop).await
    }

    /// Compose the stage list over the source sequence
    fn compose(self) -> Result<(MediaStream, Option<SinkKey>)> {
        // The first packet-consuming stage decides which input stream's
        // packets are read
        let packet_filter = self.stages.iter().find_map(|stage| match stage {
            Stage::Decode(decoder) => decoder.stream().map(|s| s.index),
            Stage::BitStream(bsf) => Some(bsf.stream().index),
            Stage::BitStreamChain(bsfs) => bsfs.first().map(|b| b.stream().index),
            _ => None,
        });

        let mut current = match self.source {
            Source::Input(input) => match packet_filter {
                Some(index) => MediaStream::Packets(input.packets_for_stream(index)),
                None => MediaStream::Packets(input.packets()),
            },
            Source::Frames(frames) => MediaStream::Frames(frames),
        };

        let mut sink_key: Option<SinkKey> = None;

        for stage in self.stages {
            current = match (stage, current) {
                (Stage::Decode(decoder), MediaStream::Packets(packets)) => {
                    if sink_key.is_none() {
                        if let Some(stream) = decoder.stream() {
                            sink_key = Some(SinkKey::CopyStream(stream.clone()));
                        }
                    }
                    MediaStream::Frames(decoder.frames(packets))
                }
                (Stage::Decode(_), MediaStream::Frames(_)) => {
                    return Err(Error::ConfigInvalid(
                        "decoder expects packets, got frames".into(),
                    ));
                }
                (Stage::Filter(filter), MediaStream::Frames(frames)) => {
                    MediaStream::Frames(filter.frames(frames))
                }
                (Stage::FilterChain(filters), MediaStream::Frames(frames)) => {
                    let mut frames = frames;
                    for filter in filters {
                        frames = filter.frames(frames);
                    }
                    MediaStream::Frames(frames)
                }
                (Stage::Filter(_) | Stage::FilterChain(_), MediaStream::Packets(_)) => {
                    return Err(Error::ConfigInvalid(
                        "filter expects frames; place it after a decoder".into(),
                    ));
                }
                (Stage::Encode(encoder), MediaStream::Frames(frames)) => {
                    sink_key = Some(SinkKey::Encoder(encoder.clone()));
                    MediaStream::Packets(encoder.packets(frames))
                }
                (Stage::Encode(_), MediaStream::Packets(_)) => {
                    return Err(Error::ConfigInvalid(
                        "encoder expects frames; place it after a decoder or filter".into(),
                    ));
                }
                (Stage::BitStream(bsf), MediaStream::Packets(packets)) => {
                    // A bitstream filter changes the stream's parameters;
                    // an output keyed on it must see the filtered side
                    if !matches!(sink_key, Some(SinkKey::Encoder(_))) {
                        sink_key = Some(SinkKey::CopyStream(bsf.stream().clone()));
                    }
                    MediaStream::Packets(bsf.packets(packets))
                }
                (Stage::BitStreamChain(bsfs), MediaStream::Packets(packets)) => {
                    let mut packets = packets;
                    for bsf in bsfs {
                        if !matches!(sink_key, Some(SinkKey::Encoder(_))) {
                            sink_key = Some(SinkKey::CopyStream(bsf.stream().clone()));
                        }
                        packets = bsf.packets(packets);
                    }
                    MediaStream::Packets(packets)
                }
                (Stage::BitStream(_) | Stage::BitStreamChain(_), MediaStream::Frames(_)) => {
                    return Err(Error::ConfigInvalid(
                        "bitstream filter expects packets, got frames".into(),
                    ));
                }
            };
        }

        Ok((current, sink_key))
    }
}

/// Forward every input stream into the output without re-encoding
async fn stream_copy(
    input: MediaInput,
    output: &MediaOutput,
    stop: &StopFlag,
) -> Result<PipelineState> {
    let streams = input.streams().to_vec();
    if streams.is_empty() {
        return Err(Error::ConfigInvalid("input has no streams".into()));
    }

    let mut mapping: HashMap<i32, usize> = HashMap::new();
    for stream in &streams {
        let index = output.add_stream(StreamSource::Copy(stream), AddStreamOptions::default())?;
        mapping.insert(stream.index, index);
    }
    debug!(streams = streams.len(), "stream copy started");

    let mut packets = input.packets();
    while let Some(item) = packets.next().await {
        if stop.is_set() {
            return Ok(PipelineState::Cancelled);
        }
        let packet = item?;
        let Some(&index) = mapping.get(&packet.stream_index()) else {
            // Unmapped stream; the packet drops here
            continue;
        };
        output.write_packet(packet, index).await?;
    }

    output.close().await?;
    Ok(PipelineState::Completed)
}

/// Consume a packet sequence into one output stream, then finalize
async fn drain_into(
    mut packets: PacketStream,
    output: &MediaOutput,
    index: usize,
    stop: &StopFlag,
) -> Result<PipelineState> {
    while let Some(item) = packets.next().await {
        if stop.is_set() {
            // The in-flight item drops (frees) here
            return Ok(PipelineState::Cancelled);
        }
        let packet = item?;
        output.write_packet(packet, index).await?;
    }
    output.close().await?;
    Ok(PipelineState::Completed)
}

// ============================================================================
// Named Multi-Stream Pipeline
// ============================================================================

/// Role a stream plays in a named pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamRole {
    Video,
    Audio,
    Subtitle,
}

impl StreamRole {
    fn media_type(&self) -> MediaType {
        match self {
            StreamRole::Video => MediaType::Video,
            StreamRole::Audio => MediaType::Audio,
            StreamRole::Subtitle => MediaType::Subtitle,
        }
    }
}

/// Per-role processing plan
pub enum RolePlan {
    /// Copy packets verbatim
    Passthrough,
    /// Run the role's packets through these stages
    Stages(Vec<Stage>),
}

struct RoleEntry {
    role: StreamRole,
    input: MediaInput,
    plan: RolePlan,
}

/// Multi-stream pipeline keyed by role
///
/// Roles keep their insertion order; the interleaver breaks DTS ties in
/// that order.
#[derive(Default)]
pub struct NamedPipeline {
    entries: Vec<RoleEntry>,
}

impl NamedPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a role with its input and plan
    pub fn role(mut self, role: StreamRole, input: MediaInput, plan: RolePlan) -> Self {
        self.entries.push(RoleEntry { role, input, plan });
        self
    }

    /// Compose every role into a lazy packet sequence, no sink
    pub fn into_streams(self) -> Result<Vec<(StreamRole, PacketStream)>> {
        self.entries
            .into_iter()
            .map(|entry| {
                let role = entry.role;
                let (packets, _) = build_role(entry)?;
                Ok((role, packets))
            })
            .collect()
    }

    /// Run every role into one shared sink, merged by decode timestamp
    pub async fn run_interleaved(self, output: &MediaOutput) -> Result<()> {
        let stop = StopFlag::default();
        match self.drive_interleaved(output, &stop).await? {
            PipelineState::Failed(msg) => Err(Error::Fatal(msg)),
            _ => Ok(()),
        }
    }

    /// Spawn the interleaved pipeline and return a control handle
    pub fn start_interleaved(self, output: MediaOutput) -> PipelineControl {
        let stopped = Arc::new(AtomicBool::new(false));
        let (tx, rx) = watch::channel(PipelineState::Running);
        let stop = StopFlag(stopped.clone());

        tokio::spawn(async move {
            let state = match self.drive_interleaved(&output, &stop).await {
                Ok(state) => state,
                Err(e) => PipelineState::Failed(e.to_string()),
            };
            let _ = tx.send(state);
        });

        PipelineControl {
            stopped,
            state: rx,
        }
    }

    /// Run every role into its own sink
    pub async fn run_split(self, outputs: Vec<(StreamRole, MediaOutput)>) -> Result<()> {
        let stop = StopFlag::default();
        let outputs: HashMap<StreamRole, MediaOutput> = outputs.into_iter().collect();

        let mut tasks = Vec::new();
        for entry in self.entries {
            let role = entry.role;
            let output = outputs
                .get(&role)
                .ok_or_else(|| {
                    Error::ConfigInvalid(format!("no output registered for role {role:?}"))
                })?
                .clone();
            let (packets, sink_key) = build_role(entry)?;
            let index = add_role_stream(&output, &sink_key)?;
            let stop = stop.clone();
            tasks.push(async move { drain_into(packets, &output, index, &stop).await });
        }

        futures::future::try_join_all(tasks).await?;
        Ok(())
    }

    async fn drive_interleaved(
        self,
        output: &MediaOutput,
        stop: &StopFlag,
    ) -> Result<PipelineState> {
        let mut slots = Vec::new();
        for entry in self.entries {
            let role = entry.role;
            let (packets, sink_key) = build_role(entry)?;
            let index = add_role_stream(output, &sink_key)?;
            debug!(?role, stream = index, "role registered");
            slots.push(InterleaveSlot {
                packets,
                head: None,
                done: false,
                index,
            });
        }
        if slots.is_empty() {
            return Err(Error::ConfigInvalid("named pipeline has no roles".into()));
        }

        interleave(slots, output, stop).await
    }
}

/// Build one role's packet sequence and sink key
fn build_role(entry: RoleEntry) -> Result<(PacketStream, SinkKey)> {
    let stream = entry
        .input
        .best_stream(entry.role.media_type())
        .ok_or_else(|| {
            Error::NotFound(format!("input has no {:?} stream", entry.role))
        })?;

    match entry.plan {
        RolePlan::Passthrough => Ok((
            entry.input.packets_for_stream(stream.index),
            SinkKey::CopyStream(stream),
        )),
        RolePlan::Stages(stages) => {
            let mut pipeline = Pipeline::new(entry.input);
            for stage in stages {
                pipeline.stages.push(stage);
            }
            let (media, sink_key) = pipeline.compose()?;
            let MediaStream::Packets(packets) = media else {
                return Err(Error::ConfigInvalid(format!(
                    "{:?} stages end in frames; add an encoder",
                    entry.role
                )));
            };
            let sink_key = sink_key.unwrap_or(SinkKey::CopyStream(stream));
            Ok((packets, sink_key))
        }
    }
}

fn add_role_stream(output: &MediaOutput, sink_key: &SinkKey) -> Result<usize> {
    match sink_key {
        SinkKey::Encoder(encoder) => {
            output.add_stream(StreamSource::Encoder(encoder), AddStreamOptions::default())
        }
        SinkKey::CopyStream(stream) => {
            output.add_stream(StreamSource::Copy(stream), AddStreamOptions::default())
        }
    }
}

// ============================================================================
// DTS Interleaver
// ============================================================================

struct InterleaveSlot {
    packets: PacketStream,
    head: Option<Packet>,
    done: bool,
    index: usize,
}

/// Ordering key of the interleaver: dts, falling back to pts, then zero
fn effective_dts(packet: &Packet) -> i64 {
    let dts = packet.dts();
    if dts != AV_NOPTS_VALUE {
        return dts;
    }
    let pts = packet.pts();
    if pts != AV_NOPTS_VALUE {
        return pts;
    }
    0
}

/// Pick the queued packet with the smallest effective DTS; ties go to the
/// earliest-registered role
fn pick_slot(heads: &[Option<i64>]) -> Option<usize> {
    heads
        .iter()
        .enumerate()
        .filter_map(|(i, dts)| dts.map(|dts| (dts, i)))
        .min()
        .map(|(_, i)| i)
}

/// K-way merge by effective DTS
async fn interleave(
    mut slots: Vec<InterleaveSlot>,
    output: &MediaOutput,
    stop: &StopFlag,
) -> Result<PipelineState> {
    // Prime every queue with its first packet
    for slot in slots.iter_mut() {
        advance(slot).await?;
    }

    loop {
        if slots.iter().all(|slot| slot.done && slot.head.is_none()) {
            break;
        }
        if stop.is_set() {
            // Queued packets drop (free) with the slots
            return Ok(PipelineState::Cancelled);
        }

        let heads: Vec<Option<i64>> = slots
            .iter()
            .map(|slot| slot.head.as_ref().map(effective_dts))
            .collect();
        let Some(pick) = pick_slot(&heads) else {
            // Queues empty but streams remain; refill them
            for slot in slots.iter_mut() {
                if !slot.done && slot.head.is_none() {
                    advance(slot).await?;
                }
            }
            if slots.iter().all(|slot| slot.head.is_none()) {
                break;
            }
            continue;
        };

        let packet = slots[pick].head.take().expect("picked slot has a head");
        let index = slots[pick].index;
        output.write_packet(packet, index).await?;
        advance(&mut slots[pick]).await?;
    }

    // All inputs may have ended before a single packet flowed; the
    // container still gets its header and trailer
    output.ensure_header().await?;
    output.close().await?;
    Ok(PipelineState::Completed)
}

/// Pull the next packet of a slot into its queue position
async fn advance(slot: &mut InterleaveSlot) -> Result<()> {
    if slot.done || slot.head.is_some() {
        return Ok(());
    }
    match slot.packets.next().await {
        Some(Ok(packet)) => slot.head = Some(packet),
        Some(Err(e)) => return Err(e),
        None => slot.done = true,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet_with_dts(dts: Option<i64>, pts: Option<i64>) -> Packet {
        let mut packet = Packet::new().unwrap();
        if let Some(dts) = dts {
            packet.set_dts(dts);
        }
        if let Some(pts) = pts {
            packet.set_pts(pts);
        }
        packet
    }

    #[test]
    fn effective_dts_falls_back_to_pts_then_zero() {
        assert_eq!(effective_dts(&packet_with_dts(Some(42), None)), 42);
        assert_eq!(effective_dts(&packet_with_dts(None, Some(7))), 7);
        assert_eq!(effective_dts(&packet_with_dts(None, None)), 0);
    }

    #[test]
    fn control_stop_is_idempotent() {
        let stopped = Arc::new(AtomicBool::new(false));
        let (_tx, rx) = watch::channel(PipelineState::Running);
        let control = PipelineControl {
            stopped,
            state: rx,
        };
        assert!(!control.is_stopped());
        control.stop();
        control.stop();
        assert!(control.is_stopped());
    }

    #[tokio::test]
    async fn completion_resolves_on_terminal_state() {
        let stopped = Arc::new(AtomicBool::new(false));
        let (tx, rx) = watch::channel(PipelineState::Running);
        let control = PipelineControl {
            stopped,
            state: rx,
        };
        tx.send(PipelineState::Completed).unwrap();
        assert_eq!(control.completion().await, PipelineState::Completed);
    }

    #[test]
    fn merge_selection_orders_streams_by_dts() {
        // video dts 0,3000,6000 vs audio dts 0,1000,2000,4000,5000,7000
        let mut video = std::collections::VecDeque::from([0i64, 3000, 6000]);
        let mut audio = std::collections::VecDeque::from([0i64, 1000, 2000, 4000, 5000, 7000]);
        let mut order = Vec::new();

        let mut heads = [video.pop_front(), audio.pop_front()];
        while let Some(pick) = pick_slot(&heads) {
            let dts = heads[pick].take().unwrap();
            order.push((pick, dts));
            heads[pick] = match pick {
                0 => video.pop_front(),
                _ => audio.pop_front(),
            };
        }

        // Ties (dts 0) break toward the earlier-registered role (video)
        assert_eq!(
            order,
            vec![
                (0, 0),
                (1, 0),
                (1, 1000),
                (1, 2000),
                (0, 3000),
                (1, 4000),
                (1, 5000),
                (0, 6000),
                (1, 7000),
            ]
        );
    }

    #[test]
    fn merge_selection_handles_empty_queues() {
        assert_eq!(pick_slot(&[None, None]), None);
        assert_eq!(pick_slot(&[None, Some(5)]), Some(1));
    }

    #[tokio::test]
    async fn frames_through_encoder_into_buffer_sink() {
        use super::super::{EncoderOptions, MediaOutputOptions};
        use crate::codec::Frame;
        use crate::ffi::{AVPixelFormat, AVRational};

        // yuvj420p, the mjpeg encoder's native format
        let frames: Vec<Result<Frame>> = (0..5)
            .map(|i| {
                let mut frame = Frame::new_video(64, 64, AVPixelFormat(12))?;
                frame.set_pts(i);
                Ok(frame)
            })
            .collect();
        let source: FrameStream = Box::pin(futures::stream::iter(frames));

        let encoder =
            Encoder::new("mjpeg", EncoderOptions::new(AVRational::new(1, 25))).unwrap();
        let output = MediaOutput::open_buffer("mp4", MediaOutputOptions::default()).unwrap();

        Pipeline::new(source)
            .stage(encoder.clone())
            .run(&output)
            .await
            .unwrap();

        // The encoder opened lazily from the first frame, the header was
        // written before the first packet, and close wrote the trailer
        assert!(encoder.is_open());
        assert!(output.header_written());
        let bytes = output.take_buffer().expect("muxed bytes");
        assert!(bytes.len() > 8);
        assert_eq!(&bytes[4..8], b"ftyp");
    }

    #[tokio::test]
    async fn frame_source_without_encoder_cannot_feed_a_sink() {
        let source: FrameStream = Box::pin(futures::stream::iter(Vec::<
            Result<crate::codec::Frame>,
        >::new()));
        let output = MediaOutput::open_buffer(
            "mp4",
            super::super::MediaOutputOptions::default(),
        )
        .unwrap();
        let err = Pipeline::new(source).run(&output).await.unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }
}
