//! Filter graph driver: frame in, frame out
//!
//! Builds a user-described graph between a buffer source and a buffer
//! sink. Graphs whose first hardware filter expects device-resident input
//! defer construction until the first processed frame reveals the hardware
//! frames context.

use crate::codec::filter_graph::{filter_needs_hw_device, FilterGraph, VideoSourceParams};
use crate::codec::{Frame, HwFramesContext, Stream};
use crate::ffi::avfilter::cmd_flag;
use crate::ffi::{AVPixelFormat, AVSampleFormat};
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::error::{Error, Result};
use super::info::StreamInfo;
use super::{FrameStream, HardwareContext};

/// Constraints applied to the buffer sink output
#[derive(Default)]
pub struct FilterOutputConstraints {
    pub pixel_formats: Vec<AVPixelFormat>,
    pub sample_formats: Vec<AVSampleFormat>,
    pub sample_rates: Vec<i32>,
    pub channel_layouts: Vec<u64>,
}

/// Filter driver options
#[derive(Default)]
pub struct FilterOptions {
    /// Worker thread count for the graph
    pub threads: Option<i32>,
    /// Default options for auto-inserted scale filters
    pub scale_sws_opts: Option<String>,
    /// Output constraints for the buffer sink
    pub output: FilterOutputConstraints,
    /// Hardware context; required when the description names any
    /// hardware-device filter
    pub hardware: Option<HardwareContext>,
}

/// Leading filter names of a comma-separated graph description
fn clause_names(description: &str) -> Vec<String> {
    description
        .split(',')
        .filter_map(|clause| {
            let mut rest = clause.trim();
            // Skip link labels like [in]
            while let Some(stripped) = rest.strip_prefix('[') {
                match stripped.find(']') {
                    Some(end) => rest = stripped[end + 1..].trim_start(),
                    None => return None,
                }
            }
            let name: String = rest
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            (!name.is_empty()).then_some(name)
        })
        .collect()
}

struct FilterInner {
    description: String,
    info: StreamInfo,
    options: FilterOptions,
    /// None until the graph has been built
    graph: Option<FilterGraph>,
    eof_sent: bool,
}

impl FilterInner {
    fn graph_mut(&mut self) -> Result<&mut FilterGraph> {
        self.graph
            .as_mut()
            .ok_or_else(|| Error::State("filter graph not initialized".into()))
    }

    /// Build the graph, with an optional hardware frames context feeding
    /// the buffer source
    fn initialize(&mut self, hw_frames: Option<&HwFramesContext>) -> Result<()> {
        let mut graph = FilterGraph::new()?;

        if let Some(threads) = self.options.threads {
            graph.set_thread_count(threads);
        }
        if let Some(opts) = &self.options.scale_sws_opts {
            graph.set_scale_sws_opts(opts)?;
        }

        match &self.info {
            StreamInfo::Video {
                width,
                height,
                pixel_format,
                time_base,
                frame_rate,
                sample_aspect_ratio,
            } => {
                if let Some(frames) = hw_frames {
                    // Frames arriving through the source are device-resident;
                    // the source's pixel format is the device format
                    graph.create_video_source_with_params(&VideoSourceParams {
                        width: *width,
                        height: *height,
                        pixel_format: frames.format(),
                        time_base: *time_base,
                        frame_rate: *frame_rate,
                        sample_aspect_ratio: *sample_aspect_ratio,
                        hw_frames_ctx: NonNull::new(frames.as_ptr()),
                    })?;
                } else {
                    let mut args = format!(
                        "video_size={}x{}:pix_fmt={}:time_base={}/{}",
                        width,
                        height,
                        pixel_format.as_raw(),
                        time_base.num,
                        time_base.den,
                    );
                    if let Some(frame_rate) = frame_rate {
                        args.push_str(&format!(
                            ":frame_rate={}/{}",
                            frame_rate.num, frame_rate.den
                        ));
                    }
                    if let Some(sar) = sample_aspect_ratio {
                        args.push_str(&format!(":pixel_aspect={}/{}", sar.num, sar.den));
                    }
                    graph.create_source_with_args("buffer", &args)?;
                }
                graph.create_sink("buffersink")?;

                if !self.options.output.pixel_formats.is_empty() {
                    let raw: Vec<i32> = self
                        .options
                        .output
                        .pixel_formats
                        .iter()
                        .map(|f| f.as_raw())
                        .collect();
                    graph.set_sink_option_bin("pix_fmts", &raw)?;
                }
            }
            StreamInfo::Audio {
                sample_rate,
                sample_format,
                channel_layout,
                time_base,
                ..
            } => {
                // An all-zero mask means the layout is unknown; assume stereo
                let layout = if *channel_layout == 0 {
                    "stereo".to_string()
                } else {
                    format!("{:#x}", channel_layout)
                };
                let args = format!(
                    "sample_rate={}:sample_fmt={}:channel_layout={}:time_base={}/{}",
                    sample_rate,
                    sample_format.as_raw(),
                    layout,
                    time_base.num,
                    time_base.den,
                );
                graph.create_source_with_args("abuffer", &args)?;
                graph.create_sink("abuffersink")?;

                let constraints = &self.options.output;
                if !constraints.sample_formats.is_empty() {
                    let raw: Vec<i32> =
                        constraints.sample_formats.iter().map(|f| f.as_raw()).collect();
                    graph.set_sink_option_bin("sample_fmts", &raw)?;
                }
                if !constraints.sample_rates.is_empty() {
                    graph.set_sink_option_bin("sample_rates", &constraints.sample_rates)?;
                }
                if !constraints.channel_layouts.is_empty() {
                    graph.set_sink_option_bin("channel_layouts", &constraints.channel_layouts)?;
                }
            }
        }

        let trimmed = self.description.trim();
        if trimmed.is_empty() || trimmed == "null" || trimmed == "anull" {
            graph.link_source_to_sink()?;
        } else {
            graph.parse(trimmed)?;
        }

        if let Some(hardware) = &self.options.hardware {
            graph.install_hw_device(hardware.device())?;
        }

        graph.configure()?;
        debug!(description = %self.description, "filter graph configured");
        self.graph = Some(graph);
        Ok(())
    }

    fn ensure_initialized(&mut self, frame: &Frame) -> Result<()> {
        if self.graph.is_some() {
            return Ok(());
        }
        // Deferred build: the frame must reveal the upstream frames context
        let hardware = self.options.hardware.clone().ok_or_else(|| {
            Error::State("filter graph awaits a hardware context".into())
        })?;
        hardware.adopt_frames_from(frame)?;
        let frames = hardware.frames_context().ok_or_else(|| {
            Error::ConfigInvalid(
                "filter graph needs a hardware frames context, but the first frame carries none"
                    .into(),
            )
        })?;
        self.initialize(Some(&frames))
    }

    /// Submit one frame and attempt one receive
    fn process_step(&mut self, frame: &mut Frame) -> Result<Option<Frame>> {
        self.ensure_initialized(frame)?;
        let graph = self.graph_mut()?;
        let accepted = graph.add_frame(Some(frame))?;
        if !accepted {
            return graph.get_frame().map_err(Error::from);
        }
        graph.get_frame().map_err(Error::from)
    }

    /// Submit one frame and drain every immediately-available output
    fn process_burst(&mut self, frame: &mut Frame) -> Result<Vec<Frame>> {
        self.ensure_initialized(frame)?;
        let graph = self.graph_mut()?;
        let mut outputs = Vec::new();

        if !graph.add_frame(Some(frame))? {
            while let Some(out) = graph.get_frame()? {
                outputs.push(out);
            }
            graph.add_frame(Some(frame))?;
        }

        while let Some(out) = graph.get_frame()? {
            outputs.push(out);
        }
        Ok(outputs)
    }

    fn receive_step(&mut self) -> Result<Option<Frame>> {
        // Draining a graph that never initialized yields nothing
        let Some(graph) = self.graph.as_mut() else {
            return Ok(None);
        };
        graph.get_frame().map_err(Error::from)
    }

    fn mark_eof(&mut self) -> Result<()> {
        if self.eof_sent || self.graph.is_none() {
            self.eof_sent = true;
            return Ok(());
        }
        self.graph_mut()?.add_frame(None)?;
        self.eof_sent = true;
        Ok(())
    }
}

/// Filter graph driver
#[derive(Clone)]
pub struct Filter {
    inner: Arc<Mutex<FilterInner>>,
}

impl Filter {
    /// Create a driver for the given graph description and input stream
    pub fn new(description: &str, stream: &Stream, options: FilterOptions) -> Result<Self> {
        Self::from_info(description, &StreamInfo::from_stream(stream)?, options)
    }

    /// Create a driver from a value description of the input
    pub fn from_info(description: &str, info: &StreamInfo, options: FilterOptions) -> Result<Self> {
        let names = clause_names(description);
        let hw_names: Vec<&String> = names
            .iter()
            .filter(|name| filter_needs_hw_device(name))
            .collect();
        let has_hwupload = names.iter().any(|n| n == "hwupload");

        if !hw_names.is_empty() && options.hardware.is_none() {
            return Err(Error::ConfigInvalid(format!(
                "graph \"{description}\" uses hardware filters and needs a HardwareContext"
            )));
        }

        // hwupload creates the frames context itself; anything else with the
        // hardware-device capability consumes frames from upstream
        let needs_upstream_frames = !has_hwupload
            && hw_names
                .iter()
                .any(|name| name.as_str() != "hwupload" && name.as_str() != "hwdownload");

        let mut inner = FilterInner {
            description: description.to_string(),
            info: info.clone(),
            options,
            graph: None,
            eof_sent: false,
        };

        if !needs_upstream_frames {
            inner.initialize(None)?;
        } else if let Some(frames) = inner
            .options
            .hardware
            .as_ref()
            .and_then(|hw| hw.frames_context())
        {
            inner.initialize(Some(&frames))?;
        }
        // else: wait for the first frame to reveal the frames context

        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    /// Whether the graph has been built
    pub fn is_initialized(&self) -> bool {
        self.inner.lock().unwrap().graph.is_some()
    }

    /// Submit one frame and attempt one receive
    ///
    /// The input frame is freed after processing.
    pub async fn process(&self, mut frame: Frame) -> Result<Option<Frame>> {
        let mut inner = self.inner.lock().unwrap();
        inner.process_step(&mut frame)
    }

    /// Pull one already-filtered frame without submitting input
    pub async fn receive(&self) -> Result<Option<Frame>> {
        let mut inner = self.inner.lock().unwrap();
        inner.receive_step()
    }

    /// Signal end of stream to the graph
    pub async fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.mark_eof()
    }

    /// Lazy sequence draining the graph after end of stream
    pub fn flush_frames(&self) -> FrameStream {
        let inner = self.inner.clone();
        Box::pin(stream::try_unfold(inner, |inner| async move {
            let next = {
                let mut guard = inner.lock().unwrap();
                guard.mark_eof()?;
                guard.receive_step()?
            };
            Ok(next.map(|frame| (frame, inner)))
        }))
    }

    /// Lazy filtered-frame sequence over an input frame sequence
    ///
    /// Inputs are freed after processing; the graph flushes and drains
    /// when the input ends.
    pub fn frames(&self, frames: FrameStream) -> FrameStream {
        enum Phase {
            Feeding,
            Draining,
        }
        struct State {
            inner: Arc<Mutex<FilterInner>>,
            input: FrameStream,
            pending: VecDeque<Frame>,
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
                if let Some(frame) = st.pending.pop_front() {
                    return Ok(Some((frame, st)));
                }
                match st.phase {
                    Phase::Feeding => match st.input.next().await {
                        Some(Ok(mut frame)) => {
                            let outputs = st.inner.lock().unwrap().process_burst(&mut frame)?;
                            // input frame dropped (freed) here
                            st.pending.extend(outputs);
                        }
                        Some(Err(e)) => return Err(e),
                        None => {
                            st.inner.lock().unwrap().mark_eof()?;
                            st.phase = Phase::Draining;
                        }
                    },
                    Phase::Draining => {
                        return match st.inner.lock().unwrap().receive_step()? {
                            Some(frame) => Ok(Some((frame, st))),
                            None => Ok(None),
                        };
                    }
                }
            }
        }))
    }

    /// Send a runtime command to matching filters; returns the response text
    pub async fn send_command(&self, target: &str, cmd: &str, arg: &str) -> Result<String> {
        let mut inner = self.inner.lock().unwrap();
        let graph = inner.graph_mut()?;
        graph
            .send_command(target, cmd, arg, 0)
            .map_err(Error::from)
    }

    /// Queue a command to apply when frames at `ts_seconds` flow through
    pub async fn queue_command(
        &self,
        target: &str,
        cmd: &str,
        arg: &str,
        ts_seconds: f64,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let graph = inner.graph_mut()?;
        graph
            .queue_command(target, cmd, arg, ts_seconds, cmd_flag::ONE)
            .map_err(Error::from)
    }
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("Filter")
            .field("description", &inner.description)
            .field("initialized", &inner.graph.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::AVRational;
    use futures::StreamExt;

    fn video_info() -> StreamInfo {
        StreamInfo::Video {
            width: 64,
            height: 48,
            pixel_format: AVPixelFormat::YUV420P,
            time_base: AVRational::new(1, 25),
            frame_rate: Some(AVRational::new(25, 1)),
            sample_aspect_ratio: None,
        }
    }

    #[test]
    fn clause_names_extracts_leading_identifiers() {
        assert_eq!(
            clause_names("format=nv12,hwupload,scale_vt=640:480"),
            vec!["format", "hwupload", "scale_vt"]
        );
        assert_eq!(clause_names("[in]scale=1:1[out]"), vec!["scale"]);
        assert_eq!(clause_names(""), Vec::<String>::new());
    }

    #[test]
    fn empty_description_initializes_immediately() {
        let filter = Filter::from_info("", &video_info(), FilterOptions::default()).unwrap();
        assert!(filter.is_initialized());
    }

    #[tokio::test]
    async fn empty_description_passes_frames_through() {
        let filter = Filter::from_info("", &video_info(), FilterOptions::default()).unwrap();
        let mut frame = crate::codec::Frame::new_video(64, 48, AVPixelFormat::YUV420P).unwrap();
        frame.set_pts(7);
        let out = filter.process(frame).await.unwrap().expect("passthrough");
        assert_eq!(out.pts(), 7);
        assert_eq!(out.width(), 64);
    }

    #[tokio::test]
    async fn scale_graph_produces_scaled_frames() {
        let filter =
            Filter::from_info("scale=32:24", &video_info(), FilterOptions::default()).unwrap();
        let frame = crate::codec::Frame::new_video(64, 48, AVPixelFormat::YUV420P).unwrap();
        let out = filter.process(frame).await.unwrap().expect("scaled frame");
        assert_eq!(out.width(), 32);
        assert_eq!(out.height(), 24);
    }

    #[tokio::test]
    async fn frames_sequence_flushes_at_end() {
        let filter = Filter::from_info("null", &video_info(), FilterOptions::default()).unwrap();
        let inputs: Vec<crate::pipeline::Result<crate::codec::Frame>> = (0..3)
            .map(|i| {
                let mut f =
                    crate::codec::Frame::new_video(64, 48, AVPixelFormat::YUV420P).unwrap();
                f.set_pts(i);
                Ok(f)
            })
            .collect();
        let input: FrameStream = Box::pin(futures::stream::iter(inputs));
        let outputs: Vec<_> = filter.frames(input).collect().await;
        assert_eq!(outputs.len(), 3);
        for (i, out) in outputs.into_iter().enumerate() {
            assert_eq!(out.unwrap().pts(), i as i64);
        }
    }
}
