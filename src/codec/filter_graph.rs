//! Filter graph wrapper for FFmpeg libavfilter
//!
//! Owns an AVFilterGraph bracketed by a buffer source and a buffer sink.
//! The high-level description parsing, hardware deferral and frame pumping
//! live in [`crate::pipeline::Filter`]; this wrapper only provides the safe
//! graph operations.

use super::{CodecError, CodecResult, Frame, HwDeviceContext};
use crate::ffi::accessors::{
  ffbuffersrc_par_set_format, ffbuffersrc_par_set_frame_rate, ffbuffersrc_par_set_height,
  ffbuffersrc_par_set_hw_frames_ctx, ffbuffersrc_par_set_sample_aspect_ratio,
  ffbuffersrc_par_set_time_base, ffbuffersrc_par_set_width, fffilter_get_flags,
  fffilterctx_get_filter, fffilterctx_set_hw_device_ctx, fffiltergraph_get_filter,
  fffiltergraph_get_nb_filters, fffiltergraph_set_nb_threads, fffiltergraph_set_scale_sws_opts,
  ffinout_alloc_labeled,
};
use crate::ffi::avfilter::{
  av_buffersink_get_frame, av_buffersrc_add_frame_flags, av_buffersrc_parameters_alloc,
  av_buffersrc_parameters_set, avfilter_get_by_name, avfilter_graph_alloc,
  avfilter_graph_alloc_filter, avfilter_graph_config, avfilter_graph_create_filter,
  avfilter_graph_free, avfilter_graph_parse_ptr, avfilter_graph_queue_command,
  avfilter_graph_send_command, avfilter_init_str, avfilter_inout_free, avfilter_link,
  buffersrc_flag, filter_flag, AVFilterContext, AVFilterGraph,
};
use crate::ffi::avutil::{av_free, av_opt_set_bin, opt_search};
use crate::ffi::error::{AVERROR_EAGAIN, AVERROR_EOF};
use crate::ffi::{AVBufferRef, AVPixelFormat, AVRational, FFmpegError};
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::ptr::{self, NonNull};

/// Look up a filter's descriptor flags, None if the filter does not exist
pub fn filter_flags(name: &str) -> Option<i32> {
  let c_name = CString::new(name).ok()?;
  let filter = unsafe { avfilter_get_by_name(c_name.as_ptr()) };
  if filter.is_null() {
    return None;
  }
  Some(unsafe { fffilter_get_flags(filter) })
}

/// Whether a filter requires a hardware device context
pub fn filter_needs_hw_device(name: &str) -> bool {
  filter_flags(name).is_some_and(|flags| (flags & filter_flag::HWDEVICE) != 0)
}

/// Video buffer source configuration applied through AVBufferSrcParameters
pub struct VideoSourceParams {
  pub width: i32,
  pub height: i32,
  pub pixel_format: AVPixelFormat,
  pub time_base: AVRational,
  pub frame_rate: Option<AVRational>,
  pub sample_aspect_ratio: Option<AVRational>,
  /// Borrowed hardware frames context the source adopts
  pub hw_frames_ctx: Option<NonNull<AVBufferRef>>,
}

/// Safe wrapper around an AVFilterGraph with its endpoint nodes
pub struct FilterGraph {
  graph: NonNull<AVFilterGraph>,
  buffersrc: *mut AVFilterContext,
  buffersink: *mut AVFilterContext,
}

impl FilterGraph {
  /// Allocate an empty graph
  pub fn new() -> CodecResult<Self> {
    let graph = unsafe { avfilter_graph_alloc() };
    NonNull::new(graph)
      .map(|graph| Self {
        graph,
        buffersrc: ptr::null_mut(),
        buffersink: ptr::null_mut(),
      })
      .ok_or(CodecError::AllocationFailed("AVFilterGraph"))
  }

  /// Set the number of worker threads for the whole graph
  pub fn set_thread_count(&mut self, threads: i32) {
    unsafe { fffiltergraph_set_nb_threads(self.graph.as_ptr(), threads) };
  }

  /// Set default options for auto-inserted scale filters
  pub fn set_scale_sws_opts(&mut self, opts: &str) -> CodecResult<()> {
    let c_opts =
      CString::new(opts).map_err(|_| CodecError::InvalidConfig("Invalid sws opts".into()))?;
    let ret = unsafe { fffiltergraph_set_scale_sws_opts(self.graph.as_ptr(), c_opts.as_ptr()) };
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }
    Ok(())
  }

  // ========================================================================
  // Endpoint Construction
  // ========================================================================

  /// Create the buffer source from an args string
  ///
  /// `filter_name` is "buffer" for video, "abuffer" for audio.
  pub fn create_source_with_args(&mut self, filter_name: &str, args: &str) -> CodecResult<()> {
    let filter = Self::require_filter(filter_name)?;
    let c_name = CString::new("in").unwrap();
    let c_args =
      CString::new(args).map_err(|_| CodecError::InvalidConfig("Invalid source args".into()))?;

    let mut ctx: *mut AVFilterContext = ptr::null_mut();
    let ret = unsafe {
      avfilter_graph_create_filter(
        &mut ctx,
        filter,
        c_name.as_ptr(),
        c_args.as_ptr(),
        ptr::null_mut(),
        self.graph.as_ptr(),
      )
    };
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }
    self.buffersrc = ctx;
    Ok(())
  }

  /// Create a video buffer source configured through parameters
  ///
  /// Required when a hardware frames context must be installed before the
  /// source initializes (it cannot be expressed in an args string).
  pub fn create_video_source_with_params(&mut self, params: &VideoSourceParams) -> CodecResult<()> {
    let filter = Self::require_filter("buffer")?;
    let c_name = CString::new("in").unwrap();

    let ctx =
      unsafe { avfilter_graph_alloc_filter(self.graph.as_ptr(), filter, c_name.as_ptr()) };
    if ctx.is_null() {
      return Err(CodecError::AllocationFailed("buffersrc AVFilterContext"));
    }

    let par = unsafe { av_buffersrc_parameters_alloc() };
    if par.is_null() {
      return Err(CodecError::AllocationFailed("AVBufferSrcParameters"));
    }

    unsafe {
      ffbuffersrc_par_set_width(par, params.width);
      ffbuffersrc_par_set_height(par, params.height);
      ffbuffersrc_par_set_format(par, params.pixel_format.as_raw());
      ffbuffersrc_par_set_time_base(par, params.time_base.num, params.time_base.den);
      if let Some(frame_rate) = params.frame_rate {
        ffbuffersrc_par_set_frame_rate(par, frame_rate.num, frame_rate.den);
      }
      if let Some(sar) = params.sample_aspect_ratio {
        ffbuffersrc_par_set_sample_aspect_ratio(par, sar.num, sar.den);
      }
      if let Some(frames_ctx) = params.hw_frames_ctx {
        let ret = ffbuffersrc_par_set_hw_frames_ctx(par, frames_ctx.as_ptr());
        if ret < 0 {
          av_free(par as *mut c_void);
          return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
        }
      }
    }

    let ret = unsafe { av_buffersrc_parameters_set(ctx, par) };
    unsafe { av_free(par as *mut c_void) };
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }

    let ret = unsafe { avfilter_init_str(ctx, ptr::null()) };
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }

    self.buffersrc = ctx;
    Ok(())
  }

  /// Create the buffer sink
  ///
  /// `filter_name` is "buffersink" for video, "abuffersink" for audio.
  pub fn create_sink(&mut self, filter_name: &str) -> CodecResult<()> {
    let filter = Self::require_filter(filter_name)?;
    let c_name = CString::new("out").unwrap();

    let mut ctx: *mut AVFilterContext = ptr::null_mut();
    let ret = unsafe {
      avfilter_graph_create_filter(
        &mut ctx,
        filter,
        c_name.as_ptr(),
        ptr::null(),
        ptr::null_mut(),
        self.graph.as_ptr(),
      )
    };
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }
    self.buffersink = ctx;
    Ok(())
  }

  /// Constrain the sink's accepted output (e.g. "pix_fmts", "sample_fmts",
  /// "sample_rates", "channel_layouts") with a binary option list
  pub fn set_sink_option_bin<T: Copy>(&mut self, name: &str, values: &[T]) -> CodecResult<()> {
    if self.buffersink.is_null() {
      return Err(CodecError::InvalidState("Buffer sink not created".into()));
    }
    let c_name =
      CString::new(name).map_err(|_| CodecError::InvalidConfig("Invalid option name".into()))?;
    let ret = unsafe {
      av_opt_set_bin(
        self.buffersink as *mut c_void,
        c_name.as_ptr(),
        values.as_ptr() as *const u8,
        std::mem::size_of_val(values) as c_int,
        opt_search::CHILDREN,
      )
    };
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }
    Ok(())
  }

  fn require_filter(name: &str) -> CodecResult<*const crate::ffi::avfilter::AVFilter> {
    let c_name =
      CString::new(name).map_err(|_| CodecError::InvalidConfig("Invalid filter name".into()))?;
    let filter = unsafe { avfilter_get_by_name(c_name.as_ptr()) };
    if filter.is_null() {
      return Err(CodecError::FilterNotFound(name.to_string()));
    }
    Ok(filter)
  }

  // ========================================================================
  // Wiring
  // ========================================================================

  /// Link the source directly to the sink (empty description)
  pub fn link_source_to_sink(&mut self) -> CodecResult<()> {
    self.require_endpoints()?;
    let ret = unsafe { avfilter_link(self.buffersrc, 0, self.buffersink, 0) };
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }
    Ok(())
  }

  /// Parse a textual description between the source ("in") and sink ("out")
  pub fn parse(&mut self, description: &str) -> CodecResult<()> {
    self.require_endpoints()?;
    let c_desc = CString::new(description)
      .map_err(|_| CodecError::InvalidConfig("Invalid graph description".into()))?;

    let c_in = CString::new("in").unwrap();
    let c_out = CString::new("out").unwrap();

    // The parsed sub-graph's inputs connect to our sink ("out"), its
    // outputs hang off our source ("in")
    let mut outputs = unsafe { ffinout_alloc_labeled(c_in.as_ptr(), self.buffersrc, 0) };
    let mut inputs = unsafe { ffinout_alloc_labeled(c_out.as_ptr(), self.buffersink, 0) };
    if outputs.is_null() || inputs.is_null() {
      unsafe {
        avfilter_inout_free(&mut outputs);
        avfilter_inout_free(&mut inputs);
      }
      return Err(CodecError::AllocationFailed("AVFilterInOut"));
    }

    let ret = unsafe {
      avfilter_graph_parse_ptr(
        self.graph.as_ptr(),
        c_desc.as_ptr(),
        &mut inputs,
        &mut outputs,
        ptr::null_mut(),
      )
    };

    unsafe {
      avfilter_inout_free(&mut inputs);
      avfilter_inout_free(&mut outputs);
    }

    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }
    Ok(())
  }

  /// Install a hardware device context on every filter node flagged as
  /// needing one. The graph takes its own references.
  pub fn install_hw_device(&mut self, device: &HwDeviceContext) -> CodecResult<()> {
    let nb_filters = unsafe { fffiltergraph_get_nb_filters(self.graph.as_ptr()) };
    for i in 0..nb_filters {
      let ctx = unsafe { fffiltergraph_get_filter(self.graph.as_ptr(), i) };
      if ctx.is_null() {
        continue;
      }
      let filter = unsafe { fffilterctx_get_filter(ctx) };
      if filter.is_null() {
        continue;
      }
      let flags = unsafe { fffilter_get_flags(filter) };
      if (flags & filter_flag::HWDEVICE) != 0 {
        let ret = unsafe { fffilterctx_set_hw_device_ctx(ctx, device.as_ptr()) };
        if ret < 0 {
          return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
        }
      }
    }
    Ok(())
  }

  /// Validate links and formats across the whole graph
  pub fn configure(&mut self) -> CodecResult<()> {
    self.require_endpoints()?;
    let ret = unsafe { avfilter_graph_config(self.graph.as_ptr(), ptr::null_mut()) };
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }
    Ok(())
  }

  fn require_endpoints(&self) -> CodecResult<()> {
    if self.buffersrc.is_null() || self.buffersink.is_null() {
      return Err(CodecError::InvalidState(
        "Buffer source/sink not created".into(),
      ));
    }
    Ok(())
  }

  // ========================================================================
  // Frame Pump
  // ========================================================================

  /// Feed a frame into the buffer source; None marks end of stream
  ///
  /// The caller keeps ownership of the frame (KEEP_REF).
  /// Returns Ok(false) when the source is congested (EAGAIN).
  pub fn add_frame(&mut self, frame: Option<&mut Frame>) -> CodecResult<bool> {
    self.require_endpoints()?;
    let (frame_ptr, flags) = match frame {
      Some(frame) => (frame.as_mut_ptr(), buffersrc_flag::KEEP_REF),
      None => (ptr::null_mut(), 0),
    };
    let ret = unsafe { av_buffersrc_add_frame_flags(self.buffersrc, frame_ptr, flags) };
    if ret == AVERROR_EAGAIN {
      return Ok(false);
    }
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }
    Ok(true)
  }

  /// Pull one frame from the buffer sink
  ///
  /// Returns Ok(None) on EAGAIN (more input needed) or EOF (drained).
  pub fn get_frame(&mut self) -> CodecResult<Option<Frame>> {
    self.require_endpoints()?;
    let mut frame = Frame::new()?;
    let ret = unsafe { av_buffersink_get_frame(self.buffersink, frame.as_mut_ptr()) };
    if ret == AVERROR_EAGAIN || ret == AVERROR_EOF {
      return Ok(None);
    }
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }
    Ok(Some(frame))
  }

  // ========================================================================
  // Runtime Commands
  // ========================================================================

  /// Send a command to matching filter instances, synchronously
  ///
  /// Returns the textual response of the filter (possibly empty).
  pub fn send_command(
    &mut self,
    target: &str,
    cmd: &str,
    arg: &str,
    flags: i32,
  ) -> CodecResult<String> {
    let c_target =
      CString::new(target).map_err(|_| CodecError::InvalidConfig("Invalid target".into()))?;
    let c_cmd = CString::new(cmd).map_err(|_| CodecError::InvalidConfig("Invalid command".into()))?;
    let c_arg = CString::new(arg).map_err(|_| CodecError::InvalidConfig("Invalid argument".into()))?;

    let mut response = [0 as c_char; 4096];
    let ret = unsafe {
      avfilter_graph_send_command(
        self.graph.as_ptr(),
        c_target.as_ptr(),
        c_cmd.as_ptr(),
        c_arg.as_ptr(),
        response.as_mut_ptr(),
        response.len() as c_int,
        flags,
      )
    };
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }

    let text = unsafe { CStr::from_ptr(response.as_ptr()) }
      .to_string_lossy()
      .into_owned();
    Ok(text)
  }

  /// Queue a command to apply when frames at `ts` (seconds) flow through
  pub fn queue_command(
    &mut self,
    target: &str,
    cmd: &str,
    arg: &str,
    ts: f64,
    flags: i32,
  ) -> CodecResult<()> {
    let c_target =
      CString::new(target).map_err(|_| CodecError::InvalidConfig("Invalid target".into()))?;
    let c_cmd = CString::new(cmd).map_err(|_| CodecError::InvalidConfig("Invalid command".into()))?;
    let c_arg = CString::new(arg).map_err(|_| CodecError::InvalidConfig("Invalid argument".into()))?;

    let ret = unsafe {
      avfilter_graph_queue_command(
        self.graph.as_ptr(),
        c_target.as_ptr(),
        c_cmd.as_ptr(),
        c_arg.as_ptr(),
        flags,
        ts,
      )
    };
    if ret < 0 {
      return Err(CodecError::Ffmpeg(FFmpegError::from_code(ret)));
    }
    Ok(())
  }
}

impl Drop for FilterGraph {
  fn drop(&mut self) {
    unsafe {
      let mut graph = self.graph.as_ptr();
      avfilter_graph_free(&mut graph);
    }
  }
}

// Graph and all its filter contexts are owned exclusively
unsafe impl Send for FilterGraph {}

impl std::fmt::Debug for FilterGraph {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FilterGraph")
      .field("has_source", &!self.buffersrc.is_null())
      .field("has_sink", &!self.buffersink.is_null())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_filter_lookup() {
    assert!(filter_flags("scale").is_some());
    assert!(filter_flags("null").is_some());
    assert!(filter_flags("no_such_filter_exists").is_none());
  }

  #[test]
  fn test_software_filters_do_not_need_hw_device() {
    assert!(!filter_needs_hw_device("scale"));
    assert!(!filter_needs_hw_device("format"));
  }

  #[test]
  fn test_null_graph_pumps_frames() {
    let mut graph = FilterGraph::new().unwrap();
    graph
      .create_source_with_args("buffer", "video_size=64x64:pix_fmt=0:time_base=1/25")
      .unwrap();
    graph.create_sink("buffersink").unwrap();
    graph.link_source_to_sink().unwrap();
    graph.configure().unwrap();

    let mut frame = Frame::new_video(64, 64, AVPixelFormat::YUV420P).unwrap();
    frame.set_pts(0);
    assert!(graph.add_frame(Some(&mut frame)).unwrap());
    let out = graph.get_frame().unwrap().expect("frame through null link");
    assert_eq!(out.width(), 64);
  }
}
