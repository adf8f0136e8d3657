//! libavfilter function declarations
//!
//! Filter graph construction, the buffer source/sink pair, and runtime
//! graph commands.

use super::types::*;
use std::os::raw::{c_char, c_int, c_uint};

// ============================================================================
// Opaque Types (filter-specific)
// ============================================================================

/// Opaque AVFilter structure (filter implementation descriptor)
#[repr(C)]
pub struct AVFilter {
  _opaque: [u8; 0],
  _marker: std::marker::PhantomData<(*mut u8, std::marker::PhantomPinned)>,
}

/// Opaque AVFilterContext structure (filter node in a graph)
#[repr(C)]
pub struct AVFilterContext {
  _opaque: [u8; 0],
  _marker: std::marker::PhantomData<(*mut u8, std::marker::PhantomPinned)>,
}

/// Opaque AVFilterGraph structure
#[repr(C)]
pub struct AVFilterGraph {
  _opaque: [u8; 0],
  _marker: std::marker::PhantomData<(*mut u8, std::marker::PhantomPinned)>,
}

/// Opaque AVFilterInOut structure (linked list of graph endpoints)
#[repr(C)]
pub struct AVFilterInOut {
  _opaque: [u8; 0],
  _marker: std::marker::PhantomData<(*mut u8, std::marker::PhantomPinned)>,
}

/// Opaque AVBufferSrcParameters structure (late buffersrc configuration)
#[repr(C)]
pub struct AVBufferSrcParameters {
  _opaque: [u8; 0],
  _marker: std::marker::PhantomData<(*mut u8, std::marker::PhantomPinned)>,
}

unsafe extern "C" {
  // ========================================================================
  // Filter Discovery
  // ========================================================================

  /// Look up a filter by name ("scale", "hwupload", ...), NULL if unknown
  pub fn avfilter_get_by_name(name: *const c_char) -> *const AVFilter;

  // ========================================================================
  // Graph Lifecycle
  // ========================================================================

  /// Allocate an empty filter graph
  pub fn avfilter_graph_alloc() -> *mut AVFilterGraph;

  /// Free the graph and every filter context in it, setting *graph to NULL
  pub fn avfilter_graph_free(graph: *mut *mut AVFilterGraph);

  /// Create a filter instance in the graph and initialize it with args
  pub fn avfilter_graph_create_filter(
    filt_ctx: *mut *mut AVFilterContext,
    filt: *const AVFilter,
    name: *const c_char,
    args: *const c_char,
    opaque: *mut std::os::raw::c_void,
    graph_ctx: *mut AVFilterGraph,
  ) -> c_int;

  /// Create an uninitialized filter instance in the graph
  ///
  /// Use together with av_buffersrc_parameters_set + avfilter_init_str when
  /// configuration (e.g. a hardware frames context) cannot be expressed as
  /// an args string.
  pub fn avfilter_graph_alloc_filter(
    graph: *mut AVFilterGraph,
    filter: *const AVFilter,
    name: *const c_char,
  ) -> *mut AVFilterContext;

  /// Initialize a filter created with avfilter_graph_alloc_filter
  pub fn avfilter_init_str(ctx: *mut AVFilterContext, args: *const c_char) -> c_int;

  /// Parse a textual graph description and insert it into an existing graph
  ///
  /// `inputs`/`outputs` describe the open pads of the parsed graph; both
  /// lists are consumed and freed by this call (even on failure).
  pub fn avfilter_graph_parse_ptr(
    graph: *mut AVFilterGraph,
    filters: *const c_char,
    inputs: *mut *mut AVFilterInOut,
    outputs: *mut *mut AVFilterInOut,
    log_ctx: *mut std::os::raw::c_void,
  ) -> c_int;

  /// Check validity and configure all the links and formats in the graph
  pub fn avfilter_graph_config(
    graphctx: *mut AVFilterGraph,
    log_ctx: *mut std::os::raw::c_void,
  ) -> c_int;

  /// Link pad `srcpad` of `src` to pad `dstpad` of `dst`
  pub fn avfilter_link(
    src: *mut AVFilterContext,
    srcpad: c_uint,
    dst: *mut AVFilterContext,
    dstpad: c_uint,
  ) -> c_int;

  // ========================================================================
  // Graph Endpoints
  // ========================================================================

  /// Allocate a single AVFilterInOut entry
  pub fn avfilter_inout_alloc() -> *mut AVFilterInOut;

  /// Free a linked list of AVFilterInOut entries, setting *inout to NULL
  pub fn avfilter_inout_free(inout: *mut *mut AVFilterInOut);

  // ========================================================================
  // Buffer Source / Sink
  // ========================================================================

  /// Add a frame to the buffer source; NULL marks end of stream
  pub fn av_buffersrc_add_frame_flags(
    buffer_src: *mut AVFilterContext,
    frame: *mut AVFrame,
    flags: c_int,
  ) -> c_int;

  /// Allocate a parameters struct for late buffersrc configuration
  ///
  /// Free with av_free after av_buffersrc_parameters_set.
  pub fn av_buffersrc_parameters_alloc() -> *mut AVBufferSrcParameters;

  /// Apply prepared parameters to a (not yet initialized) buffersrc
  pub fn av_buffersrc_parameters_set(
    ctx: *mut AVFilterContext,
    param: *mut AVBufferSrcParameters,
  ) -> c_int;

  /// Get a filtered frame from the buffer sink
  ///
  /// # Returns
  /// * >= 0 on success
  /// * AVERROR(EAGAIN) - more input needed
  /// * AVERROR_EOF - no more output after the source saw end of stream
  pub fn av_buffersink_get_frame(ctx: *mut AVFilterContext, frame: *mut AVFrame) -> c_int;

  // ========================================================================
  // Runtime Commands
  // ========================================================================

  /// Send a command to one or more filter instances, synchronously
  pub fn avfilter_graph_send_command(
    graph: *mut AVFilterGraph,
    target: *const c_char,
    cmd: *const c_char,
    arg: *const c_char,
    res: *mut c_char,
    res_len: c_int,
    flags: c_int,
  ) -> c_int;

  /// Queue a command to be applied when frames at `ts` flow through
  pub fn avfilter_graph_queue_command(
    graph: *mut AVFilterGraph,
    target: *const c_char,
    cmd: *const c_char,
    arg: *const c_char,
    flags: c_int,
    ts: f64,
  ) -> c_int;
}

// ============================================================================
// Constants
// ============================================================================

/// Filter descriptor flags
pub mod filter_flag {
  use std::os::raw::c_int;

  pub const DYNAMIC_INPUTS: c_int = 1 << 0;
  pub const DYNAMIC_OUTPUTS: c_int = 1 << 1;
  pub const SLICE_THREADS: c_int = 1 << 2;
  /// The filter requires a hardware device context
  pub const HWDEVICE: c_int = 1 << 4;
}

/// Flags for av_buffersrc_add_frame_flags
pub mod buffersrc_flag {
  use std::os::raw::c_int;

  /// Do not check format changes
  pub const NO_CHECK_FORMAT: c_int = 1;
  /// Immediately push the frame to the output
  pub const PUSH: c_int = 4;
  /// Keep a reference to the frame instead of taking ownership
  pub const KEEP_REF: c_int = 8;
}

/// Flags for graph commands
pub mod cmd_flag {
  use std::os::raw::c_int;

  /// Stop once a filter understood the command, fast filters only
  pub const ONE: c_int = 1;
  /// Only execute commands where the target filter is cheap to query
  pub const FAST: c_int = 2;
}
