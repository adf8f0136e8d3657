//! libavutil function declarations
//!
//! Provides utility functions for memory, frames, buffers and options.

use super::types::*;
use std::os::raw::{c_char, c_int, c_void};

extern "C" {
    // ========================================================================
    // Frame Management
    // ========================================================================

    /// Allocate an AVFrame and set its fields to default values
    pub fn av_frame_alloc() -> *mut AVFrame;

    /// Free the frame and any dynamically allocated objects in it
    pub fn av_frame_free(frame: *mut *mut AVFrame);

    /// Unreference all buffers referenced by frame and reset to defaults
    pub fn av_frame_unref(frame: *mut AVFrame);

    /// Create a new frame that references the same data as src
    pub fn av_frame_clone(src: *const AVFrame) -> *mut AVFrame;

    /// Allocate new buffers for media data based on frame format/dimensions
    ///
    /// # Arguments
    /// * `frame` - Frame with format plus width/height or nb_samples set
    /// * `align` - Buffer size alignment (0 for default, 32 recommended for SIMD)
    pub fn av_frame_get_buffer(frame: *mut AVFrame, align: c_int) -> c_int;

    /// Copy only "metadata" fields from src to dst (pts, duration, etc)
    pub fn av_frame_copy_props(dst: *mut AVFrame, src: *const AVFrame) -> c_int;

    // ========================================================================
    // Memory Allocation
    // ========================================================================

    /// Allocate a memory block with alignment suitable for all memory accesses
    pub fn av_malloc(size: usize) -> *mut c_void;

    /// Free a memory block which has been allocated with av_malloc
    pub fn av_free(ptr: *mut c_void);

    // ========================================================================
    // Buffer Reference Management
    // ========================================================================

    /// Create a new reference to an AVBuffer
    pub fn av_buffer_ref(buf: *const AVBufferRef) -> *mut AVBufferRef;

    /// Free a given reference and automatically free the buffer if no more refs
    pub fn av_buffer_unref(buf: *mut *mut AVBufferRef);

    // ========================================================================
    // Error Handling
    // ========================================================================

    /// Put a description of the AVERROR code errnum in errbuf
    pub fn av_strerror(errnum: c_int, errbuf: *mut c_char, errbuf_size: usize) -> c_int;

    // ========================================================================
    // Dictionary (Options)
    // ========================================================================

    /// Set an entry in the dictionary
    pub fn av_dict_set(
        pm: *mut *mut AVDictionary,
        key: *const c_char,
        value: *const c_char,
        flags: c_int,
    ) -> c_int;

    /// Free all memory allocated for an AVDictionary
    pub fn av_dict_free(m: *mut *mut AVDictionary);

    // ========================================================================
    // AVOption
    // ========================================================================

    /// Set a binary option on an object (searching children)
    pub fn av_opt_set_bin(
        obj: *mut c_void,
        name: *const c_char,
        val: *const u8,
        size: c_int,
        search_flags: c_int,
    ) -> c_int;

    // ========================================================================
    // Format Names
    // ========================================================================

    /// Look up a pixel format by name ("yuv420p"), AV_PIX_FMT_NONE if unknown
    pub fn av_get_pix_fmt(name: *const c_char) -> c_int;

    /// Name of a pixel format, NULL if unknown
    pub fn av_get_pix_fmt_name(pix_fmt: c_int) -> *const c_char;

    /// Look up a sample format by name ("fltp"), AV_SAMPLE_FMT_NONE if unknown
    pub fn av_get_sample_fmt(name: *const c_char) -> c_int;

    /// Name of a sample format, NULL if unknown
    pub fn av_get_sample_fmt_name(sample_fmt: c_int) -> *const c_char;

    // ========================================================================
    // Logging
    // ========================================================================

    /// Set the native logging level
    pub fn av_log_set_level(level: c_int);
}

// ============================================================================
// Logging Levels
// ============================================================================

pub mod log_level {
    use std::os::raw::c_int;

    pub const QUIET: c_int = -8;
    pub const PANIC: c_int = 0;
    pub const FATAL: c_int = 8;
    pub const ERROR: c_int = 16;
    pub const WARNING: c_int = 24;
    pub const INFO: c_int = 32;
    pub const VERBOSE: c_int = 40;
    pub const DEBUG: c_int = 48;
    pub const TRACE: c_int = 56;
}

// ============================================================================
// AVOption search flags
// ============================================================================

pub mod opt_search {
    use std::os::raw::c_int;

    /// Search in possible children of the given object
    pub const CHILDREN: c_int = 1;
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Look up a pixel format by name (safe wrapper)
pub fn pix_fmt_from_name(name: &str) -> Option<AVPixelFormat> {
    let c_name = std::ffi::CString::new(name).ok()?;
    let fmt = unsafe { av_get_pix_fmt(c_name.as_ptr()) };
    if fmt == AVPixelFormat::NONE.as_raw() {
        None
    } else {
        Some(AVPixelFormat(fmt))
    }
}

/// Name of a pixel format (safe wrapper)
pub fn pix_fmt_name(fmt: AVPixelFormat) -> Option<String> {
    let ptr = unsafe { av_get_pix_fmt_name(fmt.as_raw()) };
    if ptr.is_null() {
        return None;
    }
    Some(
        unsafe { std::ffi::CStr::from_ptr(ptr) }
            .to_string_lossy()
            .into_owned(),
    )
}

/// Look up a sample format by name (safe wrapper)
pub fn sample_fmt_from_name(name: &str) -> Option<AVSampleFormat> {
    let c_name = std::ffi::CString::new(name).ok()?;
    let fmt = unsafe { av_get_sample_fmt(c_name.as_ptr()) };
    if fmt == AVSampleFormat::NONE.as_raw() {
        None
    } else {
        Some(AVSampleFormat(fmt))
    }
}

/// Name of a sample format (safe wrapper)
pub fn sample_fmt_name(fmt: AVSampleFormat) -> Option<String> {
    let ptr = unsafe { av_get_sample_fmt_name(fmt.as_raw()) };
    if ptr.is_null() {
        return None;
    }
    Some(
        unsafe { std::ffi::CStr::from_ptr(ptr) }
            .to_string_lossy()
            .into_owned(),
    )
}
