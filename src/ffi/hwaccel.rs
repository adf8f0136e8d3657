//! Hardware acceleration function declarations
//!
//! Provides hardware device and frames context management for VideoToolbox,
//! CUDA, VAAPI, etc.

use super::types::*;
use std::os::raw::{c_char, c_int};

extern "C" {
    // ========================================================================
    // Hardware Device Context
    // ========================================================================

    /// Create a hardware device context for the specified type
    ///
    /// # Arguments
    /// * `device_ctx` - On success, pointer to the created context
    /// * `type_` - Hardware device type
    /// * `device` - Device name (e.g., "/dev/dri/renderD128" for VAAPI, NULL for default)
    /// * `opts` - Options dictionary (can be NULL)
    /// * `flags` - Currently unused, should be 0
    ///
    /// # Returns
    /// 0 on success, negative AVERROR on failure
    pub fn av_hwdevice_ctx_create(
        device_ctx: *mut *mut AVBufferRef,
        type_: c_int,
        device: *const c_char,
        opts: *mut AVDictionary,
        flags: c_int,
    ) -> c_int;

    /// Iterate over supported device types
    ///
    /// # Arguments
    /// * `prev` - Previous type (AV_HWDEVICE_TYPE_NONE to start)
    ///
    /// # Returns
    /// Next type, or AV_HWDEVICE_TYPE_NONE when done
    pub fn av_hwdevice_iterate_types(prev: c_int) -> c_int;

    /// Get the string name of a hardware device type
    pub fn av_hwdevice_get_type_name(type_: c_int) -> *const c_char;

    /// Get hardware device type from name ("cuda", "vaapi", ...)
    pub fn av_hwdevice_find_type_by_name(name: *const c_char) -> c_int;

    // ========================================================================
    // Hardware Frames Context
    // ========================================================================

    /// Allocate a hardware frames context tied to the given device
    ///
    /// The returned context must be configured (format, sw_format, size)
    /// and finalized with av_hwframe_ctx_init before use.
    pub fn av_hwframe_ctx_alloc(device_ctx: *mut AVBufferRef) -> *mut AVBufferRef;

    /// Finalize the hardware frames context before use
    pub fn av_hwframe_ctx_init(ref_: *mut AVBufferRef) -> c_int;

    /// Allocate a new frame from the hardware frames pool
    pub fn av_hwframe_get_buffer(
        hwframe_ctx: *mut AVBufferRef,
        frame: *mut AVFrame,
        flags: c_int,
    ) -> c_int;

    /// Copy data between hardware and software frames
    ///
    /// If src is a HW frame and dst a SW frame: download.
    /// If src is a SW frame and dst a HW frame: upload.
    pub fn av_hwframe_transfer_data(
        dst: *mut AVFrame,
        src: *const AVFrame,
        flags: c_int,
    ) -> c_int;
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Check if a hardware device type is compiled into the linked FFmpeg
pub fn is_hwdevice_available(device_type: AVHWDeviceType) -> bool {
    let mut current = unsafe { av_hwdevice_iterate_types(0) };
    while current != 0 {
        if current == device_type.as_raw() {
            return true;
        }
        current = unsafe { av_hwdevice_iterate_types(current) };
    }
    false
}

/// Get all hardware device types the linked FFmpeg knows about
pub fn available_hwdevice_types() -> Vec<AVHWDeviceType> {
    let mut types = Vec::new();
    let mut current = unsafe { av_hwdevice_iterate_types(0) };

    while current != 0 {
        if let Some(device_type) = AVHWDeviceType::from_raw(current) {
            types.push(device_type);
        }
        current = unsafe { av_hwdevice_iterate_types(current) };
    }

    types
}

/// Get hardware device type name
pub fn hwdevice_type_name(device_type: AVHWDeviceType) -> Option<&'static str> {
    let name_ptr = unsafe { av_hwdevice_get_type_name(device_type.as_raw()) };
    if name_ptr.is_null() {
        return None;
    }
    let cstr = unsafe { std::ffi::CStr::from_ptr(name_ptr) };
    cstr.to_str().ok()
}

/// Look up a hardware device type by name
pub fn hwdevice_type_by_name(name: &str) -> Option<AVHWDeviceType> {
    let c_name = std::ffi::CString::new(name).ok()?;
    let raw = unsafe { av_hwdevice_find_type_by_name(c_name.as_ptr()) };
    AVHWDeviceType::from_raw(raw)
}
