//! Safe wrapper around FFmpeg hardware device context
//!
//! Provides hardware acceleration device management for VideoToolbox, CUDA,
//! VAAPI, etc.

use crate::ffi::{
  self, AVBufferRef, AVHWDeviceType,
  avutil::av_buffer_unref,
  hwaccel::{av_hwdevice_ctx_create, hwdevice_type_by_name, hwdevice_type_name},
};
use std::ffi::CString;
use std::ptr::NonNull;

use super::{CodecError, CodecResult};

/// Safe wrapper around an FFmpeg hardware device context reference
pub struct HwDeviceContext {
  ptr: NonNull<AVBufferRef>,
  device_type: AVHWDeviceType,
}

impl HwDeviceContext {
  /// Create a hardware device context of the given type on the default device
  pub fn new(device_type: AVHWDeviceType) -> CodecResult<Self> {
    Self::new_with_device(device_type, None)
  }

  /// Create a hardware device context on a specific device
  /// (e.g. "/dev/dri/renderD128" for VAAPI)
  pub fn new_with_device(
    device_type: AVHWDeviceType,
    device: Option<&str>,
  ) -> CodecResult<Self> {
    let c_device = match device {
      Some(name) => Some(
        CString::new(name).map_err(|_| CodecError::InvalidConfig("Invalid device name".into()))?,
      ),
      None => None,
    };

    let mut device_ctx: *mut AVBufferRef = std::ptr::null_mut();
    let ret = unsafe {
      av_hwdevice_ctx_create(
        &mut device_ctx,
        device_type.as_raw(),
        c_device.as_ref().map(|c| c.as_ptr()).unwrap_or(std::ptr::null()),
        std::ptr::null_mut(),
        0,
      )
    };

    ffi::check_error(ret)?;

    NonNull::new(device_ctx)
      .map(|ptr| Self { ptr, device_type })
      .ok_or(CodecError::HardwareError(
        "Failed to create hardware device context".into(),
      ))
  }

  /// Create a device context by type name ("cuda", "vaapi", "videotoolbox")
  pub fn new_by_name(name: &str) -> CodecResult<Self> {
    let device_type = hwdevice_type_by_name(name)
      .ok_or_else(|| CodecError::HardwareError(format!("Unknown device type: {name}")))?;
    Self::new(device_type)
  }

  /// Get the raw buffer reference (owned by this wrapper)
  #[inline]
  pub fn as_ptr(&self) -> *mut AVBufferRef {
    self.ptr.as_ptr()
  }

  /// Get the device type
  #[inline]
  pub fn device_type(&self) -> AVHWDeviceType {
    self.device_type
  }

  /// Get device type name
  pub fn device_name(&self) -> &'static str {
    hwdevice_type_name(self.device_type).unwrap_or("unknown")
  }
}

impl Drop for HwDeviceContext {
  fn drop(&mut self) {
    unsafe {
      let mut ptr = self.ptr.as_ptr();
      av_buffer_unref(&mut ptr);
    }
  }
}

// Hardware device contexts can be shared across threads
unsafe impl Send for HwDeviceContext {}
unsafe impl Sync for HwDeviceContext {}

impl std::fmt::Debug for HwDeviceContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("HwDeviceContext")
      .field("type", &self.device_type)
      .field("name", &self.device_name())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_unknown_device_name() {
    assert!(HwDeviceContext::new_by_name("not_a_device").is_err());
  }

  #[test]
  #[cfg(target_os = "macos")]
  fn test_videotoolbox() {
    let result = HwDeviceContext::new(AVHWDeviceType::Videotoolbox);
    assert!(result.is_ok(), "VideoToolbox should be available on macOS");
    if let Ok(ctx) = result {
      assert_eq!(ctx.device_name(), "videotoolbox");
    }
  }
}
