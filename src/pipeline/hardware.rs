//! Shared hardware acceleration context
//!
//! One [`HardwareContext`] may back any number of encoders and filters.
//! The creator owns disposal (the last clone dropping the inner Arc);
//! stages only ever borrow device and frames references.

use crate::codec::{Frame, HwDeviceContext, HwFramesContext};
use crate::ffi::{hwaccel::hwdevice_type_name, AVHWDeviceType, AVPixelFormat};
use std::sync::{Arc, Mutex};

use super::error::Result;

struct HardwareInner {
    device: HwDeviceContext,
    /// Frames pool, created explicitly or adopted from upstream frames
    frames: Mutex<Option<HwFramesContext>>,
}

/// Shared handle to a hardware device and (optionally) a frames pool
#[derive(Clone)]
pub struct HardwareContext {
    inner: Arc<HardwareInner>,
}

impl HardwareContext {
    /// Open the default device of the given type
    pub fn new(device_type: AVHWDeviceType) -> Result<Self> {
        Ok(Self::from_device(HwDeviceContext::new(device_type)?))
    }

    /// Open a device by type name ("cuda", "vaapi", "videotoolbox")
    pub fn new_by_name(name: &str) -> Result<Self> {
        Ok(Self::from_device(HwDeviceContext::new_by_name(name)?))
    }

    /// Open a specific device (e.g. "/dev/dri/renderD128")
    pub fn new_with_device(device_type: AVHWDeviceType, device: &str) -> Result<Self> {
        Ok(Self::from_device(HwDeviceContext::new_with_device(
            device_type,
            Some(device),
        )?))
    }

    fn from_device(device: HwDeviceContext) -> Self {
        Self {
            inner: Arc::new(HardwareInner {
                device,
                frames: Mutex::new(None),
            }),
        }
    }

    /// The wrapped device context
    pub fn device(&self) -> &HwDeviceContext {
        &self.inner.device
    }

    /// Device type
    pub fn device_type(&self) -> AVHWDeviceType {
        self.inner.device.device_type()
    }

    /// Device type name ("videotoolbox", "cuda", ...)
    pub fn device_type_name(&self) -> &'static str {
        hwdevice_type_name(self.device_type()).unwrap_or("unknown")
    }

    /// The hardware pixel format frames of this device carry
    pub fn device_pixel_format(&self) -> AVPixelFormat {
        self.device_type().pixel_format()
    }

    /// Current frames pool, if one has been created or adopted
    pub fn frames_context(&self) -> Option<HwFramesContext> {
        self.inner.frames.lock().unwrap().clone()
    }

    /// Install a frames pool explicitly
    pub fn set_frames_context(&self, frames: HwFramesContext) {
        *self.inner.frames.lock().unwrap() = Some(frames);
    }

    /// Create, install, and return a frames pool on this device
    pub fn create_frames_context(
        &self,
        sw_format: AVPixelFormat,
        width: i32,
        height: i32,
        pool_size: i32,
    ) -> Result<HwFramesContext> {
        let frames = HwFramesContext::new(
            &self.inner.device,
            self.device_pixel_format(),
            sw_format,
            width,
            height,
            pool_size,
        )?;
        self.set_frames_context(frames.clone());
        Ok(frames)
    }

    /// Adopt the frames context observed on an upstream frame
    ///
    /// Returns true when the frame carried one. An already-adopted pool is
    /// kept; frames from the same upstream share it.
    pub fn adopt_frames_from(&self, frame: &Frame) -> Result<bool> {
        let Some(frames_ref) = frame.hw_frames_ctx() else {
            return Ok(false);
        };
        let mut slot = self.inner.frames.lock().unwrap();
        if slot.is_none() {
            *slot = Some(HwFramesContext::from_borrowed_ref(frames_ref)?);
        }
        Ok(true)
    }
}

impl std::fmt::Debug for HardwareContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareContext")
            .field("device", &self.device_type_name())
            .field("has_frames", &self.frames_context().is_some())
            .finish()
    }
}
