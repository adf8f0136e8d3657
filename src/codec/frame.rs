//! Safe wrapper around FFmpeg AVFrame
//!
//! Provides RAII-based memory management and safe access to frame data,
//! including hardware-resident frames.

use crate::ffi::{
    self,
    accessors::{
        ffframe_data, ffframe_get_best_effort_timestamp, ffframe_get_channel_layout_mask,
        ffframe_get_duration, ffframe_get_format, ffframe_get_height, ffframe_get_hw_frames_ctx,
        ffframe_get_nb_samples, ffframe_get_pts, ffframe_get_sample_aspect_ratio,
        ffframe_get_sample_rate, ffframe_get_width, ffframe_linesize,
        ffframe_set_channel_layout_mask, ffframe_set_duration, ffframe_set_format,
        ffframe_set_height, ffframe_set_hw_frames_ctx, ffframe_set_nb_samples, ffframe_set_pts,
        ffframe_set_sample_aspect_ratio, ffframe_set_sample_rate, ffframe_set_width,
    },
    avutil::{
        av_frame_alloc, av_frame_clone, av_frame_copy_props, av_frame_free, av_frame_get_buffer,
        av_frame_unref,
    },
    hwaccel::av_hwframe_transfer_data,
    AVBufferRef, AVFrame, AVPixelFormat, AVRational, AVSampleFormat,
};
use std::ptr::NonNull;

use super::{CodecError, HwFramesContext};

/// Safe wrapper around AVFrame with RAII cleanup
pub struct Frame {
    ptr: NonNull<AVFrame>,
}

impl Frame {
    /// Allocate a new empty frame
    pub fn new() -> Result<Self, CodecError> {
        let ptr = unsafe { av_frame_alloc() };
        NonNull::new(ptr)
            .map(|ptr| Self { ptr })
            .ok_or(CodecError::AllocationFailed("AVFrame"))
    }

    /// Allocate a video frame with a buffer for the given format and dimensions
    pub fn new_video(width: i32, height: i32, format: AVPixelFormat) -> Result<Self, CodecError> {
        let mut frame = Self::new()?;

        unsafe {
            ffframe_set_width(frame.as_mut_ptr(), width);
            ffframe_set_height(frame.as_mut_ptr(), height);
            ffframe_set_format(frame.as_mut_ptr(), format.as_raw());
        }

        // 32-byte alignment for SIMD
        let ret = unsafe { av_frame_get_buffer(frame.as_mut_ptr(), 32) };
        ffi::check_error(ret)?;

        Ok(frame)
    }

    /// Allocate an audio frame with a buffer for the given layout
    pub fn new_audio(
        sample_rate: i32,
        format: AVSampleFormat,
        channel_layout: u64,
        nb_samples: i32,
    ) -> Result<Self, CodecError> {
        let mut frame = Self::new()?;

        unsafe {
            ffframe_set_sample_rate(frame.as_mut_ptr(), sample_rate);
            ffframe_set_format(frame.as_mut_ptr(), format.as_raw());
            ffframe_set_channel_layout_mask(frame.as_mut_ptr(), channel_layout);
            ffframe_set_nb_samples(frame.as_mut_ptr(), nb_samples);
        }

        let ret = unsafe { av_frame_get_buffer(frame.as_mut_ptr(), 0) };
        ffi::check_error(ret)?;

        Ok(frame)
    }

    /// Create a Frame from a raw pointer (takes ownership)
    ///
    /// # Safety
    /// The pointer must be a valid AVFrame allocated by FFmpeg
    pub unsafe fn from_raw(ptr: *mut AVFrame) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr })
    }

    /// Get the raw pointer (for FFmpeg API calls)
    #[inline]
    pub fn as_ptr(&self) -> *const AVFrame {
        self.ptr.as_ptr()
    }

    /// Get the mutable raw pointer (for FFmpeg API calls)
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut AVFrame {
        self.ptr.as_ptr()
    }

    /// Consume the Frame and return the raw pointer
    /// The caller is responsible for freeing the frame
    pub fn into_raw(self) -> *mut AVFrame {
        let ptr = self.ptr.as_ptr();
        std::mem::forget(self);
        ptr
    }

    // ========================================================================
    // Video Properties
    // ========================================================================

    /// Get frame width
    #[inline]
    pub fn width(&self) -> i32 {
        unsafe { ffframe_get_width(self.as_ptr()) }
    }

    /// Get frame height
    #[inline]
    pub fn height(&self) -> i32 {
        unsafe { ffframe_get_height(self.as_ptr()) }
    }

    /// Get the pixel format of a video frame
    pub fn pixel_format(&self) -> AVPixelFormat {
        AVPixelFormat(unsafe { ffframe_get_format(self.as_ptr()) })
    }

    /// Get the sample aspect ratio (0/1 when unknown)
    pub fn sample_aspect_ratio(&self) -> AVRational {
        let mut num = 0;
        let mut den = 0;
        unsafe { ffframe_get_sample_aspect_ratio(self.as_ptr(), &mut num, &mut den) };
        AVRational::new(num, den)
    }

    /// Set the sample aspect ratio
    pub fn set_sample_aspect_ratio(&mut self, sar: AVRational) {
        unsafe { ffframe_set_sample_aspect_ratio(self.as_mut_ptr(), sar.num, sar.den) }
    }

    // ========================================================================
    // Audio Properties
    // ========================================================================

    /// Get the sample rate of an audio frame
    #[inline]
    pub fn sample_rate(&self) -> i32 {
        unsafe { ffframe_get_sample_rate(self.as_ptr()) }
    }

    /// Get the sample format of an audio frame
    pub fn sample_format(&self) -> AVSampleFormat {
        AVSampleFormat(unsafe { ffframe_get_format(self.as_ptr()) })
    }

    /// Get the number of audio samples per channel
    #[inline]
    pub fn nb_samples(&self) -> i32 {
        unsafe { ffframe_get_nb_samples(self.as_ptr()) }
    }

    /// Get the channel layout mask (0 when unknown or not native order)
    #[inline]
    pub fn channel_layout(&self) -> u64 {
        unsafe { ffframe_get_channel_layout_mask(self.as_ptr()) }
    }

    // ========================================================================
    // Timestamps
    // ========================================================================

    /// Get presentation timestamp (in time_base units)
    #[inline]
    pub fn pts(&self) -> i64 {
        unsafe { ffframe_get_pts(self.as_ptr()) }
    }

    /// Set presentation timestamp
    #[inline]
    pub fn set_pts(&mut self, pts: i64) {
        unsafe { ffframe_set_pts(self.as_mut_ptr(), pts) }
    }

    /// Get duration (in time_base units)
    #[inline]
    pub fn duration(&self) -> i64 {
        unsafe { ffframe_get_duration(self.as_ptr()) }
    }

    /// Set duration
    #[inline]
    pub fn set_duration(&mut self, duration: i64) {
        unsafe { ffframe_set_duration(self.as_mut_ptr(), duration) }
    }

    /// Timestamp estimated using various heuristics, in stream time base
    #[inline]
    pub fn best_effort_timestamp(&self) -> i64 {
        unsafe { ffframe_get_best_effort_timestamp(self.as_ptr()) }
    }

    // ========================================================================
    // Hardware Frames
    // ========================================================================

    /// Borrow the hardware frames context reference, if the frame is
    /// device-resident
    pub fn hw_frames_ctx(&self) -> Option<NonNull<AVBufferRef>> {
        NonNull::new(unsafe { ffframe_get_hw_frames_ctx(self.as_ptr()) })
    }

    /// Whether this frame's samples live in device memory
    pub fn is_hw_frame(&self) -> bool {
        self.hw_frames_ctx().is_some()
    }

    /// Attach a hardware frames context to this frame (takes a new reference)
    pub fn set_hw_frames_ctx(&mut self, frames: &HwFramesContext) -> Result<(), CodecError> {
        let ret = unsafe { ffframe_set_hw_frames_ctx(self.as_mut_ptr(), frames.as_ptr()) };
        ffi::check_error(ret)?;
        Ok(())
    }

    /// Download a hardware frame into a new software frame
    ///
    /// Frame properties (pts, duration, ...) are carried over.
    pub fn transfer_to_software(&self) -> Result<Frame, CodecError> {
        let mut dst = Frame::new()?;
        let ret = unsafe { av_hwframe_transfer_data(dst.as_mut_ptr(), self.as_ptr(), 0) };
        ffi::check_error(ret)?;
        let ret = unsafe { av_frame_copy_props(dst.as_mut_ptr(), self.as_ptr()) };
        ffi::check_error(ret)?;
        Ok(dst)
    }

    /// Upload a software frame into a frame allocated from the given pool
    pub fn transfer_to_hardware(&self, frames: &HwFramesContext) -> Result<Frame, CodecError> {
        let mut dst = frames.alloc_frame()?;
        let ret = unsafe { av_hwframe_transfer_data(dst.as_mut_ptr(), self.as_ptr(), 0) };
        ffi::check_error(ret)?;
        let ret = unsafe { av_frame_copy_props(dst.as_mut_ptr(), self.as_ptr()) };
        ffi::check_error(ret)?;
        Ok(dst)
    }

    // ========================================================================
    // Data Access
    // ========================================================================

    /// Get pointer to plane data
    pub fn data(&self, plane: usize) -> *const u8 {
        unsafe { ffframe_data(self.as_ptr(), plane as i32) as *const u8 }
    }

    /// Get line size (stride) for a plane
    #[inline]
    pub fn linesize(&self, plane: usize) -> i32 {
        unsafe { ffframe_linesize(self.as_ptr(), plane as i32) }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Unreference the frame data (but keep the frame structure)
    pub fn unref(&mut self) {
        unsafe { av_frame_unref(self.as_mut_ptr()) }
    }

    /// Clone the frame (creates a new reference to the same data)
    pub fn try_clone(&self) -> Result<Self, CodecError> {
        let ptr = unsafe { av_frame_clone(self.as_ptr()) };
        NonNull::new(ptr)
            .map(|ptr| Self { ptr })
            .ok_or(CodecError::AllocationFailed("frame clone"))
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        unsafe {
            let mut ptr = self.ptr.as_ptr();
            av_frame_free(&mut ptr);
        }
    }
}

// Frame data can be sent between threads
unsafe impl Send for Frame {}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("nb_samples", &self.nb_samples())
            .field("pts", &self.pts())
            .field("hw", &self.is_hw_frame())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_allocation() {
        let frame = Frame::new().unwrap();
        assert_eq!(frame.width(), 0);
        assert_eq!(frame.height(), 0);
        assert!(!frame.is_hw_frame());
    }

    #[test]
    fn test_video_frame_allocation() {
        let frame = Frame::new_video(1920, 1080, AVPixelFormat::YUV420P).unwrap();
        assert_eq!(frame.width(), 1920);
        assert_eq!(frame.height(), 1080);
        assert_eq!(frame.pixel_format(), AVPixelFormat::YUV420P);

        // Check that plane data is allocated
        assert!(!frame.data(0).is_null());
        assert!(!frame.data(1).is_null());
        assert!(!frame.data(2).is_null());
    }

    #[test]
    fn test_audio_frame_allocation() {
        // 3 = stereo mask
        let frame = Frame::new_audio(48000, AVSampleFormat::FLTP, 0x3, 1024).unwrap();
        assert_eq!(frame.sample_rate(), 48000);
        assert_eq!(frame.nb_samples(), 1024);
        assert_eq!(frame.channel_layout(), 0x3);
    }
}
