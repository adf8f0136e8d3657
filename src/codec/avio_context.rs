//! Custom I/O context wrapper for FFmpeg's AVIO system
//!
//! Backs three kinds of targets: demuxing from an in-memory buffer, muxing
//! into an in-memory buffer, and muxing through user-supplied write/seek
//! callbacks.

use crate::ffi::accessors::{fffio_free_buffer, fffio_set_seekable, AVIO_SEEKABLE_NORMAL};
use crate::ffi::avformat::{
  avio_alloc_context, avio_context_free, avio_flush, seek_whence, AVIOContext,
};
use crate::ffi::avutil::{av_free, av_malloc};
use crate::ffi::error::{AVERROR_EINVAL, AVERROR_EIO, AVERROR_EOF};
use std::os::raw::{c_int, c_void};
use std::ptr::NonNull;

/// Default buffer size for AVIO operations (32KB)
const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// Origin for a user seek callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekWhence {
  /// From the beginning of the output
  Start,
  /// From the current position
  Current,
  /// From the end of the output
  End,
}

/// User-supplied output callbacks
///
/// `write` must consume the whole buffer or fail. `seek` is optional and
/// unlocks formats that need to patch their header (e.g. plain MP4);
/// `read` is optional and only needed by formats that read their own
/// output back (e.g. MP4 faststart).
pub struct IoCallbacks {
  pub write: Box<dyn FnMut(&[u8]) -> std::io::Result<usize> + Send>,
  pub seek: Option<Box<dyn FnMut(i64, SeekWhence) -> std::io::Result<u64> + Send>>,
  pub read: Option<Box<dyn FnMut(&mut [u8]) -> std::io::Result<usize> + Send>>,
}

impl std::fmt::Debug for IoCallbacks {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("IoCallbacks")
      .field("seekable", &self.seek.is_some())
      .finish()
  }
}

/// Growable in-memory cursor used by the buffer I/O modes
struct MemoryCursor {
  data: Vec<u8>,
  position: usize,
}

impl MemoryCursor {
  fn new(data: Vec<u8>) -> Self {
    Self { data, position: 0 }
  }

  fn read(&mut self, buf: &mut [u8]) -> usize {
    let remaining = self.data.len().saturating_sub(self.position);
    let n = remaining.min(buf.len());
    buf[..n].copy_from_slice(&self.data[self.position..self.position + n]);
    self.position += n;
    n
  }

  fn write(&mut self, buf: &[u8]) -> usize {
    let end = self.position + buf.len();
    if end > self.data.len() {
      self.data.resize(end, 0);
    }
    self.data[self.position..end].copy_from_slice(buf);
    self.position = end;
    buf.len()
  }

  fn seek(&mut self, offset: i64, whence: c_int) -> i64 {
    if whence == seek_whence::AVSEEK_SIZE {
      return self.data.len() as i64;
    }
    let base = match whence {
      seek_whence::SEEK_SET => 0i64,
      seek_whence::SEEK_CUR => self.position as i64,
      seek_whence::SEEK_END => self.data.len() as i64,
      _ => return AVERROR_EINVAL as i64,
    };
    let target = base + offset;
    if target < 0 {
      return AVERROR_EINVAL as i64;
    }
    self.position = target as usize;
    target
  }
}

/// I/O mode for the custom context
enum IoMode {
  /// Demux from an in-memory buffer
  MemoryRead(MemoryCursor),
  /// Mux into an in-memory buffer (seekable, supports header patching)
  MemoryWrite(MemoryCursor),
  /// Mux through user callbacks
  Callbacks(IoCallbacks),
}

/// Custom I/O context wrapper
///
/// Wraps FFmpeg's AVIOContext for custom I/O operations. The boxed mode is
/// leaked while FFmpeg holds the opaque pointer and reclaimed in Drop.
pub struct CustomIOContext {
  ptr: NonNull<AVIOContext>,
  mode: *mut IoMode,
}

impl CustomIOContext {
  /// Create a read context over an in-memory buffer
  pub fn new_memory_read(data: Vec<u8>) -> Result<Self, String> {
    Self::create(
      IoMode::MemoryRead(MemoryCursor::new(data)),
      DEFAULT_BUFFER_SIZE,
      false,
    )
  }

  /// Create a write context collecting output into an in-memory buffer
  pub fn new_memory_write() -> Result<Self, String> {
    Self::create(
      IoMode::MemoryWrite(MemoryCursor::new(Vec::new())),
      DEFAULT_BUFFER_SIZE,
      true,
    )
  }

  /// Create a write context over user callbacks
  pub fn new_callback_write(callbacks: IoCallbacks, buffer_size: usize) -> Result<Self, String> {
    Self::create(IoMode::Callbacks(callbacks), buffer_size, true)
  }

  fn create(mode: IoMode, buffer_size: usize, writable: bool) -> Result<Self, String> {
    // Allocate the FFmpeg-side buffer; on success its ownership moves into
    // the AVIOContext
    let buffer = unsafe { av_malloc(buffer_size) } as *mut u8;
    if buffer.is_null() {
      return Err("Failed to allocate AVIO buffer".to_string());
    }

    let seekable = match &mode {
      IoMode::MemoryRead(_) | IoMode::MemoryWrite(_) => true,
      IoMode::Callbacks(cb) => cb.seek.is_some(),
    };
    let readable = match &mode {
      IoMode::MemoryRead(_) | IoMode::MemoryWrite(_) => true,
      IoMode::Callbacks(cb) => cb.read.is_some(),
    };

    // Box the mode to get a stable pointer
    let boxed_mode = Box::into_raw(Box::new(mode));
    let opaque = boxed_mode as *mut c_void;

    let ptr = unsafe {
      avio_alloc_context(
        buffer,
        buffer_size as c_int,
        if writable { 1 } else { 0 },
        opaque,
        if readable { Some(read_callback) } else { None },
        if writable { Some(write_callback) } else { None },
        if seekable { Some(seek_callback) } else { None },
      )
    };

    let Some(ptr) = NonNull::new(ptr) else {
      // Reclaim the mode and free the buffer on failure
      unsafe {
        drop(Box::from_raw(boxed_mode));
        av_free(buffer as *mut c_void);
      }
      return Err("Failed to allocate AVIOContext".to_string());
    };

    if seekable {
      unsafe { fffio_set_seekable(ptr.as_ptr(), AVIO_SEEKABLE_NORMAL) };
    }

    Ok(Self {
      ptr,
      mode: boxed_mode,
    })
  }

  /// Get the raw pointer (to install as a format context's pb)
  #[inline]
  pub fn as_ptr(&self) -> *mut AVIOContext {
    self.ptr.as_ptr()
  }

  /// Flush buffered output
  pub fn flush(&self) {
    unsafe { avio_flush(self.ptr.as_ptr()) };
  }

  /// Take the collected output (memory write mode only)
  pub fn take_buffer(&mut self) -> Option<Vec<u8>> {
    match unsafe { &mut *self.mode } {
      IoMode::MemoryWrite(cursor) => Some(std::mem::take(&mut cursor.data)),
      _ => None,
    }
  }
}

impl Drop for CustomIOContext {
  fn drop(&mut self) {
    unsafe {
      // The internal buffer may have been reallocated and is not released
      // by avio_context_free
      fffio_free_buffer(self.ptr.as_ptr());
      let mut ptr = self.ptr.as_ptr();
      avio_context_free(&mut ptr);
      // Reclaim the leaked mode box
      drop(Box::from_raw(self.mode));
    }
  }
}

unsafe impl Send for CustomIOContext {}

// ============================================================================
// C callbacks
// ============================================================================

unsafe extern "C" fn read_callback(opaque: *mut c_void, buf: *mut u8, buf_size: c_int) -> c_int {
  let mode = unsafe { &mut *(opaque as *mut IoMode) };
  let out = unsafe { std::slice::from_raw_parts_mut(buf, buf_size.max(0) as usize) };

  match mode {
    IoMode::MemoryRead(cursor) | IoMode::MemoryWrite(cursor) => {
      let n = cursor.read(out);
      if n == 0 {
        AVERROR_EOF
      } else {
        n as c_int
      }
    }
    IoMode::Callbacks(callbacks) => {
      let Some(read) = callbacks.read.as_mut() else {
        return AVERROR_EINVAL;
      };
      match read(out) {
        Ok(0) => AVERROR_EOF,
        Ok(n) => n as c_int,
        Err(_) => AVERROR_EIO,
      }
    }
  }
}

unsafe extern "C" fn write_callback(
  opaque: *mut c_void,
  buf: *const u8,
  buf_size: c_int,
) -> c_int {
  let mode = unsafe { &mut *(opaque as *mut IoMode) };
  let data = unsafe { std::slice::from_raw_parts(buf, buf_size.max(0) as usize) };

  match mode {
    IoMode::MemoryWrite(cursor) => cursor.write(data) as c_int,
    IoMode::Callbacks(callbacks) => {
      // Drive the user callback until the whole chunk is consumed
      let mut written = 0;
      while written < data.len() {
        match (callbacks.write)(&data[written..]) {
          Ok(0) => return AVERROR_EIO,
          Ok(n) => written += n,
          Err(_) => return AVERROR_EIO,
        }
      }
      written as c_int
    }
    IoMode::MemoryRead(_) => AVERROR_EINVAL,
  }
}

unsafe extern "C" fn seek_callback(opaque: *mut c_void, offset: i64, whence: c_int) -> i64 {
  let mode = unsafe { &mut *(opaque as *mut IoMode) };

  match mode {
    IoMode::MemoryRead(cursor) | IoMode::MemoryWrite(cursor) => cursor.seek(offset, whence),
    IoMode::Callbacks(callbacks) => {
      let Some(seek) = callbacks.seek.as_mut() else {
        return AVERROR_EINVAL as i64;
      };
      if whence == seek_whence::AVSEEK_SIZE {
        // Size queries are optional; report unsupported
        return AVERROR_EINVAL as i64;
      }
      let user_whence = match whence {
        seek_whence::SEEK_SET => SeekWhence::Start,
        seek_whence::SEEK_CUR => SeekWhence::Current,
        seek_whence::SEEK_END => SeekWhence::End,
        _ => return AVERROR_EINVAL as i64,
      };
      match seek(offset, user_whence) {
        Ok(pos) => pos as i64,
        Err(_) => AVERROR_EIO as i64,
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn memory_cursor_write_seek_read() {
    let mut cursor = MemoryCursor::new(Vec::new());
    assert_eq!(cursor.write(b"hello world"), 11);
    cursor.seek(0, seek_whence::SEEK_SET);
    assert_eq!(cursor.write(b"HELLO"), 5);
    assert_eq!(cursor.data, b"HELLO world");
    assert_eq!(cursor.seek(0, seek_whence::AVSEEK_SIZE), 11);
  }

  #[test]
  fn memory_cursor_read_past_end() {
    let mut cursor = MemoryCursor::new(b"abc".to_vec());
    let mut buf = [0u8; 8];
    assert_eq!(cursor.read(&mut buf), 3);
    assert_eq!(cursor.read(&mut buf), 0);
  }

  #[test]
  fn memory_write_context_collects_output() {
    let mut io = CustomIOContext::new_memory_write().unwrap();
    assert_eq!(io.take_buffer(), Some(Vec::new()));
  }
}
