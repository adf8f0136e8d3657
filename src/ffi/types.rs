//! Core FFmpeg type definitions
//!
//! All FFmpeg structs are opaque (zero-sized) to avoid version-specific layout
//! dependencies. Field access is done via the thin C accessor library in
//! accessors.c

use std::marker::PhantomData;
use std::os::raw::c_int;

// ============================================================================
// Rational Number
// ============================================================================

/// Rational number for time bases and frame rates
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AVRational {
    /// Numerator
    pub num: c_int,
    /// Denominator
    pub den: c_int,
}

impl AVRational {
    pub const fn new(num: c_int, den: c_int) -> Self {
        Self { num, den }
    }

    /// A rational is usable as a time base only with a non-zero denominator
    pub fn is_valid(&self) -> bool {
        self.den != 0
    }

    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }

    pub const fn inverse(&self) -> Self {
        Self {
            num: self.den,
            den: self.num,
        }
    }

    /// Rescale a timestamp from this time base to `dst`, rounding half away
    /// from zero. `AV_NOPTS_VALUE` passes through unchanged, matching
    /// `av_rescale_q_rnd` with `AV_ROUND_NEAR_INF | AV_ROUND_PASS_MINMAX`.
    pub fn rescale(&self, ts: i64, dst: AVRational) -> i64 {
        if ts == AV_NOPTS_VALUE {
            return ts;
        }
        let num = ts as i128 * self.num as i128 * dst.den as i128;
        let den = self.den as i128 * dst.num as i128;
        if den == 0 {
            return ts;
        }
        let half = den.abs() / 2;
        let rounded = if num >= 0 {
            (num + half) / den
        } else {
            (num - half) / den
        };
        rounded as i64
    }

    /// Microsecond time base (1/1000000)
    pub const MICROSECONDS: Self = Self {
        num: 1,
        den: 1_000_000,
    };
}

// Exact comparison by i64 cross-multiplication; no precision loss for any
// representable pair
impl PartialOrd for AVRational {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        if self.den == 0 || other.den == 0 {
            return None;
        }
        let lhs = self.num as i64 * other.den as i64;
        let rhs = other.num as i64 * self.den as i64;
        let flip = (self.den as i64 * other.den as i64).signum();
        Some((lhs * flip).cmp(&(rhs * flip)))
    }
}

// ============================================================================
// Codec IDs
// ============================================================================

/// Codec identifier, transparent over FFmpeg's `AVCodecID`
///
/// Codecs are usually resolved by name ("libx264", "aac"); the named
/// constants below cover the ids this crate needs to recognize on its own.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct AVCodecID(pub c_int);

impl AVCodecID {
    pub const NONE: Self = Self(0);
    pub const H264: Self = Self(27);
    pub const HEVC: Self = Self(173);
    pub const VP8: Self = Self(139);
    pub const VP9: Self = Self(167);
    pub const AV1: Self = Self(226);
    pub const MP3: Self = Self(0x15001);
    pub const AAC: Self = Self(0x15002);
    pub const VORBIS: Self = Self(0x15005);
    pub const FLAC: Self = Self(0x1500c);
    pub const OPUS: Self = Self(0x1503c);

    /// Get the raw FFmpeg codec ID value
    #[inline]
    pub fn as_raw(&self) -> c_int {
        self.0
    }
}

// ============================================================================
// Pixel Formats
// ============================================================================

/// Video pixel format, transparent over FFmpeg's `AVPixelFormat`
///
/// Arbitrary formats flow through the pipeline untouched; the named
/// constants are the ones the runtime itself inspects (hardware formats and
/// the common software formats used in tests).
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AVPixelFormat(pub c_int);

impl AVPixelFormat {
    pub const NONE: Self = Self(-1);
    pub const YUV420P: Self = Self(0);
    pub const YUV422P: Self = Self(4);
    pub const YUV444P: Self = Self(5);
    pub const NV12: Self = Self(23);
    pub const RGBA: Self = Self(26);
    pub const BGRA: Self = Self(28);
    pub const YUVA420P: Self = Self(33);
    pub const VAAPI: Self = Self(44);
    pub const QSV: Self = Self(114);
    pub const CUDA: Self = Self(117);
    pub const VIDEOTOOLBOX: Self = Self(158);

    /// Get the raw FFmpeg pixel format value
    #[inline]
    pub fn as_raw(&self) -> c_int {
        self.0
    }

    /// Whether this is a hardware (device-resident) pixel format
    pub fn is_hardware(&self) -> bool {
        matches!(
            *self,
            Self::VIDEOTOOLBOX | Self::CUDA | Self::VAAPI | Self::QSV
        )
    }
}

impl Default for AVPixelFormat {
    fn default() -> Self {
        Self::NONE
    }
}

// ============================================================================
// Sample Formats
// ============================================================================

/// Audio sample format, transparent over FFmpeg's `AVSampleFormat`
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AVSampleFormat(pub c_int);

impl AVSampleFormat {
    pub const NONE: Self = Self(-1);
    pub const U8: Self = Self(0);
    pub const S16: Self = Self(1);
    pub const S32: Self = Self(2);
    pub const FLT: Self = Self(3);
    pub const DBL: Self = Self(4);
    pub const U8P: Self = Self(5);
    pub const S16P: Self = Self(6);
    pub const S32P: Self = Self(7);
    pub const FLTP: Self = Self(8);
    pub const DBLP: Self = Self(9);

    /// Get the raw FFmpeg sample format value
    #[inline]
    pub fn as_raw(&self) -> c_int {
        self.0
    }
}

impl Default for AVSampleFormat {
    fn default() -> Self {
        Self::NONE
    }
}

// ============================================================================
// Hardware Device Types
// ============================================================================

/// Hardware acceleration device types
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AVHWDeviceType {
    None = 0,
    Vdpau = 1,
    Cuda = 2,
    Vaapi = 3,
    Dxva2 = 4,
    Qsv = 5,
    Videotoolbox = 6,
    D3d11va = 7,
    Drm = 8,
    Opencl = 9,
    Mediacodec = 10,
    Vulkan = 11,
}

impl AVHWDeviceType {
    /// Get the raw FFmpeg hardware device type value
    pub fn as_raw(&self) -> c_int {
        *self as c_int
    }

    pub fn from_raw(value: c_int) -> Option<Self> {
        match value {
            1 => Some(Self::Vdpau),
            2 => Some(Self::Cuda),
            3 => Some(Self::Vaapi),
            4 => Some(Self::Dxva2),
            5 => Some(Self::Qsv),
            6 => Some(Self::Videotoolbox),
            7 => Some(Self::D3d11va),
            8 => Some(Self::Drm),
            9 => Some(Self::Opencl),
            10 => Some(Self::Mediacodec),
            11 => Some(Self::Vulkan),
            _ => None,
        }
    }

    /// Get the hardware pixel format frames of this device carry
    pub fn pixel_format(&self) -> AVPixelFormat {
        match self {
            Self::Videotoolbox => AVPixelFormat::VIDEOTOOLBOX,
            Self::Cuda => AVPixelFormat::CUDA,
            Self::Vaapi => AVPixelFormat::VAAPI,
            Self::Qsv => AVPixelFormat::QSV,
            _ => AVPixelFormat::NONE,
        }
    }
}

// ============================================================================
// Opaque FFmpeg Types
// ============================================================================

/// Opaque AVCodec structure (codec implementation descriptor)
#[repr(C)]
pub struct AVCodec {
    _opaque: [u8; 0],
    _marker: PhantomData<(*mut u8, std::marker::PhantomPinned)>,
}

/// Opaque AVCodecContext structure (encoder/decoder instance)
#[repr(C)]
pub struct AVCodecContext {
    _opaque: [u8; 0],
    _marker: PhantomData<(*mut u8, std::marker::PhantomPinned)>,
}

/// Opaque AVFrame structure (uncompressed video/audio data)
#[repr(C)]
pub struct AVFrame {
    _opaque: [u8; 0],
    _marker: PhantomData<(*mut u8, std::marker::PhantomPinned)>,
}

/// Opaque AVPacket structure (compressed data)
#[repr(C)]
pub struct AVPacket {
    _opaque: [u8; 0],
    _marker: PhantomData<(*mut u8, std::marker::PhantomPinned)>,
}

/// Opaque AVBufferRef structure (reference-counted buffer)
#[repr(C)]
pub struct AVBufferRef {
    _opaque: [u8; 0],
    _marker: PhantomData<(*mut u8, std::marker::PhantomPinned)>,
}

/// Opaque AVDictionary structure (key-value options)
#[repr(C)]
pub struct AVDictionary {
    _opaque: [u8; 0],
    _marker: PhantomData<(*mut u8, std::marker::PhantomPinned)>,
}

/// Opaque AVBitStreamFilter structure (bitstream filter descriptor)
#[repr(C)]
pub struct AVBitStreamFilter {
    _opaque: [u8; 0],
    _marker: PhantomData<(*mut u8, std::marker::PhantomPinned)>,
}

/// Opaque AVBSFContext structure (bitstream filter instance)
#[repr(C)]
pub struct AVBSFContext {
    _opaque: [u8; 0],
    _marker: PhantomData<(*mut u8, std::marker::PhantomPinned)>,
}

// ============================================================================
// Constants
// ============================================================================

/// No timestamp value
pub const AV_NOPTS_VALUE: i64 = 0x8000000000000000u64 as i64;

/// Internal time base (ticks per second) used for `stream_index == -1` seeks
pub const AV_TIME_BASE: i64 = 1_000_000;

/// Packet flags
pub mod pkt_flag {
    use std::os::raw::c_int;

    pub const KEY: c_int = 0x0001;
    pub const CORRUPT: c_int = 0x0002;
    pub const DISCARD: c_int = 0x0004;
    pub const TRUSTED: c_int = 0x0008;
    pub const DISPOSABLE: c_int = 0x0010;
}

/// Codec capability flags (subset this crate inspects)
pub mod codec_cap {
    use std::os::raw::c_int;

    /// Encoder or decoder requires flushing with NULL input at the end
    pub const DELAY: c_int = 1 << 5;
    /// Codec is backed by a hardware implementation
    pub const HARDWARE: c_int = 1 << 18;
    /// Codec is potentially backed by hardware (hybrid)
    pub const HYBRID: c_int = 1 << 19;
}

/// Codec context flags
pub mod codec_flag {
    use std::os::raw::c_int;

    /// Place global headers in extradata instead of every keyframe
    pub const GLOBAL_HEADER: c_int = 1 << 22;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rational_comparison_is_exact() {
        let a = AVRational::new(1, 30);
        let b = AVRational::new(1001, 30000);
        assert!(a > b);
        assert!(b < a);
        assert_eq!(
            AVRational::new(1, 25).partial_cmp(&AVRational::new(4, 100)),
            Some(std::cmp::Ordering::Equal)
        );
    }

    #[test]
    fn rational_zero_denominator_is_unordered() {
        let bad = AVRational::new(1, 0);
        assert!(bad.partial_cmp(&AVRational::new(1, 30)).is_none());
        assert!(!bad.is_valid());
    }

    #[test]
    fn rescale_round_trips_identical_bases() {
        let tb = AVRational::new(1, 90000);
        assert_eq!(tb.rescale(3600, tb), 3600);
    }

    #[test]
    fn rescale_rounds_half_away_from_zero() {
        // 1/30 -> 1/15360: one tick is exactly 512 ticks
        let src = AVRational::new(1, 30);
        let dst = AVRational::new(1, 15360);
        assert_eq!(src.rescale(1, dst), 512);
        assert_eq!(src.rescale(-1, dst), -512);

        // 1/3 -> 1/2: 2/3 rounds up to 1
        let src = AVRational::new(1, 3);
        let dst = AVRational::new(1, 2);
        assert_eq!(src.rescale(1, dst), 1);
    }

    #[test]
    fn rescale_passes_nopts_through() {
        let src = AVRational::new(1, 1000);
        let dst = AVRational::new(1, 90000);
        assert_eq!(src.rescale(AV_NOPTS_VALUE, dst), AV_NOPTS_VALUE);
    }
}
