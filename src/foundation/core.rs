use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::foundation::error::{CompositorError, CompositorResult};

pub use kurbo::{Affine, Point, Rect};

/// Absolute 0-based frame index in composition timeline space.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Half-open frame range `[start, end)` in timeline space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameRange {
    /// Inclusive range start.
    pub start: FrameIndex,
    /// Exclusive range end.
    pub end: FrameIndex,
}

impl FrameRange {
    /// Create a validated range with `start <= end`.
    pub fn new(start: FrameIndex, end: FrameIndex) -> CompositorResult<Self> {
        if start.0 > end.0 {
            return Err(CompositorError::validation("FrameRange start must be <= end"));
        }
        Ok(Self { start, end })
    }

    /// Number of frames contained in the range.
    pub fn len_frames(self) -> u64 {
        self.end.0.saturating_sub(self.start.0)
    }

    /// Return `true` when the range has no frames.
    pub fn is_empty(self) -> bool {
        self.start.0 == self.end.0
    }

    /// Return `true` when `f` is inside `[start, end)`.
    pub fn contains(self, f: FrameIndex) -> bool {
        self.start.0 <= f.0 && f.0 < self.end.0
    }
}

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> CompositorResult<Self> {
        if den == 0 {
            return Err(CompositorError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(CompositorError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Convert a frame index to its presentation time in seconds.
    pub fn frame_to_secs(self, frame: FrameIndex) -> f64 {
        (frame.0 as f64) * f64::from(self.den) / f64::from(self.num)
    }

    /// Convert seconds to frame count using floor semantics.
    pub fn secs_to_frames_floor(self, secs: f64) -> u64 {
        (secs * self.as_f64()).floor().max(0.0) as u64
    }
}

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Identifier of a media track inside a composition.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct TrackId(pub u32);

/// Half-open time range `[start, start + duration)` in seconds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimeRange {
    /// Range start in seconds.
    pub start: f64,
    /// Range duration in seconds.
    pub duration: f64,
}

impl TimeRange {
    /// Construct a range from a start and a duration.
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }

    /// Exclusive end of the range in seconds.
    pub fn end(self) -> f64 {
        self.start + self.duration
    }

    /// Return `true` when `t` falls inside `[start, end)`.
    pub fn contains(self, t: f64) -> bool {
        self.start <= t && t < self.end()
    }

    /// Return `true` when the range has a finite, strictly positive duration.
    pub fn is_playable(self) -> bool {
        self.start.is_finite() && self.duration.is_finite() && self.duration > 0.0
    }
}

/// Packed pixel layouts understood by the compositor.
///
/// Both source frames and destination buffers use a single 32-bit packed layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 8-bit B, G, R, A with premultiplied alpha.
    #[default]
    Bgra8Premul,
}

impl PixelFormat {
    /// Bytes used by one pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgra8Premul => 4,
        }
    }
}

/// Cooperative cancellation handle tied to a compositor's cancellation epoch.
///
/// A token is cancelled once the shared epoch moves past the value captured at submission.
#[derive(Clone, Debug)]
pub struct CancelToken {
    captured: u64,
    epoch: Arc<AtomicU64>,
}

impl CancelToken {
    pub(crate) fn new(epoch: Arc<AtomicU64>) -> Self {
        let captured = epoch.load(Ordering::Acquire);
        Self { captured, epoch }
    }

    /// A token that is never cancelled.
    pub fn never() -> Self {
        Self::new(Arc::new(AtomicU64::new(0)))
    }

    /// Return `true` once cancellation was requested after this token was created.
    pub fn is_cancelled(&self) -> bool {
        self.epoch.load(Ordering::Acquire) != self.captured
    }

    /// Return `Err(Cancelled)` when cancellation was requested.
    pub fn check(&self) -> CompositorResult<()> {
        if self.is_cancelled() {
            return Err(CompositorError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
