//! Source frames for timeline video tracks.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::assets::assembler::{CompositionTrack, MediaKind};
use crate::assets::media;
use crate::compositor::request::PixelBuffer;
use crate::foundation::core::PixelFormat;
use crate::foundation::error::CompositorResult;

/// Supplies the decoded source frame a video track shows at a composition time.
pub trait SourceFrameProvider: Send {
    /// Coded (unrotated) BGRA frame of `track` at composition time `time`; `None` when no
    /// segment plays then.
    fn frame_at(
        &mut self,
        track: &CompositionTrack,
        time: f64,
    ) -> CompositorResult<Option<Arc<PixelBuffer>>>;
}

/// Provider for compositions without video; never returns a frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSourceFrames;

impl SourceFrameProvider for NoSourceFrames {
    fn frame_at(
        &mut self,
        _track: &CompositionTrack,
        _time: f64,
    ) -> CompositorResult<Option<Arc<PixelBuffer>>> {
        Ok(None)
    }
}

type FrameKey = (String, i64);

/// Decodes frames with `ffmpeg`, one process per uncached frame.
///
/// Source times are quantized to milliseconds for caching; the least recently used frame is
/// evicted once `capacity` frames are held.
#[derive(Debug)]
pub struct FfmpegFrameProvider {
    cache: HashMap<FrameKey, Arc<PixelBuffer>>,
    lru: VecDeque<FrameKey>,
    capacity: usize,
}

impl Default for FfmpegFrameProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegFrameProvider {
    /// Provider with a cache size from `LAYERCAST_FRAME_CACHE` (default 16).
    pub fn new() -> Self {
        let capacity = std::env::var("LAYERCAST_FRAME_CACHE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(16);
        Self::with_capacity(capacity)
    }

    /// Provider holding at most `capacity` decoded frames (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: HashMap::new(),
            lru: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Number of cached frames.
    pub fn cached_frames(&self) -> usize {
        self.cache.len()
    }

    fn touch(&mut self, key: &FrameKey) {
        if let Some(pos) = self.lru.iter().position(|k| k == key) {
            self.lru.remove(pos);
        }
        self.lru.push_back(key.clone());
    }

    fn insert(&mut self, key: FrameKey, frame: Arc<PixelBuffer>) {
        while self.cache.len() >= self.capacity {
            let Some(old) = self.lru.pop_front() else {
                break;
            };
            self.cache.remove(&old);
        }
        self.touch(&key);
        self.cache.insert(key, frame);
    }
}

impl SourceFrameProvider for FfmpegFrameProvider {
    fn frame_at(
        &mut self,
        track: &CompositionTrack,
        time: f64,
    ) -> CompositorResult<Option<Arc<PixelBuffer>>> {
        if track.kind != MediaKind::Video {
            return Ok(None);
        }
        let Some((segment, source_time)) = track.segment_at(time) else {
            return Ok(None);
        };
        let Some(video) = segment.asset.track(MediaKind::Video) else {
            return Ok(None);
        };

        let location = segment.asset.location();
        let key = (location.to_string(), (source_time * 1000.0).round() as i64);
        if let Some(hit) = self.cache.get(&key).cloned() {
            self.touch(&key);
            return Ok(Some(hit));
        }

        let bytes =
            media::decode_video_frame_bgra(location, video.width, video.height, source_time)?;
        let frame = Arc::new(PixelBuffer::from_data(
            video.width,
            video.height,
            PixelFormat::Bgra8Premul,
            bytes,
        )?);
        tracing::trace!(source = %location, source_time, "decoded source frame");
        self.insert(key, Arc::clone(&frame));
        Ok(Some(frame))
    }
}
