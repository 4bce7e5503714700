//! Source track assembler: element key + file reference → cached composition of aligned tracks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::assets::locate::{BaseLocation, ResourceLocation};
use crate::assets::media::{self, MediaProbe};
use crate::foundation::core::{Affine, TimeRange, TrackId};
use crate::foundation::error::{CompositorError, CompositorResult};

/// Media type of a track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Video frames.
    Video,
    /// Audio samples.
    Audio,
}

/// A track as exposed by an opened source asset.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceTrack {
    /// Media type.
    pub kind: MediaKind,
    /// Transform that displays the track's coded frames upright.
    pub preferred_transform: Affine,
    /// Whether the track's samples can be read.
    pub readable: bool,
    /// Coded frame width (video only).
    pub width: u32,
    /// Coded frame height (video only).
    pub height: u32,
}

/// Opened media asset.
pub trait SourceAsset: Send + Sync + std::fmt::Debug {
    /// Resolved location the asset was opened from.
    fn location(&self) -> &ResourceLocation;
    /// Asset duration in seconds.
    fn duration_secs(&self) -> f64;
    /// First track of `kind`, if any.
    fn track(&self, kind: MediaKind) -> Option<SourceTrack>;
}

/// Opens assets from resolved locations.
pub trait AssetOpener: Send + Sync {
    /// Open (probe) the asset at `location`.
    fn open(&self, location: &ResourceLocation) -> CompositorResult<Arc<dyn SourceAsset>>;
}

/// Asset backed by an `ffprobe` report.
#[derive(Clone, Debug)]
pub struct ProbedAsset {
    location: ResourceLocation,
    probe: MediaProbe,
}

impl ProbedAsset {
    /// Wrap a probe result.
    pub fn new(location: ResourceLocation, probe: MediaProbe) -> Self {
        Self { location, probe }
    }

    /// The underlying probe.
    pub fn probe(&self) -> &MediaProbe {
        &self.probe
    }
}

impl SourceAsset for ProbedAsset {
    fn location(&self) -> &ResourceLocation {
        &self.location
    }

    fn duration_secs(&self) -> f64 {
        self.probe.duration_sec
    }

    fn track(&self, kind: MediaKind) -> Option<SourceTrack> {
        match kind {
            MediaKind::Video if self.probe.has_video => Some(SourceTrack {
                kind,
                preferred_transform: self.probe.preferred_transform(),
                readable: self.probe.video_readable,
                width: self.probe.width,
                height: self.probe.height,
            }),
            MediaKind::Audio if self.probe.has_audio => Some(SourceTrack {
                kind,
                preferred_transform: Affine::IDENTITY,
                readable: true,
                width: 0,
                height: 0,
            }),
            _ => None,
        }
    }
}

/// [`AssetOpener`] that probes files and URIs with `ffprobe`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfprobeOpener;

impl AssetOpener for FfprobeOpener {
    fn open(&self, location: &ResourceLocation) -> CompositorResult<Arc<dyn SourceAsset>> {
        let probe = media::probe_media(location)?;
        Ok(Arc::new(ProbedAsset::new(location.clone(), probe)))
    }
}

/// A span of a source asset placed on a composition track.
#[derive(Clone, Debug)]
pub struct TrackSegment {
    /// Source asset.
    pub asset: Arc<dyn SourceAsset>,
    /// Range in source time.
    pub source: TimeRange,
    /// Composition time at which `source.start` plays.
    pub at: f64,
}

impl TrackSegment {
    /// Range covered in composition time.
    pub fn target(&self) -> TimeRange {
        TimeRange::new(self.at, self.source.duration)
    }
}

/// One track of a [`Composition`].
#[derive(Clone, Debug)]
pub struct CompositionTrack {
    /// Track id, unique within its composition.
    pub id: TrackId,
    /// Media type.
    pub kind: MediaKind,
    /// Transform copied from the source track.
    pub preferred_transform: Affine,
    /// Inserted segments, in insertion order.
    pub segments: Vec<TrackSegment>,
}

impl CompositionTrack {
    /// Empty track.
    pub fn new(id: TrackId, kind: MediaKind) -> Self {
        Self {
            id,
            kind,
            preferred_transform: Affine::IDENTITY,
            segments: Vec::new(),
        }
    }

    /// Insert `range` of `source` (a track of `asset`) at composition time `at`.
    pub fn insert_time_range(
        &mut self,
        range: TimeRange,
        asset: &Arc<dyn SourceAsset>,
        source: &SourceTrack,
        at: f64,
    ) -> CompositorResult<()> {
        if source.kind != self.kind {
            return Err(CompositorError::track_insertion(format!(
                "cannot insert a {:?} track into a {:?} track",
                source.kind, self.kind
            )));
        }
        if !source.readable {
            return Err(CompositorError::track_insertion(format!(
                "{:?} track of {} is not readable",
                source.kind,
                asset.location()
            )));
        }
        if !range.is_playable() || range.start < 0.0 || !at.is_finite() || at < 0.0 {
            return Err(CompositorError::track_insertion(format!(
                "invalid time range [{}, +{}) at {at}",
                range.start, range.duration
            )));
        }
        self.segments.push(TrackSegment {
            asset: Arc::clone(asset),
            source: range,
            at,
        });
        Ok(())
    }

    /// End of the last segment in composition time.
    pub fn duration(&self) -> f64 {
        self.segments
            .iter()
            .map(|s| s.target().end())
            .fold(0.0, f64::max)
    }

    /// Segment playing at composition time `t` and the matching source time.
    pub fn segment_at(&self, t: f64) -> Option<(&TrackSegment, f64)> {
        self.segments
            .iter()
            .rev()
            .find(|s| s.target().contains(t))
            .map(|s| (s, s.source.start + (t - s.at)))
    }
}

/// Editable set of tracks.
#[derive(Clone, Debug, Default)]
pub struct Composition {
    /// Tracks in creation order.
    pub tracks: Vec<CompositionTrack>,
}

impl Composition {
    /// Empty composition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty track with the next free id.
    pub fn add_track(&mut self, kind: MediaKind) -> &mut CompositionTrack {
        let next = self.tracks.iter().map(|t| t.id.0).max().unwrap_or(0) + 1;
        self.add_track_with_id(TrackId(next), kind)
    }

    /// Add (or replace) a track with an explicit id.
    pub fn add_track_with_id(&mut self, id: TrackId, kind: MediaKind) -> &mut CompositionTrack {
        self.tracks.retain(|t| t.id != id);
        self.tracks.push(CompositionTrack::new(id, kind));
        let last = self.tracks.len() - 1;
        &mut self.tracks[last]
    }

    /// Remove a track by id.
    pub fn remove_track(&mut self, id: TrackId) {
        self.tracks.retain(|t| t.id != id);
    }

    /// Track lookup by id.
    pub fn track(&self, id: TrackId) -> Option<&CompositionTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// First video track.
    pub fn video_track(&self) -> Option<&CompositionTrack> {
        self.tracks.iter().find(|t| t.kind == MediaKind::Video)
    }

    /// First audio track.
    pub fn audio_track(&self) -> Option<&CompositionTrack> {
        self.tracks.iter().find(|t| t.kind == MediaKind::Audio)
    }

    /// All tracks of `kind`.
    pub fn tracks_of(&self, kind: MediaKind) -> impl Iterator<Item = &CompositionTrack> {
        self.tracks.iter().filter(move |t| t.kind == kind)
    }

    /// Latest segment end over all tracks.
    pub fn duration(&self) -> f64 {
        self.tracks
            .iter()
            .map(CompositionTrack::duration)
            .fold(0.0, f64::max)
    }
}

/// Per-key assembly result: the opened asset (if any) and its composition.
#[derive(Debug)]
pub struct SourceComposition {
    /// Element key this composition was built for.
    pub key: String,
    /// Opened asset; `None` when resolution failed.
    pub asset: Option<Arc<dyn SourceAsset>>,
    /// Composition with zero, one or two tracks spanning the asset.
    pub composition: Composition,
}

impl SourceComposition {
    fn unavailable(key: &str) -> Self {
        Self {
            key: key.to_owned(),
            asset: None,
            composition: Composition::new(),
        }
    }

    /// Video track, if one could be inserted.
    pub fn video_track(&self) -> Option<&CompositionTrack> {
        self.composition.video_track()
    }

    /// Audio track, if one could be inserted.
    pub fn audio_track(&self) -> Option<&CompositionTrack> {
        self.composition.audio_track()
    }
}

type AssemblyCell = Arc<OnceLock<Arc<SourceComposition>>>;

/// Builds and memoizes one [`SourceComposition`] per element key.
///
/// The first `resolve` for a key wins: later calls return the cached result whatever `path` they
/// pass. Concurrent first calls for one key open the asset once.
pub struct SourceTrackAssembler {
    base: BaseLocation,
    opener: Arc<dyn AssetOpener>,
    cache: Mutex<HashMap<String, AssemblyCell>>,
}

impl std::fmt::Debug for SourceTrackAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceTrackAssembler")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl SourceTrackAssembler {
    /// Assembler resolving relative paths against `base`.
    pub fn new(base: BaseLocation, opener: Arc<dyn AssetOpener>) -> Self {
        Self {
            base,
            opener,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Base location for relative paths.
    pub fn base(&self) -> &BaseLocation {
        &self.base
    }

    /// Cached composition for `key`, or build it from `path`.
    pub fn resolve(&self, key: &str, path: &str) -> Arc<SourceComposition> {
        let cell = {
            let mut map = match self.cache.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            Arc::clone(map.entry(key.to_owned()).or_default())
        };
        Arc::clone(cell.get_or_init(|| Arc::new(self.assemble(key, path))))
    }

    /// Already-built composition for `key`.
    pub fn cached(&self, key: &str) -> Option<Arc<SourceComposition>> {
        let map = match self.cache.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.get(key).and_then(|c| c.get().cloned())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn assemble(&self, key: &str, path: &str) -> SourceComposition {
        let location = ResourceLocation::resolve(path, &self.base);
        let asset = match self.opener.open(&location) {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(key, %location, error = %e, "source asset unavailable");
                return SourceComposition::unavailable(key);
            }
        };

        let full = TimeRange::new(0.0, asset.duration_secs());
        let mut composition = Composition::new();
        for kind in [MediaKind::Video, MediaKind::Audio] {
            let Some(source) = asset.track(kind) else {
                continue;
            };
            let track = composition.add_track(kind);
            if kind == MediaKind::Video {
                track.preferred_transform = source.preferred_transform;
            }
            if let Err(e) = track.insert_time_range(full, &asset, &source, 0.0) {
                tracing::warn!(key, ?kind, error = %e, "omitting source track");
                let id = track.id;
                composition.remove_track(id);
            }
        }

        tracing::debug!(key, tracks = composition.tracks.len(), "assembled source");
        SourceComposition {
            key: key.to_owned(),
            asset: Some(asset),
            composition,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/assembler.rs"]
mod tests;
