//! Concrete track model: a loaded manifest plus its caches and timeline.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use crate::assets::assembler::{
    AssetOpener, Composition, FfprobeOpener, MediaKind, SourceComposition, SourceTrackAssembler,
};
use crate::assets::image::DecodedImage;
use crate::assets::locate::{BaseLocation, ResourceLocation};
use crate::compositor::instruction::{
    LayerInstruction, VideoComposition, VideoCompositionInstruction,
};
use crate::foundation::core::{Canvas, Fps, FrameIndex, TimeRange, TrackId};
use crate::foundation::error::CompositorResult;
use crate::geometry::color::{Rgba, color_or};
use crate::scene::element::{ElementInstance, ElementKind};
use crate::scene::model::{Manifest, ManifestElement};
use crate::scene::track_model::{ImageCache, TrackModel};

/// Manifest file name inside a data directory.
pub const MANIFEST_FILE: &str = "composition.json";

type FontCell = Arc<OnceLock<Option<Arc<Vec<u8>>>>>;

/// Owns a [`Manifest`] and everything resolved from it for one session.
///
/// Video elements with a file get one composition track each, numbered from 1 in manifest order.
pub struct CompositionManager {
    manifest: Manifest,
    base: BaseLocation,
    background: Option<Rgba>,
    images: ImageCache,
    fonts: Mutex<HashMap<String, FontCell>>,
    assembler: SourceTrackAssembler,
    video_tracks: BTreeMap<String, TrackId>,
}

impl std::fmt::Debug for CompositionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositionManager")
            .field("canvas", &self.manifest.canvas())
            .field("elements", &self.manifest.elements.len())
            .field("base", &self.base)
            .field("video_tracks", &self.video_tracks)
            .finish_non_exhaustive()
    }
}

impl CompositionManager {
    /// Load `dir/composition.json`, resolving relative paths against `dir` and probing with
    /// `ffprobe`.
    pub fn load(dir: &Path) -> CompositorResult<Self> {
        let manifest = Manifest::from_path(&dir.join(MANIFEST_FILE))?;
        Self::from_manifest(manifest, BaseLocation::from(dir), Arc::new(FfprobeOpener))
    }

    /// Wrap an already-parsed manifest.
    pub fn from_manifest(
        manifest: Manifest,
        base: BaseLocation,
        opener: Arc<dyn AssetOpener>,
    ) -> CompositorResult<Self> {
        manifest.validate()?;

        let background = manifest
            .background
            .as_deref()
            .map(|hex| color_or(hex, 1.0, Rgba::BLACK));

        let video_tracks = manifest
            .elements
            .iter()
            .filter(|el| ElementKind::parse(&el.kind) == ElementKind::Video && el.file.is_some())
            .zip(1u32..)
            .map(|(el, id)| (el.name.clone(), TrackId(id)))
            .collect();

        Ok(Self {
            assembler: SourceTrackAssembler::new(base.clone(), opener),
            manifest,
            base,
            background,
            images: ImageCache::new(),
            fonts: Mutex::new(HashMap::new()),
            video_tracks,
        })
    }

    /// The manifest.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Source track assembler shared by timeline queries.
    pub fn assembler(&self) -> &SourceTrackAssembler {
        &self.assembler
    }

    /// `(element name, track id)` for every video element bound to a track.
    pub fn video_tracks(&self) -> impl Iterator<Item = (&str, TrackId)> {
        self.video_tracks.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Assembled source for an element with a file reference.
    pub fn source(&self, element_name: &str) -> Option<Arc<SourceComposition>> {
        let el = self.manifest.element(element_name)?;
        let path = self.element_path(el)?;
        Some(self.assembler.resolve(&el.name, &path))
    }

    fn element_path(&self, el: &ManifestElement) -> Option<String> {
        el.file.as_ref().and_then(|key| self.manifest.files.get(key)).cloned()
    }

    fn frame_to_secs(&self, frame: u64) -> f64 {
        self.manifest.fps.frame_to_secs(FrameIndex(frame))
    }

    /// Timeline tracks: each bound video element's source placed over its active range.
    ///
    /// Elements whose source has no usable video track get no track. Audio tracks follow the
    /// video tracks.
    pub fn composition(&self) -> Composition {
        let mut composition = Composition::new();
        let mut audio = Vec::new();

        for (name, id) in &self.video_tracks {
            let Some(el) = self.manifest.element(name) else {
                continue;
            };
            let Some(source) = self.source(name) else {
                continue;
            };
            let Some(asset) = source.asset.as_ref() else {
                continue;
            };

            let range = self.manifest.element_range(el);
            let at = self.frame_to_secs(range.start.0);
            let span = self.frame_to_secs(range.end.0) - at;
            let clip = TimeRange::new(0.0, asset.duration_secs().min(span));

            if let (Some(video), Some(track)) =
                (source.video_track(), asset.track(MediaKind::Video))
            {
                let added = composition.add_track_with_id(*id, MediaKind::Video);
                added.preferred_transform = video.preferred_transform;
                if let Err(e) = added.insert_time_range(clip, asset, &track, at) {
                    tracing::warn!(
                        element = %name,
                        error = %e,
                        "video element left off the timeline"
                    );
                    composition.remove_track(*id);
                }
            }
            if source.audio_track().is_some()
                && let Some(track) = asset.track(MediaKind::Audio)
            {
                audio.push((name.clone(), Arc::clone(asset), track, clip, at));
            }
        }

        for (name, asset, track, clip, at) in audio {
            let added = composition.add_track(MediaKind::Audio);
            if let Err(e) = added.insert_time_range(clip, &asset, &track, at) {
                tracing::debug!(element = %name, error = %e, "audio left off the timeline");
                let id = added.id;
                composition.remove_track(id);
            }
        }
        composition
    }

    /// Instructions binding timeline video tracks to their preferred transforms.
    pub fn video_composition(&self) -> VideoComposition {
        let composition = self.composition();
        let duration = self.frame_to_secs(self.manifest.duration);

        let layers = composition
            .tracks_of(MediaKind::Video)
            .map(|track| {
                let mut layer = LayerInstruction::new(track.id);
                let start = track.segments.first().map(|s| s.at).unwrap_or(0.0);
                layer.set_transform(track.preferred_transform, start);
                layer
            })
            .collect();

        VideoComposition {
            canvas: self.manifest.canvas(),
            fps: self.manifest.fps,
            instructions: vec![VideoCompositionInstruction {
                range: TimeRange::new(0.0, duration),
                layers,
            }],
        }
    }

    fn load_file(&self, key: &str) -> Option<Arc<DecodedImage>> {
        let path = self.manifest.files.get(key)?;
        let location = ResourceLocation::resolve(path, &self.base);
        match location.read_bytes().and_then(|b| DecodedImage::decode(&b)) {
            Ok(img) => Some(Arc::new(img)),
            Err(e) => {
                tracing::warn!(key, %location, error = %e, "image load failed");
                None
            }
        }
    }

    fn load_font(&self, family: &str) -> Option<Arc<Vec<u8>>> {
        let path = self.manifest.fonts.get(family)?;
        let location = ResourceLocation::resolve(path, &self.base);
        match location.read_bytes() {
            Ok(bytes) => Some(Arc::new(bytes)),
            Err(e) => {
                tracing::warn!(family, %location, error = %e, "font load failed");
                None
            }
        }
    }
}

impl TrackModel for CompositionManager {
    fn canvas(&self) -> Canvas {
        self.manifest.canvas()
    }

    fn fps(&self) -> Fps {
        self.manifest.fps
    }

    fn elements_at(&self, frame: FrameIndex) -> Vec<ElementInstance> {
        self.manifest.elements_at(frame)
    }

    fn video_track_id(&self, element_name: &str) -> Option<TrackId> {
        self.video_tracks.get(element_name).copied()
    }

    fn still_image(&self, element_name: &str) -> Option<Arc<DecodedImage>> {
        let el = self.manifest.element(element_name)?;
        let key = el.file.as_deref()?;
        self.images
            .get_or_load(&format!("frame:{element_name}"), &|| self.load_file(key))
    }

    fn cached_image(
        &self,
        key: &str,
        loader: &dyn Fn() -> Option<Arc<DecodedImage>>,
    ) -> Option<Arc<DecodedImage>> {
        self.images.get_or_load(key, loader)
    }

    fn file_path(&self, key: &str) -> Option<String> {
        self.manifest.files.get(key).cloned()
    }

    fn base_location(&self) -> BaseLocation {
        self.base.clone()
    }

    fn font_bytes(&self, family: &str) -> Option<Arc<Vec<u8>>> {
        let cell = {
            let mut map = match self.fonts.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            Arc::clone(map.entry(family.to_owned()).or_default())
        };
        cell.get_or_init(|| self.load_font(family)).clone()
    }

    fn default_font_family(&self) -> Option<String> {
        self.manifest.default_font.clone()
    }

    fn background(&self) -> Option<Rgba> {
        self.background
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/manager.rs"]
mod tests;
