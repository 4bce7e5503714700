use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::assets::image::DecodedImage;
use crate::assets::locate::BaseLocation;
use crate::foundation::core::{Canvas, Fps, FrameIndex, TrackId};
use crate::geometry::color::Rgba;
use crate::scene::element::ElementInstance;

/// Read-only view of the manifest and its track bindings, shared by all render workers.
pub trait TrackModel: Send + Sync {
    /// Output canvas.
    fn canvas(&self) -> Canvas;

    /// Output frame rate.
    fn fps(&self) -> Fps;

    /// Ordered `(type, element, props)` triples for `frame`, bottommost first.
    fn elements_at(&self, frame: FrameIndex) -> Vec<ElementInstance>;

    /// Composition track carrying a `video` element's frames.
    fn video_track_id(&self, element_name: &str) -> Option<TrackId>;

    /// Pre-rendered still for a `frame` element.
    fn still_image(&self, element_name: &str) -> Option<Arc<DecodedImage>>;

    /// Decoded image for `key`, running `loader` on first access only.
    fn cached_image(
        &self,
        key: &str,
        loader: &dyn Fn() -> Option<Arc<DecodedImage>>,
    ) -> Option<Arc<DecodedImage>>;

    /// Path registered for a logical file key.
    fn file_path(&self, key: &str) -> Option<String>;

    /// Base location for relative paths.
    fn base_location(&self) -> BaseLocation;

    /// Font file bytes for a family.
    fn font_bytes(&self, family: &str) -> Option<Arc<Vec<u8>>>;

    /// Family to fall back to when a requested one has no font.
    fn default_font_family(&self) -> Option<String> {
        None
    }

    /// Background override; the renderer default applies when `None`.
    fn background(&self) -> Option<Rgba> {
        None
    }
}

type ImageCell = Arc<OnceLock<Option<Arc<DecodedImage>>>>;

/// Keyed decoded-image cache with single initialization per key.
///
/// Failed loads are cached as well, so a missing file is only looked up once.
#[derive(Debug, Default)]
pub struct ImageCache {
    cells: Mutex<HashMap<String, ImageCell>>,
}

impl ImageCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached image for `key`, or the result of `loader`.
    pub fn get_or_load(
        &self,
        key: &str,
        loader: &dyn Fn() -> Option<Arc<DecodedImage>>,
    ) -> Option<Arc<DecodedImage>> {
        let cell = {
            let mut map = match self.cells.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            Arc::clone(map.entry(key.to_owned()).or_default())
        };
        cell.get_or_init(|| {
            let loaded = loader();
            if loaded.is_none() {
                tracing::debug!(key, "image cache miss resolved to nothing");
            }
            loaded
        })
        .clone()
    }

    /// Number of keys seen so far.
    pub fn len(&self) -> usize {
        match self.cells.lock() {
            Ok(g) => g.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Return `true` when nothing was requested yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
