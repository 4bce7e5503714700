use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::Context;

use crate::foundation::core::{Canvas, Fps, FrameIndex, FrameRange};
use crate::foundation::error::{CompositorError, CompositorResult};
use crate::scene::element::{Element, ElementInstance, ElementKind};
use crate::scene::props::FlatProps;

/// Declarative overlay scene, as stored in `composition.json`.
///
/// Properties are already resolved per frame: an element carries base `props` and an optional
/// `frames` list whose entry `i` overlays the props of frame `start + i`.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub fps: Fps,
    /// Total duration in frames.
    pub duration: u64,
    /// Background color as hex; black when absent.
    #[serde(default)]
    pub background: Option<String>,
    /// Logical file key to path (URI, absolute, or relative to the data directory).
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    /// Font family name to font file path.
    #[serde(default)]
    pub fonts: BTreeMap<String, String>,
    /// Family used when an element's `fontName` has no registered font.
    #[serde(default)]
    pub default_font: Option<String>,
    /// Elements, bottommost first.
    #[serde(default)]
    pub elements: Vec<ManifestElement>,
}

/// One element entry of the manifest.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ManifestElement {
    /// Element type string (`image`, `rect`, `gradient`, `video`, `frame`, `text`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Unique element name.
    pub name: String,
    /// Logical file key into [`Manifest::files`].
    #[serde(default)]
    pub file: Option<String>,
    /// First active frame.
    #[serde(default)]
    pub start: u64,
    /// Exclusive end frame; the manifest duration when absent.
    #[serde(default)]
    pub end: Option<u64>,
    /// Base props.
    #[serde(default)]
    pub props: FlatProps,
    /// Per-frame overlays starting at `start`.
    #[serde(default)]
    pub frames: Vec<FlatProps>,
}

impl ManifestElement {
    /// Props resolved for `frame` (base props plus the frame overlay, if any).
    pub fn props_at(&self, frame: FrameIndex) -> FlatProps {
        let overlay = frame
            .0
            .checked_sub(self.start)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| self.frames.get(i));
        match overlay {
            Some(top) => self.props.overlay(top),
            None => self.props.clone(),
        }
    }
}

impl Manifest {
    /// Parse and validate a manifest from a JSON string.
    pub fn from_json_str(s: &str) -> CompositorResult<Self> {
        let m: Self = serde_json::from_str(s)
            .map_err(|e| CompositorError::validation(format!("manifest json: {e}")))?;
        m.validate()?;
        Ok(m)
    }

    /// Parse and validate a manifest from a reader.
    pub fn from_reader(r: impl std::io::Read) -> CompositorResult<Self> {
        let m: Self = serde_json::from_reader(r)
            .map_err(|e| CompositorError::validation(format!("manifest json: {e}")))?;
        m.validate()?;
        Ok(m)
    }

    /// Read, parse and validate a manifest file.
    pub fn from_path(path: &Path) -> CompositorResult<Self> {
        let f = std::fs::File::open(path)
            .with_context(|| format!("open manifest '{}'", path.display()))?;
        Self::from_reader(std::io::BufReader::new(f))
    }

    /// Check structural invariants.
    pub fn validate(&self) -> CompositorResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CompositorError::validation("width/height must be > 0"));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(CompositorError::validation("fps must have num>0 and den>0"));
        }
        if self.duration == 0 {
            return Err(CompositorError::validation("duration must be > 0 frames"));
        }

        let mut names = HashSet::new();
        for el in &self.elements {
            if el.name.trim().is_empty() {
                return Err(CompositorError::validation("element name must be non-empty"));
            }
            if !names.insert(el.name.as_str()) {
                return Err(CompositorError::validation(format!(
                    "duplicate element name '{}'",
                    el.name
                )));
            }
            let end = el.end.unwrap_or(self.duration);
            if el.start > end {
                return Err(CompositorError::validation(format!(
                    "element '{}' has start > end",
                    el.name
                )));
            }
            if let Some(file) = &el.file
                && !self.files.contains_key(file)
            {
                return Err(CompositorError::validation(format!(
                    "element '{}' references missing file key '{file}'",
                    el.name
                )));
            }
        }
        if let Some(family) = &self.default_font
            && !self.fonts.contains_key(family)
        {
            return Err(CompositorError::validation(format!(
                "defaultFont '{family}' is not in fonts"
            )));
        }
        Ok(())
    }

    /// Output canvas.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// Full timeline range `[0, duration)`.
    pub fn range(&self) -> FrameRange {
        FrameRange {
            start: FrameIndex(0),
            end: FrameIndex(self.duration),
        }
    }

    /// Active range of an element.
    pub fn element_range(&self, el: &ManifestElement) -> FrameRange {
        let end = el.end.unwrap_or(self.duration);
        FrameRange {
            start: FrameIndex(el.start.min(end)),
            end: FrameIndex(end),
        }
    }

    /// Element lookup by name.
    pub fn element(&self, name: &str) -> Option<&ManifestElement> {
        self.elements.iter().find(|e| e.name == name)
    }

    /// Ordered `(type, element, props)` triples active at `frame`.
    pub fn elements_at(&self, frame: FrameIndex) -> Vec<ElementInstance> {
        self.elements
            .iter()
            .filter(|el| self.element_range(el).contains(frame))
            .map(|el| {
                ElementInstance::new(
                    ElementKind::parse(&el.kind),
                    Element {
                        name: el.name.clone(),
                        file: el.file.clone(),
                    },
                    el.props_at(frame),
                )
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/model.rs"]
mod tests;
