use std::fmt;

use crate::scene::props::FlatProps;

/// Closed set of element types the renderer knows how to draw.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Decoded still image looked up by `imageKey`.
    Image,
    /// Filled (optionally stroked) rounded rectangle.
    Rect,
    /// Vertical three-stop gradient band.
    Gradient,
    /// Frame of a source video track.
    Video,
    /// Pre-rendered still owned by the track model.
    Frame,
    /// Laid-out text block.
    Text,
    /// Anything else; logged and skipped.
    Unsupported(String),
}

impl ElementKind {
    /// Map a manifest type string to a kind. Matching is case-insensitive.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Self::Image,
            "rect" => Self::Rect,
            "gradient" => Self::Gradient,
            "video" => Self::Video,
            "frame" => Self::Frame,
            "text" => Self::Text,
            _ => Self::Unsupported(s.to_owned()),
        }
    }

    /// Stable lowercase name, used in logs.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Image => "image",
            Self::Rect => "rect",
            Self::Gradient => "gradient",
            Self::Video => "video",
            Self::Frame => "frame",
            Self::Text => "text",
            Self::Unsupported(s) => s,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named reference to a manifest element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    /// Element name, unique within the manifest.
    pub name: String,
    /// Logical file key, if the element references one.
    pub file: Option<String>,
}

impl Element {
    /// Element without a file reference.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: None,
        }
    }
}

/// One `(type, element, props)` triple, as resolved for a single output frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ElementInstance {
    /// Element type.
    pub kind: ElementKind,
    /// The element itself.
    pub element: Element,
    /// Flat props for this frame.
    pub props: FlatProps,
}

impl ElementInstance {
    /// Convenience constructor.
    pub fn new(kind: ElementKind, element: Element, props: FlatProps) -> Self {
        Self {
            kind,
            element,
            props,
        }
    }
}
