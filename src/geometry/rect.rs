//! Manifest rectangles, resize placement and the manifest→device coordinate flip.

use std::str::FromStr;

use crate::foundation::core::{Point, Rect};
use crate::foundation::error::CompositorError;
use crate::scene::props::FlatProps;

/// Rectangle in manifest space (top-left origin, Y down).
///
/// Deliberately not convertible to [`Rect`] except through [`CoordinateFlip::to_device`].
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct ManifestRect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl ManifestRect {
    /// Construct from origin and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Same rectangle moved vertically by `dy` manifest units.
    pub fn offset_y(self, dy: f64) -> Self {
        Self {
            y: self.y + dy,
            ..self
        }
    }

    /// Same rectangle grown by `d` on every side.
    pub fn inflate(self, d: f64) -> Self {
        Self::new(
            self.x - d,
            self.y - d,
            self.width + 2.0 * d,
            self.height + 2.0 * d,
        )
    }
}

/// Read `{modifier}x`, `{modifier}y`, `{modifier}width`, `{modifier}height`, each defaulting to `0`.
pub fn rect_from_props(props: &FlatProps, modifier: Option<&str>) -> ManifestRect {
    let prefix = modifier.unwrap_or("");
    let get = |name: &str| props.number_or(&format!("{prefix}{name}"), 0.0);
    ManifestRect::new(get("x"), get("y"), get("width"), get("height"))
}

/// Maps manifest space onto device space (bottom-left origin, Y up) of a given height.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateFlip {
    /// Device height in units.
    pub height: f64,
}

impl CoordinateFlip {
    /// Flip for a device of the given height.
    pub fn new(height: f64) -> Self {
        Self { height }
    }

    /// `(x, y, w, h)` → `(x, height - y - h, w, h)`.
    pub fn to_device(self, r: ManifestRect) -> Rect {
        let y0 = self.height - r.y - r.height;
        Rect::new(r.x, y0, r.x + r.width, y0 + r.height)
    }

    /// `(x, y)` → `(x, height - y)`.
    pub fn point(self, x: f64, y: f64) -> Point {
        Point::new(x, self.height - y)
    }
}

/// How a source image is placed inside a target rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ResizeMode {
    /// Aspect-fill; overflow is clipped by the draw primitive.
    Cover,
    /// Aspect-fit, centered.
    Contain,
    /// Stretch to the target.
    #[default]
    Fill,
}

impl FromStr for ResizeMode {
    type Err = CompositorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cover" => Ok(Self::Cover),
            "contain" => Ok(Self::Contain),
            "fill" => Ok(Self::Fill),
            other => Err(CompositorError::invalid_property(format!(
                "unknown resize mode \"{other}\""
            ))),
        }
    }
}

/// Placement of a `source_w`×`source_h` image inside `target` for `mode`.
///
/// Degenerate source or target sizes yield `target`.
pub fn resize_rect(source_w: f64, source_h: f64, mode: ResizeMode, target: Rect) -> Rect {
    let (tw, th) = (target.width(), target.height());
    let degenerate = |v: f64| !v.is_finite() || v <= 0.0;
    if degenerate(source_w) || degenerate(source_h) || degenerate(tw) || degenerate(th) {
        return target;
    }

    let sx = tw / source_w;
    let sy = th / source_h;
    let scale = match mode {
        ResizeMode::Fill => return target,
        ResizeMode::Contain => sx.min(sy),
        ResizeMode::Cover => sx.max(sy),
    };

    let w = source_w * scale;
    let h = source_h * scale;
    let c = target.center();
    Rect::new(c.x - w / 2.0, c.y - h / 2.0, c.x + w / 2.0, c.y + h / 2.0)
}

/// A resolved image placement: mode, device-space target and opacity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawSpec {
    /// Resize mode.
    pub resize: ResizeMode,
    /// Target rectangle in device space.
    pub target: Rect,
    /// Opacity in `[0, 1]`.
    pub alpha: f64,
}

impl DrawSpec {
    /// Construct a draw spec, clamping `alpha`.
    pub fn new(resize: ResizeMode, target: Rect, alpha: f64) -> Self {
        let alpha = if alpha.is_finite() {
            alpha.clamp(0.0, 1.0)
        } else {
            1.0
        };
        Self {
            resize,
            target,
            alpha,
        }
    }

    /// Where a `source_w`×`source_h` image lands.
    pub fn placement(&self, source_w: f64, source_h: f64) -> Rect {
        resize_rect(source_w, source_h, self.resize, self.target)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/geometry/rect.rs"]
mod tests;
