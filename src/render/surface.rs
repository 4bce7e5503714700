use crate::foundation::core::{Point, Rect};
use crate::foundation::error::CompositorResult;
use crate::geometry::color::Rgba;
use crate::render::orientation::OrientedImage;
use crate::render::text::TextBlock;

/// One color stop of a linear gradient.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientStop {
    /// Position along the gradient axis in `[0, 1]`.
    pub offset: f64,
    /// Color at `offset`.
    pub color: Rgba,
}

/// 2D drawing surface in device space (bottom-left origin, Y up).
///
/// State set by [`DrawSurface::set_alpha`] and [`DrawSurface::clip_rect`] lasts until the matching
/// [`DrawSurface::restore`]. Alpha multiplies into every primitive drawn after it.
pub trait DrawSurface {
    /// Surface width in pixels.
    fn width(&self) -> u32;
    /// Surface height in pixels.
    fn height(&self) -> u32;

    /// Push the graphics state.
    fn save(&mut self);
    /// Pop the graphics state pushed by the matching [`DrawSurface::save`].
    fn restore(&mut self);
    /// Multiply the current alpha by `alpha`.
    fn set_alpha(&mut self, alpha: f64);
    /// Intersect the current clip with `rect`.
    fn clip_rect(&mut self, rect: Rect);

    /// Fill an axis-aligned rectangle.
    fn fill_rect(&mut self, rect: Rect, color: Rgba);
    /// Fill a rounded rectangle.
    fn fill_rounded_rect(&mut self, rect: Rect, radius: f64, color: Rgba);
    /// Stroke a rounded rectangle centered on its outline.
    fn stroke_rounded_rect(&mut self, rect: Rect, radius: f64, width: f64, color: Rgba);
    /// Fill `rect` with a linear gradient running from `start` to `end`; no extension past the ends.
    fn fill_linear_gradient(
        &mut self,
        rect: Rect,
        start: Point,
        end: Point,
        stops: &[GradientStop],
    );

    /// Draw an oriented image so that its extent maps onto `dest`.
    fn draw_image(&mut self, image: &OrientedImage, dest: Rect) -> CompositorResult<()>;
    /// Draw a laid-out text block with its first line at the top of `rect`.
    fn draw_text(&mut self, block: &TextBlock, rect: Rect) -> CompositorResult<()>;
}
