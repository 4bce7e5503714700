//! Draw-call recorder, used to inspect what the scene renderer asks of a surface.

use crate::foundation::core::{Point, Rect};
use crate::foundation::error::CompositorResult;
use crate::geometry::color::Rgba;
use crate::render::orientation::OrientedImage;
use crate::render::surface::{DrawSurface, GradientStop};
use crate::render::text::TextBlock;

/// One recorded surface call.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    /// `save`.
    Save,
    /// `restore`.
    Restore,
    /// `set_alpha` with the requested factor.
    SetAlpha(f64),
    /// `clip_rect`.
    ClipRect(Rect),
    /// `fill_rect`.
    FillRect {
        /// Device-space rectangle.
        rect: Rect,
        /// Fill color.
        color: Rgba,
    },
    /// `fill_rounded_rect`.
    FillRoundedRect {
        /// Device-space rectangle.
        rect: Rect,
        /// Corner radius.
        radius: f64,
        /// Fill color.
        color: Rgba,
    },
    /// `stroke_rounded_rect`.
    StrokeRoundedRect {
        /// Device-space rectangle.
        rect: Rect,
        /// Corner radius.
        radius: f64,
        /// Stroke width.
        width: f64,
        /// Stroke color.
        color: Rgba,
    },
    /// `fill_linear_gradient`.
    LinearGradient {
        /// Filled rectangle.
        rect: Rect,
        /// Axis start.
        start: Point,
        /// Axis end.
        end: Point,
        /// Color stops.
        stops: Vec<GradientStop>,
    },
    /// `draw_image`.
    Image {
        /// Destination rectangle.
        dest: Rect,
        /// Oriented extent of the source.
        extent: Rect,
    },
    /// `draw_text`.
    Text {
        /// Laid-out string.
        text: String,
        /// Frame rectangle.
        rect: Rect,
    },
}

/// [`DrawSurface`] that records calls instead of drawing.
#[derive(Clone, Debug)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    /// Calls in submission order.
    pub ops: Vec<DrawOp>,
}

impl RecordingSurface {
    /// Empty recorder with the given device size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    /// Calls that put pixels on the surface (everything except state changes).
    pub fn draws(&self) -> impl Iterator<Item = &DrawOp> {
        self.ops.iter().filter(|op| {
            !matches!(
                op,
                DrawOp::Save | DrawOp::Restore | DrawOp::SetAlpha(_) | DrawOp::ClipRect(_)
            )
        })
    }
}

impl DrawSurface for RecordingSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn save(&mut self) {
        self.ops.push(DrawOp::Save);
    }

    fn restore(&mut self) {
        self.ops.push(DrawOp::Restore);
    }

    fn set_alpha(&mut self, alpha: f64) {
        self.ops.push(DrawOp::SetAlpha(alpha));
    }

    fn clip_rect(&mut self, rect: Rect) {
        self.ops.push(DrawOp::ClipRect(rect));
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        self.ops.push(DrawOp::FillRect { rect, color });
    }

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f64, color: Rgba) {
        self.ops.push(DrawOp::FillRoundedRect {
            rect,
            radius,
            color,
        });
    }

    fn stroke_rounded_rect(&mut self, rect: Rect, radius: f64, width: f64, color: Rgba) {
        self.ops.push(DrawOp::StrokeRoundedRect {
            rect,
            radius,
            width,
            color,
        });
    }

    fn fill_linear_gradient(
        &mut self,
        rect: Rect,
        start: Point,
        end: Point,
        stops: &[GradientStop],
    ) {
        self.ops.push(DrawOp::LinearGradient {
            rect,
            start,
            end,
            stops: stops.to_vec(),
        });
    }

    fn draw_image(&mut self, image: &OrientedImage, dest: Rect) -> CompositorResult<()> {
        self.ops.push(DrawOp::Image {
            dest,
            extent: image.extent(),
        });
        Ok(())
    }

    fn draw_text(&mut self, block: &TextBlock, rect: Rect) -> CompositorResult<()> {
        self.ops.push(DrawOp::Text {
            text: block.text.clone(),
            rect,
        });
        Ok(())
    }
}
