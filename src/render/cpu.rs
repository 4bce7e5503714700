//! CPU drawing surface backed by `vello_cpu`.

use std::sync::Arc;

use vello_cpu::kurbo::Shape;

use crate::compositor::request::PixelBuffer;
use crate::foundation::core::{Affine, PixelFormat, Point, Rect};
use crate::foundation::error::{CompositorError, CompositorResult};
use crate::foundation::math::{mul_div255_u8, swap_red_blue};
use crate::geometry::color::Rgba;
use crate::render::blur::{blur_rgba8_premul, shadow_kernel};
use crate::render::orientation::OrientedImage;
use crate::render::surface::{DrawSurface, GradientStop};
use crate::render::text::{TextBlock, TextShadow};

#[derive(Clone, Copy, Debug)]
struct GState {
    alpha: f64,
    clip_layers: usize,
}

impl Default for GState {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            clip_layers: 0,
        }
    }
}

/// [`DrawSurface`] rasterizing into an RGBA pixmap.
///
/// Device space is Y-up; the surface maps it onto pixmap rows (row 0 on top) itself.
pub struct CpuSurface {
    width: u16,
    height: u16,
    ctx: vello_cpu::RenderContext,
    saved: Vec<GState>,
    current: GState,
}

impl std::fmt::Debug for CpuSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuSurface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("depth", &self.saved.len())
            .finish_non_exhaustive()
    }
}

impl CpuSurface {
    /// Blank (transparent) surface.
    pub fn new(width: u32, height: u32) -> CompositorResult<Self> {
        let w: u16 = width
            .try_into()
            .map_err(|_| CompositorError::validation("surface width exceeds u16"))?;
        let h: u16 = height
            .try_into()
            .map_err(|_| CompositorError::validation("surface height exceeds u16"))?;
        if w == 0 || h == 0 {
            return Err(CompositorError::validation("surface width/height must be > 0"));
        }
        Ok(Self {
            width: w,
            height: h,
            ctx: vello_cpu::RenderContext::new(w, h),
            saved: Vec::new(),
            current: GState::default(),
        })
    }

    fn device_to_pixmap(&self) -> Affine {
        Affine::new([1.0, 0.0, 0.0, -1.0, 0.0, f64::from(self.height)])
    }

    fn with_opacity(&mut self, draw: impl FnOnce(&mut vello_cpu::RenderContext)) {
        let alpha = self.current.alpha;
        if alpha <= 0.0 {
            return;
        }
        self.ctx
            .set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        if alpha < 1.0 {
            self.ctx.push_opacity_layer(alpha as f32);
        }
        draw(&mut self.ctx);
        if alpha < 1.0 {
            self.ctx.pop_layer();
        }
    }

    /// Rasterize everything drawn so far into premultiplied RGBA8 rows (top row first).
    ///
    /// Unbalanced `save` calls are closed first.
    pub fn render_rgba8_premul(&mut self) -> Vec<u8> {
        while !self.saved.is_empty() {
            self.restore();
        }
        for _ in 0..self.current.clip_layers {
            self.ctx.pop_layer();
        }
        self.current.clip_layers = 0;

        let mut pixmap = vello_cpu::Pixmap::new(self.width, self.height);
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut pixmap);
        pixmap.data_as_u8_slice().to_vec()
    }

    /// Rasterize into a BGRA destination of the same size.
    pub fn write_into(&mut self, dst: &mut PixelBuffer) -> CompositorResult<()> {
        if dst.width != u32::from(self.width) || dst.height != u32::from(self.height) {
            return Err(CompositorError::validation(format!(
                "destination is {}x{}, surface is {}x{}",
                dst.width, dst.height, self.width, self.height
            )));
        }
        match dst.format {
            PixelFormat::Bgra8Premul => {
                let rgba = self.render_rgba8_premul();
                swap_red_blue(&rgba, &mut dst.data);
            }
        }
        Ok(())
    }

    fn glyphs_into(
        ctx: &mut vello_cpu::RenderContext,
        block: &TextBlock,
        font: &vello_cpu::peniko::FontData,
        solid: Option<Rgba>,
    ) {
        for line in block.layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let [r, g, b, a] = match solid {
                    Some(c) => c.to_rgba8(),
                    None => {
                        let brush = run.style().brush;
                        [brush.r, brush.g, brush.b, brush.a]
                    }
                };
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
                let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
    }

    fn text_shadow_image(
        &self,
        block: &TextBlock,
        font: &vello_cpu::peniko::FontData,
        glyph_transform: Affine,
        shadow: TextShadow,
    ) -> CompositorResult<vello_cpu::Image> {
        let mut ctx = vello_cpu::RenderContext::new(self.width, self.height);
        ctx.set_transform(affine_to_cpu(glyph_transform));
        Self::glyphs_into(&mut ctx, block, font, Some(shadow.color));
        let mut pixmap = vello_cpu::Pixmap::new(self.width, self.height);
        ctx.flush();
        ctx.render_to_pixmap(&mut pixmap);

        let (radius, sigma) = shadow_kernel(shadow.blur_radius);
        let blurred = blur_rgba8_premul(
            pixmap.data_as_u8_slice(),
            u32::from(self.width),
            u32::from(self.height),
            radius,
            sigma,
        )?;
        rgba_premul_to_image(&blurred, u32::from(self.width), u32::from(self.height))
    }
}

impl DrawSurface for CpuSurface {
    fn width(&self) -> u32 {
        u32::from(self.width)
    }

    fn height(&self) -> u32 {
        u32::from(self.height)
    }

    fn save(&mut self) {
        self.saved.push(self.current);
        self.current.clip_layers = 0;
    }

    fn restore(&mut self) {
        for _ in 0..self.current.clip_layers {
            self.ctx.pop_layer();
        }
        self.current = self.saved.pop().unwrap_or_default();
    }

    fn set_alpha(&mut self, alpha: f64) {
        let a = if alpha.is_finite() { alpha.clamp(0.0, 1.0) } else { 1.0 };
        self.current.alpha *= a;
    }

    fn clip_rect(&mut self, rect: Rect) {
        let base = self.device_to_pixmap();
        self.ctx.set_transform(affine_to_cpu(base));
        let path = rect_to_cpu(rect.abs()).to_path(0.1);
        self.ctx.push_clip_layer(&path);
        self.current.clip_layers += 1;
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        let base = affine_to_cpu(self.device_to_pixmap());
        let [r, g, b, a] = color.to_rgba8();
        self.with_opacity(|ctx| {
            ctx.set_transform(base);
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
            ctx.fill_rect(&rect_to_cpu(rect.abs()));
        });
    }

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f64, color: Rgba) {
        let base = affine_to_cpu(self.device_to_pixmap());
        let [r, g, b, a] = color.to_rgba8();
        let path = rounded_path(rect, radius);
        self.with_opacity(|ctx| {
            ctx.set_transform(base);
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
            ctx.fill_path(&path);
        });
    }

    fn stroke_rounded_rect(&mut self, rect: Rect, radius: f64, width: f64, color: Rgba) {
        if !width.is_finite() || width <= 0.0 {
            return;
        }
        let base = affine_to_cpu(self.device_to_pixmap());
        let [r, g, b, a] = color.to_rgba8();
        let path = rounded_path(rect, radius);
        self.with_opacity(|ctx| {
            ctx.set_transform(base);
            ctx.set_stroke(vello_cpu::kurbo::Stroke::new(width));
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
            ctx.stroke_path(&path);
        });
    }

    fn fill_linear_gradient(
        &mut self,
        rect: Rect,
        start: Point,
        end: Point,
        stops: &[GradientStop],
    ) {
        // Bake in pixmap space over the rect's pixel bounds.
        let base = self.device_to_pixmap();
        let px = base.transform_rect_bbox(rect.abs());
        let x0 = px.x0.floor().max(0.0) as u32;
        let y0 = px.y0.floor().max(0.0) as u32;
        let x1 = (px.x1.ceil().max(0.0) as u32).min(u32::from(self.width));
        let y1 = (px.y1.ceil().max(0.0) as u32).min(u32::from(self.height));
        if x1 <= x0 || y1 <= y0 || stops.is_empty() {
            return;
        }
        let (w, h) = (x1 - x0, y1 - y0);

        let axis = end - start;
        let len2 = axis.hypot2();
        let to_device = base.inverse();
        let mut bytes = vec![0u8; w as usize * h as usize * 4];
        for row in 0..h {
            for col in 0..w {
                let device = to_device
                    * Point::new(f64::from(x0 + col) + 0.5, f64::from(y0 + row) + 0.5);
                let t = if len2 > 0.0 {
                    (device - start).dot(axis) / len2
                } else {
                    0.0
                };
                if !(0.0..=1.0).contains(&t) {
                    continue;
                }
                let idx = (row as usize * w as usize + col as usize) * 4;
                bytes[idx..idx + 4].copy_from_slice(&premul_rgba8(sample_stops(stops, t)));
            }
        }

        let Ok(image) = rgba_premul_to_image(&bytes, w, h) else {
            return;
        };
        let placed = affine_to_cpu(Affine::translate((f64::from(x0), f64::from(y0))));
        self.with_opacity(|ctx| {
            ctx.set_transform(placed);
            ctx.set_paint(image);
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, f64::from(w), f64::from(h)));
        });
    }

    fn draw_image(&mut self, image: &OrientedImage, dest: Rect) -> CompositorResult<()> {
        let extent = image.extent();
        if extent.width() <= 0.0 || extent.height() <= 0.0 {
            return Ok(());
        }
        let fit = Affine::translate((dest.x0, dest.y0))
            * Affine::scale_non_uniform(
                dest.width() / extent.width(),
                dest.height() / extent.height(),
            )
            * Affine::translate((-extent.x0, -extent.y0));
        let total = affine_to_cpu(self.device_to_pixmap() * fit * image.pixel_transform());

        let img = &image.image;
        let paint = rgba_premul_to_image(img.rgba8_premul.as_slice(), img.width, img.height)?;
        let (w, h) = img.size();
        self.with_opacity(|ctx| {
            ctx.set_transform(total);
            ctx.set_paint(paint);
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));
        });
        Ok(())
    }

    fn draw_text(&mut self, block: &TextBlock, rect: Rect) -> CompositorResult<()> {
        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(block.font.as_ref().clone()),
            0,
        );
        // Layout space is Y-down from the block's top-left corner.
        let glyph_transform =
            self.device_to_pixmap() * Affine::new([1.0, 0.0, 0.0, -1.0, rect.x0, rect.y1]);

        if let Some(shadow) = block.shadow {
            let shadow_img = self.text_shadow_image(block, &font, glyph_transform, shadow)?;
            let (w, h) = (f64::from(self.width), f64::from(self.height));
            self.with_opacity(|ctx| {
                ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
                ctx.set_paint(shadow_img);
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));
            });
        }

        let transform = affine_to_cpu(glyph_transform);
        self.with_opacity(|ctx| {
            ctx.set_transform(transform);
            Self::glyphs_into(ctx, block, &font, None);
        });
        Ok(())
    }
}

fn sample_stops(stops: &[GradientStop], t: f64) -> [u8; 4] {
    let first = stops[0];
    let last = stops[stops.len() - 1];
    let color = if t <= first.offset {
        first.color
    } else if t >= last.offset {
        last.color
    } else {
        let mut out = last.color;
        for pair in stops.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t >= a.offset && t <= b.offset {
                let span = b.offset - a.offset;
                let u = if span > 0.0 { (t - a.offset) / span } else { 0.0 };
                let lerp = |x: f64, y: f64| x + (y - x) * u;
                out = Rgba::rgba(
                    lerp(a.color.r, b.color.r),
                    lerp(a.color.g, b.color.g),
                    lerp(a.color.b, b.color.b),
                    lerp(a.color.a, b.color.a),
                );
                break;
            }
        }
        out
    };
    color.to_rgba8()
}

fn premul_rgba8([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    let a16 = u16::from(a);
    [
        mul_div255_u8(u16::from(r), a16),
        mul_div255_u8(u16::from(g), a16),
        mul_div255_u8(u16::from(b), a16),
        a,
    ]
}

fn rounded_path(rect: Rect, radius: f64) -> vello_cpu::kurbo::BezPath {
    let r = rect.abs();
    let max_radius = (r.width().min(r.height()) / 2.0).max(0.0);
    let radius = if radius.is_finite() {
        radius.clamp(0.0, max_radius)
    } else {
        0.0
    };
    vello_cpu::kurbo::RoundedRect::new(r.x0, r.y0, r.x1, r.y1, radius).to_path(0.1)
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> CompositorResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| CompositorError::validation("pixmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| CompositorError::validation("pixmap height exceeds u16"))?;
    if bytes.len() != (width as usize).saturating_mul(height as usize).saturating_mul(4) {
        return Err(CompositorError::validation("pixmap byte len mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in bytes.chunks_exact(4) {
        may_have_opacities |= px[3] != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8::from_u8_array([
            px[0], px[1], px[2], px[3],
        ]));
    }
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

fn rgba_premul_to_image(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> CompositorResult<vello_cpu::Image> {
    let pixmap = pixmap_from_premul_bytes(bytes, width, height)?;
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;
