//! Layered scene renderer: background first, then each element bottom-up.

use std::collections::HashMap;
use std::sync::Arc;

use crate::assets::image::DecodedImage;
use crate::assets::locate::ResourceLocation;
use crate::compositor::instruction::VideoCompositionInstruction;
use crate::compositor::request::PixelBuffer;
use crate::foundation::core::{CancelToken, FrameIndex, Rect, TrackId};
use crate::foundation::error::{CompositorError, CompositorResult};
use crate::geometry::color::{Rgba, color_or};
use crate::geometry::rect::{CoordinateFlip, DrawSpec, ManifestRect, ResizeMode, rect_from_props};
use crate::render::orientation::{OrientedImage, normalize};
use crate::render::surface::{DrawSurface, GradientStop};
use crate::render::text::{TextStyle, layout_text};
use crate::scene::element::{ElementInstance, ElementKind};
use crate::scene::props::FlatProps;
use crate::scene::track_model::TrackModel;

/// Fixed band the `gradient` element paints into, in manifest units.
///
/// The band sits at the bottom of a `reference_height` tall frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientBand {
    /// Height of the frame the band is anchored to.
    pub reference_height: f64,
    /// Band height.
    pub band_height: f64,
    /// Band width.
    pub width: f64,
}

impl Default for GradientBand {
    fn default() -> Self {
        Self {
            reference_height: 1280.0,
            band_height: 210.0,
            width: 720.0,
        }
    }
}

impl GradientBand {
    /// Band rectangle in manifest space.
    pub fn rect(&self) -> ManifestRect {
        ManifestRect::new(
            0.0,
            self.reference_height - self.band_height,
            self.width,
            self.band_height,
        )
    }
}

/// Scene renderer options.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RendererOpts {
    /// Background painted under every frame unless the track model overrides it.
    pub background: Rgba,
    /// Geometry of the `gradient` element.
    pub gradient: GradientBand,
}

impl Default for RendererOpts {
    fn default() -> Self {
        Self {
            background: Rgba::BLACK,
            gradient: GradientBand::default(),
        }
    }
}

impl RendererOpts {
    /// Override the background color.
    pub fn with_background(mut self, background: Rgba) -> Self {
        self.background = background;
        self
    }

    /// Override the gradient band geometry.
    pub fn with_gradient(mut self, gradient: GradientBand) -> Self {
        self.gradient = gradient;
        self
    }
}

/// Per-frame inputs coming from the render request.
#[derive(Clone, Debug, Default)]
pub struct FrameInputs {
    /// Output frame index.
    pub frame: FrameIndex,
    /// Composition time in seconds.
    pub time: f64,
    /// Decoded source frames by track.
    pub source_frames: HashMap<TrackId, Arc<PixelBuffer>>,
    /// Instruction active at `time`.
    pub instruction: Option<Arc<VideoCompositionInstruction>>,
}

impl FrameInputs {
    /// Inputs with no source frames and no instruction.
    pub fn at(frame: FrameIndex, time: f64) -> Self {
        Self {
            frame,
            time,
            ..Self::default()
        }
    }

    /// Attach a source frame.
    pub fn with_source_frame(mut self, track_id: TrackId, frame: Arc<PixelBuffer>) -> Self {
        self.source_frames.insert(track_id, frame);
        self
    }

    /// Attach the active instruction.
    pub fn with_instruction(mut self, instruction: Arc<VideoCompositionInstruction>) -> Self {
        self.instruction = Some(instruction);
        self
    }
}

/// What happened to the elements of one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Elements that reached the surface.
    pub drawn: usize,
    /// Elements skipped for missing resources or errors.
    pub skipped: usize,
    /// Elements of unknown type.
    pub unsupported: usize,
}

enum Outcome {
    Drawn,
    Skipped,
}

/// Paints manifest elements onto a [`DrawSurface`].
#[derive(Clone, Debug, Default)]
pub struct SceneRenderer {
    opts: RendererOpts,
}

impl SceneRenderer {
    /// Renderer with the given options.
    pub fn new(opts: RendererOpts) -> Self {
        Self { opts }
    }

    /// Options in use.
    pub fn opts(&self) -> &RendererOpts {
        &self.opts
    }

    /// Paint the background and then `elements`, first one bottommost.
    ///
    /// Element failures are logged and counted; only cancellation aborts the frame.
    #[tracing::instrument(skip_all, fields(frame = inputs.frame.0, elements = elements.len()))]
    pub fn render_frame(
        &self,
        surface: &mut dyn DrawSurface,
        model: &dyn TrackModel,
        elements: &[ElementInstance],
        inputs: &FrameInputs,
        cancel: &CancelToken,
    ) -> CompositorResult<FrameReport> {
        let (w, h) = (f64::from(surface.width()), f64::from(surface.height()));
        let flip = CoordinateFlip::new(h);
        let background = model
            .background()
            .unwrap_or(self.opts.background)
            .with_alpha(1.0);
        surface.fill_rect(Rect::new(0.0, 0.0, w, h), background);

        let mut report = FrameReport::default();
        for el in elements {
            cancel.check()?;

            if let ElementKind::Unsupported(kind) = &el.kind {
                tracing::warn!(
                    kind = %kind,
                    element = %el.element.name,
                    "unsupported element type"
                );
                report.unsupported += 1;
                continue;
            }

            surface.save();
            let res = match el.kind {
                ElementKind::Image => draw_image_element(surface, model, el, flip),
                ElementKind::Rect => draw_rect_element(surface, &el.props, flip),
                ElementKind::Gradient => {
                    draw_gradient_element(surface, &el.props, &self.opts.gradient, flip)
                }
                ElementKind::Video => draw_video_element(surface, model, el, inputs, flip),
                ElementKind::Frame => draw_frame_element(surface, model, el, flip),
                ElementKind::Text => draw_text_element(surface, model, el, flip),
                ElementKind::Unsupported(_) => Ok(Outcome::Skipped),
            };
            surface.restore();

            match res {
                Ok(Outcome::Drawn) => report.drawn += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(
                        kind = %el.kind,
                        element = %el.element.name,
                        error = %e,
                        "element draw failed"
                    );
                    report.skipped += 1;
                }
            }
        }

        tracing::debug!(?report, "frame painted");
        Ok(report)
    }
}

fn alpha_of(props: &FlatProps) -> f64 {
    props.number_or("alpha", 1.0)
}

fn load_image(model: &dyn TrackModel, key: &str) -> Option<Arc<DecodedImage>> {
    let Some(path) = model.file_path(key) else {
        tracing::warn!(key, "no file registered for image key");
        return None;
    };
    let location = ResourceLocation::resolve(&path, &model.base_location());
    let decoded = location
        .read_bytes()
        .and_then(|bytes| DecodedImage::decode(&bytes));
    match decoded {
        Ok(img) => Some(Arc::new(img)),
        Err(e) => {
            tracing::warn!(key, location = %location, error = %e, "image load failed");
            None
        }
    }
}

fn place_image(
    surface: &mut dyn DrawSurface,
    image: &OrientedImage,
    spec: DrawSpec,
) -> CompositorResult<Outcome> {
    let extent = image.extent();
    let dest = spec.placement(extent.width(), extent.height());
    surface.set_alpha(spec.alpha);
    surface.clip_rect(spec.target);
    surface.draw_image(image, dest)?;
    Ok(Outcome::Drawn)
}

fn draw_image_element(
    surface: &mut dyn DrawSurface,
    model: &dyn TrackModel,
    el: &ElementInstance,
    flip: CoordinateFlip,
) -> CompositorResult<Outcome> {
    let Some(key) = el.props.text("imageKey") else {
        tracing::warn!(element = %el.element.name, "image element without imageKey");
        return Ok(Outcome::Skipped);
    };
    let Some(img) = model.cached_image(&key, &|| load_image(model, &key)) else {
        tracing::debug!(element = %el.element.name, key = %key, "image unavailable, skipping");
        return Ok(Outcome::Skipped);
    };

    let resize = match el.props.text("resizeMode") {
        Some(s) => s.parse().unwrap_or_else(|e: CompositorError| {
            tracing::warn!(element = %el.element.name, error = %e, "falling back to fill");
            ResizeMode::Fill
        }),
        None => ResizeMode::Fill,
    };
    let target = flip.to_device(rect_from_props(&el.props, None));
    place_image(
        surface,
        &OrientedImage::upright(img),
        DrawSpec::new(resize, target, alpha_of(&el.props)),
    )
}

fn draw_rect_element(
    surface: &mut dyn DrawSurface,
    props: &FlatProps,
    flip: CoordinateFlip,
) -> CompositorResult<Outcome> {
    let rect = rect_from_props(props, None);
    let radius = props.number_or("cornerRadius", 0.0);
    let fill = color_or(&props.text_or("color", "#000000"), alpha_of(props), Rgba::BLACK);
    surface.fill_rounded_rect(flip.to_device(rect), radius, fill);

    let stroke_width = props.number_or("strokeWidth", 0.0);
    if stroke_width > 0.0 {
        let stroke = color_or(
            &props.text_or("strokeColor", "#000000"),
            props.number_or("strokeAlpha", 1.0),
            Rgba::BLACK,
        );
        let half = stroke_width / 2.0;
        surface.stroke_rounded_rect(
            flip.to_device(rect.inflate(half)),
            radius + half,
            stroke_width,
            stroke,
        );
    }
    Ok(Outcome::Drawn)
}

fn draw_gradient_element(
    surface: &mut dyn DrawSurface,
    props: &FlatProps,
    band: &GradientBand,
    flip: CoordinateFlip,
) -> CompositorResult<Outcome> {
    let channel = |key: &str, default: f64| props.number_or(key, default).clamp(0.0, 255.0) / 255.0;
    let base = Rgba::rgba(
        channel("rVal", 52.0),
        channel("gVal", 152.0),
        channel("bVal", 219.0),
        1.0,
    );
    let stops = [
        GradientStop {
            offset: 0.0,
            color: base.with_alpha(0.0),
        },
        GradientStop {
            offset: 0.45,
            color: base.with_alpha(0.8),
        },
        GradientStop {
            offset: 1.0,
            color: base,
        },
    ];

    let m = band.rect();
    let device = flip.to_device(m);
    let start = flip.point(m.x, m.y);
    let end = flip.point(m.x, m.y + m.height);

    surface.set_alpha(alpha_of(props));
    surface.clip_rect(device);
    surface.fill_linear_gradient(device, start, end, &stops);
    Ok(Outcome::Drawn)
}

fn draw_video_element(
    surface: &mut dyn DrawSurface,
    model: &dyn TrackModel,
    el: &ElementInstance,
    inputs: &FrameInputs,
    flip: CoordinateFlip,
) -> CompositorResult<Outcome> {
    let name = &el.element.name;
    let Some(track_id) = model.video_track_id(name) else {
        tracing::debug!(element = %name, "no track bound to video element");
        return Ok(Outcome::Skipped);
    };
    let Some(buf) = inputs.source_frames.get(&track_id) else {
        tracing::debug!(element = %name, track = track_id.0, "no source frame for track");
        return Ok(Outcome::Skipped);
    };

    let frame = Arc::new(DecodedImage::from_pixel_buffer(buf)?);
    let oriented = normalize(frame, inputs.instruction.as_deref(), track_id, inputs.time);
    let target = flip.to_device(rect_from_props(&el.props, None));
    place_image(
        surface,
        &oriented,
        DrawSpec::new(ResizeMode::Contain, target, alpha_of(&el.props)),
    )
}

fn draw_frame_element(
    surface: &mut dyn DrawSurface,
    model: &dyn TrackModel,
    el: &ElementInstance,
    flip: CoordinateFlip,
) -> CompositorResult<Outcome> {
    let Some(still) = model.still_image(&el.element.name) else {
        tracing::warn!(element = %el.element.name, "no still image for frame element");
        return Ok(Outcome::Skipped);
    };
    let target = flip.to_device(rect_from_props(&el.props, None));
    place_image(
        surface,
        &OrientedImage::upright(still),
        DrawSpec::new(ResizeMode::Contain, target, alpha_of(&el.props)),
    )
}

fn draw_text_element(
    surface: &mut dyn DrawSurface,
    model: &dyn TrackModel,
    el: &ElementInstance,
    flip: CoordinateFlip,
) -> CompositorResult<Outcome> {
    let style = TextStyle::from_props(&el.props);
    let font = model.font_bytes(&style.font_name).or_else(|| {
        model
            .default_font_family()
            .and_then(|family| model.font_bytes(&family))
    });
    let Some(font) = font else {
        tracing::warn!(
            element = %el.element.name,
            font = %style.font_name,
            "no font for text element"
        );
        return Ok(Outcome::Skipped);
    };

    let block = layout_text(&style, font)?;
    let r = style.rect;
    let block_height = if r.height > 0.0 {
        block.height.min(r.height)
    } else {
        block.height
    };
    let frame = ManifestRect::new(
        r.x,
        r.y + style.origin_y.shift(block_height),
        if r.width > 0.0 { r.width } else { block.width },
        if r.height > 0.0 { r.height } else { block.height },
    );
    let device = flip.to_device(frame);

    surface.clip_rect(device);
    surface.draw_text(&block, device)?;
    Ok(Outcome::Drawn)
}

#[cfg(test)]
#[path = "../../tests/unit/render/painter.rs"]
mod tests;
