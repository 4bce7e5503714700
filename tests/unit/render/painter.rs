use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use super::*;
use crate::assets::locate::BaseLocation;
use crate::foundation::core::{Affine, Canvas, Fps, PixelFormat, Point, TimeRange};
use crate::compositor::instruction::LayerInstruction;
use crate::render::recording::{DrawOp, RecordingSurface};
use crate::scene::element::Element;
use crate::scene::track_model::ImageCache;

#[derive(Default)]
struct StubModel {
    images: HashMap<String, Arc<DecodedImage>>,
    stills: HashMap<String, Arc<DecodedImage>>,
    tracks: HashMap<String, TrackId>,
    cache: ImageCache,
}

impl TrackModel for StubModel {
    fn canvas(&self) -> Canvas {
        Canvas {
            width: 100,
            height: 100,
        }
    }

    fn fps(&self) -> Fps {
        Fps { num: 30, den: 1 }
    }

    fn elements_at(&self, _frame: FrameIndex) -> Vec<ElementInstance> {
        Vec::new()
    }

    fn video_track_id(&self, element_name: &str) -> Option<TrackId> {
        self.tracks.get(element_name).copied()
    }

    fn still_image(&self, element_name: &str) -> Option<Arc<DecodedImage>> {
        self.stills.get(element_name).cloned()
    }

    fn cached_image(
        &self,
        key: &str,
        loader: &dyn Fn() -> Option<Arc<DecodedImage>>,
    ) -> Option<Arc<DecodedImage>> {
        self.images
            .get(key)
            .cloned()
            .or_else(|| self.cache.get_or_load(key, loader))
    }

    fn file_path(&self, _key: &str) -> Option<String> {
        None
    }

    fn base_location(&self) -> BaseLocation {
        BaseLocation::Dir(PathBuf::from("."))
    }

    fn font_bytes(&self, _family: &str) -> Option<Arc<Vec<u8>>> {
        None
    }
}

fn el(kind: &str, name: &str, props: FlatProps) -> ElementInstance {
    ElementInstance::new(ElementKind::parse(kind), Element::named(name), props)
}

fn render(
    model: &StubModel,
    elements: &[ElementInstance],
    inputs: &FrameInputs,
) -> (RecordingSurface, FrameReport) {
    let mut surface = RecordingSurface::new(100, 100);
    let report = SceneRenderer::default()
        .render_frame(&mut surface, model, elements, inputs, &CancelToken::never())
        .unwrap();
    (surface, report)
}

fn background_only(surface: &RecordingSurface) -> bool {
    let draws: Vec<_> = surface.draws().collect();
    draws.len() == 1
        && draws[0]
            == &DrawOp::FillRect {
                rect: Rect::new(0.0, 0.0, 100.0, 100.0),
                color: Rgba::BLACK,
            }
}

#[test]
fn unsupported_type_leaves_background_only() {
    let model = StubModel::default();
    let (surface, report) = render(
        &model,
        &[el("sparkle", "s", FlatProps::new().with("width", 10.0))],
        &FrameInputs::default(),
    );
    assert!(background_only(&surface));
    assert_eq!(report.unsupported, 1);
    assert_eq!(report.drawn, 0);
}

#[test]
fn rect_without_stroke_width_emits_no_stroke() {
    let model = StubModel::default();
    let props = FlatProps::new()
        .with("x", 10.0)
        .with("y", 20.0)
        .with("width", 30.0)
        .with("height", 40.0)
        .with("color", "#FF0000")
        .with("strokeWidth", 0.0);
    let (surface, report) = render(&model, &[el("rect", "r", props)], &FrameInputs::default());

    assert_eq!(report.drawn, 1);
    assert!(
        !surface
            .ops
            .iter()
            .any(|op| matches!(op, DrawOp::StrokeRoundedRect { .. }))
    );
    assert!(surface.ops.contains(&DrawOp::FillRoundedRect {
        rect: Rect::new(10.0, 40.0, 40.0, 80.0),
        radius: 0.0,
        color: Rgba::rgba(1.0, 0.0, 0.0, 1.0),
    }));
}

#[test]
fn rect_stroke_is_expanded_by_half_its_width() {
    let model = StubModel::default();
    let props = FlatProps::new()
        .with("x", 10.0)
        .with("y", 10.0)
        .with("width", 20.0)
        .with("height", 20.0)
        .with("cornerRadius", 3.0)
        .with("strokeWidth", 4.0)
        .with("strokeColor", "#FFFFFF")
        .with("strokeAlpha", 0.5);
    let (surface, _) = render(&model, &[el("rect", "r", props)], &FrameInputs::default());

    let stroke = surface
        .ops
        .iter()
        .find(|op| matches!(op, DrawOp::StrokeRoundedRect { .. }))
        .cloned()
        .unwrap();
    assert_eq!(
        stroke,
        DrawOp::StrokeRoundedRect {
            rect: Rect::new(8.0, 68.0, 32.0, 92.0),
            radius: 5.0,
            width: 4.0,
            color: Rgba::rgba(1.0, 1.0, 1.0, 0.5),
        }
    );
}

#[test]
fn missing_image_is_skipped_without_error() {
    let model = StubModel::default();
    let props = FlatProps::new()
        .with("imageKey", "logo")
        .with("width", 50.0)
        .with("height", 50.0);
    let (surface, report) = render(&model, &[el("image", "logo", props)], &FrameInputs::default());
    assert!(background_only(&surface));
    assert_eq!(report.skipped, 1);
}

#[test]
fn image_uses_resize_mode_and_clips_to_target() {
    let mut model = StubModel::default();
    model
        .images
        .insert("logo".into(), Arc::new(DecodedImage::solid(20, 10, [255, 0, 0, 255])));
    let props = FlatProps::new()
        .with("imageKey", "logo")
        .with("width", 40.0)
        .with("height", 40.0)
        .with("resizeMode", "contain")
        .with("alpha", 0.5);
    let (surface, report) = render(&model, &[el("image", "logo", props)], &FrameInputs::default());

    assert_eq!(report.drawn, 1);
    let target = Rect::new(0.0, 60.0, 40.0, 100.0);
    assert!(surface.ops.contains(&DrawOp::SetAlpha(0.5)));
    assert!(surface.ops.contains(&DrawOp::ClipRect(target)));
    assert!(surface.ops.contains(&DrawOp::Image {
        dest: Rect::new(0.0, 70.0, 40.0, 90.0),
        extent: Rect::new(0.0, 0.0, 20.0, 10.0),
    }));
}

#[test]
fn every_element_is_wrapped_in_save_restore() {
    let model = StubModel::default();
    let elements = [
        el("rect", "a", FlatProps::new().with("width", 5.0)),
        el("image", "b", FlatProps::new()),
        el("gradient", "c", FlatProps::new()),
    ];
    let (surface, _) = render(&model, &elements, &FrameInputs::default());
    let saves = surface.ops.iter().filter(|op| **op == DrawOp::Save).count();
    let restores = surface.ops.iter().filter(|op| **op == DrawOp::Restore).count();
    assert_eq!(saves, 3);
    assert_eq!(restores, 3);
}

#[test]
fn gradient_fills_fixed_band_top_to_bottom() {
    let model = StubModel::default();
    let mut surface = RecordingSurface::new(720, 1280);
    SceneRenderer::default()
        .render_frame(
            &mut surface,
            &model,
            &[el("gradient", "g", FlatProps::new().with("alpha", 0.25))],
            &FrameInputs::default(),
            &CancelToken::never(),
        )
        .unwrap();

    let band = Rect::new(0.0, 0.0, 720.0, 210.0);
    assert!(surface.ops.contains(&DrawOp::SetAlpha(0.25)));
    let grad = surface
        .ops
        .iter()
        .find_map(|op| match op {
            DrawOp::LinearGradient {
                rect,
                start,
                end,
                stops,
            } => Some((*rect, *start, *end, stops.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(grad.0, band);
    assert_eq!(grad.1, Point::new(0.0, 210.0));
    assert_eq!(grad.2, Point::new(0.0, 0.0));
    let alphas: Vec<f64> = grad.3.iter().map(|s| s.color.a).collect();
    assert_eq!(alphas, vec![0.0, 0.8, 1.0]);
    assert_eq!(grad.3[1].offset, 0.45);
    assert_eq!(grad.3[2].color.to_rgba8(), [52, 152, 219, 255]);
}

#[test]
fn video_frame_is_normalized_and_contained() {
    let mut model = StubModel::default();
    model.tracks.insert("clip".into(), TrackId(1));
    let props = FlatProps::new().with("width", 100.0).with("height", 100.0);
    let elements = [el("video", "clip", props)];

    let (surface, report) = render(&model, &elements, &FrameInputs::default());
    assert_eq!(report.skipped, 1);
    assert!(background_only(&surface));

    // 40x20 coded frame rotated a quarter turn displays as 20x40.
    let buf = Arc::new(PixelBuffer::new(40, 20, PixelFormat::Bgra8Premul));
    let mut layer = LayerInstruction::new(TrackId(1));
    layer.set_transform(Affine::new([0.0, 1.0, -1.0, 0.0, 20.0, 0.0]), 0.0);
    let instruction = Arc::new(VideoCompositionInstruction {
        range: TimeRange::new(0.0, 10.0),
        layers: vec![layer],
    });
    let inputs = FrameInputs::at(FrameIndex(0), 0.0)
        .with_source_frame(TrackId(1), buf)
        .with_instruction(instruction);
    let (surface, report) = render(&model, &elements, &inputs);
    assert_eq!(report.drawn, 1);
    let (dest, extent) = surface
        .ops
        .iter()
        .find_map(|op| match op {
            DrawOp::Image { dest, extent } => Some((*dest, *extent)),
            _ => None,
        })
        .unwrap();
    assert!((extent.width() - 20.0).abs() < 1e-9);
    assert!((extent.height() - 40.0).abs() < 1e-9);
    assert!((dest.width() - 50.0).abs() < 1e-9);
    assert!((dest.height() - 100.0).abs() < 1e-9);
}

#[test]
fn frame_without_still_is_skipped() {
    let mut model = StubModel::default();
    let props = FlatProps::new().with("width", 10.0).with("height", 10.0);
    let (_, report) = render(&model, &[el("frame", "f", props.clone())], &FrameInputs::default());
    assert_eq!(report.skipped, 1);

    model
        .stills
        .insert("f".into(), Arc::new(DecodedImage::solid(10, 10, [0, 0, 0, 255])));
    let (_, report) = render(&model, &[el("frame", "f", props)], &FrameInputs::default());
    assert_eq!(report.drawn, 1);
}

#[test]
fn text_without_any_font_is_skipped() {
    let model = StubModel::default();
    let props = FlatProps::new().with("value", "hello").with("width", 80.0);
    let (surface, report) = render(&model, &[el("text", "t", props)], &FrameInputs::default());
    assert_eq!(report.skipped, 1);
    assert!(background_only(&surface));
}

#[test]
fn cancellation_aborts_between_elements() {
    let epoch = Arc::new(AtomicU64::new(0));
    let token = CancelToken::new(Arc::clone(&epoch));
    epoch.fetch_add(1, Ordering::AcqRel);

    let model = StubModel::default();
    let mut surface = RecordingSurface::new(10, 10);
    let err = SceneRenderer::default()
        .render_frame(
            &mut surface,
            &model,
            &[el("rect", "r", FlatProps::new())],
            &FrameInputs::default(),
            &token,
        )
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[test]
fn track_model_background_overrides_default() {
    struct Blue(StubModel);
    impl TrackModel for Blue {
        fn canvas(&self) -> Canvas {
            self.0.canvas()
        }
        fn fps(&self) -> Fps {
            self.0.fps()
        }
        fn elements_at(&self, frame: FrameIndex) -> Vec<ElementInstance> {
            self.0.elements_at(frame)
        }
        fn video_track_id(&self, name: &str) -> Option<TrackId> {
            self.0.video_track_id(name)
        }
        fn still_image(&self, name: &str) -> Option<Arc<DecodedImage>> {
            self.0.still_image(name)
        }
        fn cached_image(
            &self,
            key: &str,
            loader: &dyn Fn() -> Option<Arc<DecodedImage>>,
        ) -> Option<Arc<DecodedImage>> {
            self.0.cached_image(key, loader)
        }
        fn file_path(&self, key: &str) -> Option<String> {
            self.0.file_path(key)
        }
        fn base_location(&self) -> BaseLocation {
            self.0.base_location()
        }
        fn font_bytes(&self, family: &str) -> Option<Arc<Vec<u8>>> {
            self.0.font_bytes(family)
        }
        fn background(&self) -> Option<Rgba> {
            Some(Rgba::rgba(0.0, 0.0, 1.0, 0.3))
        }
    }

    let mut surface = RecordingSurface::new(4, 4);
    SceneRenderer::default()
        .render_frame(
            &mut surface,
            &Blue(StubModel::default()),
            &[],
            &FrameInputs::default(),
            &CancelToken::never(),
        )
        .unwrap();
    assert_eq!(
        surface.ops,
        vec![DrawOp::FillRect {
            rect: Rect::new(0.0, 0.0, 4.0, 4.0),
            color: Rgba::rgba(0.0, 0.0, 1.0, 1.0),
        }]
    );
}
