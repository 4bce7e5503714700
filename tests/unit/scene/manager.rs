use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::assets::assembler::{SourceAsset, SourceTrack};
use crate::foundation::core::Affine;

const SCENE: &str = r##"{
  "width": 720, "height": 1280,
  "fps": { "num": 30, "den": 1 },
  "duration": 300,
  "background": "#102030",
  "files": { "a": "media/a.mp4", "b": "media/b.mp4", "still": "img/still.png" },
  "fonts": { "Open Sans": "fonts/OpenSans.ttf" },
  "defaultFont": "Open Sans",
  "elements": [
    { "type": "video", "name": "first", "file": "a", "start": 30, "end": 90 },
    { "type": "rect", "name": "box" },
    { "type": "video", "name": "unbound" },
    { "type": "video", "name": "second", "file": "b" },
    { "type": "frame", "name": "poster", "file": "still" }
  ]
}"##;

#[derive(Debug)]
struct StubAsset {
    location: ResourceLocation,
}

impl SourceAsset for StubAsset {
    fn location(&self) -> &ResourceLocation {
        &self.location
    }
    fn duration_secs(&self) -> f64 {
        10.0
    }
    fn track(&self, kind: MediaKind) -> Option<SourceTrack> {
        Some(SourceTrack {
            kind,
            preferred_transform: match kind {
                MediaKind::Video => Affine::new([0.0, 1.0, -1.0, 0.0, 9.0, 0.0]),
                MediaKind::Audio => Affine::IDENTITY,
            },
            readable: true,
            width: 16,
            height: 9,
        })
    }
}

#[derive(Default)]
struct StubOpener {
    opens: AtomicUsize,
}

impl AssetOpener for StubOpener {
    fn open(&self, location: &ResourceLocation) -> CompositorResult<Arc<dyn SourceAsset>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(StubAsset {
            location: location.clone(),
        }))
    }
}

fn manager_in(dir: PathBuf, opener: Arc<StubOpener>) -> CompositionManager {
    let manifest = Manifest::from_json_str(SCENE).unwrap();
    CompositionManager::from_manifest(manifest, BaseLocation::Dir(dir), opener).unwrap()
}

fn manager() -> CompositionManager {
    manager_in(PathBuf::from("/data"), Arc::new(StubOpener::default()))
}

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("layercast-manager-{tag}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn video_elements_with_files_get_sequential_track_ids() {
    let m = manager();
    assert_eq!(m.video_track_id("first"), Some(TrackId(1)));
    assert_eq!(m.video_track_id("second"), Some(TrackId(2)));
    assert_eq!(m.video_track_id("unbound"), None);
    assert_eq!(m.video_track_id("box"), None);
    assert_eq!(m.video_tracks().count(), 2);
}

#[test]
fn exposes_manifest_facts() {
    let m = manager();
    assert_eq!(m.canvas(), Canvas { width: 720, height: 1280 });
    assert_eq!(m.fps(), Fps { num: 30, den: 1 });
    assert_eq!(m.background().map(|c| c.to_rgba8()), Some([0x10, 0x20, 0x30, 255]));
    assert_eq!(m.default_font_family().as_deref(), Some("Open Sans"));
    assert_eq!(m.file_path("a").as_deref(), Some("media/a.mp4"));
    assert_eq!(m.file_path("nope"), None);
    assert_eq!(m.base_location(), BaseLocation::Dir(PathBuf::from("/data")));

    let names: Vec<_> = m
        .elements_at(FrameIndex(0))
        .into_iter()
        .map(|e| e.element.name)
        .collect();
    assert_eq!(names, vec!["box", "unbound", "second", "poster"]);
}

#[test]
fn timeline_places_sources_over_active_ranges() {
    let opener = Arc::new(StubOpener::default());
    let m = manager_in(PathBuf::from("/data"), Arc::clone(&opener));
    let comp = m.composition();

    let first = comp.track(TrackId(1)).unwrap();
    assert_eq!(first.kind, MediaKind::Video);
    assert_eq!(first.segments.len(), 1);
    assert_eq!(first.segments[0].at, 1.0);
    assert_eq!(first.segments[0].source, TimeRange::new(0.0, 2.0));
    assert_eq!(
        first.preferred_transform,
        Affine::new([0.0, 1.0, -1.0, 0.0, 9.0, 0.0])
    );
    assert_eq!(
        first.segments[0].asset.location(),
        &ResourceLocation::File(PathBuf::from("/data/media/a.mp4"))
    );

    let second = comp.track(TrackId(2)).unwrap();
    assert_eq!(second.segments[0].source, TimeRange::new(0.0, 10.0));
    assert_eq!(comp.tracks_of(MediaKind::Audio).count(), 2);

    // Sources are assembled once per element, however often the timeline is rebuilt.
    let _ = m.composition();
    assert_eq!(opener.opens.load(Ordering::SeqCst), 2);
}

#[test]
fn video_composition_binds_preferred_transforms() {
    let m = manager();
    let vc = m.video_composition();
    assert_eq!(vc.canvas, Canvas { width: 720, height: 1280 });
    assert_eq!(vc.instructions.len(), 1);

    let instruction = vc.instruction_at(5.0).unwrap();
    assert_eq!(instruction.range, TimeRange::new(0.0, 10.0));
    assert_eq!(instruction.track_ids().collect::<Vec<_>>(), vec![TrackId(1), TrackId(2)]);

    let first = instruction.layer(TrackId(1)).unwrap();
    assert_eq!(first.transform_at(0.5), None);
    assert_eq!(
        first.transform_at(1.5),
        Some(Affine::new([0.0, 1.0, -1.0, 0.0, 9.0, 0.0]))
    );
}

#[test]
fn still_images_and_fonts_load_lazily_from_the_data_dir() {
    let dir = scratch_dir("assets");
    std::fs::create_dir_all(dir.join("img")).unwrap();
    std::fs::create_dir_all(dir.join("fonts")).unwrap();
    ::image::RgbaImage::from_pixel(3, 2, ::image::Rgba([255, 0, 0, 255]))
        .save(dir.join("img/still.png"))
        .unwrap();
    std::fs::write(dir.join("fonts/OpenSans.ttf"), b"font bytes").unwrap();

    let m = manager_in(dir.clone(), Arc::new(StubOpener::default()));
    let still = m.still_image("poster").unwrap();
    assert_eq!((still.width, still.height), (3, 2));
    assert!(Arc::ptr_eq(&still, &m.still_image("poster").unwrap()));
    assert!(m.still_image("box").is_none());

    let font = m.font_bytes("Open Sans").unwrap();
    assert_eq!(font.as_slice(), b"font bytes");
    assert!(Arc::ptr_eq(&font, &m.font_bytes("Open Sans").unwrap()));
    assert!(m.font_bytes("Comic Sans").is_none());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn load_reads_composition_json() {
    let dir = scratch_dir("load");
    std::fs::write(
        dir.join(MANIFEST_FILE),
        r#"{ "width": 8, "height": 8, "fps": { "num": 25, "den": 1 }, "duration": 5 }"#,
    )
    .unwrap();
    let m = CompositionManager::load(&dir).unwrap();
    assert_eq!(m.manifest().duration, 5);
    assert!(m.background().is_none());
    assert!(m.composition().tracks.is_empty());

    assert!(CompositionManager::load(&dir.join("missing")).is_err());
    std::fs::remove_dir_all(&dir).ok();
}
