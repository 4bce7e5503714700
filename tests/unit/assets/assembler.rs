use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

#[derive(Debug)]
struct StubAsset {
    location: ResourceLocation,
    duration: f64,
    video: Option<SourceTrack>,
    audio: Option<SourceTrack>,
}

impl SourceAsset for StubAsset {
    fn location(&self) -> &ResourceLocation {
        &self.location
    }
    fn duration_secs(&self) -> f64 {
        self.duration
    }
    fn track(&self, kind: MediaKind) -> Option<SourceTrack> {
        match kind {
            MediaKind::Video => self.video.clone(),
            MediaKind::Audio => self.audio.clone(),
        }
    }
}

fn video_track(transform: Affine) -> SourceTrack {
    SourceTrack {
        kind: MediaKind::Video,
        preferred_transform: transform,
        readable: true,
        width: 16,
        height: 9,
    }
}

fn audio_track() -> SourceTrack {
    SourceTrack {
        kind: MediaKind::Audio,
        preferred_transform: Affine::IDENTITY,
        readable: true,
        width: 0,
        height: 0,
    }
}

#[derive(Default)]
struct StubOpener {
    opened: Mutex<Vec<ResourceLocation>>,
    opens: AtomicUsize,
    duration: f64,
    video_readable: bool,
    fail: bool,
}

impl AssetOpener for StubOpener {
    fn open(&self, location: &ResourceLocation) -> CompositorResult<Arc<dyn SourceAsset>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.opened.lock().unwrap().push(location.clone());
        if self.fail {
            return Err(CompositorError::resource_unavailable("stub"));
        }
        let mut video = video_track(Affine::rotate(std::f64::consts::FRAC_PI_2));
        video.readable = self.video_readable;
        Ok(Arc::new(StubAsset {
            location: location.clone(),
            duration: self.duration,
            video: Some(video),
            audio: Some(audio_track()),
        }))
    }
}

fn opener(duration: f64) -> Arc<StubOpener> {
    Arc::new(StubOpener {
        duration,
        video_readable: true,
        ..Default::default()
    })
}

#[test]
fn path_resolution_follows_uri_absolute_relative_order() {
    let stub = opener(2.0);
    let asm = SourceTrackAssembler::new(
        BaseLocation::Dir(PathBuf::from("/data")),
        stub.clone(),
    );
    asm.resolve("a", "https://cdn.example/a.mp4");
    asm.resolve("b", "/abs/b.mp4");
    asm.resolve("c", "media/c.mp4");

    let opened = stub.opened.lock().unwrap().clone();
    assert_eq!(
        opened,
        vec![
            ResourceLocation::Uri("https://cdn.example/a.mp4".to_owned()),
            ResourceLocation::File(PathBuf::from("/abs/b.mp4")),
            ResourceLocation::File(PathBuf::from("/data/media/c.mp4")),
        ]
    );
}

#[test]
fn first_resolve_wins_and_is_cached() {
    let stub = opener(2.0);
    let asm = SourceTrackAssembler::new(BaseLocation::Dir(PathBuf::from("/d")), stub.clone());
    let first = asm.resolve("clip", "one.mp4");
    let second = asm.resolve("clip", "two.mp4");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(stub.opens.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&asm.cached("clip").unwrap(), &first));
    assert!(asm.cached("other").is_none());
}

#[test]
fn concurrent_first_access_opens_once() {
    let stub = opener(2.0);
    let asm = Arc::new(SourceTrackAssembler::new(
        BaseLocation::Dir(PathBuf::from("/d")),
        stub.clone(),
    ));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let asm = Arc::clone(&asm);
            std::thread::spawn(move || asm.resolve("k", "k.mp4"))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(stub.opens.load(Ordering::SeqCst), 1);
    assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[test]
fn builds_video_and_audio_spanning_full_duration() {
    let asm = SourceTrackAssembler::new(BaseLocation::Dir(PathBuf::from("/d")), opener(3.5));
    let sc = asm.resolve("clip", "clip.mp4");
    assert!(sc.asset.is_some());

    let video = sc.video_track().unwrap();
    assert_eq!(
        video.preferred_transform,
        Affine::rotate(std::f64::consts::FRAC_PI_2)
    );
    assert_eq!(video.segments.len(), 1);
    assert_eq!(video.segments[0].source, TimeRange::new(0.0, 3.5));
    assert_eq!(video.segments[0].at, 0.0);

    let audio = sc.audio_track().unwrap();
    assert_eq!(audio.preferred_transform, Affine::IDENTITY);
    assert_eq!(audio.duration(), 3.5);
}

#[test]
fn zero_duration_omits_both_tracks_but_keeps_asset() {
    let asm = SourceTrackAssembler::new(BaseLocation::Dir(PathBuf::from("/d")), opener(0.0));
    let sc = asm.resolve("clip", "clip.mp4");
    assert!(sc.asset.is_some());
    assert!(sc.composition.tracks.is_empty());
}

#[test]
fn unreadable_video_keeps_audio_only() {
    let stub = Arc::new(StubOpener {
        duration: 1.0,
        video_readable: false,
        ..Default::default()
    });
    let asm = SourceTrackAssembler::new(BaseLocation::Dir(PathBuf::from("/d")), stub);
    let sc = asm.resolve("clip", "clip.mp4");
    assert!(sc.video_track().is_none());
    assert!(sc.audio_track().is_some());
}

#[test]
fn open_failure_is_absorbed() {
    let stub = Arc::new(StubOpener {
        fail: true,
        ..Default::default()
    });
    let asm = SourceTrackAssembler::new(BaseLocation::Dir(PathBuf::from("/d")), stub);
    let sc = asm.resolve("clip", "clip.mp4");
    assert!(sc.asset.is_none());
    assert!(sc.composition.tracks.is_empty());
    assert_eq!(sc.key, "clip");
}

#[test]
fn segment_at_maps_composition_time_to_source_time() {
    let asset: Arc<dyn SourceAsset> = Arc::new(StubAsset {
        location: ResourceLocation::File(PathBuf::from("/x")),
        duration: 10.0,
        video: None,
        audio: None,
    });
    let mut track = CompositionTrack::new(TrackId(1), MediaKind::Video);
    track
        .insert_time_range(TimeRange::new(2.0, 3.0), &asset, &video_track(Affine::IDENTITY), 1.0)
        .unwrap();
    let (_, src) = track.segment_at(2.5).unwrap();
    assert!((src - 3.5).abs() < 1e-12);
    assert!(track.segment_at(0.5).is_none());
    assert!(track.segment_at(4.0).is_none());

    let err = track
        .insert_time_range(TimeRange::new(0.0, 1.0), &asset, &audio_track(), 0.0)
        .unwrap_err();
    assert!(matches!(err, CompositorError::TrackInsertion(_)));
}
