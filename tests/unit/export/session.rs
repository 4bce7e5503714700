use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::*;
use crate::assets::assembler::{AssetOpener, CompositionTrack, MediaKind, SourceAsset, SourceTrack};
use crate::assets::locate::{BaseLocation, ResourceLocation};
use crate::export::frames::NoSourceFrames;
use crate::export::sink::InMemorySink;
use crate::foundation::core::{Affine, PixelFormat, TrackId};
use crate::scene::model::Manifest;

/// Completes requests in reverse order once `batch` of them are queued.
#[derive(Default)]
struct BatchingCompositor {
    batch: usize,
    fail_frame: Option<u64>,
    queued: Mutex<Vec<RenderRequest>>,
    seen_tracks: Mutex<Vec<(u64, Vec<TrackId>, bool)>>,
    cancelled: AtomicBool,
}

impl VideoCompositor for BatchingCompositor {
    fn start_request(&self, request: RenderRequest) {
        self.seen_tracks.lock().unwrap().push((
            request.frame.0,
            request.source_track_ids(),
            request.instruction.is_some(),
        ));
        let mut queued = self.queued.lock().unwrap();
        queued.push(request);
        if queued.len() < self.batch {
            return;
        }
        let ready: Vec<_> = queued.drain(..).collect();
        drop(queued);
        for req in ready.into_iter().rev() {
            let frame = req.frame.0;
            if Some(frame) == self.fail_frame {
                req.finish(Err(CompositorError::export("boom")));
                continue;
            }
            let mut buf = req.render_context.new_pixel_buffer();
            buf.data[0] = frame as u8;
            req.finish(Ok(buf));
        }
    }

    fn render_context_changed(&self, _context: RenderContext) {}

    fn cancel_all_pending_requests(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let pending: Vec<_> = self.queued.lock().unwrap().drain(..).collect();
        for req in pending {
            req.finish(Err(CompositorError::Cancelled));
        }
    }
}

#[derive(Debug)]
struct StubAsset(ResourceLocation);

impl SourceAsset for StubAsset {
    fn location(&self) -> &ResourceLocation {
        &self.0
    }
    fn duration_secs(&self) -> f64 {
        100.0
    }
    fn track(&self, kind: MediaKind) -> Option<SourceTrack> {
        (kind == MediaKind::Video).then_some(SourceTrack {
            kind,
            preferred_transform: Affine::IDENTITY,
            readable: true,
            width: 4,
            height: 4,
        })
    }
}

struct StubOpener;

impl AssetOpener for StubOpener {
    fn open(&self, location: &ResourceLocation) -> CompositorResult<Arc<dyn SourceAsset>> {
        Ok(Arc::new(StubAsset(location.clone())))
    }
}

struct SolidFrames;

impl SourceFrameProvider for SolidFrames {
    fn frame_at(
        &mut self,
        track: &CompositionTrack,
        time: f64,
    ) -> CompositorResult<Option<Arc<PixelBuffer>>> {
        Ok(track
            .segment_at(time)
            .map(|_| Arc::new(PixelBuffer::new(4, 4, PixelFormat::Bgra8Premul))))
    }
}

fn manager(json: &str) -> Arc<CompositionManager> {
    let manifest = Manifest::from_json_str(json).unwrap();
    Arc::new(
        CompositionManager::from_manifest(
            manifest,
            BaseLocation::Dir(PathBuf::from("/data")),
            Arc::new(StubOpener),
        )
        .unwrap(),
    )
}

const PLAIN: &str = r#"{ "width": 4, "height": 4, "fps": { "num": 10, "den": 1 }, "duration": 6 }"#;

#[test]
fn completions_reach_the_sink_in_frame_order() {
    let compositor = Arc::new(BatchingCompositor {
        batch: 3,
        ..Default::default()
    });
    let mut session = ExportSession::new(
        compositor,
        manager(PLAIN),
        Box::new(NoSourceFrames),
        ExportOpts::default().with_max_in_flight(3),
    );
    let mut sink = InMemorySink::new();
    let stats = session
        .export(FrameRange::new(FrameIndex(0), FrameIndex(6)).unwrap(), &mut sink)
        .unwrap();

    assert_eq!(stats.frames, 6);
    assert!(sink.is_ended());
    let order: Vec<_> = sink.frames().iter().map(|(i, b)| (i.0, b.data[0])).collect();
    assert_eq!(order, vec![(0, 0), (1, 1), (2, 2), (3, 3), (4, 4), (5, 5)]);
    assert_eq!(sink.config().unwrap().width, 4);
}

#[test]
fn first_failure_cancels_pending_and_is_returned() {
    let compositor = Arc::new(BatchingCompositor {
        batch: 2,
        fail_frame: Some(2),
        ..Default::default()
    });
    let mut session = ExportSession::new(
        Arc::clone(&compositor) as Arc<dyn VideoCompositor>,
        manager(PLAIN),
        Box::new(NoSourceFrames),
        ExportOpts::default().with_max_in_flight(3),
    );
    let mut sink = InMemorySink::new();
    let err = session
        .export(FrameRange::new(FrameIndex(0), FrameIndex(6)).unwrap(), &mut sink)
        .unwrap_err();

    assert!(matches!(err, CompositorError::Export(_)));
    assert!(compositor.cancelled.load(Ordering::SeqCst));
    assert!(!sink.is_ended());
    assert!(sink.frames().iter().all(|(i, _)| i.0 < 2));
}

#[test]
fn video_tracks_get_source_frames_and_instructions() {
    let json = r#"{
      "width": 4, "height": 4, "fps": { "num": 10, "den": 1 }, "duration": 4,
      "files": { "a": "a.mp4" },
      "elements": [ { "type": "video", "name": "clip", "file": "a", "start": 2 } ]
    }"#;
    let compositor = Arc::new(BatchingCompositor {
        batch: 1,
        ..Default::default()
    });
    let mut session = ExportSession::new(
        Arc::clone(&compositor) as Arc<dyn VideoCompositor>,
        manager(json),
        Box::new(SolidFrames),
        ExportOpts::default(),
    );
    let mut sink = InMemorySink::new();
    let stats = session
        .export(FrameRange::new(FrameIndex(0), FrameIndex(4)).unwrap(), &mut sink)
        .unwrap();

    assert_eq!(stats.frames, 4);
    assert_eq!(stats.frames_with_video, 2);
    let seen = compositor.seen_tracks.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            (0, vec![], true),
            (1, vec![], true),
            (2, vec![TrackId(1)], true),
            (3, vec![TrackId(1)], true),
        ]
    );
}
