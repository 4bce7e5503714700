//! Export driver playing the host role: one request per frame, completions reordered into a sink.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crate::compositor::instruction::VideoCompositionInstruction;
use crate::compositor::request::{PixelBuffer, RenderContext, RenderRequest};
use crate::compositor::scheduler::VideoCompositor;
use crate::export::frames::SourceFrameProvider;
use crate::export::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{FrameIndex, FrameRange};
use crate::foundation::error::{CompositorError, CompositorResult};
use crate::scene::manager::CompositionManager;
use crate::scene::track_model::TrackModel;

/// Export options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportOpts {
    /// Requests outstanding at once.
    pub max_in_flight: usize,
}

impl Default for ExportOpts {
    fn default() -> Self {
        Self { max_in_flight: 8 }
    }
}

impl ExportOpts {
    /// Set the in-flight request limit (at least one).
    pub fn with_max_in_flight(mut self, n: usize) -> Self {
        self.max_in_flight = n.max(1);
        self
    }
}

/// Summary of a finished export.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportStats {
    /// Frames pushed to the sink.
    pub frames: u64,
    /// Frames that had at least one source frame attached.
    pub frames_with_video: u64,
    /// Wall time of the export.
    pub elapsed: Duration,
}

type Completed = (FrameIndex, CompositorResult<PixelBuffer>);

/// Drives a [`VideoCompositor`] over a frame range of a [`CompositionManager`].
///
/// The compositor must already have the manager installed as its track model.
pub struct ExportSession {
    compositor: Arc<dyn VideoCompositor>,
    manager: Arc<CompositionManager>,
    frames: Box<dyn SourceFrameProvider>,
    opts: ExportOpts,
}

impl std::fmt::Debug for ExportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportSession")
            .field("manager", &self.manager)
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl ExportSession {
    /// Session over `manager`, pulling source frames from `frames`.
    pub fn new(
        compositor: Arc<dyn VideoCompositor>,
        manager: Arc<CompositionManager>,
        frames: Box<dyn SourceFrameProvider>,
        opts: ExportOpts,
    ) -> Self {
        Self {
            compositor,
            manager,
            frames,
            opts,
        }
    }

    /// Render `range` into `sink`.
    ///
    /// Frames complete in any order and reach the sink in frame order. The first failed request
    /// cancels everything still pending and is returned once the rest have drained.
    #[tracing::instrument(skip_all, fields(start = range.start.0, end = range.end.0))]
    pub fn export(
        &mut self,
        range: FrameRange,
        sink: &mut dyn FrameSink,
    ) -> CompositorResult<ExportStats> {
        let started = Instant::now();
        let canvas = self.manager.canvas();
        let fps = self.manager.fps();
        let timeline = self.manager.composition();
        let instructions: Vec<Arc<VideoCompositionInstruction>> = self
            .manager
            .video_composition()
            .instructions
            .into_iter()
            .map(Arc::new)
            .collect();
        let video_tracks: Vec<_> = timeline
            .tracks_of(crate::assets::assembler::MediaKind::Video)
            .collect();

        sink.begin(SinkConfig {
            width: canvas.width,
            height: canvas.height,
            fps,
        })?;

        let (tx, rx) = mpsc::channel::<Completed>();
        let mut reorder = Reorder::new(range.start);
        let mut stats = ExportStats::default();
        let mut in_flight = 0usize;

        for f in range.start.0..range.end.0 {
            while in_flight >= self.opts.max_in_flight {
                let done = recv(&rx)?;
                in_flight -= 1;
                if let Err(e) = reorder.accept(done, sink, &mut stats) {
                    return Err(self.abort(e, &rx, in_flight));
                }
            }

            let frame = FrameIndex(f);
            let time = fps.frame_to_secs(frame);
            let done_tx = tx.clone();
            let mut request = RenderRequest::new(
                frame,
                time,
                RenderContext::new(canvas.width, canvas.height),
                move |idx, result| {
                    // The receiver only goes away once the export is over.
                    let _ = done_tx.send((idx, result));
                },
            );

            let mut attached = false;
            for track in &video_tracks {
                match self.frames.frame_at(track, time) {
                    Ok(Some(buf)) => {
                        request = request.with_source_frame(track.id, buf);
                        attached = true;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(
                            frame = f,
                            track = track.id.0,
                            error = %e,
                            "source frame unavailable"
                        );
                    }
                }
            }
            if attached {
                stats.frames_with_video += 1;
            }
            if let Some(i) = instructions.iter().find(|i| i.range.contains(time)) {
                request = request.with_instruction(Arc::clone(i));
            }

            self.compositor.start_request(request);
            in_flight += 1;
        }

        while in_flight > 0 {
            let done = recv(&rx)?;
            in_flight -= 1;
            if let Err(e) = reorder.accept(done, sink, &mut stats) {
                return Err(self.abort(e, &rx, in_flight));
            }
        }

        sink.end()?;
        stats.elapsed = started.elapsed();
        tracing::info!(
            frames = stats.frames,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "export finished"
        );
        Ok(stats)
    }

    fn abort(
        &self,
        err: CompositorError,
        rx: &mpsc::Receiver<Completed>,
        in_flight: usize,
    ) -> CompositorError {
        tracing::error!(
            error = %err,
            pending = in_flight,
            "export failed, cancelling pending frames"
        );
        self.compositor.cancel_all_pending_requests();
        for _ in 0..in_flight {
            if rx.recv().is_err() {
                break;
            }
        }
        err
    }
}

fn recv(rx: &mpsc::Receiver<Completed>) -> CompositorResult<Completed> {
    rx.recv()
        .map_err(|_| CompositorError::compositor_unavailable("completion channel closed"))
}

/// Holds out-of-order frames until their turn.
struct Reorder {
    next: FrameIndex,
    pending: BTreeMap<FrameIndex, PixelBuffer>,
}

impl Reorder {
    fn new(first: FrameIndex) -> Self {
        Self {
            next: first,
            pending: BTreeMap::new(),
        }
    }

    fn accept(
        &mut self,
        (idx, result): Completed,
        sink: &mut dyn FrameSink,
        stats: &mut ExportStats,
    ) -> CompositorResult<()> {
        self.pending.insert(idx, result?);
        while let Some(buf) = self.pending.remove(&self.next) {
            sink.push_frame(self.next, &buf)?;
            stats.frames += 1;
            if stats.frames % 100 == 0 {
                tracing::info!(frames = stats.frames, "export progress");
            }
            self.next = FrameIndex(self.next.0 + 1);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/session.rs"]
mod tests;
