//! Asynchronous per-frame compositing: requests in, finished pixel buffers out.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::compositor::request::{PixelBuffer, RenderContext, RenderRequest};
use crate::foundation::core::{CancelToken, PixelFormat};
use crate::foundation::error::{CompositorError, CompositorResult};
use crate::render::cpu::CpuSurface;
use crate::render::painter::{RendererOpts, SceneRenderer};
use crate::scene::track_model::TrackModel;

/// Host-facing frame-render contract.
pub trait VideoCompositor: Send + Sync {
    /// Accept one request. Never blocks; the result arrives through the request's completion.
    fn start_request(&self, request: RenderRequest);

    /// The host changed its render context.
    fn render_context_changed(&self, context: RenderContext);

    /// Finish every request accepted so far with [`CompositorError::Cancelled`].
    fn cancel_all_pending_requests(&self);

    /// Layout of source frames handed in with requests.
    fn source_pixel_format(&self) -> PixelFormat {
        PixelFormat::Bgra8Premul
    }

    /// Layout of destination buffers.
    fn required_pixel_format(&self) -> PixelFormat {
        PixelFormat::Bgra8Premul
    }
}

/// Compositor configuration.
#[derive(Clone, Debug, Default)]
pub struct CompositorOpts {
    /// Worker thread count; `None` lets rayon decide.
    pub threads: Option<usize>,
    /// Scene renderer options.
    pub renderer: RendererOpts,
}

impl CompositorOpts {
    /// Defaults, with `LAYERCAST_THREADS` applied when it holds a positive integer.
    pub fn from_env() -> Self {
        let threads = std::env::var("LAYERCAST_THREADS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0);
        Self {
            threads,
            ..Self::default()
        }
    }

    /// Set the worker thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Set the renderer options.
    pub fn with_renderer(mut self, renderer: RendererOpts) -> Self {
        self.renderer = renderer;
        self
    }
}

/// Request counters since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompositorStats {
    /// Requests accepted by `start_request`.
    pub started: u64,
    /// Requests finished with a buffer.
    pub succeeded: u64,
    /// Requests finished with an error other than cancellation.
    pub failed: u64,
    /// Requests finished as cancelled.
    pub cancelled: u64,
}

#[derive(Debug, Default)]
struct Counters {
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

impl Counters {
    fn record(&self, result: &CompositorResult<PixelBuffer>) {
        let counter = match result {
            Ok(_) => &self.succeeded,
            Err(e) if e.is_cancelled() => &self.cancelled,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// [`VideoCompositor`] rendering manifest scenes on a rayon pool.
pub struct SceneCompositor {
    pool: rayon::ThreadPool,
    model: RwLock<Option<Arc<dyn TrackModel>>>,
    renderer: Arc<SceneRenderer>,
    epoch: Arc<AtomicU64>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for SceneCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneCompositor")
            .field("threads", &self.pool.current_num_threads())
            .field("has_model", &self.has_model())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl SceneCompositor {
    /// Build the worker pool. No track model is installed yet.
    pub fn new(opts: CompositorOpts) -> CompositorResult<Self> {
        if opts.threads == Some(0) {
            return Err(CompositorError::validation(
                "compositor 'threads' must be >= 1 when set",
            ));
        }
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("layercast-compositor-{i}"));
        if let Some(n) = opts.threads {
            builder = builder.num_threads(n);
        }
        let pool = builder.build().map_err(|e| {
            CompositorError::compositor_unavailable(format!(
                "failed to build rayon thread pool: {e}"
            ))
        })?;

        Ok(Self {
            pool,
            model: RwLock::new(None),
            renderer: Arc::new(SceneRenderer::new(opts.renderer)),
            epoch: Arc::new(AtomicU64::new(0)),
            counters: Arc::new(Counters::default()),
        })
    }

    /// Install the track model used by every later request.
    pub fn install_model(&self, model: Arc<dyn TrackModel>) {
        *self.model.write().unwrap_or_else(|p| p.into_inner()) = Some(model);
    }

    /// Remove the track model; later requests fail immediately.
    pub fn clear_model(&self) {
        *self.model.write().unwrap_or_else(|p| p.into_inner()) = None;
    }

    /// Return `true` when a track model is installed.
    pub fn has_model(&self) -> bool {
        self.current_model().is_some()
    }

    /// Snapshot of the request counters.
    pub fn stats(&self) -> CompositorStats {
        CompositorStats {
            started: self.counters.started.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            cancelled: self.counters.cancelled.load(Ordering::Relaxed),
        }
    }

    fn current_model(&self) -> Option<Arc<dyn TrackModel>> {
        self.model.read().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl VideoCompositor for SceneCompositor {
    fn start_request(&self, request: RenderRequest) {
        self.counters.started.fetch_add(1, Ordering::Relaxed);

        let Some(model) = self.current_model() else {
            tracing::warn!(frame = request.frame.0, "no track model installed");
            let result = Err(CompositorError::compositor_unavailable(
                "no track model installed",
            ));
            self.counters.record(&result);
            request.finish(result);
            return;
        };

        let token = CancelToken::new(Arc::clone(&self.epoch));
        let renderer = Arc::clone(&self.renderer);
        let counters = Arc::clone(&self.counters);
        tracing::trace!(frame = request.frame.0, "request queued");
        self.pool.spawn(move || {
            let result = if token.is_cancelled() {
                Err(CompositorError::Cancelled)
            } else {
                run_guarded(&request, model.as_ref(), &renderer, &token)
            };
            counters.record(&result);
            request.finish(result);
        });
    }

    fn render_context_changed(&self, _context: RenderContext) {}

    fn cancel_all_pending_requests(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::info!(epoch, "cancelling pending render requests");
    }
}

fn run_guarded(
    request: &RenderRequest,
    model: &dyn TrackModel,
    renderer: &SceneRenderer,
    token: &CancelToken,
) -> CompositorResult<PixelBuffer> {
    let rendered = catch_unwind(AssertUnwindSafe(|| {
        render_request(request, model, renderer, token)
    }));
    match rendered {
        Ok(result) => result,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            tracing::error!(frame = request.frame.0, panic = %msg, "render task panicked");
            Err(anyhow::anyhow!("render task panicked: {msg}").into())
        }
    }
}

#[tracing::instrument(skip_all, fields(frame = request.frame.0, time = request.time))]
fn render_request(
    request: &RenderRequest,
    model: &dyn TrackModel,
    renderer: &SceneRenderer,
    token: &CancelToken,
) -> CompositorResult<PixelBuffer> {
    let ctx = request.render_context;
    let mut dst = ctx.new_pixel_buffer();
    let mut surface = CpuSurface::new(ctx.width, ctx.height)?;

    let elements = model.elements_at(request.frame);
    let inputs = request.frame_inputs();
    renderer.render_frame(&mut surface, model, &elements, &inputs, token)?;

    token.check()?;
    surface.write_into(&mut dst)?;
    Ok(dst)
}
