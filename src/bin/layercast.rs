use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use layercast::{
    CompositionManager, CompositorOpts, ExportOpts, ExportSession, FfmpegSink, FfmpegSinkOpts,
    FrameIndex, FrameRange, InMemorySink, SceneCompositor, TrackModel, VideoCompositor,
    export::frames::FfmpegFrameProvider,
};

#[derive(Parser, Debug)]
#[command(name = "layercast", version)]
struct Cli {
    /// Log more (repeat for trace output).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Worker threads (defaults to LAYERCAST_THREADS, then the CPU count).
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a data directory's composition to MP4 (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Data directory holding `composition.json` and its media.
    dir: PathBuf,

    /// Output MP4 path (defaults to `<DIR>/out.mp4`).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Maximum frames rendering at once.
    #[arg(long, default_value_t = 8)]
    in_flight: usize,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Data directory holding `composition.json` and its media.
    dir: PathBuf,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut opts = CompositorOpts::from_env();
    if let Some(n) = cli.threads {
        opts = opts.with_threads(n);
    }
    match cli.cmd {
        Command::Render(args) => cmd_render(args, opts),
        Command::Frame(args) => cmd_frame(args, opts),
    }
}

fn open_session(
    dir: &Path,
    opts: CompositorOpts,
    export: ExportOpts,
) -> anyhow::Result<(Arc<CompositionManager>, ExportSession)> {
    let manager = Arc::new(
        CompositionManager::load(dir)
            .with_context(|| format!("load composition from '{}'", dir.display()))?,
    );
    let compositor = SceneCompositor::new(opts)?;
    compositor.install_model(Arc::clone(&manager) as Arc<dyn TrackModel>);
    let compositor: Arc<dyn VideoCompositor> = Arc::new(compositor);
    let session = ExportSession::new(
        compositor,
        Arc::clone(&manager),
        Box::new(FfmpegFrameProvider::new()),
        export,
    );
    Ok((manager, session))
}

fn cmd_render(args: RenderArgs, opts: CompositorOpts) -> anyhow::Result<()> {
    let started = Instant::now();
    let out = args.out.unwrap_or_else(|| args.dir.join("out.mp4"));
    if out.exists() {
        std::fs::remove_file(&out)
            .with_context(|| format!("remove previous output '{}'", out.display()))?;
    }

    let (manager, mut session) = open_session(
        &args.dir,
        opts,
        ExportOpts::default().with_max_in_flight(args.in_flight),
    )?;
    let bg = manager
        .background()
        .map(|c| c.to_rgba8())
        .unwrap_or([0, 0, 0, 255]);
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(&out).with_background(bg));
    let stats = session.export(manager.manifest().range(), &mut sink)?;

    tracing::info!(
        frames = stats.frames,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "render finished"
    );
    eprintln!(
        "wrote {} ({} frames in {:.2}s)",
        out.display(),
        stats.frames,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

fn cmd_frame(args: FrameArgs, opts: CompositorOpts) -> anyhow::Result<()> {
    let (manager, mut session) = open_session(&args.dir, opts, ExportOpts::default())?;
    let range = FrameRange::new(FrameIndex(args.frame), FrameIndex(args.frame + 1))?;
    if !manager.manifest().range().contains(range.start) {
        anyhow::bail!(
            "frame {} is outside the composition (duration {})",
            args.frame,
            manager.manifest().duration
        );
    }

    let mut sink = InMemorySink::new();
    session.export(range, &mut sink)?;
    let (_, frame) = sink
        .into_frames()
        .pop()
        .context("export produced no frame")?;

    // Frames are opaque (background first), so premultiplied equals straight alpha.
    let mut rgba = frame.data;
    for px in rgba.chunks_exact_mut(4) {
        px.swap(0, 2);
    }

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &rgba,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
