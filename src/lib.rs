//! Layercast renders a manifest-driven overlay scene onto video frames.
//!
//! The crate is organised around a host-facing, asynchronous per-frame request protocol:
//!
//! - Load a manifest into a [`CompositionManager`] (the track model)
//! - Install it on a [`SceneCompositor`] and submit one [`RenderRequest`] per output frame
//! - Or let an [`ExportSession`] play the host role and stream frames into a [`FrameSink`]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Media assets: decoded images, path resolution, probing and the source track assembler.
pub mod assets;
/// Host-facing compositor: instructions, render requests and the async scheduler.
pub mod compositor;
/// Export driver: frame sinks, source-frame providers and the export session.
pub mod export;
mod foundation;
/// Geometry and color utilities.
pub mod geometry;
/// Layered scene rendering onto drawing surfaces.
pub mod render;
/// Manifest model and the track-model collaborator.
pub mod scene;

pub use crate::foundation::core::{
    Affine, CancelToken, Canvas, Fps, FrameIndex, FrameRange, PixelFormat, Point, Rect, TimeRange,
    TrackId,
};
pub use crate::foundation::error::{CompositorError, CompositorResult};

pub use crate::assets::assembler::{
    AssetOpener, Composition, CompositionTrack, MediaKind, SourceAsset, SourceComposition,
    SourceTrack, SourceTrackAssembler, TrackSegment,
};
pub use crate::assets::image::DecodedImage;
pub use crate::assets::locate::{BaseLocation, ResourceLocation};
pub use crate::compositor::instruction::{
    LayerInstruction, VideoComposition, VideoCompositionInstruction,
};
pub use crate::compositor::request::{PixelBuffer, RenderContext, RenderRequest};
pub use crate::compositor::scheduler::{
    CompositorOpts, CompositorStats, SceneCompositor, VideoCompositor,
};
pub use crate::export::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
pub use crate::export::frames::{NoSourceFrames, SourceFrameProvider};
pub use crate::export::session::{ExportOpts, ExportSession, ExportStats};
pub use crate::export::sink::{FrameSink, InMemorySink, SinkConfig};
pub use crate::geometry::color::Rgba;
pub use crate::geometry::rect::{CoordinateFlip, ManifestRect, ResizeMode};
pub use crate::render::cpu::CpuSurface;
pub use crate::render::painter::{
    FrameInputs, FrameReport, GradientBand, RendererOpts, SceneRenderer,
};
pub use crate::render::surface::DrawSurface;
pub use crate::scene::element::{Element, ElementInstance, ElementKind};
pub use crate::scene::manager::CompositionManager;
pub use crate::scene::model::Manifest;
pub use crate::scene::props::{FlatProps, PropValue};
pub use crate::scene::track_model::{ImageCache, TrackModel};
