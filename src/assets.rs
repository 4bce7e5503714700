pub mod assembler;
/// Decoded, premultiplied raster images.
pub mod image;
/// Manifest path resolution.
pub mod locate;
/// `ffprobe` / `ffmpeg` helpers for probing and frame extraction.
pub mod media;
