/// `ffmpeg` encoder sink.
pub mod ffmpeg;
pub mod frames;
pub mod session;
/// Frame sink abstraction and an in-memory sink.
pub mod sink;
