use std::collections::HashMap;
use std::sync::Arc;

use crate::foundation::core::{FrameIndex, PixelFormat, TrackId};
use crate::foundation::error::{CompositorError, CompositorResult};
use crate::compositor::instruction::VideoCompositionInstruction;
use crate::render::painter::FrameInputs;

/// Packed pixel buffer (source frame or render destination).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Row-major pixel bytes, rows packed without padding.
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Zero-filled (transparent) buffer.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let len = width as usize * height as usize * format.bytes_per_pixel();
        Self {
            width,
            height,
            format,
            data: vec![0; len],
        }
    }

    /// Wrap packed bytes, checking the length.
    pub fn from_data(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> CompositorResult<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(CompositorError::validation(format!(
                "pixel buffer has {} bytes, expected {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Raw bytes of the pixel at `(x, y)` (row 0 is the top row).
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let off = y as usize * self.stride() + x as usize * 4;
        let px = self.data.get(off..off + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Allocation parameters for destination buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderContext {
    /// Destination width.
    pub width: u32,
    /// Destination height.
    pub height: u32,
    /// Destination pixel layout.
    pub format: PixelFormat,
}

impl RenderContext {
    /// Context for `width`×`height` BGRA destinations.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Bgra8Premul,
        }
    }

    /// Allocate one destination buffer.
    pub fn new_pixel_buffer(&self) -> PixelBuffer {
        PixelBuffer::new(self.width, self.height, self.format)
    }
}

type Completion = Box<dyn FnOnce(FrameIndex, CompositorResult<PixelBuffer>) + Send>;

/// One per-frame render request from the host.
///
/// The request is finished exactly once: [`RenderRequest::finish`] consumes it, and dropping an
/// unfinished request reports [`CompositorError::CompositorUnavailable`].
pub struct RenderRequest {
    /// Output frame index.
    pub frame: FrameIndex,
    /// Composition time in seconds.
    pub time: f64,
    /// Destination allocation parameters.
    pub render_context: RenderContext,
    /// Instruction active at `time`, if any.
    pub instruction: Option<Arc<VideoCompositionInstruction>>,
    source_frames: HashMap<TrackId, Arc<PixelBuffer>>,
    completion: Option<Completion>,
}

impl std::fmt::Debug for RenderRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderRequest")
            .field("frame", &self.frame)
            .field("time", &self.time)
            .field("render_context", &self.render_context)
            .field("source_tracks", &self.source_frames.keys().collect::<Vec<_>>())
            .field("finished", &self.completion.is_none())
            .finish()
    }
}

impl RenderRequest {
    /// New request whose result is delivered to `completion`.
    pub fn new(
        frame: FrameIndex,
        time: f64,
        render_context: RenderContext,
        completion: impl FnOnce(FrameIndex, CompositorResult<PixelBuffer>) + Send + 'static,
    ) -> Self {
        Self {
            frame,
            time,
            render_context,
            instruction: None,
            source_frames: HashMap::new(),
            completion: Some(Box::new(completion)),
        }
    }

    /// Attach the source frame for `track_id`.
    pub fn with_source_frame(mut self, track_id: TrackId, frame: Arc<PixelBuffer>) -> Self {
        self.source_frames.insert(track_id, frame);
        self
    }

    /// Attach the active instruction.
    pub fn with_instruction(mut self, instruction: Arc<VideoCompositionInstruction>) -> Self {
        self.instruction = Some(instruction);
        self
    }

    /// Source frame for `track_id`.
    pub fn source_frame(&self, track_id: TrackId) -> Option<&Arc<PixelBuffer>> {
        self.source_frames.get(&track_id)
    }

    /// Ids of tracks with a source frame attached.
    pub fn source_track_ids(&self) -> Vec<TrackId> {
        let mut ids: Vec<_> = self.source_frames.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Renderer inputs carried by this request.
    pub fn frame_inputs(&self) -> FrameInputs {
        FrameInputs {
            frame: self.frame,
            time: self.time,
            source_frames: self.source_frames.clone(),
            instruction: self.instruction.clone(),
        }
    }

    /// Deliver the result to the host.
    pub fn finish(mut self, result: CompositorResult<PixelBuffer>) {
        if let Some(done) = self.completion.take() {
            done(self.frame, result);
        }
    }
}

impl Drop for RenderRequest {
    fn drop(&mut self) {
        if let Some(done) = self.completion.take() {
            tracing::warn!(frame = self.frame.0, "render request dropped unfinished");
            done(
                self.frame,
                Err(CompositorError::compositor_unavailable(
                    "render request dropped before it was finished",
                )),
            );
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compositor/request.rs"]
mod tests;
