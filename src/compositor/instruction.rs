//! Video-composition instructions: which tracks are layered over a time range, and with which
//! track transforms.

use crate::foundation::core::{Affine, Canvas, Fps, TimeRange, TrackId};

/// Transform applied to a track from `range.start`, interpolated to `end` over `range`.
///
/// After the range the `end` transform holds. A zero-length range is a plain "set transform".
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformRamp {
    /// Ramp interval in composition seconds.
    pub range: TimeRange,
    /// Transform at `range.start`.
    pub start: Affine,
    /// Transform at `range.end()` and after.
    pub end: Affine,
}

impl TransformRamp {
    fn at(&self, t: f64) -> Affine {
        if self.range.duration <= 0.0 || t >= self.range.end() {
            return self.end;
        }
        let u = ((t - self.range.start) / self.range.duration).clamp(0.0, 1.0);
        let a = self.start.as_coeffs();
        let b = self.end.as_coeffs();
        Affine::new(std::array::from_fn(|i| a[i] + (b[i] - a[i]) * u))
    }
}

/// Per-track transform schedule inside one instruction.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerInstruction {
    /// Track the schedule applies to.
    pub track_id: TrackId,
    /// Ramps ordered by start time.
    pub ramps: Vec<TransformRamp>,
}

impl LayerInstruction {
    /// Empty schedule for `track_id`.
    pub fn new(track_id: TrackId) -> Self {
        Self {
            track_id,
            ramps: Vec::new(),
        }
    }

    /// Set `transform` from composition time `at` onwards.
    pub fn set_transform(&mut self, transform: Affine, at: f64) {
        self.push(TransformRamp {
            range: TimeRange::new(at, 0.0),
            start: transform,
            end: transform,
        });
    }

    /// Interpolate from `start` to `end` over `range`.
    pub fn set_transform_ramp(&mut self, start: Affine, end: Affine, range: TimeRange) {
        self.push(TransformRamp { range, start, end });
    }

    fn push(&mut self, ramp: TransformRamp) {
        let idx = self
            .ramps
            .partition_point(|r| r.range.start <= ramp.range.start);
        self.ramps.insert(idx, ramp);
    }

    /// Transform active at `t`; `None` before the first ramp.
    pub fn transform_at(&self, t: f64) -> Option<Affine> {
        self.ramps
            .iter()
            .rev()
            .find(|r| r.range.start <= t)
            .map(|r| r.at(t))
    }
}

/// Layering of tracks over a time range.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoCompositionInstruction {
    /// Interval the instruction covers.
    pub range: TimeRange,
    /// Layer schedules, bottommost first.
    pub layers: Vec<LayerInstruction>,
}

impl VideoCompositionInstruction {
    /// Schedule for `track_id`, if the track participates.
    pub fn layer(&self, track_id: TrackId) -> Option<&LayerInstruction> {
        self.layers.iter().find(|l| l.track_id == track_id)
    }

    /// Ids of all participating tracks.
    pub fn track_ids(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.layers.iter().map(|l| l.track_id)
    }
}

/// Output format plus the instruction list driving the compositor.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoComposition {
    /// Render size.
    pub canvas: Canvas,
    /// Frame rate.
    pub fps: Fps,
    /// Instructions, non-overlapping and ordered by start.
    pub instructions: Vec<VideoCompositionInstruction>,
}

impl VideoComposition {
    /// Instruction covering composition time `t`.
    pub fn instruction_at(&self, t: f64) -> Option<&VideoCompositionInstruction> {
        self.instructions.iter().find(|i| i.range.contains(t))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compositor/instruction.rs"]
mod tests;
