//! Frame orientation normalizer.
//!
//! Decoded source frames arrive in coded orientation. The track transform active at the
//! composition time says how to display them; this module resolves that transform into an
//! [`OrientedImage`] without touching pixels.

use std::sync::Arc;

use crate::assets::image::DecodedImage;
use crate::compositor::instruction::VideoCompositionInstruction;
use crate::foundation::core::{Affine, Rect, TrackId};

/// A decoded frame plus the transform that orients it.
///
/// `transform` acts on Y-up image space, where the frame occupies `[0, w] × [0, h]` with its
/// first pixel row at the top.
#[derive(Clone, Debug)]
pub struct OrientedImage {
    /// Pixels, shared with the source.
    pub image: Arc<DecodedImage>,
    /// Orientation transform in Y-up image space.
    pub transform: Affine,
}

impl OrientedImage {
    /// Image shown as decoded.
    pub fn upright(image: Arc<DecodedImage>) -> Self {
        Self {
            image,
            transform: Affine::IDENTITY,
        }
    }

    /// Bounding box of the transformed frame.
    pub fn extent(&self) -> Rect {
        let (w, h) = self.image.size();
        self.transform
            .transform_rect_bbox(Rect::new(0.0, 0.0, w, h))
    }

    /// Maps pixel coordinates (row 0 on top, Y down) into oriented Y-up space.
    pub fn pixel_transform(&self) -> Affine {
        let (_, h) = self.image.size();
        self.transform * Affine::new([1.0, 0.0, 0.0, -1.0, 0.0, h])
    }
}

/// Orientation to apply for an active track transform on a `width`×`height` frame.
///
/// Transforms translated by exactly `(height, 0)` are the encoder quirk for 90° sources; they are
/// composed with a half turn and a `(-width, -height)` shift first.
pub fn orientation_for(active: Affine, width: f64, height: f64) -> Affine {
    if active == Affine::IDENTITY {
        return Affine::IDENTITY;
    }
    let [.., tx, ty] = active.as_coeffs();
    if tx == height && ty == 0.0 {
        return active
            * Affine::rotate(-std::f64::consts::PI)
            * Affine::translate((-width, -height));
    }
    active
}

/// Orient `frame` using the transform `instruction` holds for `track_id` at `time`.
///
/// Without an instruction, a layer for the track, or an active non-identity transform, the frame
/// comes back unchanged.
pub fn normalize(
    frame: Arc<DecodedImage>,
    instruction: Option<&VideoCompositionInstruction>,
    track_id: TrackId,
    time: f64,
) -> OrientedImage {
    let active = instruction
        .and_then(|i| i.layer(track_id))
        .and_then(|l| l.transform_at(time));
    match active {
        Some(t) if t != Affine::IDENTITY => {
            let (w, h) = frame.size();
            OrientedImage {
                transform: orientation_for(t, w, h),
                image: frame,
            }
        }
        _ => OrientedImage::upright(frame),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/orientation.rs"]
mod tests;
