use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::*;

#[test]
fn frame_range_validates_and_contains() {
    assert!(FrameRange::new(FrameIndex(5), FrameIndex(4)).is_err());

    let r = FrameRange::new(FrameIndex(2), FrameIndex(5)).unwrap();
    assert_eq!(r.len_frames(), 3);
    assert!(r.contains(FrameIndex(2)));
    assert!(r.contains(FrameIndex(4)));
    assert!(!r.contains(FrameIndex(5)));
    assert!(FrameRange::new(FrameIndex(3), FrameIndex(3)).unwrap().is_empty());
}

#[test]
fn fps_frame_time_conversions() {
    assert!(Fps::new(30, 0).is_err());
    assert!(Fps::new(0, 1).is_err());

    let fps = Fps::new(30, 1).unwrap();
    assert!((fps.frame_to_secs(FrameIndex(45)) - 1.5).abs() < 1e-12);
    assert_eq!(fps.secs_to_frames_floor(1.51), 45);
    assert_eq!(fps.secs_to_frames_floor(-2.0), 0);
}

#[test]
fn time_range_is_half_open() {
    let r = TimeRange::new(1.0, 2.0);
    assert!(r.contains(1.0));
    assert!(r.contains(2.999));
    assert!(!r.contains(3.0));
    assert!(r.is_playable());
    assert!(!TimeRange::new(0.0, 0.0).is_playable());
    assert!(!TimeRange::new(0.0, f64::NAN).is_playable());
}

#[test]
fn cancel_token_observes_epoch_bumps_after_creation() {
    let epoch = Arc::new(AtomicU64::new(7));
    let before = CancelToken::new(epoch.clone());
    assert!(!before.is_cancelled());
    assert!(before.check().is_ok());

    epoch.fetch_add(1, Ordering::AcqRel);
    let after = CancelToken::new(epoch.clone());

    assert!(before.is_cancelled());
    assert!(matches!(before.check(), Err(CompositorError::Cancelled)));
    assert!(!after.is_cancelled());
    assert!(!CancelToken::never().is_cancelled());
}
