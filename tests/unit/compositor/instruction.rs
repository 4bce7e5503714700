use super::*;

#[test]
fn transform_is_absent_before_first_set() {
    let mut layer = LayerInstruction::new(TrackId(1));
    layer.set_transform(Affine::scale(2.0), 1.0);
    assert_eq!(layer.transform_at(0.5), None);
    assert_eq!(layer.transform_at(1.0), Some(Affine::scale(2.0)));
    assert_eq!(layer.transform_at(100.0), Some(Affine::scale(2.0)));
}

#[test]
fn later_sets_override_earlier_ones() {
    let mut layer = LayerInstruction::new(TrackId(1));
    layer.set_transform(Affine::translate((5.0, 0.0)), 2.0);
    layer.set_transform(Affine::IDENTITY, 0.0);
    assert_eq!(layer.transform_at(1.0), Some(Affine::IDENTITY));
    assert_eq!(layer.transform_at(3.0), Some(Affine::translate((5.0, 0.0))));
}

#[test]
fn ramps_interpolate_and_hold_end_value() {
    let mut layer = LayerInstruction::new(TrackId(1));
    layer.set_transform_ramp(
        Affine::IDENTITY,
        Affine::translate((10.0, 0.0)),
        TimeRange::new(0.0, 2.0),
    );
    let mid = layer.transform_at(1.0).unwrap();
    assert!((mid.as_coeffs()[4] - 5.0).abs() < 1e-12);
    assert_eq!(layer.transform_at(5.0), Some(Affine::translate((10.0, 0.0))));
}

#[test]
fn instruction_lookup_by_time_and_track() {
    let mut layer = LayerInstruction::new(TrackId(7));
    layer.set_transform(Affine::IDENTITY, 0.0);
    let vc = VideoComposition {
        canvas: Canvas {
            width: 4,
            height: 4,
        },
        fps: Fps::new(30, 1).unwrap(),
        instructions: vec![VideoCompositionInstruction {
            range: TimeRange::new(0.0, 10.0),
            layers: vec![layer],
        }],
    };
    let ins = vc.instruction_at(3.0).unwrap();
    assert!(ins.layer(TrackId(7)).is_some());
    assert!(ins.layer(TrackId(8)).is_none());
    assert_eq!(ins.track_ids().collect::<Vec<_>>(), vec![TrackId(7)]);
    assert!(vc.instruction_at(10.0).is_none());
}
