use camsnap::{Angles, AspectRatio, Axis, Facing, Reference, Size, compute_crop};

#[test]
fn aspect_ratio_reduces() {
    assert_eq!(AspectRatio::of(1920, 1080), AspectRatio::of(16, 9));
    assert_eq!(AspectRatio::of(1000, 1000), AspectRatio::of(1, 1));
    assert_eq!(AspectRatio::of(16, 9).flipped(), AspectRatio::of(9, 16));
}

#[test]
fn crop_shrinks_height_for_wider_target() {
    // 4:3 source, 16:9 target: keep width, cut height.
    let cropped = compute_crop(Size::new(1600, 1200), AspectRatio::of(16, 9));
    assert_eq!(cropped, Size::new(1600, 900));
}

#[test]
fn crop_shrinks_width_for_taller_target() {
    let cropped = compute_crop(Size::new(1920, 1080), AspectRatio::of(1, 1));
    assert_eq!(cropped, Size::new(1080, 1080));
}

#[test]
fn crop_is_identity_when_ratio_matches() {
    let size = Size::new(1280, 720);
    assert_eq!(compute_crop(size, AspectRatio::of(16, 9)), size);
}

#[test]
fn size_flip_swaps_dimensions() {
    assert_eq!(Size::new(640, 480).flipped(), Size::new(480, 640));
}

#[test]
fn angles_flip_detects_axis_swap() {
    let angles = Angles::new(Facing::Back, 90, 0, 0).unwrap();
    assert!(angles.flip(Reference::View, Reference::Sensor));
    assert!(!angles.flip(Reference::View, Reference::Output));

    let aligned = Angles::new(Facing::Back, 180, 0, 0).unwrap();
    assert!(!aligned.flip(Reference::View, Reference::Sensor));
}

#[test]
fn angles_offset_chains_through_base() {
    let angles = Angles::new(Facing::Back, 90, 0, 270).unwrap();
    assert_eq!(
        angles.offset(Reference::View, Reference::Output, Axis::Absolute),
        270
    );
    assert_eq!(
        angles.offset(Reference::Output, Reference::View, Axis::Absolute),
        90
    );
    assert_eq!(
        angles.offset(Reference::Sensor, Reference::Output, Axis::Absolute),
        180
    );
}

#[test]
fn front_sensor_offset_is_mirrored() {
    let back = Angles::new(Facing::Back, 90, 0, 0).unwrap();
    let front = Angles::new(Facing::Front, 90, 0, 0).unwrap();
    assert_eq!(
        back.offset(Reference::Base, Reference::Sensor, Axis::Absolute),
        90
    );
    assert_eq!(
        front.offset(Reference::Base, Reference::Sensor, Axis::Absolute),
        270
    );
}

#[test]
fn relative_axis_mirrors_for_front() {
    let front = Angles::new(Facing::Front, 0, 0, 90).unwrap();
    assert_eq!(
        front.offset(Reference::View, Reference::Output, Axis::Absolute),
        90
    );
    assert_eq!(
        front.offset(Reference::View, Reference::Output, Axis::RelativeToSensor),
        270
    );
}

#[test]
fn angles_reject_non_right_angles() {
    assert!(Angles::new(Facing::Back, 45, 0, 0).is_err());
    assert!(Angles::new(Facing::Back, 0, 360, 0).is_err());
    assert!(Angles::new(Facing::Back, 0, 0, -90).is_err());
}
