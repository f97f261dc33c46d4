//! The 4x4 transform pipeline that reconciles sensor, view, and output
//! coordinate spaces entirely through matrix composition, deferring the
//! actual resampling to the GPU.
//!
//! The rotation and flip signs below were calibrated empirically against
//! real devices. Treat them as data: they are asserted by the test matrix,
//! not derived.

use glam::{Mat4, Vec3};

use crate::capture::Facing;

/// Post-multiply `m` by a translation, GL matrix-stack style.
pub fn translated(m: Mat4, x: f32, y: f32, z: f32) -> Mat4 {
    m * Mat4::from_translation(Vec3::new(x, y, z))
}

/// Post-multiply `m` by a scale.
pub fn scaled(m: Mat4, x: f32, y: f32, z: f32) -> Mat4 {
    m * Mat4::from_scale(Vec3::new(x, y, z))
}

/// Post-multiply `m` by a rotation of `degrees` about the Z axis.
pub fn rotated_z(m: Mat4, degrees: f32) -> Mat4 {
    m * Mat4::from_rotation_z(degrees.to_radians())
}

/// Everything the pipeline needs beyond the producers' raw matrices.
#[derive(Debug, Clone, Copy)]
pub struct TransformSpec {
    /// Requested horizontal crop scale, measured in view space.
    pub scale_x: f32,
    /// Requested vertical crop scale, measured in view space.
    pub scale_y: f32,
    /// Whether view and sensor spaces have exchanged axes.
    pub axis_flipped: bool,
    /// Requested output rotation in degrees.
    pub rotation: i32,
    /// Absolute view-to-output offset applied to the overlay.
    pub overlay_rotation: i32,
    pub facing: Facing,
}

impl TransformSpec {
    /// Scales with the view/sensor axis swap applied.
    fn real_scales(&self) -> (f32, f32) {
        if self.axis_flipped {
            (self.scale_y, self.scale_x)
        } else {
            (self.scale_x, self.scale_y)
        }
    }
}

/// Transform for the camera texture: crop, center, rotate, mirror.
pub fn primary_transform(raw: Mat4, spec: &TransformSpec) -> Mat4 {
    let (sx, sy) = spec.real_scales();

    // Crop and re-center the texture to the output rectangle.
    let mut m = translated(raw, (1.0 - sx) / 2.0, (1.0 - sy) / 2.0, 0.0);
    m = scaled(m, sx, sy, 1.0);

    // Pivot on the texture center so rotation and mirroring behave.
    m = translated(m, 0.5, 0.5, 0.0);
    // The sign is empirical; see module docs.
    m = rotated_z(m, -(spec.rotation as f32));
    if spec.facing == Facing::Front {
        m = scaled(m, -1.0, 1.0, 1.0);
    }
    translated(m, -0.5, -0.5, 0.0)
}

/// Transform for the overlay texture.
///
/// Net scale: Y always flipped, X flipped only for front cameras. The
/// rotation sign is negated for front cameras.
pub fn overlay_transform(raw: Mat4, spec: &TransformSpec) -> Mat4 {
    let rotation = match spec.facing {
        Facing::Front => -spec.overlay_rotation,
        Facing::Back => spec.overlay_rotation,
    };

    let mut m = translated(raw, 0.5, 0.5, 0.0);
    m = rotated_z(m, rotation as f32);
    if spec.facing == Facing::Front {
        m = scaled(m, -1.0, 1.0, 1.0);
    }
    m = scaled(m, 1.0, -1.0, 1.0);
    translated(m, -0.5, -0.5, 0.0)
}
