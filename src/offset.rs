//! Orientation bookkeeping between the coordinate spaces a capture touches:
//! the sensor, the on-screen view, and the requested output. All offsets are
//! clockwise degrees and must be multiples of 90.

use crate::capture::Facing;
use crate::error::SnapshotError;

/// A named coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    /// The fixed device frame every other space is measured against.
    Base,
    Sensor,
    View,
    Output,
}

/// How an offset query should treat front-camera mirroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Absolute,
    /// Mirror the result for front cameras, which flip around the sensor.
    RelativeToSensor,
}

/// Snapshot of the angular relationships at capture time.
///
/// Immutable once built; the orchestrator copies it into the worker task so
/// a mid-capture orientation change cannot skew the transforms.
#[derive(Debug, Clone, Copy)]
pub struct Angles {
    facing: Facing,
    sensor_offset: i32,
    display_offset: i32,
    output_offset: i32,
}

impl Angles {
    /// Build from the offsets the camera engine reports.
    ///
    /// Front sensors report their offset mirrored, so it is stored as
    /// `(360 - offset) % 360` to keep later queries facing-agnostic.
    pub fn new(
        facing: Facing,
        sensor_offset: i32,
        display_offset: i32,
        output_offset: i32,
    ) -> Result<Self, SnapshotError> {
        for (name, value) in [
            ("sensor offset", sensor_offset),
            ("display offset", display_offset),
            ("output offset", output_offset),
        ] {
            if value % 90 != 0 || !(0..360).contains(&value) {
                return Err(SnapshotError::acquire(format!(
                    "{name} {value} is not a multiple of 90 in 0..360"
                )));
            }
        }
        let sensor_offset = match facing {
            Facing::Front => (360 - sensor_offset) % 360,
            Facing::Back => sensor_offset,
        };
        Ok(Self {
            facing,
            sensor_offset,
            display_offset,
            output_offset,
        })
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    fn to_base(&self, reference: Reference) -> i32 {
        match reference {
            Reference::Base => 0,
            Reference::Sensor => self.sensor_offset,
            Reference::View => self.display_offset,
            Reference::Output => self.output_offset,
        }
    }

    /// Clockwise rotation taking `from` coordinates into `to` coordinates.
    pub fn offset(&self, from: Reference, to: Reference, axis: Axis) -> i32 {
        let absolute = (self.to_base(to) - self.to_base(from)).rem_euclid(360);
        match axis {
            Axis::Absolute => absolute,
            Axis::RelativeToSensor => match self.facing {
                Facing::Front => (360 - absolute) % 360,
                Facing::Back => absolute,
            },
        }
    }

    /// Whether the two spaces have exchanged axes (offset of 90 or 270).
    pub fn flip(&self, a: Reference, b: Reference) -> bool {
        self.offset(a, b, Axis::Absolute) % 180 == 90
    }
}
