//! One-shot GPU snapshot capture for live camera previews.
//!
//! The pipeline grabs the latest frame of a streaming camera texture,
//! composites an optional overlay on top inside an off-screen render
//! target, corrects sensor/view/output orientation mismatches through 4x4
//! matrix composition, then reads the pixels back and encodes a JPEG.

pub mod capture;
pub mod config;
pub mod error;
pub mod offset;
pub mod overlay;
pub mod preview;
pub mod render;
pub mod size;
pub mod snapshot;
pub mod tasks {
    pub mod worker;
}
pub mod transform;

pub use capture::{CaptureRequest, Facing, PictureFormat, PictureResult, ResultListener};
pub use error::SnapshotError;
pub use offset::{Angles, Axis, Reference};
pub use size::{AspectRatio, Size, compute_crop};
pub use snapshot::{SnapshotRecorder, SnapshotState};
