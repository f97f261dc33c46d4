//! Capture request and result types, plus the listener seam a snapshot
//! reports through.

use crate::error::SnapshotError;
use crate::size::{AspectRatio, Size};

/// Which way the camera points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Back,
    Front,
}

/// Encoded still-image formats. JPEG is the only one produced today; the
/// tag travels with the result so consumers never have to sniff bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureFormat {
    Jpeg,
}

/// Parameters of one snapshot. Immutable once `take()` starts.
#[derive(Debug, Clone, Copy)]
pub struct CaptureRequest {
    /// Full size of the preview stream before cropping.
    pub size: Size,
    /// Output rectangle ratio; the stream is center-cropped to it.
    pub output_ratio: AspectRatio,
    /// Requested output rotation in degrees.
    pub rotation: i32,
    pub facing: Facing,
    /// Whether the overlay draw list should be composited on top.
    pub with_overlay: bool,
}

/// A finished snapshot. `rotation` is always 0: the requested rotation has
/// been baked into the pixels by the transform pipeline.
#[derive(Debug, Clone)]
pub struct PictureResult {
    pub data: Vec<u8>,
    pub format: PictureFormat,
    pub size: Size,
    pub rotation: i32,
    pub facing: Facing,
}

pub type SnapshotOutcome = Result<PictureResult, SnapshotError>;

/// Receives the single success or failure of a snapshot.
///
/// Dispatch consumes the listener, so firing twice is unrepresentable.
pub trait ResultListener: Send {
    fn on_result(self: Box<Self>, outcome: SnapshotOutcome);
}

impl<F> ResultListener for F
where
    F: FnOnce(SnapshotOutcome) + Send,
{
    fn on_result(self: Box<Self>, outcome: SnapshotOutcome) {
        (*self)(outcome)
    }
}
