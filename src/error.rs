use thiserror::Error;

/// Library error type for snapshot capture operations.
///
/// Every variant is fatal to the snapshot that raised it: the worker task
/// releases whatever was acquired and dispatches exactly one failure. No
/// retries happen inside the library; callers re-issue `take()` instead.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A GPU context, surface, viewport or producer could not be created.
    #[error("gpu resource acquisition failed: {0}")]
    Acquire(String),

    /// A compositor draw call failed.
    #[error("draw call failed: {0}")]
    Draw(String),

    /// Surface-to-buffer readback or image encoding failed.
    #[error("frame readback failed: {0}")]
    Readback(String),

    /// An operation was invoked on a resource after `release()`.
    #[error("{0} used after release")]
    Released(&'static str),

    /// A snapshot is already in flight on this recorder.
    #[error("snapshot already in progress")]
    Busy,
}

impl SnapshotError {
    /// Classify an acquisition failure with context about what was wanted.
    pub fn acquire(what: impl Into<String>) -> Self {
        Self::Acquire(what.into())
    }

    pub fn draw(what: impl Into<String>) -> Self {
        Self::Draw(what.into())
    }

    pub fn readback(what: impl Into<String>) -> Self {
        Self::Readback(what.into())
    }
}
