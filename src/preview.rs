//! Frame-event plumbing between the live preview's rendering context and the
//! snapshot orchestrator: cancellable subscriptions, frame producers, and a
//! concrete fan-out hub embedders can drive from their render loop.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::Mat4;
use tracing::debug;

use crate::error::SnapshotError;
use crate::render::TextureId;
use crate::size::Size;

/// Delivered on the rendering context whenever the preview has a new frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameEvent {
    /// Horizontal crop scale of the preview, in view space.
    pub scale_x: f32,
    /// Vertical crop scale of the preview, in view space.
    pub scale_y: f32,
}

/// Cancel token for a frame callback registration.
///
/// `claim()` doubles as the single-shot guard: the first caller both wins
/// the event and deregisters the callback, so a late second frame can never
/// re-enter the handler.
#[derive(Debug, Clone, Default)]
pub struct Subscription {
    cancelled: Arc<AtomicBool>,
}

impl Subscription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Atomically cancel; returns true only for the first caller.
    pub fn claim(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }
}

pub type FrameCallback = Box<dyn FnMut(&FrameEvent) + Send>;

/// Receives GPU frames and hands out their texture transform.
///
/// The transform is only defined after `update_tex_image()` has latched the
/// current frame; reading it earlier yields stale or identity data.
pub trait FrameProducer: Send {
    /// Resize the backing buffer before the next latch.
    fn set_default_buffer_size(&mut self, size: Size);

    /// Latch the most recent frame into the associated texture.
    fn update_tex_image(&mut self) -> Result<(), SnapshotError>;

    /// Column-major transform of the latched frame.
    fn transform_matrix(&self) -> Mat4;

    fn release(&mut self);
}

/// The live preview as the orchestrator sees it.
pub trait FramePreview: Send + Sync {
    /// Texture id of the camera stream in the shared namespace.
    fn texture_id(&self) -> TextureId;

    /// Create a producer bound to the preview's texture.
    fn acquire_producer(&self) -> Result<Box<dyn FrameProducer>, SnapshotError>;

    /// Register a frame callback guarded by `sub`; delivery stops once the
    /// subscription is cancelled.
    fn add_frame_callback(&self, sub: Subscription, callback: FrameCallback);
}

type ProducerFactory =
    Box<dyn Fn() -> Result<Box<dyn FrameProducer>, SnapshotError> + Send + Sync>;

struct FrameSlot {
    sub: Subscription,
    callback: FrameCallback,
}

/// Concrete callback fan-out for render loops.
///
/// The loop that owns the live preview calls `dispatch_frame` after each
/// rendered frame; cancelled registrations are pruned as they are seen.
pub struct FrameHub {
    texture_id: TextureId,
    producers: ProducerFactory,
    slots: Mutex<Vec<FrameSlot>>,
}

impl FrameHub {
    pub fn new(texture_id: TextureId, producers: ProducerFactory) -> Self {
        Self {
            texture_id,
            producers,
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Invoke every live callback with `event` and drop cancelled ones.
    pub fn dispatch_frame(&self, event: &FrameEvent) {
        let mut slots = self.slots.lock().expect("frame hub poisoned");
        slots.retain(|slot| !slot.sub.is_cancelled());
        for slot in slots.iter_mut() {
            (slot.callback)(event);
        }
        let before = slots.len();
        slots.retain(|slot| !slot.sub.is_cancelled());
        if slots.len() != before {
            debug!(dropped = before - slots.len(), "pruned frame callbacks");
        }
    }

    pub fn callback_count(&self) -> usize {
        let slots = self.slots.lock().expect("frame hub poisoned");
        slots.iter().filter(|s| !s.sub.is_cancelled()).count()
    }
}

impl FramePreview for FrameHub {
    fn texture_id(&self) -> TextureId {
        self.texture_id
    }

    fn acquire_producer(&self) -> Result<Box<dyn FrameProducer>, SnapshotError> {
        (self.producers)()
    }

    fn add_frame_callback(&self, sub: Subscription, callback: FrameCallback) {
        let mut slots = self.slots.lock().expect("frame hub poisoned");
        slots.push(FrameSlot { sub, callback });
    }
}
