//! GPU seams for the snapshot pipeline.
//!
//! The orchestrator only speaks to these traits; `context`, `surface`,
//! `viewport` and `producer` provide the wgpu-backed implementations, and
//! the test suite substitutes counting fakes.

pub mod context;
pub mod producer;
pub mod surface;
pub mod viewport;

use glam::Mat4;

use crate::capture::PictureFormat;
use crate::error::SnapshotError;
use crate::overlay::Canvas;
use crate::preview::FrameProducer;
use crate::size::Size;

pub use context::{GpuContext, SharedGpu, WgpuFactory};
pub use producer::{CanvasSurface, PixelBufferProducer};
pub use surface::RenderSurface;
pub use viewport::Viewport;

/// Handle to a texture in the shared object namespace. Valid in every
/// context created from the same `SharedGpu`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Creation flags for a snapshot context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextFlags {
    /// Surfaces created in this context support persistence into an encoded
    /// sink; without it `save_frame_to` fails.
    pub recordable: bool,
}

impl ContextFlags {
    pub const RECORDABLE: Self = Self { recordable: true };
}

/// Creates per-snapshot contexts that share the live preview's namespace.
pub trait GpuFactory: Send + Sync {
    type Context: DrawContext;

    fn create_context(&self, flags: ContextFlags) -> Result<Self::Context, SnapshotError>;
}

/// A rendering context owning the resources of exactly one snapshot.
///
/// `release()` is safe to call at most once; creating resources afterwards
/// fails with [`SnapshotError::Released`].
pub trait DrawContext: Send {
    type Target: RenderTarget;
    type Viewport: Compositor<Target = Self::Target>;

    /// Off-screen surface whose color buffer will hold the composite.
    fn create_surface(&self, size: Size) -> Result<Self::Target, SnapshotError>;

    fn create_viewport(&self) -> Result<Self::Viewport, SnapshotError>;

    /// Canvas-backed overlay producer feeding `texture`.
    fn create_overlay_surface(
        &self,
        texture: TextureId,
        size: Size,
    ) -> Result<Box<dyn OverlaySurface>, SnapshotError>;

    fn release(&mut self);
}

/// A drawable off-screen surface.
pub trait RenderTarget: Send {
    /// Bind this surface as the active draw target. Required before any
    /// draw or readback.
    fn make_current(&mut self) -> Result<(), SnapshotError>;

    /// Blocking readback of the bound color buffer, encoded as `format`.
    fn save_frame_to(&mut self, format: PictureFormat) -> Result<Vec<u8>, SnapshotError>;

    fn release(&mut self);
}

/// Draws texture ids through 4x4 transforms into the current surface.
///
/// Successive draws composite with standard alpha blending; the last draw
/// wins on overlap.
pub trait Compositor: Send {
    type Target: RenderTarget;

    /// Allocate a new externally-updatable texture in the shared namespace.
    fn create_texture(&mut self, size: Size) -> Result<TextureId, SnapshotError>;

    /// Full-screen quad draw of `texture` sampled through `transform`.
    fn draw_frame(
        &mut self,
        target: &mut Self::Target,
        texture: TextureId,
        transform: &Mat4,
    ) -> Result<(), SnapshotError>;

    fn release(&mut self);
}

/// The overlay's drawing destination: a lockable CPU canvas that posts into
/// a texture, plus the producer half that latches posted pixels.
pub trait OverlaySurface: FrameProducer {
    /// Exclusive access to the canvas. Fails when the canvas is already
    /// locked or the backing store is gone (a readback-class error).
    fn lock_canvas(&mut self) -> Result<&mut Canvas, SnapshotError>;

    /// Publish the locked canvas so the next `update_tex_image` sees it.
    fn unlock_and_post(&mut self) -> Result<(), SnapshotError>;
}
