//! Concrete frame producers for the wgpu backend: a pixel-buffer producer
//! for camera frames and a lockable canvas surface for the overlay.

use glam::Mat4;
use tracing::debug;

use crate::error::SnapshotError;
use crate::overlay::Canvas;
use crate::preview::FrameProducer;
use crate::render::{OverlaySurface, SharedGpu, TextureId};
use crate::size::Size;

/// Receives RGBA8 frames from a camera source and latches them into a
/// texture on `update_tex_image`.
pub struct PixelBufferProducer {
    shared: SharedGpu,
    texture: TextureId,
    size: Size,
    pending: Option<Vec<u8>>,
    transform: Mat4,
    released: bool,
}

impl PixelBufferProducer {
    pub fn new(shared: SharedGpu, texture: TextureId, size: Size) -> Self {
        Self {
            shared,
            texture,
            size,
            pending: None,
            transform: Mat4::IDENTITY,
            released: false,
        }
    }

    /// Queue the next frame. `pixels` must be `size.area() * 4` bytes for
    /// the size configured at construction or via `set_default_buffer_size`.
    pub fn push_frame(&mut self, pixels: Vec<u8>) {
        self.pending = Some(pixels);
    }
}

impl FrameProducer for PixelBufferProducer {
    fn set_default_buffer_size(&mut self, size: Size) {
        self.size = size;
    }

    fn update_tex_image(&mut self) -> Result<(), SnapshotError> {
        if self.released {
            return Err(SnapshotError::Released("frame producer"));
        }
        let Some(pixels) = self.pending.take() else {
            // Nothing new; the texture keeps its last latched frame.
            return Ok(());
        };
        self.shared.write_texture(self.texture, &pixels, self.size)?;
        self.transform = Mat4::IDENTITY;
        Ok(())
    }

    fn transform_matrix(&self) -> Mat4 {
        self.transform
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.pending = None;
            debug!("pixel producer released");
        }
    }
}

/// The overlay's drawing destination: drawers paint the locked canvas, the
/// posted pixels are uploaded on `update_tex_image`.
pub struct CanvasSurface {
    shared: SharedGpu,
    texture: TextureId,
    canvas: Canvas,
    posted: Option<Vec<u8>>,
    locked: bool,
    released: bool,
}

impl CanvasSurface {
    pub(crate) fn new(shared: SharedGpu, texture: TextureId, size: Size) -> Self {
        Self {
            shared,
            texture,
            canvas: Canvas::new(size),
            posted: None,
            locked: false,
            released: false,
        }
    }
}

impl FrameProducer for CanvasSurface {
    fn set_default_buffer_size(&mut self, size: Size) {
        if self.canvas.size() != size {
            self.canvas = Canvas::new(size);
        }
    }

    fn update_tex_image(&mut self) -> Result<(), SnapshotError> {
        if self.released {
            return Err(SnapshotError::Released("overlay surface"));
        }
        let Some(pixels) = self.posted.take() else {
            return Ok(());
        };
        self.shared
            .write_texture(self.texture, &pixels, self.canvas.size())
    }

    fn transform_matrix(&self) -> Mat4 {
        Mat4::IDENTITY
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.posted = None;
            self.locked = false;
            debug!("overlay surface released");
        }
    }
}

impl OverlaySurface for CanvasSurface {
    fn lock_canvas(&mut self) -> Result<&mut Canvas, SnapshotError> {
        if self.released {
            return Err(SnapshotError::Released("overlay surface"));
        }
        if self.locked {
            return Err(SnapshotError::readback("overlay canvas already locked"));
        }
        self.locked = true;
        Ok(&mut self.canvas)
    }

    fn unlock_and_post(&mut self) -> Result<(), SnapshotError> {
        if !self.locked {
            return Err(SnapshotError::readback("overlay canvas is not locked"));
        }
        self.locked = false;
        self.posted = Some(self.canvas.pixels().to_vec());
        Ok(())
    }
}
