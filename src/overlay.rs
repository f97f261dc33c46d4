//! CPU-side overlay drawing. Drawers paint onto a transparent RGBA canvas in
//! list order; the composited canvas is then uploaded as the overlay texture.

use crate::size::Size;

/// An RGBA color, straight (non-premultiplied) alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Self = Self { r: 0, g: 0, b: 0, a: 0 };

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// A plain RGBA8 pixel buffer drawers paint into.
#[derive(Debug, Clone)]
pub struct Canvas {
    size: Size,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            pixels: vec![0; size.area() as usize * 4],
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Fill the whole canvas, erasing prior content.
    pub fn clear(&mut self, color: Color) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&[color.r, color.g, color.b, color.a]);
        }
    }

    /// Fill an axis-aligned rectangle, clipped to the canvas.
    pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: Color) {
        let x1 = x.min(self.size.width);
        let y1 = y.min(self.size.height);
        let x2 = x.saturating_add(w).min(self.size.width);
        let y2 = y.saturating_add(h).min(self.size.height);
        for row in y1..y2 {
            let start = (row as usize * self.size.width as usize + x1 as usize) * 4;
            let end = (row as usize * self.size.width as usize + x2 as usize) * 4;
            for px in self.pixels[start..end].chunks_exact_mut(4) {
                px.copy_from_slice(&[color.r, color.g, color.b, color.a]);
            }
        }
    }

    /// Copy an RGBA8 tile at `(x, y)`, clipped to the canvas. `src` must hold
    /// `w * h * 4` bytes.
    pub fn blit_rgba(&mut self, x: u32, y: u32, w: u32, h: u32, src: &[u8]) {
        debug_assert_eq!(src.len(), (w as usize) * (h as usize) * 4);
        let copy_w = w.min(self.size.width.saturating_sub(x)) as usize;
        let copy_h = h.min(self.size.height.saturating_sub(y)) as usize;
        for row in 0..copy_h {
            let dst_start =
                ((y as usize + row) * self.size.width as usize + x as usize) * 4;
            let src_start = row * w as usize * 4;
            self.pixels[dst_start..dst_start + copy_w * 4]
                .copy_from_slice(&src[src_start..src_start + copy_w * 4]);
        }
    }
}

/// One entry of the ordered overlay draw list.
pub trait OverlayDrawer: Send + Sync {
    /// Paint this drawer's content for a still-picture snapshot.
    fn draw_for_picture_snapshot(&self, canvas: &mut Canvas);
}
