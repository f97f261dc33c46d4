//! Pixel sizes, reduced aspect ratios, and the centered crop used to fit
//! the snapshot into the requested output rectangle.

use std::fmt;

/// A width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Same dimensions with width and height exchanged.
    pub const fn flipped(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A reduced aspect ratio (e.g. 16:9), kept as integers so equality is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AspectRatio {
    pub x: u32,
    pub y: u32,
}

impl AspectRatio {
    /// Build a ratio from raw terms, reduced by their gcd.
    pub fn of(x: u32, y: u32) -> Self {
        let d = gcd(x.max(1), y.max(1));
        Self { x: x.max(1) / d, y: y.max(1) / d }
    }

    pub fn from_size(size: Size) -> Self {
        Self::of(size.width, size.height)
    }

    pub const fn flipped(self) -> Self {
        Self { x: self.y, y: self.x }
    }

    pub fn value(self) -> f32 {
        self.x as f32 / self.y as f32
    }

    pub fn matches(self, size: Size) -> bool {
        Self::from_size(size) == self
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.y)
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Largest centered sub-rectangle of `source` with exactly `target` ratio.
///
/// When the source is wider than the target ratio the width is cropped,
/// otherwise the height; the result never exceeds `source`.
pub fn compute_crop(source: Size, target: AspectRatio) -> Size {
    if target.matches(source) {
        return source;
    }
    let current = source.width as f32 / source.height as f32;
    let wanted = target.value();
    if current > wanted {
        Size::new((source.height as f32 * wanted).round() as u32, source.height)
    } else {
        Size::new(source.width, (source.width as f32 / wanted).round() as u32)
    }
}
