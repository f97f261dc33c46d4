//! The off-screen surface a snapshot composites into, plus the blocking
//! readback-and-encode path.

use std::io::Cursor;

use image::ImageEncoder;
use tracing::debug;

use crate::capture::PictureFormat;
use crate::error::SnapshotError;
use crate::render::{RenderTarget, SharedGpu};
use crate::size::Size;

const ROW_ALIGN: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

/// A drawable color target that is never presented; its only consumer is
/// `save_frame_to`.
pub struct RenderSurface {
    shared: SharedGpu,
    texture: Option<wgpu::Texture>,
    view: Option<wgpu::TextureView>,
    size: Size,
    recordable: bool,
    jpeg_quality: u8,
    current: bool,
    pending_clear: bool,
}

impl RenderSurface {
    pub(crate) fn new(
        shared: SharedGpu,
        size: Size,
        recordable: bool,
        jpeg_quality: u8,
    ) -> Result<Self, SnapshotError> {
        if size.width == 0 || size.height == 0 {
            return Err(SnapshotError::acquire(format!(
                "render surface size {size} is empty"
            )));
        }
        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        if recordable {
            usage |= wgpu::TextureUsages::COPY_SRC;
        }
        let texture = shared.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("camsnap-offscreen"),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        debug!(%size, recordable, "offscreen surface created");
        Ok(Self {
            shared,
            texture: Some(texture),
            view: Some(view),
            size,
            recordable,
            jpeg_quality,
            current: false,
            pending_clear: false,
        })
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub(crate) fn is_current(&self) -> bool {
        self.current
    }

    /// The first draw after `make_current` clears the target; this hands
    /// the flag to the viewport.
    pub(crate) fn take_pending_clear(&mut self) -> bool {
        std::mem::take(&mut self.pending_clear)
    }

    pub(crate) fn view(&self) -> Result<&wgpu::TextureView, SnapshotError> {
        self.view
            .as_ref()
            .ok_or(SnapshotError::Released("render surface"))
    }

    fn read_pixels(&self) -> Result<Vec<u8>, SnapshotError> {
        let texture = self
            .texture
            .as_ref()
            .ok_or(SnapshotError::Released("render surface"))?;
        let device = self.shared.device();
        let queue = self.shared.queue();

        let unpadded = 4 * self.size.width;
        let padded = unpadded.div_ceil(ROW_ALIGN) * ROW_ALIGN;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("camsnap-readback"),
            size: u64::from(padded) * u64::from(self.size.height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("camsnap-readback"),
        });
        encoder.copy_texture_to_buffer(
            texture.as_image_copy(),
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.size.height),
                },
            },
            wgpu::Extent3d {
                width: self.size.width,
                height: self.size.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit([encoder.finish()]);

        let slice = buffer.slice(..);
        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        let _ = device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| SnapshotError::readback("map callback dropped"))?
            .map_err(|e| SnapshotError::readback(format!("buffer map failed: {e:?}")))?;

        // Strip row padding and the alpha channel in one pass; JPEG has no
        // alpha and the composite is already resolved.
        let mapped = slice.get_mapped_range();
        let mut rgb =
            Vec::with_capacity(self.size.area() as usize * 3);
        for row in mapped.chunks_exact(padded as usize) {
            for px in row[..unpadded as usize].chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
            }
        }
        drop(mapped);
        buffer.unmap();
        Ok(rgb)
    }
}

impl RenderTarget for RenderSurface {
    fn make_current(&mut self) -> Result<(), SnapshotError> {
        if self.view.is_none() {
            return Err(SnapshotError::Released("render surface"));
        }
        self.current = true;
        self.pending_clear = true;
        Ok(())
    }

    fn save_frame_to(&mut self, format: PictureFormat) -> Result<Vec<u8>, SnapshotError> {
        if !self.recordable {
            return Err(SnapshotError::readback(
                "surface was not created recordable",
            ));
        }
        if !self.current {
            return Err(SnapshotError::readback("surface is not current"));
        }
        let rgb = self.read_pixels()?;
        let mut out = Cursor::new(Vec::new());
        match format {
            PictureFormat::Jpeg => {
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, self.jpeg_quality)
                    .write_image(
                        &rgb,
                        self.size.width,
                        self.size.height,
                        image::ExtendedColorType::Rgb8,
                    )
                    .map_err(|e| SnapshotError::readback(format!("jpeg encode: {e}")))?;
            }
        }
        debug!(size = %self.size, bytes = out.get_ref().len(), "frame saved");
        Ok(out.into_inner())
    }

    fn release(&mut self) {
        if self.texture.is_some() {
            self.view = None;
            self.texture = None;
            self.current = false;
            debug!("offscreen surface released");
        }
    }
}
