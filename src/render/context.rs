//! Shared GPU state and per-snapshot contexts.
//!
//! wgpu has no EGL-style share groups, so the "shared object namespace" is
//! a handle bundling the device, the queue, and a texture registry. Every
//! context cloned from one `SharedGpu` resolves the same texture ids.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context as _;
use tracing::debug;

use crate::error::SnapshotError;
use crate::render::{
    CanvasSurface, ContextFlags, DrawContext, GpuFactory, OverlaySurface, RenderSurface,
    TextureId, Viewport,
};
use crate::size::Size;

pub(crate) struct TextureEntry {
    pub texture: wgpu::Texture,
    pub view: Arc<wgpu::TextureView>,
    pub size: Size,
}

#[derive(Default)]
pub(crate) struct TextureRegistry {
    next_id: u32,
    entries: HashMap<TextureId, TextureEntry>,
}

impl TextureRegistry {
    fn insert(&mut self, entry: TextureEntry) -> TextureId {
        let id = TextureId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, entry);
        id
    }

    pub(crate) fn view(&self, id: TextureId) -> Option<Arc<wgpu::TextureView>> {
        self.entries.get(&id).map(|e| Arc::clone(&e.view))
    }

    pub(crate) fn remove(&mut self, id: TextureId) {
        self.entries.remove(&id);
    }
}

/// The object namespace shared between the live preview and snapshot
/// contexts: device, queue, and texture id table.
#[derive(Clone)]
pub struct SharedGpu {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    textures: Arc<Mutex<TextureRegistry>>,
}

impl SharedGpu {
    /// Wrap an existing device/queue pair, e.g. the live preview's.
    pub fn from_parts(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            textures: Arc::new(Mutex::new(TextureRegistry::default())),
        }
    }

    /// Bring up an adapter and device without any window, for standalone
    /// and headless use.
    pub fn headless() -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        pollster::block_on(async {
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .context("no compatible GPU adapter found")?;
            let (device, queue) = adapter
                .request_device(
                    &wgpu::DeviceDescriptor {
                        label: Some("camsnap-device"),
                        required_features: wgpu::Features::empty(),
                        required_limits: wgpu::Limits::default(),
                        memory_hints: wgpu::MemoryHints::default(),
                    },
                    None,
                )
                .await
                .context("requesting GPU device")?;
            Ok(Self::from_parts(Arc::new(device), Arc::new(queue)))
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub(crate) fn textures(&self) -> MutexGuard<'_, TextureRegistry> {
        self.textures.lock().expect("texture registry poisoned")
    }

    /// Allocate an externally-updatable RGBA8 texture and register it.
    pub fn alloc_texture(&self, size: Size) -> TextureId {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("camsnap-texture"),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = Arc::new(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        self.textures().insert(TextureEntry {
            texture,
            view,
            size,
        })
    }

    /// Upload raw RGBA8 pixels into a registered texture.
    pub fn write_texture(
        &self,
        id: TextureId,
        pixels: &[u8],
        size: Size,
    ) -> Result<(), SnapshotError> {
        let registry = self.textures();
        let entry = registry
            .entries
            .get(&id)
            .ok_or_else(|| SnapshotError::acquire(format!("unknown texture id {id:?}")))?;
        if entry.size != size {
            return Err(SnapshotError::acquire(format!(
                "texture {id:?} is {}, frame is {size}",
                entry.size
            )));
        }
        self.queue.write_texture(
            entry.texture.as_image_copy(),
            pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * size.width),
                rows_per_image: Some(size.height),
            },
            wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    /// Drop a texture from the namespace.
    pub fn free_texture(&self, id: TextureId) {
        self.textures().remove(id);
    }
}

/// A snapshot's rendering context: a clone of the shared namespace plus the
/// creation flags, with a release-once guard.
pub struct GpuContext {
    shared: SharedGpu,
    flags: ContextFlags,
    jpeg_quality: u8,
    released: bool,
}

impl GpuContext {
    pub(crate) fn new(shared: SharedGpu, flags: ContextFlags, jpeg_quality: u8) -> Self {
        Self {
            shared,
            flags,
            jpeg_quality,
            released: false,
        }
    }

    fn live(&self) -> Result<&SharedGpu, SnapshotError> {
        if self.released {
            Err(SnapshotError::Released("gpu context"))
        } else {
            Ok(&self.shared)
        }
    }
}

impl DrawContext for GpuContext {
    type Target = RenderSurface;
    type Viewport = Viewport;

    fn create_surface(&self, size: Size) -> Result<RenderSurface, SnapshotError> {
        let shared = self.live()?;
        RenderSurface::new(shared.clone(), size, self.flags.recordable, self.jpeg_quality)
    }

    fn create_viewport(&self) -> Result<Viewport, SnapshotError> {
        let shared = self.live()?;
        Viewport::new(shared.clone())
    }

    fn create_overlay_surface(
        &self,
        texture: TextureId,
        size: Size,
    ) -> Result<Box<dyn OverlaySurface>, SnapshotError> {
        let shared = self.live()?;
        Ok(Box::new(CanvasSurface::new(shared.clone(), texture, size)))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            debug!("gpu context released");
        }
    }
}

/// Factory handing each snapshot a context over the shared namespace.
pub struct WgpuFactory {
    shared: SharedGpu,
    jpeg_quality: u8,
}

impl WgpuFactory {
    pub fn new(shared: SharedGpu, jpeg_quality: u8) -> Self {
        Self {
            shared,
            jpeg_quality,
        }
    }
}

impl GpuFactory for WgpuFactory {
    type Context = GpuContext;

    fn create_context(&self, flags: ContextFlags) -> Result<GpuContext, SnapshotError> {
        Ok(GpuContext::new(
            self.shared.clone(),
            flags,
            self.jpeg_quality,
        ))
    }
}
