//! The texture compositor: draws texture ids through 4x4 transforms into
//! the current off-screen surface with painter's-algorithm blending.

use std::sync::Arc;

use glam::Mat4;
use tracing::debug;
use wgpu::util::DeviceExt;

use crate::error::SnapshotError;
use crate::render::{Compositor, RenderSurface, SharedGpu, TextureId};
use crate::size::Size;

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    pos: [f32; 2],
    uv: [f32; 2],
}

const QUAD: [Vertex; 4] = [
    Vertex { pos: [-1.0, -1.0], uv: [0.0, 1.0] },
    Vertex { pos: [1.0, -1.0], uv: [1.0, 1.0] },
    Vertex { pos: [-1.0, 1.0], uv: [0.0, 0.0] },
    Vertex { pos: [1.0, 1.0], uv: [1.0, 0.0] },
];

/// Owns the quad pipeline plus every texture it allocated; both are freed
/// by `release()`.
pub struct Viewport {
    shared: SharedGpu,
    pipeline: Option<wgpu::RenderPipeline>,
    bind_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    vbuf: wgpu::Buffer,
    owned_textures: Vec<TextureId>,
}

impl Viewport {
    pub(crate) fn new(shared: SharedGpu) -> Result<Self, SnapshotError> {
        let device = shared.device();

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("camsnap-compose"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/compose.wgsl").into()),
        });

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("camsnap-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("camsnap-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let vbuf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camsnap-quad"),
            contents: bytemuck::cast_slice(&QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let vlayout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
        };

        let pip_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("camsnap-pipe-layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("camsnap-pipeline"),
            layout: Some(&pip_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[vlayout],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            shared,
            pipeline: Some(pipeline),
            bind_layout,
            sampler,
            vbuf,
            owned_textures: Vec::new(),
        })
    }
}

impl Compositor for Viewport {
    type Target = RenderSurface;

    fn create_texture(&mut self, size: Size) -> Result<TextureId, SnapshotError> {
        if self.pipeline.is_none() {
            return Err(SnapshotError::Released("viewport"));
        }
        let id = self.shared.alloc_texture(size);
        self.owned_textures.push(id);
        Ok(id)
    }

    fn draw_frame(
        &mut self,
        target: &mut RenderSurface,
        texture: TextureId,
        transform: &Mat4,
    ) -> Result<(), SnapshotError> {
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or(SnapshotError::Released("viewport"))?;
        if !target.is_current() {
            return Err(SnapshotError::draw("no render surface is current"));
        }
        let view: Arc<wgpu::TextureView> = self
            .shared
            .textures()
            .view(texture)
            .ok_or_else(|| SnapshotError::draw(format!("unknown texture id {texture:?}")))?;

        let device = self.shared.device();
        let matrix = transform.to_cols_array();
        let ubuf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camsnap-tex-matrix"),
            contents: bytemuck::cast_slice(&matrix),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camsnap-bind-group"),
            layout: &self.bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: ubuf.as_entire_binding(),
                },
            ],
        });

        let clear = target.take_pending_clear();
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("camsnap-draw"),
        });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("camsnap-compose"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.view()?,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: if clear {
                            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &bind_group, &[]);
            rpass.set_vertex_buffer(0, self.vbuf.slice(..));
            rpass.draw(0..4, 0..1);
        }
        self.shared.queue().submit([encoder.finish()]);
        debug!(?texture, "frame drawn");
        Ok(())
    }

    fn release(&mut self) {
        if self.pipeline.take().is_some() {
            for id in self.owned_textures.drain(..) {
                self.shared.free_texture(id);
            }
            debug!("viewport released");
        }
    }
}
