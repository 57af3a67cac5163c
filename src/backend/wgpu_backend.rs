//! [`Backend`] implementation on wgpu.
//!
//! wgpu bakes blend state and the color-target format into a pipeline, so each program
//! keeps one pipeline per `(format, blend)` pair it has been drawn with. Every draw or
//! clear records and submits its own small command buffer; passes are few and full-screen,
//! so this keeps the sticky-state model simple without changing throughput noticeably.

use std::collections::HashMap;

use tracing::{debug, trace};
use wgpu::util::DeviceExt;

use super::{
    Backend, Destination, FilterMode, ProgramDescriptor, ProgramId, Size, TargetFormat, TargetId,
    TextureHandle,
};
use crate::color::Color;
use crate::error::{PassError, PassResult};
use crate::gpu::GpuContext;
use crate::uniform::UniformLayout;

type PipelineKey = (wgpu::TextureFormat, Option<wgpu::BlendState>);

struct Program {
    label: String,
    module: wgpu::ShaderModule,
    layout: UniformLayout,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    uniform_buffer: wgpu::Buffer,
    textures: Vec<Option<TextureHandle>>,
}

struct Target {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    filter: FilterMode,
}

/// A backend drawing through a [`GpuContext`].
pub struct WgpuBackend {
    gpu: GpuContext,
    programs: HashMap<ProgramId, Program>,
    targets: HashMap<TargetId, Target>,
    next_id: u32,
    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,
    placeholder: wgpu::TextureView,
    program: Option<ProgramId>,
    destination: Destination,
    blend: Option<wgpu::BlendState>,
    frame: Option<wgpu::SurfaceTexture>,
    /// Stand-in screen for contexts without a window.
    virtual_screen: Option<(Size, wgpu::TextureView)>,
}

impl WgpuBackend {
    pub fn new(gpu: GpuContext) -> Self {
        let sampler = |label, filter| {
            gpu.device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            })
        };
        let linear_sampler = sampler("Linear Sampler", wgpu::FilterMode::Linear);
        let nearest_sampler = sampler("Nearest Sampler", wgpu::FilterMode::Nearest);

        let placeholder = gpu
            .device
            .create_texture_with_data(
                &gpu.queue,
                &wgpu::TextureDescriptor {
                    label: Some("Placeholder Texture"),
                    size: wgpu::Extent3d {
                        width: 1,
                        height: 1,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                &[0, 0, 0, 0],
            )
            .create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            gpu,
            programs: HashMap::new(),
            targets: HashMap::new(),
            next_id: 1,
            linear_sampler,
            nearest_sampler,
            placeholder,
            program: None,
            destination: Destination::Screen,
            blend: None,
            frame: None,
            virtual_screen: None,
        }
    }

    /// The underlying context, for direct wgpu access.
    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// View and format of the bound destination, acquiring the surface frame on first use.
    fn destination_view(&mut self) -> PassResult<(wgpu::TextureView, wgpu::TextureFormat)> {
        match self.destination {
            Destination::Target { id, .. } => {
                let target = self.targets.get(&id).ok_or(PassError::UnknownResource {
                    kind: "target",
                    id: id.0,
                })?;
                Ok((target.view.clone(), target.format))
            }
            Destination::Screen if self.gpu.surface.is_some() => {
                if self.frame.is_none() {
                    self.frame = Some(self.gpu.acquire_frame()?);
                }
                let frame = self.frame.as_ref().ok_or(PassError::NoSurface)?;
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                Ok((view, self.gpu.config.format))
            }
            Destination::Screen => {
                let size = self.gpu.size();
                let stale = self.virtual_screen.as_ref().is_none_or(|(s, _)| *s != size);
                if stale {
                    let (_, view) = create_texture(
                        &self.gpu.device,
                        "Virtual Screen",
                        size,
                        self.gpu.config.format,
                    );
                    self.virtual_screen = Some((size, view));
                }
                let (_, view) = self.virtual_screen.as_ref().ok_or(PassError::NoSurface)?;
                Ok((view.clone(), self.gpu.config.format))
            }
        }
    }

    fn submit_pass(
        &self,
        label: &str,
        view: &wgpu::TextureView,
        load: wgpu::LoadOp<wgpu::Color>,
        draw: impl FnOnce(&mut wgpu::RenderPass<'_>),
    ) {
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            draw(&mut render_pass);
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
    }
}

fn create_texture(
    device: &wgpu::Device,
    label: &str,
    size: Size,
    format: wgpu::TextureFormat,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn create_pipeline(
    device: &wgpu::Device,
    program: &Program,
    (format, blend): PipelineKey,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&program.label),
        layout: Some(&program.pipeline_layout),
        vertex: wgpu::VertexState {
            module: &program.module,
            entry_point: Some("vs"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &program.module,
            entry_point: Some("fs"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn bind_group_layout(
    device: &wgpu::Device,
    label: &str,
    layout: UniformLayout,
) -> wgpu::BindGroupLayout {
    let mut entries = vec![wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }];
    for k in 0..layout.texture_count as u32 {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 1 + 2 * k,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 2 + 2 * k,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}

impl Backend for WgpuBackend {
    fn surface_size(&self) -> Size {
        self.gpu.size()
    }

    fn resize_surface(&mut self, size: Size) {
        // A frame acquired at the old size must not be drawn into after reconfiguring.
        self.frame = None;
        self.gpu.resize(size.width, size.height);
    }

    fn present(&mut self) -> PassResult<()> {
        if let Some(frame) = self.frame.take() {
            frame.present();
        }
        Ok(())
    }

    fn create_program(&mut self, desc: &ProgramDescriptor<'_>) -> PassResult<ProgramId> {
        let device = &self.gpu.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(desc.source.into()),
        });
        let bind_group_layout = bind_group_layout(device, desc.label, desc.layout);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.label),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: desc.layout.block_size as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut program = Program {
            label: desc.label.to_string(),
            module,
            layout: desc.layout,
            bind_group_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
            uniform_buffer,
            textures: vec![None; desc.layout.texture_count],
        };

        // Build one pipeline eagerly so interface mismatches surface here, not at draw time.
        let key = (TargetFormat::default().wgpu(), None);
        let pipeline = create_pipeline(device, &program, key);
        program.pipelines.insert(key, pipeline);

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(PassError::shader_compilation(desc.label, error.to_string()));
        }

        let id = ProgramId(self.next());
        debug!(label = desc.label, program = id.0, "program created");
        self.programs.insert(id, program);
        Ok(id)
    }

    fn use_program(&mut self, program: ProgramId) -> PassResult<()> {
        if !self.programs.contains_key(&program) {
            return Err(PassError::UnknownResource {
                kind: "program",
                id: program.0,
            });
        }
        self.program = Some(program);
        Ok(())
    }

    fn upload_uniforms(
        &mut self,
        program: ProgramId,
        block: &[u8],
        textures: &[Option<TextureHandle>],
    ) -> PassResult<()> {
        let entry = self
            .programs
            .get_mut(&program)
            .ok_or(PassError::UnknownResource {
                kind: "program",
                id: program.0,
            })?;
        self.gpu.queue.write_buffer(&entry.uniform_buffer, 0, block);
        entry.textures = textures.to_vec();
        Ok(())
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        if self.program == Some(program) {
            self.program = None;
        }
    }

    fn create_target(&mut self, size: Size, format: TargetFormat) -> PassResult<TargetId> {
        if format == TargetFormat::Rgba32Float
            && !self
                .gpu
                .device
                .features()
                .contains(wgpu::Features::FLOAT32_FILTERABLE)
        {
            return Err(PassError::gpu(
                "Rgba32Float targets need FLOAT32_FILTERABLE, which this adapter lacks",
            ));
        }

        let id = TargetId(self.next());
        let label = format!("Target {}", id.0);
        let (texture, view) = create_texture(&self.gpu.device, &label, size, format.wgpu());
        self.targets.insert(
            id,
            Target {
                texture,
                view,
                format: format.wgpu(),
                filter: FilterMode::Linear,
            },
        );
        Ok(id)
    }

    fn destroy_target(&mut self, target: TargetId) {
        if let Some(t) = self.targets.remove(&target) {
            t.texture.destroy();
        }
    }

    fn target_texture(&self, target: TargetId) -> PassResult<TextureHandle> {
        if self.targets.contains_key(&target) {
            Ok(TextureHandle(target.0))
        } else {
            Err(PassError::UnknownResource {
                kind: "target",
                id: target.0,
            })
        }
    }

    fn bind_destination(&mut self, destination: Destination) {
        self.destination = destination;
    }

    fn set_blend(&mut self, blend: Option<wgpu::BlendState>) {
        self.blend = blend;
    }

    fn clear(&mut self, color: Color) -> PassResult<()> {
        let (view, _) = self.destination_view()?;
        self.submit_pass("Clear", &view, wgpu::LoadOp::Clear(color.into()), |_| {});
        Ok(())
    }

    fn draw(&mut self) -> PassResult<()> {
        let id = self.program.ok_or(PassError::NoProgramBound)?;
        let (view, format) = self.destination_view()?;

        let program = self.programs.get_mut(&id).ok_or(PassError::NoProgramBound)?;
        let key = (format, self.blend);
        if !program.pipelines.contains_key(&key) {
            let pipeline = create_pipeline(&self.gpu.device, program, key);
            program.pipelines.insert(key, pipeline);
        }

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: program.uniform_buffer.as_entire_binding(),
        }];
        for k in 0..program.layout.texture_count {
            let target = match program.textures.get(k).copied().flatten() {
                Some(texture) => Some(self.targets.get(&TargetId(texture.0)).ok_or(
                    PassError::UnknownResource {
                        kind: "texture",
                        id: texture.0,
                    },
                )?),
                None => None,
            };
            let (texture_view, sampler) = match target {
                Some(t) => (
                    &t.view,
                    match t.filter {
                        FilterMode::Linear => &self.linear_sampler,
                        FilterMode::Nearest => &self.nearest_sampler,
                    },
                ),
                None => (&self.placeholder, &self.linear_sampler),
            };
            entries.push(wgpu::BindGroupEntry {
                binding: 1 + 2 * k as u32,
                resource: wgpu::BindingResource::TextureView(texture_view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + 2 * k as u32,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }

        let bind_group = self.gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&program.label),
            layout: &program.bind_group_layout,
            entries: &entries,
        });

        let program = &self.programs[&id];
        let pipeline = &program.pipelines[&key];
        trace!(label = %program.label, destination = ?self.destination, "draw");
        self.submit_pass(&program.label, &view, wgpu::LoadOp::Load, |render_pass| {
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        });
        Ok(())
    }

    fn mag_filter(&self, texture: TextureHandle) -> PassResult<FilterMode> {
        self.targets
            .get(&TargetId(texture.0))
            .map(|t| t.filter)
            .ok_or(PassError::UnknownResource {
                kind: "texture",
                id: texture.0,
            })
    }

    fn set_mag_filter(&mut self, texture: TextureHandle, filter: FilterMode) -> PassResult<()> {
        self.targets
            .get_mut(&TargetId(texture.0))
            .ok_or(PassError::UnknownResource {
                kind: "texture",
                id: texture.0,
            })?
            .filter = filter;
        Ok(())
    }
}
