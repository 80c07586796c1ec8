//! Shared plumbing for fullscreen passes.
//!
//! Every pass in the pipeline has the same shape: an optional uniform
//! buffer, one sampler, and one to three source textures, drawn as a single
//! fullscreen triangle into an explicit destination view. Passes never rely
//! on state left behind by a previous pass.

use wgpu::util::DeviceExt;

use super::target::{FilterMode, TextureProfile};

/// Samplers and the bind group layouts shared by all fullscreen passes.
/// Layout shape is (has uniform buffer, texture count).
pub struct PassResources {
    pub profile: TextureProfile,
    linear: wgpu::Sampler,
    nearest: wgpu::Sampler,
    layouts: Vec<wgpu::BindGroupLayout>,
}

const MAX_TEXTURES: u32 = 3;

impl PassResources {
    pub fn new(device: &wgpu::Device, profile: TextureProfile) -> Self {
        let sampler = |filter: wgpu::FilterMode, label| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            })
        };
        let linear = sampler(wgpu::FilterMode::Linear, "linear sampler");
        let nearest = sampler(wgpu::FilterMode::Nearest, "nearest sampler");

        let mut layouts = Vec::new();
        for has_uniform in [false, true] {
            for textures in 1..=MAX_TEXTURES {
                layouts.push(Self::build_layout(device, profile, has_uniform, textures));
            }
        }

        Self {
            profile,
            linear,
            nearest,
            layouts,
        }
    }

    fn build_layout(
        device: &wgpu::Device,
        profile: TextureProfile,
        has_uniform: bool,
        textures: u32,
    ) -> wgpu::BindGroupLayout {
        let mut entries = Vec::new();
        let mut binding = 0;
        if has_uniform {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
            binding += 1;
        }
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(profile.sampler_binding()),
            count: None,
        });
        binding += 1;
        for _ in 0..textures {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: profile.sample_type(),
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            binding += 1;
        }
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("fullscreen pass layout"),
            entries: &entries,
        })
    }

    pub fn layout(&self, has_uniform: bool, textures: u32) -> &wgpu::BindGroupLayout {
        debug_assert!((1..=MAX_TEXTURES).contains(&textures));
        &self.layouts[(has_uniform as usize) * MAX_TEXTURES as usize + (textures - 1) as usize]
    }

    /// Sampler for the requested filter, honoring the capability fallback.
    pub fn sampler(&self, filter: FilterMode) -> &wgpu::Sampler {
        match self.profile.effective_filter(filter) {
            FilterMode::Linear => &self.linear,
            FilterMode::Nearest => &self.nearest,
        }
    }

    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        uniform: Option<&wgpu::Buffer>,
        filter: FilterMode,
        views: &[&wgpu::TextureView],
    ) -> wgpu::BindGroup {
        let mut entries = Vec::new();
        let mut binding = 0;
        if let Some(buffer) = uniform {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: buffer.as_entire_binding(),
            });
            binding += 1;
        }
        entries.push(wgpu::BindGroupEntry {
            binding,
            resource: wgpu::BindingResource::Sampler(self.sampler(filter)),
        });
        binding += 1;
        for view in views {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
            binding += 1;
        }
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("fullscreen pass bind group"),
            layout: self.layout(uniform.is_some(), views.len() as u32),
            entries: &entries,
        })
    }
}

/// Build a fullscreen-triangle render pipeline for one pass.
pub fn fullscreen_pipeline(
    device: &wgpu::Device,
    module: &wgpu::ShaderModule,
    layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    label: &str,
) -> wgpu::RenderPipeline {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
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

/// Additive accumulation (bloom upsample).
pub const BLEND_ADD: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Premultiplied source over destination (final composite).
pub const BLEND_PREMULTIPLIED_OVER: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Create a zeroed uniform buffer for a Pod params struct.
pub fn uniform_buffer<T: bytemuck::Pod>(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(&T::zeroed()),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

/// Record one fullscreen draw into `view`. `clear` of None keeps the
/// destination contents (used by blended accumulation passes).
pub fn draw(
    encoder: &mut wgpu::CommandEncoder,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    view: &wgpu::TextureView,
    clear: Option<wgpu::Color>,
    label: &str,
) {
    let load = match clear {
        Some(color) => wgpu::LoadOp::Clear(color),
        None => wgpu::LoadOp::Load,
    };
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}
