//! Render target resource management.
//!
//! A [`RenderTarget`] owns one texture + view pair (the render-to-texture
//! analogue of a framebuffer attachment). [`DoubleBuffer`] pairs two
//! same-shape targets for ping-pong passes. Resizes preserve prior content
//! by sampling the old texture through [`CopyPass`] into the new allocation,
//! so a window resize never visibly resets the flow field.

use super::pass::{self, PassResources};
use super::shader::{PassShader, ShaderBuildError, ShaderFlags, ShaderRegistry};

/// Channel layout of a simulation field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldFormat {
    /// Single channel (pressure, divergence, curl, sunrays).
    R,
    /// Two channels (velocity).
    Rg,
    /// Four channels (dye, bloom).
    Rgba,
}

impl FieldFormat {
    pub fn texture_format(self) -> wgpu::TextureFormat {
        match self {
            FieldFormat::R => wgpu::TextureFormat::R16Float,
            FieldFormat::Rg => wgpu::TextureFormat::Rg16Float,
            FieldFormat::Rgba => wgpu::TextureFormat::Rgba16Float,
        }
    }

    pub fn channels(self) -> u32 {
        match self {
            FieldFormat::R => 1,
            FieldFormat::Rg => 2,
            FieldFormat::Rgba => 4,
        }
    }

    fn index(self) -> usize {
        match self {
            FieldFormat::R => 0,
            FieldFormat::Rg => 1,
            FieldFormat::Rgba => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Linear,
    Nearest,
}

/// Capability tier for half-float textures, probed once at startup. When the
/// adapter cannot filter them, samplers degrade to nearest and advection
/// switches to its manual-interpolation variant; callers never see a
/// failure, only lower fidelity.
#[derive(Clone, Copy, Debug)]
pub struct TextureProfile {
    pub linear_filtering: bool,
}

impl TextureProfile {
    pub fn detect(adapter: &wgpu::Adapter) -> Self {
        let formats = [
            wgpu::TextureFormat::R16Float,
            wgpu::TextureFormat::Rg16Float,
            wgpu::TextureFormat::Rgba16Float,
        ];
        let linear_filtering = formats.iter().all(|format| {
            adapter
                .get_texture_format_features(*format)
                .flags
                .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE)
        });
        if !linear_filtering {
            log::info!(
                "half-float linear filtering unavailable; using nearest sampling and manual interpolation"
            );
        }
        Self { linear_filtering }
    }

    pub fn effective_filter(&self, want: FilterMode) -> FilterMode {
        if self.linear_filtering {
            want
        } else {
            FilterMode::Nearest
        }
    }

    pub fn sample_type(&self) -> wgpu::TextureSampleType {
        wgpu::TextureSampleType::Float {
            filterable: self.linear_filtering,
        }
    }

    pub fn sampler_binding(&self) -> wgpu::SamplerBindingType {
        if self.linear_filtering {
            wgpu::SamplerBindingType::Filtering
        } else {
            wgpu::SamplerBindingType::NonFiltering
        }
    }

    /// Base shader variant implied by this profile.
    pub fn shader_flags(&self) -> ShaderFlags {
        ShaderFlags {
            manual_filtering: !self.linear_filtering,
            ..ShaderFlags::default()
        }
    }
}

/// One GPU texture + view, render-attachable and sampleable.
pub struct RenderTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: FieldFormat,
    filter: FilterMode,
    label: String,
}

impl RenderTarget {
    /// Allocate a target cleared to zero. Dimensions are clamped to 1 so a
    /// degenerate resize can never produce a zero-sized texture.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        format: FieldFormat,
        filter: FilterMode,
        label: &str,
    ) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: format.texture_format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Fresh textures are not guaranteed to be zeroed on every backend.
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("target clear encoder"),
        });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("target clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        queue.submit(std::iter::once(encoder.finish()));

        Self {
            texture,
            view,
            width,
            height,
            format,
            filter,
            label: label.to_owned(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// (1/width, 1/height); exact reciprocal of the current dimensions.
    pub fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn format(&self) -> FieldFormat {
        self.format
    }

    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    /// Allocate at the new size and copy the old content across, sampling
    /// through normalized coordinates. The old texture drops afterwards.
    pub fn resized(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        resources: &PassResources,
        copy: &CopyPass,
        width: u32,
        height: u32,
    ) -> RenderTarget {
        let next = RenderTarget::new(
            device,
            queue,
            width,
            height,
            self.format,
            self.filter,
            &self.label,
        );
        copy.run(device, queue, resources, self, &next);
        next
    }
}

/// Two same-shape targets with a swappable read/write role.
pub struct DoubleBuffer {
    targets: [RenderTarget; 2],
    read: usize,
}

impl DoubleBuffer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
        format: FieldFormat,
        filter: FilterMode,
        label: &str,
    ) -> Self {
        Self {
            targets: [
                RenderTarget::new(device, queue, width, height, format, filter, label),
                RenderTarget::new(device, queue, width, height, format, filter, label),
            ],
            read: 0,
        }
    }

    pub fn read(&self) -> &RenderTarget {
        &self.targets[self.read]
    }

    pub fn write(&self) -> &RenderTarget {
        &self.targets[1 - self.read]
    }

    /// Exchange read/write roles without copying.
    pub fn swap(&mut self) {
        self.read = 1 - self.read;
    }

    pub fn read_index(&self) -> usize {
        self.read
    }

    /// Direct access by slot, for passes that prebuild both ping-pong bind
    /// groups.
    pub fn target(&self, index: usize) -> &RenderTarget {
        &self.targets[index]
    }

    pub fn width(&self) -> u32 {
        self.read().width()
    }

    pub fn height(&self) -> u32 {
        self.read().height()
    }

    pub fn texel_size(&self) -> [f32; 2] {
        self.read().texel_size()
    }

    /// Resize both halves. The read half keeps its content through a copy
    /// pass; the write half is freshly allocated since every pass overwrites
    /// it before reading.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        resources: &PassResources,
        copy: &CopyPass,
        width: u32,
        height: u32,
    ) {
        if self.width() == width && self.height() == height {
            return;
        }
        let preserved = self
            .read()
            .resized(device, queue, resources, copy, width, height);
        let scratch = {
            let old = self.read();
            RenderTarget::new(
                device,
                queue,
                width,
                height,
                old.format(),
                old.filter(),
                &old.label,
            )
        };
        self.targets = [preserved, scratch];
        self.read = 0;
    }
}

/// Fullscreen copy used by content-preserving resizes; one pipeline per
/// destination format.
pub struct CopyPass {
    pipelines: [wgpu::RenderPipeline; 3],
}

impl CopyPass {
    pub fn new(
        device: &wgpu::Device,
        registry: &mut ShaderRegistry,
        resources: &PassResources,
    ) -> Result<Self, ShaderBuildError> {
        let module = registry.module(device, PassShader::Copy, ShaderFlags::default())?;
        let layout = resources.layout(false, 1);
        let build = |format: FieldFormat| {
            pass::fullscreen_pipeline(
                device,
                &module,
                layout,
                format.texture_format(),
                None,
                "copy pipeline",
            )
        };
        Ok(Self {
            pipelines: [
                build(FieldFormat::R),
                build(FieldFormat::Rg),
                build(FieldFormat::Rgba),
            ],
        })
    }

    pub fn encode(
        &self,
        device: &wgpu::Device,
        resources: &PassResources,
        encoder: &mut wgpu::CommandEncoder,
        source: &RenderTarget,
        dest: &RenderTarget,
    ) {
        let bind_group = resources.bind_group(device, None, source.filter(), &[source.view()]);
        pass::draw(
            encoder,
            &self.pipelines[dest.format().index()],
            &bind_group,
            dest.view(),
            Some(wgpu::Color::TRANSPARENT),
            "copy",
        );
    }

    pub fn run(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        resources: &PassResources,
        source: &RenderTarget,
        dest: &RenderTarget,
    ) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("copy encoder"),
        });
        self.encode(device, resources, &mut encoder, source, dest);
        queue.submit(std::iter::once(encoder.finish()));
    }
}
