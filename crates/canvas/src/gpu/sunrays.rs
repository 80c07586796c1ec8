//! Sunrays: a brightness mask followed by radial accumulation toward the
//! frame center, softened by one separable blur. The mask borrows the dye
//! write target as scratch for the duration of the pass.

use bytemuck::{Pod, Zeroable};
use sim::{grid_resolution, SunraysConfig};

use super::pass::{self, PassResources};
use super::shader::{PassShader, ShaderBuildError, ShaderRegistry};
use super::target::{FieldFormat, FilterMode, RenderTarget};

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct SunraysParams {
    weight: f32,
    _pad: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct BlurParams {
    texel_size: [f32; 2],
    _pad: [f32; 2],
}

pub struct SunraysPass {
    mask_pipeline: wgpu::RenderPipeline,
    rays_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,

    rays_params: wgpu::Buffer,
    blur_h_params: wgpu::Buffer,
    blur_v_params: wgpu::Buffer,

    output: RenderTarget,
    temp: RenderTarget,
}

impl SunraysPass {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        registry: &mut ShaderRegistry,
        resources: &PassResources,
        config: &SunraysConfig,
        surface_size: (u32, u32),
    ) -> Result<Self, ShaderBuildError> {
        let flags = resources.profile.shader_flags();
        let layout = resources.layout(true, 1);
        let mask_layout = resources.layout(false, 1);

        let mask_module = registry.module(device, PassShader::SunraysMask, flags)?;
        let rays_module = registry.module(device, PassShader::Sunrays, flags)?;
        let blur_module = registry.module(device, PassShader::Blur, flags)?;

        let (output, temp) = Self::build_targets(device, queue, config, surface_size);

        let sunrays = Self {
            mask_pipeline: pass::fullscreen_pipeline(
                device,
                &mask_module,
                mask_layout,
                FieldFormat::Rgba.texture_format(),
                None,
                "sunrays mask pipeline",
            ),
            rays_pipeline: pass::fullscreen_pipeline(
                device,
                &rays_module,
                layout,
                FieldFormat::R.texture_format(),
                None,
                "sunrays pipeline",
            ),
            blur_pipeline: pass::fullscreen_pipeline(
                device,
                &blur_module,
                layout,
                FieldFormat::R.texture_format(),
                None,
                "sunrays blur pipeline",
            ),
            rays_params: pass::uniform_buffer::<SunraysParams>(device, "sunrays params"),
            blur_h_params: pass::uniform_buffer::<BlurParams>(device, "sunrays blur h params"),
            blur_v_params: pass::uniform_buffer::<BlurParams>(device, "sunrays blur v params"),
            output,
            temp,
        };
        sunrays.write_blur_params(queue);
        Ok(sunrays)
    }

    fn build_targets(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: &SunraysConfig,
        surface_size: (u32, u32),
    ) -> (RenderTarget, RenderTarget) {
        let (w, h) = grid_resolution(config.resolution, surface_size.0, surface_size.1);
        let output = RenderTarget::new(
            device,
            queue,
            w,
            h,
            FieldFormat::R,
            FilterMode::Linear,
            "sunrays",
        );
        let temp = RenderTarget::new(
            device,
            queue,
            w,
            h,
            FieldFormat::R,
            FilterMode::Linear,
            "sunrays temp",
        );
        (output, temp)
    }

    fn write_blur_params(&self, queue: &wgpu::Queue) {
        let [tx, ty] = self.output.texel_size();
        queue.write_buffer(
            &self.blur_h_params,
            0,
            bytemuck::bytes_of(&BlurParams {
                texel_size: [tx, 0.0],
                _pad: [0.0; 2],
            }),
        );
        queue.write_buffer(
            &self.blur_v_params,
            0,
            bytemuck::bytes_of(&BlurParams {
                texel_size: [0.0, ty],
                _pad: [0.0; 2],
            }),
        );
    }

    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: &SunraysConfig,
        surface_size: (u32, u32),
    ) {
        let (output, temp) = Self::build_targets(device, queue, config, surface_size);
        self.output = output;
        self.temp = temp;
        self.write_blur_params(queue);
    }

    /// The blurred ray texture, valid after `apply`.
    pub fn output(&self) -> &RenderTarget {
        &self.output
    }

    /// Mask the dye into `scratch`, accumulate rays, blur once.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        resources: &PassResources,
        config: &SunraysConfig,
        source: &RenderTarget,
        scratch: &RenderTarget,
        encoder: &mut wgpu::CommandEncoder,
    ) {
        queue.write_buffer(
            &self.rays_params,
            0,
            bytemuck::bytes_of(&SunraysParams {
                weight: config.weight,
                _pad: [0.0; 3],
            }),
        );

        let bind = resources.bind_group(device, None, FilterMode::Linear, &[source.view()]);
        pass::draw(
            encoder,
            &self.mask_pipeline,
            &bind,
            scratch.view(),
            Some(wgpu::Color::TRANSPARENT),
            "sunrays mask",
        );

        let bind = resources.bind_group(
            device,
            Some(&self.rays_params),
            FilterMode::Linear,
            &[scratch.view()],
        );
        pass::draw(
            encoder,
            &self.rays_pipeline,
            &bind,
            self.output.view(),
            Some(wgpu::Color::TRANSPARENT),
            "sunrays",
        );

        let bind = resources.bind_group(
            device,
            Some(&self.blur_h_params),
            FilterMode::Linear,
            &[self.output.view()],
        );
        pass::draw(
            encoder,
            &self.blur_pipeline,
            &bind,
            self.temp.view(),
            Some(wgpu::Color::TRANSPARENT),
            "sunrays blur h",
        );

        let bind = resources.bind_group(
            device,
            Some(&self.blur_v_params),
            FilterMode::Linear,
            &[self.temp.view()],
        );
        pass::draw(
            encoder,
            &self.blur_pipeline,
            &bind,
            self.output.view(),
            Some(wgpu::Color::TRANSPARENT),
            "sunrays blur v",
        );
    }
}
