//! Gaussian impulse deposits into the velocity and dye fields.

use bytemuck::{Pod, Zeroable};
use sim::Splat;

use super::pass::{self, PassResources};
use super::shader::{PassShader, ShaderBuildError, ShaderRegistry};
use super::target::{DoubleBuffer, FieldFormat, FilterMode};

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct SplatParams {
    point: [f32; 2],
    aspect_ratio: f32,
    radius: f32,
    color: [f32; 3],
    _pad: f32,
}

pub struct SplatPass {
    velocity_pipeline: wgpu::RenderPipeline,
    dye_pipeline: wgpu::RenderPipeline,
    velocity_params: wgpu::Buffer,
    dye_params: wgpu::Buffer,
}

/// Widen the kernel on wide viewports so splats stay circular on screen.
fn correct_radius(radius: f32, aspect_ratio: f32) -> f32 {
    if aspect_ratio > 1.0 {
        radius * aspect_ratio
    } else {
        radius
    }
}

impl SplatPass {
    pub fn new(
        device: &wgpu::Device,
        registry: &mut ShaderRegistry,
        resources: &PassResources,
    ) -> Result<Self, ShaderBuildError> {
        let module = registry.module(device, PassShader::Splat, resources.profile.shader_flags())?;
        let layout = resources.layout(true, 1);
        Ok(Self {
            velocity_pipeline: pass::fullscreen_pipeline(
                device,
                &module,
                layout,
                FieldFormat::Rg.texture_format(),
                None,
                "velocity splat pipeline",
            ),
            dye_pipeline: pass::fullscreen_pipeline(
                device,
                &module,
                layout,
                FieldFormat::Rgba.texture_format(),
                None,
                "dye splat pipeline",
            ),
            velocity_params: pass::uniform_buffer::<SplatParams>(device, "velocity splat params"),
            dye_params: pass::uniform_buffer::<SplatParams>(device, "dye splat params"),
        })
    }

    /// Deposit one splat: force into velocity, color into dye, both shaped
    /// by the same Gaussian falloff. `radius_pct` is the configured radius
    /// in percent of the shorter screen axis.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        resources: &PassResources,
        velocity: &mut DoubleBuffer,
        dye: &mut DoubleBuffer,
        splat: &Splat,
        aspect_ratio: f32,
        radius_pct: f32,
    ) {
        let radius = correct_radius(radius_pct / 100.0, aspect_ratio);
        let point = [splat.point.x, splat.point.y];

        queue.write_buffer(
            &self.velocity_params,
            0,
            bytemuck::bytes_of(&SplatParams {
                point,
                aspect_ratio,
                radius,
                color: [splat.force.x, splat.force.y, 0.0],
                _pad: 0.0,
            }),
        );
        queue.write_buffer(
            &self.dye_params,
            0,
            bytemuck::bytes_of(&SplatParams {
                point,
                aspect_ratio,
                radius,
                color: splat.color,
                _pad: 0.0,
            }),
        );

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("splat encoder"),
        });

        let bind = resources.bind_group(
            device,
            Some(&self.velocity_params),
            FilterMode::Linear,
            &[velocity.read().view()],
        );
        pass::draw(
            &mut encoder,
            &self.velocity_pipeline,
            &bind,
            velocity.write().view(),
            Some(wgpu::Color::TRANSPARENT),
            "velocity splat",
        );

        let bind = resources.bind_group(
            device,
            Some(&self.dye_params),
            FilterMode::Linear,
            &[dye.read().view()],
        );
        pass::draw(
            &mut encoder,
            &self.dye_pipeline,
            &bind,
            dye.write().view(),
            Some(wgpu::Color::TRANSPARENT),
            "dye splat",
        );

        queue.submit(std::iter::once(encoder.finish()));
        velocity.swap();
        dye.swap();
    }
}
