//! Bloom: prefilter above a soft threshold, blur down a pyramid of
//! half-resolution targets, accumulate back up additively, scale by
//! intensity. The output target doubles as the prefilter scratch, exactly
//! like the downsample chain it feeds.

use bytemuck::{Pod, Zeroable};
use sim::{grid_resolution, BloomConfig};

use super::pass::{self, PassResources, BLEND_ADD};
use super::shader::{PassShader, ShaderBuildError, ShaderRegistry};
use super::target::{FieldFormat, FilterMode, RenderTarget};

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct PrefilterParams {
    curve: [f32; 3],
    threshold: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct BlurParams {
    texel_size: [f32; 2],
    _pad: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct FinalParams {
    intensity: f32,
    _pad: [f32; 3],
}

/// Pyramid level sizes below a base resolution: each level halves, stopping
/// before anything drops under 2 texels.
fn pyramid_sizes(base_w: u32, base_h: u32, iterations: u32) -> Vec<(u32, u32)> {
    let mut sizes = Vec::new();
    for i in 0..iterations {
        let w = base_w >> (i + 1);
        let h = base_h >> (i + 1);
        if w < 2 || h < 2 {
            break;
        }
        sizes.push((w, h));
    }
    sizes
}

pub struct BloomPass {
    prefilter_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    blur_add_pipeline: wgpu::RenderPipeline,
    final_pipeline: wgpu::RenderPipeline,

    prefilter_params: wgpu::Buffer,
    final_params: wgpu::Buffer,

    output: RenderTarget,
    levels: Vec<RenderTarget>,
    /// Blur offsets keyed by blur source: the output target, then each level.
    blur_params: Vec<wgpu::Buffer>,
}

impl BloomPass {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        registry: &mut ShaderRegistry,
        resources: &PassResources,
        config: &BloomConfig,
        surface_size: (u32, u32),
    ) -> Result<Self, ShaderBuildError> {
        let flags = resources.profile.shader_flags();
        let layout = resources.layout(true, 1);
        let format = FieldFormat::Rgba.texture_format();

        let prefilter_module = registry.module(device, PassShader::BloomPrefilter, flags)?;
        let blur_module = registry.module(device, PassShader::Blur, flags)?;
        let final_module = registry.module(device, PassShader::BloomFinal, flags)?;

        let (output, levels, blur_params) =
            Self::build_targets(device, queue, config, surface_size);

        Ok(Self {
            prefilter_pipeline: pass::fullscreen_pipeline(
                device,
                &prefilter_module,
                layout,
                format,
                None,
                "bloom prefilter pipeline",
            ),
            blur_pipeline: pass::fullscreen_pipeline(
                device,
                &blur_module,
                layout,
                format,
                None,
                "bloom blur pipeline",
            ),
            blur_add_pipeline: pass::fullscreen_pipeline(
                device,
                &blur_module,
                layout,
                format,
                Some(BLEND_ADD),
                "bloom upsample pipeline",
            ),
            final_pipeline: pass::fullscreen_pipeline(
                device,
                &final_module,
                layout,
                format,
                None,
                "bloom final pipeline",
            ),
            prefilter_params: pass::uniform_buffer::<PrefilterParams>(device, "bloom prefilter params"),
            final_params: pass::uniform_buffer::<FinalParams>(device, "bloom final params"),
            output,
            levels,
            blur_params,
        })
    }

    fn build_targets(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: &BloomConfig,
        surface_size: (u32, u32),
    ) -> (RenderTarget, Vec<RenderTarget>, Vec<wgpu::Buffer>) {
        let (base_w, base_h) = grid_resolution(config.resolution, surface_size.0, surface_size.1);
        let output = RenderTarget::new(
            device,
            queue,
            base_w,
            base_h,
            FieldFormat::Rgba,
            FilterMode::Linear,
            "bloom",
        );
        let levels: Vec<RenderTarget> = pyramid_sizes(base_w, base_h, config.iterations)
            .into_iter()
            .map(|(w, h)| {
                RenderTarget::new(
                    device,
                    queue,
                    w,
                    h,
                    FieldFormat::Rgba,
                    FilterMode::Linear,
                    "bloom level",
                )
            })
            .collect();

        let mut blur_params = Vec::with_capacity(levels.len() + 1);
        for target in std::iter::once(&output).chain(levels.iter()) {
            let buffer = pass::uniform_buffer::<BlurParams>(device, "bloom blur params");
            queue.write_buffer(
                &buffer,
                0,
                bytemuck::bytes_of(&BlurParams {
                    texel_size: target.texel_size(),
                    _pad: [0.0; 2],
                }),
            );
            blur_params.push(buffer);
        }

        (output, levels, blur_params)
    }

    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: &BloomConfig,
        surface_size: (u32, u32),
    ) {
        let (output, levels, blur_params) =
            Self::build_targets(device, queue, config, surface_size);
        self.output = output;
        self.levels = levels;
        self.blur_params = blur_params;
    }

    /// The composited bloom texture, valid after `apply`.
    pub fn output(&self) -> &RenderTarget {
        &self.output
    }

    /// Run the bloom chain over the dye read target. Skipped entirely when
    /// the pyramid is too shallow to blur (tiny windows).
    pub fn apply(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        resources: &PassResources,
        config: &BloomConfig,
        source: &RenderTarget,
        encoder: &mut wgpu::CommandEncoder,
    ) {
        if self.levels.len() < 2 {
            return;
        }

        queue.write_buffer(
            &self.prefilter_params,
            0,
            bytemuck::bytes_of(&PrefilterParams {
                curve: config.knee_curve(),
                threshold: config.threshold,
            }),
        );
        queue.write_buffer(
            &self.final_params,
            0,
            bytemuck::bytes_of(&FinalParams {
                intensity: config.intensity,
                _pad: [0.0; 3],
            }),
        );

        // Prefilter into the output target.
        let bind = resources.bind_group(
            device,
            Some(&self.prefilter_params),
            FilterMode::Linear,
            &[source.view()],
        );
        pass::draw(
            encoder,
            &self.prefilter_pipeline,
            &bind,
            self.output.view(),
            Some(wgpu::Color::TRANSPARENT),
            "bloom prefilter",
        );

        // Downsample chain with a tent blur at every step.
        let mut last: &RenderTarget = &self.output;
        let mut last_params: &wgpu::Buffer = &self.blur_params[0];
        for (i, level) in self.levels.iter().enumerate() {
            let bind =
                resources.bind_group(device, Some(last_params), FilterMode::Linear, &[last.view()]);
            pass::draw(
                encoder,
                &self.blur_pipeline,
                &bind,
                level.view(),
                Some(wgpu::Color::TRANSPARENT),
                "bloom downsample",
            );
            last = level;
            last_params = &self.blur_params[i + 1];
        }

        // Accumulate back up, additively.
        for i in (0..self.levels.len() - 1).rev() {
            let bind =
                resources.bind_group(device, Some(last_params), FilterMode::Linear, &[last.view()]);
            pass::draw(
                encoder,
                &self.blur_add_pipeline,
                &bind,
                self.levels[i].view(),
                None,
                "bloom upsample",
            );
            last = &self.levels[i];
            last_params = &self.blur_params[i + 1];
        }

        // Intensity scale into the output target.
        let bind = resources.bind_group(
            device,
            Some(&self.final_params),
            FilterMode::Linear,
            &[last.view()],
        );
        pass::draw(
            encoder,
            &self.final_pipeline,
            &bind,
            self.output.view(),
            Some(wgpu::Color::TRANSPARENT),
            "bloom final",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pyramid_halves_each_level() {
        let sizes = pyramid_sizes(256, 128, 8);
        assert_eq!(sizes[0], (128, 64));
        assert_eq!(sizes[1], (64, 32));
        for window in sizes.windows(2) {
            assert_eq!(window[1].0, window[0].0 / 2);
            assert_eq!(window[1].1, window[0].1 / 2);
        }
    }

    #[test]
    fn pyramid_stops_above_two_texels() {
        let sizes = pyramid_sizes(256, 128, 32);
        assert!(sizes.iter().all(|&(w, h)| w >= 2 && h >= 2));
        assert!(sizes.len() < 32);
    }

    #[test]
    fn pyramid_respects_iteration_cap() {
        assert_eq!(pyramid_sizes(1024, 1024, 3).len(), 3);
    }

    #[test]
    fn tiny_base_yields_no_levels() {
        assert!(pyramid_sizes(3, 3, 8).is_empty());
    }
}
