//! Final composite to the surface.
//!
//! The display shader has one variant per bloom/sunrays combination, fetched
//! from the registry and cached per surface format. Disabled inputs are
//! bound as 1x1 dummies so every variant shares one bind group shape. The
//! fluid blends premultiplied-over a surface cleared to the configured
//! background color.

use std::collections::HashMap;

use super::pass::{self, PassResources, BLEND_PREMULTIPLIED_OVER};
use super::shader::{PassShader, ShaderBuildError, ShaderFlags, ShaderRegistry};
use super::target::{FieldFormat, FilterMode, RenderTarget};

pub struct DisplayPass {
    surface_format: wgpu::TextureFormat,
    pipelines: HashMap<ShaderFlags, wgpu::RenderPipeline>,
    dummy_bloom: RenderTarget,
    dummy_sunrays: RenderTarget,
}

/// Convert an sRGB byte to the linear value the attachment expects, for
/// surfaces with hardware sRGB encoding.
fn srgb_byte_to_linear(byte: u8) -> f64 {
    let c = byte as f64 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

impl DisplayPass {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            surface_format,
            pipelines: HashMap::new(),
            dummy_bloom: RenderTarget::new(
                device,
                queue,
                1,
                1,
                FieldFormat::Rgba,
                FilterMode::Nearest,
                "bloom dummy",
            ),
            dummy_sunrays: RenderTarget::new(
                device,
                queue,
                1,
                1,
                FieldFormat::R,
                FilterMode::Nearest,
                "sunrays dummy",
            ),
        }
    }

    /// Clear color for the surface, honoring hardware sRGB encoding.
    pub fn clear_color(&self, back_color: [u8; 3]) -> wgpu::Color {
        let convert = |byte: u8| {
            if self.surface_format.is_srgb() {
                srgb_byte_to_linear(byte)
            } else {
                byte as f64 / 255.0
            }
        };
        wgpu::Color {
            r: convert(back_color[0]),
            g: convert(back_color[1]),
            b: convert(back_color[2]),
            a: 1.0,
        }
    }

    fn pipeline(
        &mut self,
        device: &wgpu::Device,
        registry: &mut ShaderRegistry,
        resources: &PassResources,
        flags: ShaderFlags,
    ) -> Result<&wgpu::RenderPipeline, ShaderBuildError> {
        if !self.pipelines.contains_key(&flags) {
            let module = registry.module(device, PassShader::Display, flags)?;
            let pipeline = pass::fullscreen_pipeline(
                device,
                &module,
                resources.layout(false, 3),
                self.surface_format,
                Some(BLEND_PREMULTIPLIED_OVER),
                "display pipeline",
            );
            self.pipelines.insert(flags, pipeline);
        }
        Ok(&self.pipelines[&flags])
    }

    /// Compile and cache a variant up front so shader build failures surface
    /// at startup rather than mid-frame.
    pub fn warm(
        &mut self,
        device: &wgpu::Device,
        registry: &mut ShaderRegistry,
        resources: &PassResources,
        flags: ShaderFlags,
    ) -> Result<(), ShaderBuildError> {
        self.pipeline(device, registry, resources, flags).map(|_| ())
    }

    /// Composite dye (+ optional bloom/sunrays) over the cleared background.
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &mut self,
        device: &wgpu::Device,
        registry: &mut ShaderRegistry,
        resources: &PassResources,
        encoder: &mut wgpu::CommandEncoder,
        surface_view: &wgpu::TextureView,
        back_color: [u8; 3],
        dye: &RenderTarget,
        bloom: Option<&RenderTarget>,
        sunrays: Option<&RenderTarget>,
    ) -> Result<(), ShaderBuildError> {
        let flags = ShaderFlags {
            bloom: bloom.is_some(),
            sunrays: sunrays.is_some(),
            ..resources.profile.shader_flags()
        };
        let clear = self.clear_color(back_color);

        let bind = resources.bind_group(
            device,
            None,
            FilterMode::Linear,
            &[
                dye.view(),
                bloom.unwrap_or(&self.dummy_bloom).view(),
                sunrays.unwrap_or(&self.dummy_sunrays).view(),
            ],
        );
        let pipeline = self.pipeline(device, registry, resources, flags)?;
        pass::draw(encoder, pipeline, &bind, surface_view, Some(clear), "display");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_conversion_endpoints() {
        assert_eq!(srgb_byte_to_linear(0), 0.0);
        assert!((srgb_byte_to_linear(255) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn srgb_conversion_is_monotonic() {
        let mut prev = -1.0;
        for byte in (0..=255).step_by(5) {
            let linear = srgb_byte_to_linear(byte);
            assert!(linear > prev);
            prev = linear;
        }
    }

    #[test]
    fn dark_background_maps_below_linear_ramp() {
        // Gamma expansion pushes small values down.
        assert!(srgb_byte_to_linear(10) < 10.0 / 255.0);
    }
}
