//! Shader registry.
//!
//! Every pass shader is a self-contained WGSL file. Optional code paths
//! (bloom/sunrays composite inputs, manual bilinear filtering) are selected
//! by prepending `const` flag declarations, so each flag combination is a
//! distinct module compiled once and cached. Validation failures surface as
//! [`ShaderBuildError`] carrying the compiler diagnostic; callers treat this
//! as fatal at startup.

use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassShader {
    Copy,
    Clear,
    Splat,
    Curl,
    Vorticity,
    Divergence,
    Pressure,
    GradientSubtract,
    Advection,
    BloomPrefilter,
    Blur,
    BloomFinal,
    SunraysMask,
    Sunrays,
    Display,
}

impl PassShader {
    pub fn source(self) -> &'static str {
        match self {
            PassShader::Copy => include_str!("../shaders/copy.wgsl"),
            PassShader::Clear => include_str!("../shaders/clear.wgsl"),
            PassShader::Splat => include_str!("../shaders/splat.wgsl"),
            PassShader::Curl => include_str!("../shaders/curl.wgsl"),
            PassShader::Vorticity => include_str!("../shaders/vorticity.wgsl"),
            PassShader::Divergence => include_str!("../shaders/divergence.wgsl"),
            PassShader::Pressure => include_str!("../shaders/pressure.wgsl"),
            PassShader::GradientSubtract => include_str!("../shaders/gradient_subtract.wgsl"),
            PassShader::Advection => include_str!("../shaders/advection.wgsl"),
            PassShader::BloomPrefilter => include_str!("../shaders/bloom_prefilter.wgsl"),
            PassShader::Blur => include_str!("../shaders/blur.wgsl"),
            PassShader::BloomFinal => include_str!("../shaders/bloom_final.wgsl"),
            PassShader::SunraysMask => include_str!("../shaders/sunrays_mask.wgsl"),
            PassShader::Sunrays => include_str!("../shaders/sunrays.wgsl"),
            PassShader::Display => include_str!("../shaders/display.wgsl"),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PassShader::Copy => "copy",
            PassShader::Clear => "clear",
            PassShader::Splat => "splat",
            PassShader::Curl => "curl",
            PassShader::Vorticity => "vorticity",
            PassShader::Divergence => "divergence",
            PassShader::Pressure => "pressure",
            PassShader::GradientSubtract => "gradient_subtract",
            PassShader::Advection => "advection",
            PassShader::BloomPrefilter => "bloom_prefilter",
            PassShader::Blur => "blur",
            PassShader::BloomFinal => "bloom_final",
            PassShader::SunraysMask => "sunrays_mask",
            PassShader::Sunrays => "sunrays",
            PassShader::Display => "display",
        }
    }
}

/// Compile-time feature set for a shader variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ShaderFlags {
    pub bloom: bool,
    pub sunrays: bool,
    pub manual_filtering: bool,
}

impl ShaderFlags {
    /// Flag declarations prepended to the WGSL source. Every flag is always
    /// declared so a variant differs only in values, never in shape.
    pub fn prelude(self) -> String {
        format!(
            "const ENABLE_BLOOM: bool = {};\n\
             const ENABLE_SUNRAYS: bool = {};\n\
             const MANUAL_FILTERING: bool = {};\n\n",
            self.bloom, self.sunrays, self.manual_filtering
        )
    }
}

/// Fatal shader compilation/validation failure.
#[derive(Debug)]
pub struct ShaderBuildError {
    pub shader: &'static str,
    pub log: String,
}

impl std::fmt::Display for ShaderBuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "shader '{}' failed to build: {}", self.shader, self.log)
    }
}

impl std::error::Error for ShaderBuildError {}

/// Compiles and caches shader module variants.
#[derive(Default)]
pub struct ShaderRegistry {
    modules: HashMap<(PassShader, ShaderFlags), Arc<wgpu::ShaderModule>>,
}

impl ShaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch (or compile once) the module for a shader variant.
    pub fn module(
        &mut self,
        device: &wgpu::Device,
        shader: PassShader,
        flags: ShaderFlags,
    ) -> Result<Arc<wgpu::ShaderModule>, ShaderBuildError> {
        if let Some(module) = self.modules.get(&(shader, flags)) {
            return Ok(module.clone());
        }

        let source = format!("{}{}", flags.prelude(), shader.source());
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(shader.label()),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(ShaderBuildError {
                shader: shader.label(),
                log: error.to_string(),
            });
        }

        let module = Arc::new(module);
        self.modules.insert((shader, flags), module.clone());
        Ok(module)
    }

    pub fn compiled_variants(&self) -> usize {
        self.modules.len()
    }
}
