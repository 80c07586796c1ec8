//! The simulation stepper.
//!
//! Owns the velocity/dye/pressure/divergence/curl field set and runs the
//! fixed per-frame pass sequence: curl, vorticity confinement, divergence,
//! pressure decay seed, Jacobi relaxation, gradient subtraction, then
//! velocity and dye advection. Velocity and pressure live on the coarse
//! simulation grid; dye runs at its own higher resolution.

use bytemuck::{Pod, Zeroable};
use sim::{grid_resolution, SimConfig};

use super::pass::{self, PassResources};
use super::shader::{PassShader, ShaderBuildError, ShaderRegistry};
use super::target::{CopyPass, DoubleBuffer, FieldFormat, FilterMode, RenderTarget};

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct StencilParams {
    texel_size: [f32; 2],
    _pad: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct VorticityParams {
    texel_size: [f32; 2],
    curl: f32,
    dt: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct ClearParams {
    value: f32,
    _pad: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct AdvectionParams {
    texel_size: [f32; 2],
    source_texel_size: [f32; 2],
    dt: f32,
    dissipation: f32,
    _pad: [f32; 2],
}

pub struct FluidSolver {
    pub velocity: DoubleBuffer,
    pub dye: DoubleBuffer,
    pub pressure: DoubleBuffer,
    pub divergence: RenderTarget,
    pub curl: RenderTarget,

    curl_pipeline: wgpu::RenderPipeline,
    vorticity_pipeline: wgpu::RenderPipeline,
    divergence_pipeline: wgpu::RenderPipeline,
    clear_pipeline: wgpu::RenderPipeline,
    pressure_pipeline: wgpu::RenderPipeline,
    gradient_pipeline: wgpu::RenderPipeline,
    velocity_advection_pipeline: wgpu::RenderPipeline,
    dye_advection_pipeline: wgpu::RenderPipeline,

    curl_params: wgpu::Buffer,
    vorticity_params: wgpu::Buffer,
    divergence_params: wgpu::Buffer,
    clear_params: wgpu::Buffer,
    pressure_params: wgpu::Buffer,
    gradient_params: wgpu::Buffer,
    velocity_advection_params: wgpu::Buffer,
    dye_advection_params: wgpu::Buffer,
}

impl FluidSolver {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        registry: &mut ShaderRegistry,
        resources: &PassResources,
        config: &SimConfig,
        surface_size: (u32, u32),
    ) -> Result<Self, ShaderBuildError> {
        let (sim_w, sim_h) = grid_resolution(config.sim_resolution, surface_size.0, surface_size.1);
        let (dye_w, dye_h) = grid_resolution(config.dye_resolution, surface_size.0, surface_size.1);

        let velocity = DoubleBuffer::new(
            device,
            queue,
            sim_w,
            sim_h,
            FieldFormat::Rg,
            FilterMode::Linear,
            "velocity",
        );
        let dye = DoubleBuffer::new(
            device,
            queue,
            dye_w,
            dye_h,
            FieldFormat::Rgba,
            FilterMode::Linear,
            "dye",
        );
        let pressure = DoubleBuffer::new(
            device,
            queue,
            sim_w,
            sim_h,
            FieldFormat::R,
            FilterMode::Nearest,
            "pressure",
        );
        let divergence = RenderTarget::new(
            device,
            queue,
            sim_w,
            sim_h,
            FieldFormat::R,
            FilterMode::Nearest,
            "divergence",
        );
        let curl = RenderTarget::new(
            device,
            queue,
            sim_w,
            sim_h,
            FieldFormat::R,
            FilterMode::Nearest,
            "curl",
        );

        let flags = resources.profile.shader_flags();
        let layout1 = resources.layout(true, 1);
        let layout2 = resources.layout(true, 2);

        let velocity_format = FieldFormat::Rg.texture_format();
        let scalar_format = FieldFormat::R.texture_format();
        let dye_format = FieldFormat::Rgba.texture_format();

        let curl_module = registry.module(device, PassShader::Curl, flags)?;
        let vorticity_module = registry.module(device, PassShader::Vorticity, flags)?;
        let divergence_module = registry.module(device, PassShader::Divergence, flags)?;
        let clear_module = registry.module(device, PassShader::Clear, flags)?;
        let pressure_module = registry.module(device, PassShader::Pressure, flags)?;
        let gradient_module = registry.module(device, PassShader::GradientSubtract, flags)?;
        let advection_module = registry.module(device, PassShader::Advection, flags)?;

        let curl_pipeline = pass::fullscreen_pipeline(
            device,
            &curl_module,
            layout1,
            scalar_format,
            None,
            "curl pipeline",
        );
        let vorticity_pipeline = pass::fullscreen_pipeline(
            device,
            &vorticity_module,
            layout2,
            velocity_format,
            None,
            "vorticity pipeline",
        );
        let divergence_pipeline = pass::fullscreen_pipeline(
            device,
            &divergence_module,
            layout1,
            scalar_format,
            None,
            "divergence pipeline",
        );
        let clear_pipeline = pass::fullscreen_pipeline(
            device,
            &clear_module,
            layout1,
            scalar_format,
            None,
            "pressure decay pipeline",
        );
        let pressure_pipeline = pass::fullscreen_pipeline(
            device,
            &pressure_module,
            layout2,
            scalar_format,
            None,
            "pressure pipeline",
        );
        let gradient_pipeline = pass::fullscreen_pipeline(
            device,
            &gradient_module,
            layout2,
            velocity_format,
            None,
            "gradient subtract pipeline",
        );
        let velocity_advection_pipeline = pass::fullscreen_pipeline(
            device,
            &advection_module,
            layout2,
            velocity_format,
            None,
            "velocity advection pipeline",
        );
        let dye_advection_pipeline = pass::fullscreen_pipeline(
            device,
            &advection_module,
            layout2,
            dye_format,
            None,
            "dye advection pipeline",
        );

        Ok(Self {
            velocity,
            dye,
            pressure,
            divergence,
            curl,
            curl_pipeline,
            vorticity_pipeline,
            divergence_pipeline,
            clear_pipeline,
            pressure_pipeline,
            gradient_pipeline,
            velocity_advection_pipeline,
            dye_advection_pipeline,
            curl_params: pass::uniform_buffer::<StencilParams>(device, "curl params"),
            vorticity_params: pass::uniform_buffer::<VorticityParams>(device, "vorticity params"),
            divergence_params: pass::uniform_buffer::<StencilParams>(device, "divergence params"),
            clear_params: pass::uniform_buffer::<ClearParams>(device, "pressure decay params"),
            pressure_params: pass::uniform_buffer::<StencilParams>(device, "pressure params"),
            gradient_params: pass::uniform_buffer::<StencilParams>(device, "gradient params"),
            velocity_advection_params: pass::uniform_buffer::<AdvectionParams>(
                device,
                "velocity advection params",
            ),
            dye_advection_params: pass::uniform_buffer::<AdvectionParams>(
                device,
                "dye advection params",
            ),
        })
    }

    /// Reallocate resolution-dependent targets for a new surface size.
    /// Velocity and dye keep their content; pressure, divergence and curl
    /// restart from zero like the initial state.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        resources: &PassResources,
        copy: &CopyPass,
        config: &SimConfig,
        surface_size: (u32, u32),
    ) {
        let (sim_w, sim_h) = grid_resolution(config.sim_resolution, surface_size.0, surface_size.1);
        let (dye_w, dye_h) = grid_resolution(config.dye_resolution, surface_size.0, surface_size.1);

        self.velocity
            .resize(device, queue, resources, copy, sim_w, sim_h);
        self.dye.resize(device, queue, resources, copy, dye_w, dye_h);

        if self.pressure.width() != sim_w || self.pressure.height() != sim_h {
            self.pressure = DoubleBuffer::new(
                device,
                queue,
                sim_w,
                sim_h,
                FieldFormat::R,
                FilterMode::Nearest,
                "pressure",
            );
            self.divergence = RenderTarget::new(
                device,
                queue,
                sim_w,
                sim_h,
                FieldFormat::R,
                FilterMode::Nearest,
                "divergence",
            );
            self.curl = RenderTarget::new(
                device,
                queue,
                sim_w,
                sim_h,
                FieldFormat::R,
                FilterMode::Nearest,
                "curl",
            );
        }
    }

    /// Advance the simulation by `dt` seconds.
    pub fn step(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        resources: &PassResources,
        config: &SimConfig,
        dt: f32,
    ) {
        let texel = self.velocity.texel_size();
        let stencil = StencilParams {
            texel_size: texel,
            _pad: [0.0; 2],
        };
        queue.write_buffer(&self.curl_params, 0, bytemuck::bytes_of(&stencil));
        queue.write_buffer(&self.divergence_params, 0, bytemuck::bytes_of(&stencil));
        queue.write_buffer(&self.pressure_params, 0, bytemuck::bytes_of(&stencil));
        queue.write_buffer(&self.gradient_params, 0, bytemuck::bytes_of(&stencil));
        queue.write_buffer(
            &self.vorticity_params,
            0,
            bytemuck::bytes_of(&VorticityParams {
                texel_size: texel,
                curl: config.curl,
                dt,
            }),
        );
        queue.write_buffer(
            &self.clear_params,
            0,
            bytemuck::bytes_of(&ClearParams {
                value: config.pressure,
                _pad: [0.0; 3],
            }),
        );
        queue.write_buffer(
            &self.velocity_advection_params,
            0,
            bytemuck::bytes_of(&AdvectionParams {
                texel_size: texel,
                source_texel_size: texel,
                dt,
                dissipation: config.velocity_dissipation,
                _pad: [0.0; 2],
            }),
        );
        queue.write_buffer(
            &self.dye_advection_params,
            0,
            bytemuck::bytes_of(&AdvectionParams {
                texel_size: texel,
                source_texel_size: self.dye.texel_size(),
                dt,
                dissipation: config.density_dissipation,
                _pad: [0.0; 2],
            }),
        );

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("solver step encoder"),
        });

        // Curl of velocity.
        let bind = resources.bind_group(
            device,
            Some(&self.curl_params),
            FilterMode::Nearest,
            &[self.velocity.read().view()],
        );
        pass::draw(
            &mut encoder,
            &self.curl_pipeline,
            &bind,
            self.curl.view(),
            Some(wgpu::Color::TRANSPARENT),
            "curl",
        );

        // Vorticity confinement back into velocity.
        let bind = resources.bind_group(
            device,
            Some(&self.vorticity_params),
            FilterMode::Nearest,
            &[self.velocity.read().view(), self.curl.view()],
        );
        pass::draw(
            &mut encoder,
            &self.vorticity_pipeline,
            &bind,
            self.velocity.write().view(),
            Some(wgpu::Color::TRANSPARENT),
            "vorticity",
        );
        self.velocity.swap();

        // Divergence of the confined velocity.
        let bind = resources.bind_group(
            device,
            Some(&self.divergence_params),
            FilterMode::Nearest,
            &[self.velocity.read().view()],
        );
        pass::draw(
            &mut encoder,
            &self.divergence_pipeline,
            &bind,
            self.divergence.view(),
            Some(wgpu::Color::TRANSPARENT),
            "divergence",
        );

        // Seed the solve with the decayed previous pressure.
        let bind = resources.bind_group(
            device,
            Some(&self.clear_params),
            FilterMode::Nearest,
            &[self.pressure.read().view()],
        );
        pass::draw(
            &mut encoder,
            &self.clear_pipeline,
            &bind,
            self.pressure.write().view(),
            Some(wgpu::Color::TRANSPARENT),
            "pressure decay",
        );
        self.pressure.swap();

        // Jacobi relaxation, ping-pong every iteration. Both orientations
        // of the bind group are built up front.
        let jacobi_binds = [
            resources.bind_group(
                device,
                Some(&self.pressure_params),
                FilterMode::Nearest,
                &[self.pressure.target(0).view(), self.divergence.view()],
            ),
            resources.bind_group(
                device,
                Some(&self.pressure_params),
                FilterMode::Nearest,
                &[self.pressure.target(1).view(), self.divergence.view()],
            ),
        ];
        for _ in 0..config.pressure_iterations {
            pass::draw(
                &mut encoder,
                &self.pressure_pipeline,
                &jacobi_binds[self.pressure.read_index()],
                self.pressure.write().view(),
                Some(wgpu::Color::TRANSPARENT),
                "pressure",
            );
            self.pressure.swap();
        }

        // Projection: subtract the pressure gradient.
        let bind = resources.bind_group(
            device,
            Some(&self.gradient_params),
            FilterMode::Nearest,
            &[self.pressure.read().view(), self.velocity.read().view()],
        );
        pass::draw(
            &mut encoder,
            &self.gradient_pipeline,
            &bind,
            self.velocity.write().view(),
            Some(wgpu::Color::TRANSPARENT),
            "gradient subtract",
        );
        self.velocity.swap();

        // Self-advect velocity.
        let bind = resources.bind_group(
            device,
            Some(&self.velocity_advection_params),
            FilterMode::Linear,
            &[self.velocity.read().view(), self.velocity.read().view()],
        );
        pass::draw(
            &mut encoder,
            &self.velocity_advection_pipeline,
            &bind,
            self.velocity.write().view(),
            Some(wgpu::Color::TRANSPARENT),
            "velocity advection",
        );
        self.velocity.swap();

        // Advect dye through the projected velocity.
        let bind = resources.bind_group(
            device,
            Some(&self.dye_advection_params),
            FilterMode::Linear,
            &[self.velocity.read().view(), self.dye.read().view()],
        );
        pass::draw(
            &mut encoder,
            &self.dye_advection_pipeline,
            &bind,
            self.dye.write().view(),
            Some(wgpu::Color::TRANSPARENT),
            "dye advection",
        );
        self.dye.swap();

        queue.submit(std::iter::once(encoder.finish()));
    }
}
