//! The frame driver: a winit application that owns the GPU context and the
//! fluid state, forwards pointer input to the sim crate, and runs exactly
//! one simulation step and one composite per frame.

use std::sync::Arc;

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::Window,
};

use sim::{FrameClock, PointerId, PointerSet, RecolorTimer, SimConfig, Splat, SplatScheduler};

use super::context::{GpuContext, InitError};
use crate::gpu::bloom::BloomPass;
use crate::gpu::display::DisplayPass;
use crate::gpu::pass::PassResources;
use crate::gpu::shader::{ShaderFlags, ShaderRegistry};
use crate::gpu::solver::FluidSolver;
use crate::gpu::splat::SplatPass;
use crate::gpu::sunrays::SunraysPass;
use crate::gpu::target::CopyPass;

/// Everything the per-frame loop touches.
struct FluidApp {
    config: SimConfig,
    registry: ShaderRegistry,
    resources: PassResources,
    copy: CopyPass,
    solver: FluidSolver,
    splat_pass: SplatPass,
    bloom: BloomPass,
    sunrays: SunraysPass,
    display: DisplayPass,

    pointers: PointerSet,
    scheduler: SplatScheduler,
    recolor: RecolorTimer,
    clock: FrameClock,
    rng: StdRng,
    splats: Vec<Splat>,

    /// Surface size the field targets were allocated for.
    field_size: (u32, u32),
    last_mouse: Vec2,
    paused: bool,
}

impl FluidApp {
    fn new(ctx: &GpuContext, config: SimConfig) -> Result<Self, InitError> {
        let mut registry = ShaderRegistry::new();
        let resources = PassResources::new(&ctx.device, ctx.profile);
        let copy = CopyPass::new(&ctx.device, &mut registry, &resources)?;
        let solver = FluidSolver::new(
            &ctx.device,
            &ctx.queue,
            &mut registry,
            &resources,
            &config,
            ctx.size,
        )?;
        let splat_pass = SplatPass::new(&ctx.device, &mut registry, &resources)?;
        let bloom = BloomPass::new(
            &ctx.device,
            &ctx.queue,
            &mut registry,
            &resources,
            &config.bloom,
            ctx.size,
        )?;
        let sunrays = SunraysPass::new(
            &ctx.device,
            &ctx.queue,
            &mut registry,
            &resources,
            &config.sunrays,
            ctx.size,
        )?;
        let mut display = DisplayPass::new(&ctx.device, &ctx.queue, ctx.surface_format());
        display.warm(
            &ctx.device,
            &mut registry,
            &resources,
            ShaderFlags {
                bloom: config.bloom.enabled,
                sunrays: config.sunrays.enabled,
                ..ctx.profile.shader_flags()
            },
        )?;
        log::info!(
            "pipeline ready: {} shader variants compiled",
            registry.compiled_variants()
        );

        let mut rng = StdRng::from_entropy();
        let mut scheduler = SplatScheduler::new();
        scheduler.seed(&mut rng);

        let paused = config.paused;
        Ok(Self {
            config,
            registry,
            resources,
            copy,
            solver,
            splat_pass,
            bloom,
            sunrays,
            display,
            pointers: PointerSet::new(),
            scheduler,
            recolor: RecolorTimer::new(),
            clock: FrameClock::new(),
            rng,
            splats: Vec::new(),
            field_size: ctx.size,
            last_mouse: Vec2::ZERO,
            paused,
        })
    }

    fn surface_vec(ctx: &GpuContext) -> Vec2 {
        Vec2::new(ctx.size.0 as f32, ctx.size.1 as f32)
    }

    fn frame(&mut self, ctx: &mut GpuContext) {
        let dt = self.clock.tick();

        // Apply a pending resize before the simulation pass, never mid-pass.
        if self.field_size != ctx.size {
            self.solver.resize(
                &ctx.device,
                &ctx.queue,
                &self.resources,
                &self.copy,
                &self.config,
                ctx.size,
            );
            self.bloom
                .resize(&ctx.device, &ctx.queue, &self.config.bloom, ctx.size);
            self.sunrays
                .resize(&ctx.device, &ctx.queue, &self.config.sunrays, ctx.size);
            self.field_size = ctx.size;
        }

        if self.config.colorful && self.recolor.tick(dt, self.config.color_update_speed) {
            self.pointers.recolor(&mut self.rng);
        }

        self.splats.clear();
        self.scheduler.collect(
            dt,
            self.config.auto_splat_interval,
            self.config.splat_force,
            &mut self.pointers,
            &mut self.rng,
            &mut self.splats,
        );
        let aspect = ctx.aspect_ratio();
        for splat in &self.splats {
            self.splat_pass.apply(
                &ctx.device,
                &ctx.queue,
                &self.resources,
                &mut self.solver.velocity,
                &mut self.solver.dye,
                splat,
                aspect,
                self.config.splat_radius,
            );
        }

        if !self.paused {
            self.solver
                .step(&ctx.device, &ctx.queue, &self.resources, &self.config, dt);
        }

        let frame = match ctx.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                ctx.surface.configure(&ctx.device, &ctx.config);
                return;
            }
            Err(wgpu::SurfaceError::Timeout) => return,
            Err(error) => {
                log::error!("surface acquire failed: {error}");
                return;
            }
        };
        let surface_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("composite encoder"),
            });

        if self.config.bloom.enabled {
            self.bloom.apply(
                &ctx.device,
                &ctx.queue,
                &self.resources,
                &self.config.bloom,
                self.solver.dye.read(),
                &mut encoder,
            );
        }
        if self.config.sunrays.enabled {
            self.sunrays.apply(
                &ctx.device,
                &ctx.queue,
                &self.resources,
                &self.config.sunrays,
                self.solver.dye.read(),
                self.solver.dye.write(),
                &mut encoder,
            );
        }

        let bloom = self
            .config
            .bloom
            .enabled
            .then(|| self.bloom.output());
        let sunrays = self
            .config
            .sunrays
            .enabled
            .then(|| self.sunrays.output());
        if let Err(error) = self.display.draw(
            &ctx.device,
            &mut self.registry,
            &self.resources,
            &mut encoder,
            &surface_view,
            self.config.back_color,
            self.solver.dye.read(),
            bloom,
            sunrays,
        ) {
            log::error!("display variant failed to build: {error}");
            return;
        }

        ctx.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
    }

    fn window_event(&mut self, ctx: &mut GpuContext, event: WindowEvent) {
        let surface = Self::surface_vec(ctx);
        match event {
            WindowEvent::Resized(size) => {
                ctx.resize(size.width, size.height);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.last_mouse = Vec2::new(position.x as f32, position.y as f32);
                self.pointers
                    .motion(PointerId::Mouse, self.last_mouse, surface, &mut self.rng);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => {
                    self.pointers
                        .press(PointerId::Mouse, self.last_mouse, surface, &mut self.rng);
                }
                ElementState::Released => self.pointers.release(PointerId::Mouse),
            },
            WindowEvent::Touch(touch) => {
                let position = Vec2::new(touch.location.x as f32, touch.location.y as f32);
                let id = PointerId::Touch(touch.id);
                match touch.phase {
                    TouchPhase::Started => {
                        self.pointers.press(id, position, surface, &mut self.rng)
                    }
                    TouchPhase::Moved => {
                        self.pointers.motion(id, position, surface, &mut self.rng)
                    }
                    TouchPhase::Ended | TouchPhase::Cancelled => self.pointers.release(id),
                }
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !event.repeat =>
            {
                match event.logical_key {
                    Key::Named(NamedKey::Space) => {
                        self.scheduler.queue_burst(self.rng.gen_range(5..25));
                    }
                    Key::Character(ch) if ch.as_str() == "p" || ch.as_str() == "P" => {
                        self.paused = !self.paused;
                        log::info!("simulation {}", if self.paused { "paused" } else { "resumed" });
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }
}

struct AppRunner {
    config: SimConfig,
    window: Option<Arc<Window>>,
    ctx: Option<GpuContext>,
    app: Option<FluidApp>,
}

impl AppRunner {
    fn new(config: SimConfig) -> Self {
        Self {
            config,
            window: None,
            ctx: None,
            app: None,
        }
    }
}

impl ApplicationHandler for AppRunner {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window = match event_loop.create_window(
            Window::default_attributes()
                .with_title("Fluid Canvas")
                .with_inner_size(winit::dpi::LogicalSize::new(1280, 720)),
        ) {
            Ok(window) => Arc::new(window),
            Err(error) => {
                log::error!("failed to create window: {error}");
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        match pollster::block_on(GpuContext::new(window))
            .and_then(|ctx| FluidApp::new(&ctx, self.config.clone()).map(|app| (ctx, app)))
        {
            Ok((ctx, app)) => {
                self.ctx = Some(ctx);
                self.app = Some(app);
            }
            Err(error) => {
                log::error!("initialization failed: {error}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        if let WindowEvent::CloseRequested = event {
            event_loop.exit();
            return;
        }
        if let (Some(ctx), Some(app)) = (&mut self.ctx, &mut self.app) {
            app.window_event(ctx, event);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let (Some(ctx), Some(app)) = (&mut self.ctx, &mut self.app) {
            app.frame(ctx);
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }
    }
}

/// Run the canvas until the window closes. All owned GPU resources release
/// on drop when this returns.
pub fn run(config: SimConfig) {
    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(error) => {
            log::error!("failed to create event loop: {error}");
            std::process::exit(1);
        }
    };
    let mut runner = AppRunner::new(config);
    if let Err(error) = event_loop.run_app(&mut runner) {
        log::error!("event loop error: {error}");
        std::process::exit(1);
    }
}
