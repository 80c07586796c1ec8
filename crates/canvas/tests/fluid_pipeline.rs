//! Headless GPU tests for the fluid pipeline.
//!
//! Verifies the solver against its physical contract:
//! 1. A splat makes the velocity field divergent near the impulse
//! 2. Pressure projection reduces that divergence
//! 3. Dye is transported along the injected force and dissipates
//! 4. Resizes preserve content and never produce NaNs
//!
//! Tests skip when no GPU adapter is available.

use glam::Vec2;
use sim::{SimConfig, Splat};

use canvas::gpu::bloom::BloomPass;
use canvas::gpu::display::DisplayPass;
use canvas::gpu::pass::PassResources;
use canvas::gpu::readback::read_target;
use canvas::gpu::shader::{PassShader, ShaderFlags, ShaderRegistry};
use canvas::gpu::solver::FluidSolver;
use canvas::gpu::splat::SplatPass;
use canvas::gpu::sunrays::SunraysPass;
use canvas::gpu::target::{
    CopyPass, DoubleBuffer, FieldFormat, FilterMode, RenderTarget, TextureProfile,
};

const DT: f32 = 1.0 / 60.0;

struct TestGpu {
    device: wgpu::Device,
    queue: wgpu::Queue,
    resources: PassResources,
    registry: ShaderRegistry,
}

/// Create a headless GPU context for testing, or None when the machine has
/// no adapter.
async fn create_test_gpu() -> Option<TestGpu> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await?;

    let profile = TextureProfile::detect(&adapter);
    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Test Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        )
        .await
        .expect("Failed to create device");

    let resources = PassResources::new(&device, profile);
    Some(TestGpu {
        device,
        queue,
        resources,
        registry: ShaderRegistry::new(),
    })
}

macro_rules! require_gpu {
    () => {
        match pollster::block_on(create_test_gpu()) {
            Some(gpu) => gpu,
            None => {
                println!("SKIP: No GPU adapter available");
                return;
            }
        }
    };
}

/// Square 64x64 grids, no vorticity confinement, post-effects off: isolates
/// the projection behavior under test.
fn test_config() -> SimConfig {
    let mut config = SimConfig::default();
    config.sim_resolution = 64;
    config.dye_resolution = 64;
    config.curl = 0.0;
    config.bloom.enabled = false;
    config.sunrays.enabled = false;
    config
}

const SURFACE: (u32, u32) = (256, 256);

fn center_splat(force: Vec2, color: [f32; 3]) -> Splat {
    Splat {
        point: Vec2::new(0.5, 0.5),
        force,
        color,
    }
}

/// Central-difference divergence of an rg velocity readback, matching the
/// shader stencil.
fn divergence_at(data: &[f32], w: usize, x: usize, y: usize) -> f32 {
    let vx = |x: usize, y: usize| data[(y * w + x) * 2];
    let vy = |x: usize, y: usize| data[(y * w + x) * 2 + 1];
    0.5 * ((vx(x + 1, y) - vx(x - 1, y)) + (vy(x, y + 1) - vy(x, y - 1)))
}

fn max_abs_divergence(data: &[f32], w: usize, h: usize) -> f32 {
    let mut max = 0.0f32;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            max = max.max(divergence_at(data, w, x, y).abs());
        }
    }
    max
}

#[test]
fn double_buffer_swap_is_an_involution() {
    let gpu = require_gpu!();
    let mut buffer = DoubleBuffer::new(
        &gpu.device,
        &gpu.queue,
        32,
        32,
        FieldFormat::Rg,
        FilterMode::Linear,
        "swap test",
    );

    assert_eq!(buffer.read_index(), 0);
    assert!(!std::ptr::eq(buffer.read(), buffer.write()));

    buffer.swap();
    assert_eq!(buffer.read_index(), 1);
    assert!(!std::ptr::eq(buffer.read(), buffer.write()));

    buffer.swap();
    assert_eq!(buffer.read_index(), 0);
}

#[test]
fn every_shader_variant_compiles() {
    let mut gpu = require_gpu!();
    let shaders = [
        PassShader::Copy,
        PassShader::Clear,
        PassShader::Splat,
        PassShader::Curl,
        PassShader::Vorticity,
        PassShader::Divergence,
        PassShader::Pressure,
        PassShader::GradientSubtract,
        PassShader::Advection,
        PassShader::BloomPrefilter,
        PassShader::Blur,
        PassShader::BloomFinal,
        PassShader::SunraysMask,
        PassShader::Sunrays,
        PassShader::Display,
    ];
    for manual_filtering in [false, true] {
        for bloom in [false, true] {
            for sunrays in [false, true] {
                let flags = ShaderFlags {
                    bloom,
                    sunrays,
                    manual_filtering,
                };
                for shader in shaders {
                    gpu.registry
                        .module(&gpu.device, shader, flags)
                        .unwrap_or_else(|e| panic!("{e}"));
                }
            }
        }
    }
}

#[test]
fn splat_raises_local_divergence_and_projection_reduces_it() {
    let mut gpu = require_gpu!();
    let config = test_config();
    let mut solver = FluidSolver::new(
        &gpu.device,
        &gpu.queue,
        &mut gpu.registry,
        &gpu.resources,
        &config,
        SURFACE,
    )
    .expect("solver init");
    let splat_pass =
        SplatPass::new(&gpu.device, &mut gpu.registry, &gpu.resources).expect("splat init");

    let w = solver.velocity.width() as usize;
    let h = solver.velocity.height() as usize;

    // Cleared field: no divergence.
    let data = read_target(&gpu.device, &gpu.queue, solver.velocity.read()).unwrap();
    assert!(max_abs_divergence(&data, w, h) < 1e-3);

    // Inject a horizontal impulse at the center.
    splat_pass.apply(
        &gpu.device,
        &gpu.queue,
        &gpu.resources,
        &mut solver.velocity,
        &mut solver.dye,
        &center_splat(Vec2::new(1000.0, 0.0), [0.3, 0.1, 0.0]),
        1.0,
        config.splat_radius,
    );
    let data = read_target(&gpu.device, &gpu.queue, solver.velocity.read()).unwrap();
    let div_after_splat = max_abs_divergence(&data, w, h);
    assert!(
        div_after_splat > 1.0,
        "splat should leave the field divergent, got {div_after_splat}"
    );

    // One full step (decay seed + Jacobi + gradient subtraction) pulls the
    // field back toward divergence-free.
    solver.step(&gpu.device, &gpu.queue, &gpu.resources, &config, DT);
    let data = read_target(&gpu.device, &gpu.queue, solver.velocity.read()).unwrap();
    let div_after_projection = max_abs_divergence(&data, w, h);
    assert!(
        div_after_projection < div_after_splat * 0.9,
        "projection should reduce divergence: {div_after_splat} -> {div_after_projection}"
    );
}

#[test]
fn dye_transports_rightward_and_dissipates() {
    let mut gpu = require_gpu!();
    let config = test_config();
    let mut solver = FluidSolver::new(
        &gpu.device,
        &gpu.queue,
        &mut gpu.registry,
        &gpu.resources,
        &config,
        SURFACE,
    )
    .expect("solver init");
    let splat_pass =
        SplatPass::new(&gpu.device, &mut gpu.registry, &gpu.resources).expect("splat init");

    splat_pass.apply(
        &gpu.device,
        &gpu.queue,
        &gpu.resources,
        &mut solver.velocity,
        &mut solver.dye,
        &center_splat(Vec2::new(1000.0, 0.0), [1.0, 0.2, 0.1]),
        1.0,
        config.splat_radius,
    );

    let w = solver.dye.width() as usize;
    let h = solver.dye.height() as usize;
    let density = |data: &[f32], x: usize, y: usize| data[(y * w + x) * 4];
    let total = |data: &[f32]| -> f64 {
        let mut sum = 0.0f64;
        for y in 0..h {
            for x in 0..w {
                sum += density(data, x, y) as f64;
            }
        }
        sum
    };
    let centroid_x = |data: &[f32]| -> f64 {
        let mut weighted = 0.0f64;
        let mut mass = 0.0f64;
        for y in 0..h {
            for x in 0..w {
                let d = density(data, x, y) as f64;
                weighted += d * (x as f64 + 0.5) / w as f64;
                mass += d;
            }
        }
        weighted / mass
    };

    let data = read_target(&gpu.device, &gpu.queue, solver.dye.read()).unwrap();
    let mass_at_injection = total(&data);
    let centroid_at_injection = centroid_x(&data);
    assert!(mass_at_injection > 0.0);
    assert!((centroid_at_injection - 0.5).abs() < 0.02);

    for _ in 0..20 {
        solver.step(&gpu.device, &gpu.queue, &gpu.resources, &config, DT);
    }

    let data = read_target(&gpu.device, &gpu.queue, solver.dye.read()).unwrap();
    assert!(data.iter().all(|v| v.is_finite()), "dye field has NaNs");

    let mass_after = total(&data);
    let centroid_after = centroid_x(&data);
    assert!(
        centroid_after > centroid_at_injection + 0.01,
        "dye centroid should move right: {centroid_at_injection} -> {centroid_after}"
    );
    assert!(
        mass_after < mass_at_injection * 0.95,
        "dye should dissipate: {mass_at_injection} -> {mass_after}"
    );
}

#[test]
fn resize_preserves_content() {
    let mut gpu = require_gpu!();
    let config = test_config();
    let copy = CopyPass::new(&gpu.device, &mut gpu.registry, &gpu.resources).expect("copy init");
    let mut solver = FluidSolver::new(
        &gpu.device,
        &gpu.queue,
        &mut gpu.registry,
        &gpu.resources,
        &config,
        SURFACE,
    )
    .expect("solver init");
    let splat_pass =
        SplatPass::new(&gpu.device, &mut gpu.registry, &gpu.resources).expect("splat init");

    splat_pass.apply(
        &gpu.device,
        &gpu.queue,
        &gpu.resources,
        &mut solver.velocity,
        &mut solver.dye,
        &center_splat(Vec2::new(0.0, 0.0), [1.0, 0.5, 0.25]),
        1.0,
        config.splat_radius,
    );

    let w = solver.dye.width() as usize;
    let data = read_target(&gpu.device, &gpu.queue, solver.dye.read()).unwrap();
    let before = data[(w / 2 * w + w / 2) * 4];
    assert!(before > 0.1);

    // Halve the dye resolution; the center sample survives within filtering
    // tolerance of the downsample.
    let mut half = config.clone();
    half.dye_resolution = 32;
    solver.resize(
        &gpu.device,
        &gpu.queue,
        &gpu.resources,
        &copy,
        &half,
        SURFACE,
    );
    let w2 = solver.dye.width() as usize;
    assert_eq!(w2, 32);
    let data = read_target(&gpu.device, &gpu.queue, solver.dye.read()).unwrap();
    let after = data[(w2 / 2 * w2 + w2 / 2) * 4];
    assert!(
        (after - before).abs() < before * 0.5,
        "center sample should survive resize: {before} -> {after}"
    );
}

#[test]
fn resize_roundtrip_stays_finite() {
    let mut gpu = require_gpu!();
    let mut config = test_config();
    config.sim_resolution = 128;
    config.dye_resolution = 128;

    let copy = CopyPass::new(&gpu.device, &mut gpu.registry, &gpu.resources).expect("copy init");
    let mut solver = FluidSolver::new(
        &gpu.device,
        &gpu.queue,
        &mut gpu.registry,
        &gpu.resources,
        &config,
        (800, 600),
    )
    .expect("solver init");
    let splat_pass =
        SplatPass::new(&gpu.device, &mut gpu.registry, &gpu.resources).expect("splat init");

    splat_pass.apply(
        &gpu.device,
        &gpu.queue,
        &gpu.resources,
        &mut solver.velocity,
        &mut solver.dye,
        &center_splat(Vec2::new(400.0, -300.0), [0.4, 0.2, 0.1]),
        800.0 / 600.0,
        config.splat_radius,
    );
    solver.step(&gpu.device, &gpu.queue, &gpu.resources, &config, DT);

    solver.resize(&gpu.device, &gpu.queue, &gpu.resources, &copy, &config, (400, 300));
    solver.step(&gpu.device, &gpu.queue, &gpu.resources, &config, DT);
    solver.resize(&gpu.device, &gpu.queue, &gpu.resources, &copy, &config, (800, 600));
    solver.step(&gpu.device, &gpu.queue, &gpu.resources, &config, DT);

    for target in [solver.velocity.read(), solver.dye.read(), solver.pressure.read()] {
        let data = read_target(&gpu.device, &gpu.queue, target).unwrap();
        assert!(data.iter().all(|v| v.is_finite()), "field has NaNs after resize roundtrip");
        assert!(data.iter().all(|v| v.abs() < 1e6), "field values unbounded");
    }
}

#[test]
fn bloom_and_sunrays_produce_finite_output() {
    let mut gpu = require_gpu!();
    let mut config = test_config();
    config.bloom.enabled = true;
    config.sunrays.enabled = true;

    let mut solver = FluidSolver::new(
        &gpu.device,
        &gpu.queue,
        &mut gpu.registry,
        &gpu.resources,
        &config,
        SURFACE,
    )
    .expect("solver init");
    let splat_pass =
        SplatPass::new(&gpu.device, &mut gpu.registry, &gpu.resources).expect("splat init");
    let bloom = BloomPass::new(
        &gpu.device,
        &gpu.queue,
        &mut gpu.registry,
        &gpu.resources,
        &config.bloom,
        SURFACE,
    )
    .expect("bloom init");
    let sunrays = SunraysPass::new(
        &gpu.device,
        &gpu.queue,
        &mut gpu.registry,
        &gpu.resources,
        &config.sunrays,
        SURFACE,
    )
    .expect("sunrays init");

    // Saturate the center so the prefilter threshold passes something.
    for _ in 0..3 {
        splat_pass.apply(
            &gpu.device,
            &gpu.queue,
            &gpu.resources,
            &mut solver.velocity,
            &mut solver.dye,
            &center_splat(Vec2::new(0.0, 0.0), [0.45, 0.3, 0.1]),
            1.0,
            config.splat_radius,
        );
    }

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    bloom.apply(
        &gpu.device,
        &gpu.queue,
        &gpu.resources,
        &config.bloom,
        solver.dye.read(),
        &mut encoder,
    );
    sunrays.apply(
        &gpu.device,
        &gpu.queue,
        &gpu.resources,
        &config.sunrays,
        solver.dye.read(),
        solver.dye.write(),
        &mut encoder,
    );
    gpu.queue.submit(std::iter::once(encoder.finish()));

    let bloom_data = read_target(&gpu.device, &gpu.queue, bloom.output()).unwrap();
    assert!(bloom_data.iter().all(|v| v.is_finite()));
    assert!(bloom_data.iter().any(|v| *v > 0.0), "bloom output all zero");

    let rays_data = read_target(&gpu.device, &gpu.queue, sunrays.output()).unwrap();
    assert!(rays_data.iter().all(|v| v.is_finite()));
    assert!(rays_data.iter().any(|v| *v > 0.0), "sunrays output all zero");
}

#[test]
fn display_composites_over_background() {
    let mut gpu = require_gpu!();
    let config = test_config();
    let solver = FluidSolver::new(
        &gpu.device,
        &gpu.queue,
        &mut gpu.registry,
        &gpu.resources,
        &config,
        SURFACE,
    )
    .expect("solver init");

    // Offscreen stand-in for the surface.
    let screen = RenderTarget::new(
        &gpu.device,
        &gpu.queue,
        64,
        64,
        FieldFormat::Rgba,
        FilterMode::Nearest,
        "screen",
    );
    let mut display = DisplayPass::new(&gpu.device, &gpu.queue, FieldFormat::Rgba.texture_format());

    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    display
        .draw(
            &gpu.device,
            &mut gpu.registry,
            &gpu.resources,
            &mut encoder,
            screen.view(),
            [10, 10, 11],
            solver.dye.read(),
            None,
            None,
        )
        .expect("display draw");
    gpu.queue.submit(std::iter::once(encoder.finish()));

    // Empty dye over the background: the clear color shows through.
    let data = read_target(&gpu.device, &gpu.queue, &screen).unwrap();
    let expected = 10.0 / 255.0;
    let center = (32 * 64 + 32) * 4;
    assert!((data[center] as f64 - expected).abs() < 0.01);
    assert!(data.iter().all(|v| v.is_finite()));
}
