//! Fluid Canvas - GPU crate
//!
//! The wgpu side of the fluid toy: render-target management, the shader
//! registry, the multi-pass incompressible-flow stepper, splat injection,
//! bloom/sunrays compositing, and the winit frame driver. Simulation-side
//! state (pointers, scheduling, configuration) lives in the `sim` crate.

pub mod app;
pub mod gpu;
