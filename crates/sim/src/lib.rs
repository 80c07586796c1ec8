//! Fluid Canvas - Simulation Core
//!
//! Pointer-driven 2D fluid toy: this crate holds everything that does not
//! touch the GPU:
//! - configuration and quality presets
//! - the frame clock (clamped dt)
//! - pointer state tracking with aspect-corrected deltas
//! - splat scheduling (pointer drains, ambient timer, burst queue)
//! - the warm-band procedural palette
//!
//! This crate is framework-agnostic - it handles simulation-side state only.
//! Use the `canvas` crate for the wgpu pipeline and the window shell.

pub mod color;
pub mod config;
pub mod pointer;
pub mod resolution;
pub mod splat;
pub mod timing;

pub use color::{splat_color, RecolorTimer};
pub use config::{BloomConfig, SimConfig, SunraysConfig};
pub use pointer::{Pointer, PointerId, PointerSet};
pub use resolution::grid_resolution;
pub use splat::{Splat, SplatScheduler};
pub use timing::{clamp_dt, FrameClock, MAX_DT};
