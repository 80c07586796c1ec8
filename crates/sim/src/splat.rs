//! Per-frame splat scheduling.
//!
//! Three sources feed the injector each frame, in order: pointer motion,
//! the ambient timer (keeps the field alive when idle), and queued bursts
//! (startup seeding, keyboard). All randomness flows through the caller's
//! RNG so scheduling stays deterministic under a fixed seed.

use glam::Vec2;
use rand::Rng;

use crate::color::splat_color;
use crate::pointer::PointerSet;

/// One pending impulse: a Gaussian deposit of `force` into velocity and
/// `color` into dye at `point` (normalized texture coordinates).
#[derive(Clone, Copy, Debug)]
pub struct Splat {
    pub point: Vec2,
    pub force: Vec2,
    pub color: [f32; 3],
}

/// Velocity magnitude range for randomly generated splats.
const RANDOM_FORCE: f32 = 1000.0;

pub fn random_splat<R: Rng + ?Sized>(rng: &mut R) -> Splat {
    let point = Vec2::new(rng.gen::<f32>(), rng.gen::<f32>());
    let force = Vec2::new(
        RANDOM_FORCE * (rng.gen::<f32>() - 0.5),
        RANDOM_FORCE * (rng.gen::<f32>() - 0.5),
    );
    Splat {
        point,
        force,
        color: splat_color(rng),
    }
}

#[derive(Default)]
pub struct SplatScheduler {
    auto_timer: f32,
    bursts: Vec<u32>,
}

impl SplatScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the startup burst that seeds initial motion (8-22 splats).
    pub fn seed<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.queue_burst(rng.gen_range(8..23));
    }

    /// Request `count` simultaneous random splats on a later frame.
    pub fn queue_burst(&mut self, count: u32) {
        self.bursts.push(count);
    }

    pub fn pending_bursts(&self) -> usize {
        self.bursts.len()
    }

    /// Collect this frame's splats: pointer drains, then the ambient timer,
    /// then at most one queued burst.
    pub fn collect<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        auto_interval: f32,
        force_scale: f32,
        pointers: &mut PointerSet,
        rng: &mut R,
        out: &mut Vec<Splat>,
    ) {
        pointers.drain_moved(force_scale, out);

        self.auto_timer += dt;
        if self.auto_timer > auto_interval {
            self.auto_timer = 0.0;
            out.push(random_splat(rng));
        }

        if let Some(count) = self.bursts.pop() {
            for _ in 0..count {
                out.push(random_splat(rng));
            }
        }
    }
}
