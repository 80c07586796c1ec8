//! Warm-band procedural palette.
//!
//! Hue is sampled from a narrow red-to-orange band with high saturation and
//! value, then scaled down so repeated additive deposits into the dye field
//! glow instead of clipping.

use rand::Rng;

/// Width of the hue band as a fraction of the full hue circle (~32 degrees).
pub const HUE_BAND: f32 = 0.09;
/// Floor for saturation and value samples.
pub const SV_FLOOR: f32 = 0.8;
/// Post-conversion channel scale.
pub const INTENSITY: f32 = 0.45;

/// Sample the next splat color.
pub fn splat_color<R: Rng + ?Sized>(rng: &mut R) -> [f32; 3] {
    let h = rng.gen::<f32>() * HUE_BAND;
    let s = SV_FLOOR + rng.gen::<f32>() * (1.0 - SV_FLOOR);
    let v = SV_FLOOR + rng.gen::<f32>() * (1.0 - SV_FLOOR);
    let [r, g, b] = hsv_to_rgb(h, s, v);
    [r * INTENSITY, g * INTENSITY, b * INTENSITY]
}

/// HSV to RGB, all components in [0, 1].
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);
    match (i as i32).rem_euclid(6) {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

/// Accumulating timer driving the periodic pointer recolor. `tick` returns
/// true when a recolor is due; the fractional overshoot carries over.
#[derive(Debug, Default)]
pub struct RecolorTimer {
    acc: f32,
}

impl RecolorTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, dt: f32, speed: f32) -> bool {
        self.acc += dt * speed;
        if self.acc >= 1.0 {
            self.acc = self.acc.fract();
            true
        } else {
            false
        }
    }
}
