//! Simulation configuration.
//!
//! Defaults correspond to the desktop quality tier; `low_power` mirrors the
//! constrained-device tier (coarser grids, fewer solver iterations, cheaper
//! post-processing). All values are read once per frame; nothing mutates a
//! `SimConfig` mid-step.

use serde::{Deserialize, Serialize};

/// Bloom post-effect parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomConfig {
    pub enabled: bool,
    /// Depth of the downsample/upsample pyramid.
    pub iterations: u32,
    /// Base resolution of the prefilter target.
    pub resolution: u32,
    pub intensity: f32,
    pub threshold: f32,
    pub soft_knee: f32,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            iterations: 8,
            resolution: 256,
            intensity: 0.9,
            threshold: 0.4,
            soft_knee: 0.7,
        }
    }
}

impl BloomConfig {
    /// Prefilter knee curve: (threshold - knee, 2*knee, 0.25/knee).
    pub fn knee_curve(&self) -> [f32; 3] {
        let knee = self.threshold * self.soft_knee + 1e-4;
        [self.threshold - knee, knee * 2.0, 0.25 / knee]
    }
}

/// Sunrays (radial light-shaft) post-effect parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SunraysConfig {
    pub enabled: bool,
    pub resolution: u32,
    pub weight: f32,
}

impl Default for SunraysConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            resolution: 196,
            weight: 1.0,
        }
    }
}

/// Full simulation configuration. Immutable during a frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Requested solver grid density (shorter screen axis).
    pub sim_resolution: u32,
    /// Requested dye grid density; higher than the solver grid on purpose.
    pub dye_resolution: u32,
    /// Per-second multiplicative decay of the dye field.
    pub density_dissipation: f32,
    /// Per-second multiplicative decay of the velocity field.
    pub velocity_dissipation: f32,
    /// Pressure carry-over factor seeding each frame's Jacobi solve.
    pub pressure: f32,
    pub pressure_iterations: u32,
    /// Vorticity confinement strength.
    pub curl: f32,
    /// Splat kernel radius, in percent of the shorter screen axis.
    pub splat_radius: f32,
    /// Scale from pointer delta (texcoords) to velocity impulse.
    pub splat_force: f32,
    /// Periodically reassign pointer colors.
    pub colorful: bool,
    pub color_update_speed: f32,
    /// Composite background, sRGB bytes.
    pub back_color: [u8; 3],
    /// Seconds between ambient splats when idle.
    pub auto_splat_interval: f32,
    pub bloom: BloomConfig,
    pub sunrays: SunraysConfig,
    pub paused: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            sim_resolution: 128,
            dye_resolution: 1024,
            density_dissipation: 0.97,
            velocity_dissipation: 0.98,
            pressure: 0.8,
            pressure_iterations: 20,
            curl: 30.0,
            splat_radius: 0.6,
            splat_force: 6000.0,
            colorful: true,
            color_update_speed: 10.0,
            back_color: [10, 10, 11],
            auto_splat_interval: 1.5,
            bloom: BloomConfig::default(),
            sunrays: SunraysConfig::default(),
            paused: false,
        }
    }
}

impl SimConfig {
    /// Quality tier for integrated/mobile-class GPUs.
    pub fn low_power() -> Self {
        Self {
            sim_resolution: 64,
            dye_resolution: 256,
            pressure_iterations: 8,
            auto_splat_interval: 3.0,
            bloom: BloomConfig {
                enabled: false,
                iterations: 3,
                resolution: 64,
                ..BloomConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_desktop_tier() {
        let config = SimConfig::default();
        assert_eq!(config.sim_resolution, 128);
        assert_eq!(config.dye_resolution, 1024);
        assert_eq!(config.pressure_iterations, 20);
        assert!(config.bloom.enabled);
        assert!(!config.sunrays.enabled);
    }

    #[test]
    fn low_power_reduces_cost() {
        let config = SimConfig::low_power();
        assert!(config.sim_resolution < SimConfig::default().sim_resolution);
        assert!(config.pressure_iterations < SimConfig::default().pressure_iterations);
        assert!(!config.bloom.enabled);
    }

    #[test]
    fn knee_curve_matches_threshold() {
        let bloom = BloomConfig::default();
        let knee = bloom.threshold * bloom.soft_knee + 1e-4;
        let curve = bloom.knee_curve();
        assert!((curve[0] - (bloom.threshold - knee)).abs() < 1e-6);
        assert!((curve[1] - 2.0 * knee).abs() < 1e-6);
        assert!((curve[2] - 0.25 / knee).abs() < 1e-6);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config = SimConfig::from_toml_str(
            "sim_resolution = 64\n[bloom]\nenabled = false\n",
        )
        .unwrap();
        assert_eq!(config.sim_resolution, 64);
        assert!(!config.bloom.enabled);
        assert_eq!(config.dye_resolution, 1024);
        assert_eq!(config.pressure_iterations, 20);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(SimConfig::from_toml_str("sim_resolution = \"high\"").is_err());
    }
}
