//! User settings and simulation tuning.
//!
//! Both structs are plain serde types. Every field has a default, so a
//! settings file only needs the values it changes.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::director::{sanitize_seed, TransitionStyle, DEFAULT_SEED};
use crate::error::ConfigError;
use crate::shape::DEFAULT_RASTER_SIZE;
use crate::staging::{PhaseMode, PhaseParams};

/// Largest particle count accepted; a 2048 x 2048 grid.
pub const MAX_COUNT: usize = 2048 * 2048;

/// Which simulator advances the particles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Backend {
    /// Per-particle records on the CPU.
    #[default]
    Scalar,
    /// Grid kernel on the GPU; falls back to `Scalar` if no adapter is usable.
    Grid,
    /// Grid kernel executed on the CPU.
    HostGrid,
}

/// Force and integration constants shared by both simulators.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimParams {
    pub drag: f32,
    pub max_speed: f32,
    pub safe_radius: f32,
    pub soft_margin: f32,
    pub spring_loose: f32,
    pub spring_tight: f32,
    pub scatter_radius: f32,
    pub noise_scale: f32,
    pub noise_speed: f32,
    pub noise_strength: f32,
    pub vortex_strength: f32,
    pub orbit_strength: f32,
    pub burst_strength: f32,
    pub field_pull: f32,
    pub lock_rate: f32,
    pub near_epsilon: f32,
    pub amount_rate_fast: f32,
    pub amount_rate_gated: f32,
    pub min_ambient_scatter: f32,
    /// Fraction of particles that never form and drift as ambience.
    pub ambient_ratio: f32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            drag: 2.2,
            max_speed: 3.0,
            safe_radius: 1.6,
            soft_margin: 0.15,
            spring_loose: 6.0,
            spring_tight: 24.0,
            scatter_radius: 1.1,
            noise_scale: 2.2,
            noise_speed: 0.35,
            noise_strength: 1.4,
            vortex_strength: 1.0,
            orbit_strength: 1.0,
            burst_strength: 2.0,
            field_pull: 4.0,
            lock_rate: 18.0,
            near_epsilon: 0.02,
            amount_rate_fast: 10.0,
            amount_rate_gated: 2.5,
            min_ambient_scatter: 0.25,
            ambient_ratio: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Base seed for the director. Accepts a number or a numeric string.
    #[serde(deserialize_with = "deserialize_seed")]
    pub transition_seed: u32,
    pub transition_style: TransitionStyle,
    /// Length of one transition in seconds.
    pub cycle_seconds: f32,
    /// Pause between transitions in seconds.
    pub hold_seconds: f32,
    /// Scales the chaos curve, `0..=1`.
    pub chaos: f32,
    pub shape_aware_transitions: bool,
    /// Staging mode used when `shape_aware_transitions` is on.
    pub staging_mode: PhaseMode,
    pub phase_params: PhaseParams,
    pub shape_raster_size: u32,
    /// Number of particles.
    pub count: usize,
    pub backend: Backend,
    pub sim: SimParams,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            transition_seed: DEFAULT_SEED,
            transition_style: TransitionStyle::Chaotic,
            cycle_seconds: 2.5,
            hold_seconds: 1.5,
            chaos: 1.0,
            shape_aware_transitions: true,
            staging_mode: PhaseMode::EdgeThenFill,
            phase_params: PhaseParams::default(),
            shape_raster_size: DEFAULT_RASTER_SIZE,
            count: 20_000,
            backend: Backend::Scalar,
            sim: SimParams::default(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&text)?;
        Ok(settings.sanitized())
    }

    /// Write settings as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Clamp values into their usable ranges.
    pub fn sanitized(mut self) -> Self {
        self.transition_seed = sanitize_seed(self.transition_seed);
        self.chaos = if self.chaos.is_finite() {
            self.chaos.clamp(0.0, 1.0)
        } else {
            1.0
        };
        if !self.cycle_seconds.is_finite() || self.cycle_seconds < 0.0 {
            self.cycle_seconds = 0.0;
        }
        if !self.hold_seconds.is_finite() || self.hold_seconds < 0.0 {
            self.hold_seconds = 0.0;
        }
        self.shape_raster_size = self.shape_raster_size.max(8);
        if self.count == 0 || self.count > MAX_COUNT {
            let count = self.count.clamp(1, MAX_COUNT);
            log::warn!("Particle count {} out of range, using {}", self.count, count);
            self.count = count;
        }
        self.sim.ambient_ratio = self.sim.ambient_ratio.clamp(0.0, 1.0);
        self
    }

    /// The staging profile these settings ask for.
    pub fn staging_profile(&self) -> crate::staging::StagingProfile {
        let mode = if self.shape_aware_transitions {
            self.staging_mode
        } else {
            PhaseMode::None
        };
        crate::staging::StagingProfile::new(mode, self.phase_params)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SeedValue {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

/// Numbers are truncated into `u32`; anything else becomes [`DEFAULT_SEED`].
fn deserialize_seed<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let seed = match SeedValue::deserialize(deserializer)? {
        SeedValue::Number(n) if n.is_finite() && n >= 0.0 => (n as u64 & 0xFFFF_FFFF) as u32,
        SeedValue::Text(s) => s.trim().parse::<u32>().unwrap_or(0),
        SeedValue::Number(_) | SeedValue::Other(_) => 0,
    };
    Ok(sanitize_seed(seed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let s: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.shape_raster_size, 384);
    }

    #[test]
    fn test_seed_lenient() {
        let s: Settings = serde_json::from_str(r#"{"transitionSeed": "1234"}"#).unwrap();
        assert_eq!(s.transition_seed, 1234);
        let s: Settings = serde_json::from_str(r#"{"transitionSeed": "banana"}"#).unwrap();
        assert_eq!(s.transition_seed, DEFAULT_SEED);
        let s: Settings = serde_json::from_str(r#"{"transitionSeed": 0}"#).unwrap();
        assert_eq!(s.transition_seed, DEFAULT_SEED);
        let s: Settings = serde_json::from_str(r#"{"transitionSeed": null}"#).unwrap();
        assert_eq!(s.transition_seed, DEFAULT_SEED);
        let s: Settings = serde_json::from_str(r#"{"transitionSeed": 7}"#).unwrap();
        assert_eq!(s.transition_seed, 7);
    }

    #[test]
    fn test_partial_sim_params() {
        let s: Settings = serde_json::from_str(r#"{"sim": {"drag": 3.0}}"#).unwrap();
        assert_eq!(s.sim.drag, 3.0);
        assert_eq!(s.sim.max_speed, SimParams::default().max_speed);
    }

    #[test]
    fn test_enums_camel_case() {
        let s: Settings = serde_json::from_str(
            r#"{"transitionStyle": "clean", "stagingMode": "sdfFront", "backend": "hostGrid"}"#,
        )
        .unwrap();
        assert_eq!(s.transition_style, TransitionStyle::Clean);
        assert_eq!(s.staging_mode, PhaseMode::SdfFront);
        assert_eq!(s.backend, Backend::HostGrid);
    }

    #[test]
    fn test_sanitize_clamps() {
        let s = Settings {
            chaos: 4.0,
            hold_seconds: -1.0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(s.chaos, 1.0);
        assert_eq!(s.hold_seconds, 0.0);
    }

    #[test]
    fn test_sanitize_clamps_count() {
        let huge = Settings {
            count: usize::MAX,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(huge.count, MAX_COUNT);
        let empty = Settings {
            count: 0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(empty.count, 1);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let path = std::env::temp_dir().join(format!("morphdust-settings-{}.json", std::process::id()));
        let settings = Settings {
            transition_seed: 99,
            count: 1234,
            ..Default::default()
        };
        settings.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_staging_profile_respects_toggle() {
        let mut s = Settings::default();
        assert_eq!(s.staging_profile().mode, PhaseMode::EdgeThenFill);
        s.shape_aware_transitions = false;
        assert_eq!(s.staging_profile().mode, PhaseMode::None);
    }
}
