//! Transition director.
//!
//! Picks a script for each transition and bakes its randomness into a
//! [`TransitionRecord`]. In deterministic mode the script is a pure function
//! of `(seed, from_id, to_id, style)`, so exports reproduce exactly.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::curves::CurveState;
use crate::script::{Script, ScriptKind};

/// Shortest accepted transition, in seconds.
pub const MIN_DURATION: f32 = 0.1;
/// Substitute for a zero or unparsable user seed.
pub const DEFAULT_SEED: u32 = 0x5EED_1234;

/// Where per-transition seeds come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DirectorMode {
    /// Fresh entropy for every transition.
    #[default]
    Random,
    /// Seeds derive only from the user seed and the target ids.
    Deterministic,
}

/// Which family of scripts a transition draws from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransitionStyle {
    /// Always [`ScriptKind::CleanMorph`].
    Clean,
    /// Weighted pick among the turbulent scripts.
    #[default]
    Chaotic,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransitionRequest {
    pub from_index: usize,
    pub to_index: usize,
    pub from_id: u32,
    pub to_id: u32,
    pub duration_seconds: f32,
    pub style: TransitionStyle,
}

/// One in-flight transition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransitionRecord {
    pub from_index: usize,
    pub to_index: usize,
    pub seed: u32,
    pub script: Script,
    pub duration: f32,
    pub elapsed: f32,
    pub style: TransitionStyle,
}

impl TransitionRecord {
    pub fn script_name(&self) -> &'static str {
        self.script.kind().name()
    }

    /// Normalized progress at `elapsed` seconds.
    pub fn progress(&self, elapsed: f32) -> f32 {
        let t = elapsed / self.duration.max(MIN_DURATION);
        if t.is_nan() {
            0.0
        } else {
            t.clamp(0.0, 1.0)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.elapsed >= self.duration
    }
}

fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Combine a base seed with an ordered pair of ids.
///
/// Order matters: `(a, b)` and `(b, a)` give different seeds.
pub fn mix_seed(seed: u32, from_id: u32, to_id: u32) -> u32 {
    let h = fmix32(seed ^ fmix32(from_id));
    fmix32(h.wrapping_add(to_id.wrapping_mul(0x9E37_79B9)) ^ 0x7F4A_7C15)
}

/// Map a zero seed onto [`DEFAULT_SEED`].
pub fn sanitize_seed(seed: u32) -> u32 {
    if seed == 0 {
        DEFAULT_SEED
    } else {
        seed
    }
}

#[derive(Clone, Debug)]
pub struct TransitionDirector {
    mode: DirectorMode,
    seed: u32,
}

impl TransitionDirector {
    pub fn new(mode: DirectorMode, seed: u32) -> Self {
        Self {
            mode,
            seed: sanitize_seed(seed),
        }
    }

    pub fn deterministic(seed: u32) -> Self {
        Self::new(DirectorMode::Deterministic, seed)
    }

    pub fn mode(&self) -> DirectorMode {
        self.mode
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn set_seed(&mut self, seed: u32) {
        self.seed = sanitize_seed(seed);
    }

    pub fn set_mode(&mut self, mode: DirectorMode) {
        self.mode = mode;
    }

    /// Begin a transition.
    pub fn start(&mut self, request: &TransitionRequest) -> TransitionRecord {
        let base = match self.mode {
            DirectorMode::Deterministic => self.seed,
            DirectorMode::Random => self.seed ^ rand::thread_rng().gen::<u32>(),
        };
        let seed = sanitize_seed(mix_seed(base, request.from_id, request.to_id));
        Self::record_for(seed, request)
    }

    /// Build the record a given transition seed produces.
    pub fn record_for(seed: u32, request: &TransitionRequest) -> TransitionRecord {
        let mut rng = StdRng::seed_from_u64(seed as u64);
        let kind = match request.style {
            TransitionStyle::Clean => ScriptKind::CleanMorph,
            TransitionStyle::Chaotic => ScriptKind::pick_chaotic(rng.gen::<f32>()),
        };
        let script = Script::start(kind, &mut rng);

        let duration = if request.duration_seconds.is_finite() {
            request.duration_seconds.max(MIN_DURATION)
        } else {
            MIN_DURATION
        };

        log::debug!(
            "Transition {} -> {}: {} (seed {:08x}, {:.2}s)",
            request.from_index,
            request.to_index,
            kind,
            seed,
            duration
        );

        TransitionRecord {
            from_index: request.from_index,
            to_index: request.to_index,
            seed,
            script,
            duration,
            elapsed: 0.0,
            style: request.style,
        }
    }

    /// Curve state of `record` at `elapsed` seconds. Pure.
    pub fn evaluate(record: &TransitionRecord, elapsed: f32) -> CurveState {
        record.script.evaluate(record.progress(elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(from_id: u32, to_id: u32, style: TransitionStyle) -> TransitionRequest {
        TransitionRequest {
            from_index: 0,
            to_index: 1,
            from_id,
            to_id,
            duration_seconds: 2.5,
            style,
        }
    }

    #[test]
    fn test_deterministic_start() {
        let mut a = TransitionDirector::deterministic(42);
        let mut b = TransitionDirector::deterministic(42);
        let req = request(0xAAAA, 0xBBBB, TransitionStyle::Chaotic);
        let ra = a.start(&req);
        let rb = b.start(&req);
        assert_eq!(ra, rb);
        for i in 0..=50 {
            let e = i as f32 * 0.05;
            assert_eq!(
                TransitionDirector::evaluate(&ra, e),
                TransitionDirector::evaluate(&rb, e)
            );
        }
    }

    #[test]
    fn test_evaluate_idempotent() {
        let mut d = TransitionDirector::deterministic(9);
        let rec = d.start(&request(1, 2, TransitionStyle::Chaotic));
        let first = TransitionDirector::evaluate(&rec, 1.3);
        let second = TransitionDirector::evaluate(&rec, 1.3);
        assert_eq!(first, second);
    }

    #[test]
    fn test_seed_is_order_sensitive() {
        assert_ne!(mix_seed(5, 1, 2), mix_seed(5, 2, 1));
        assert_eq!(mix_seed(5, 1, 2), mix_seed(5, 1, 2));
    }

    #[test]
    fn test_clean_style_forces_clean_script() {
        let mut d = TransitionDirector::new(DirectorMode::Random, 3);
        for i in 0..20 {
            let rec = d.start(&request(i, i + 1, TransitionStyle::Clean));
            assert_eq!(rec.script.kind(), ScriptKind::CleanMorph);
        }
    }

    #[test]
    fn test_chaotic_never_clean() {
        let mut d = TransitionDirector::deterministic(77);
        for i in 0..64 {
            let rec = d.start(&request(i, i * 3 + 1, TransitionStyle::Chaotic));
            assert_ne!(rec.script.kind(), ScriptKind::CleanMorph);
        }
    }

    #[test]
    fn test_duration_clamped() {
        let mut d = TransitionDirector::deterministic(1);
        let mut req = request(1, 2, TransitionStyle::Clean);
        req.duration_seconds = 0.0;
        assert_eq!(d.start(&req).duration, MIN_DURATION);
        req.duration_seconds = -3.0;
        assert_eq!(d.start(&req).duration, MIN_DURATION);
        req.duration_seconds = f32::NAN;
        assert_eq!(d.start(&req).duration, MIN_DURATION);
    }

    #[test]
    fn test_complete_at_duration() {
        let mut d = TransitionDirector::deterministic(1);
        for style in [TransitionStyle::Clean, TransitionStyle::Chaotic] {
            let rec = d.start(&request(4, 5, style));
            let end = TransitionDirector::evaluate(&rec, rec.duration);
            assert_eq!(end.morph_t, 1.0);
            assert_eq!(end.settle_t, 1.0);
        }
    }

    #[test]
    fn test_zero_seed_uses_default() {
        let d = TransitionDirector::deterministic(0);
        assert_eq!(d.seed(), DEFAULT_SEED);
    }
}
