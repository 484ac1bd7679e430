//! Per-cloud transition state machine.
//!
//! ```text
//! Idle ──start──▶ Transitioning ──commit──▶ Holding ──hold elapsed──▶ Idle
//!   ▲                   │
//!   └──── interrupt ────┘
//! ```
//!
//! The sequence only decides *when* things happen. It returns
//! [`SequenceEvent`]s and the frame's [`CurveState`]; simulators react to them.

use crate::curves::CurveState;
use crate::director::{TransitionDirector, TransitionRecord, TransitionRequest, TransitionStyle};
use crate::staging::{PhaseMode, PhaseParams};

/// Elapsed time within this many seconds of the duration counts as complete.
pub const COMPLETION_SNAP: f32 = 1e-4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SequencePhase {
    Idle,
    Transitioning(TransitionRecord),
    Holding { remaining: f32 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SequenceMode {
    /// Loop through the targets, pausing `hold_seconds` on each.
    #[default]
    HoldThenAdvance,
    /// Stay on the current target until [`Sequence::morph_to`] is called.
    Hold,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SequenceEvent {
    /// A transition began; simulators should push `record.to_index`.
    Started(TransitionRecord),
    /// A transition finished; simulators should commit `to_index`.
    Committed { to_index: usize },
}

/// One frame's worth of sequencing output.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameCurve {
    /// `None` while idle or holding.
    pub curve: Option<CurveState>,
    pub events: Vec<SequenceEvent>,
}

/// Identity and staging of one loaded target, as the sequence sees it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetInfo {
    pub id: u32,
    pub ready: bool,
    pub phase_mode: PhaseMode,
}

#[derive(Clone, Debug)]
pub struct Sequence {
    phase: SequencePhase,
    mode: SequenceMode,
    current: usize,
    pending: Option<usize>,
    duration: f32,
    hold_seconds: f32,
    style: TransitionStyle,
    chaos: f32,
    phase_params: PhaseParams,
}

impl Sequence {
    pub fn new(mode: SequenceMode, duration: f32, hold_seconds: f32, style: TransitionStyle) -> Self {
        Self {
            phase: SequencePhase::Holding {
                remaining: hold_seconds.max(0.0),
            },
            mode,
            current: 0,
            pending: None,
            duration,
            hold_seconds: hold_seconds.max(0.0),
            style,
            chaos: 1.0,
            phase_params: PhaseParams::default(),
        }
    }

    pub fn phase(&self) -> &SequencePhase {
        &self.phase
    }

    pub fn mode(&self) -> SequenceMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SequenceMode) {
        self.mode = mode;
    }

    /// Index of the formation currently shown (or being left).
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn record(&self) -> Option<&TransitionRecord> {
        match &self.phase {
            SequencePhase::Transitioning(record) => Some(record),
            _ => None,
        }
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self.phase, SequencePhase::Transitioning(_))
    }

    pub fn configure(&mut self, duration: f32, hold_seconds: f32, style: TransitionStyle, chaos: f32) {
        self.duration = duration;
        self.hold_seconds = hold_seconds.max(0.0);
        self.style = style;
        self.chaos = chaos;
    }

    pub fn set_phase_params(&mut self, params: PhaseParams) {
        self.phase_params = params;
    }

    /// Request a transition to `index` at the next opportunity.
    pub fn morph_to(&mut self, index: usize) {
        self.pending = Some(index);
        if let SequencePhase::Holding { .. } = self.phase {
            self.phase = SequencePhase::Idle;
        }
    }

    /// Drop the in-flight record, if any, and go idle at `current`.
    pub fn interrupt(&mut self) -> Option<TransitionRecord> {
        let previous = self.phase;
        self.phase = SequencePhase::Idle;
        match previous {
            SequencePhase::Transitioning(record) => {
                log::info!(
                    "Interrupted {} transition {} -> {} at {:.2}s",
                    record.script_name(),
                    record.from_index,
                    record.to_index,
                    record.elapsed
                );
                Some(record)
            }
            _ => None,
        }
    }

    /// Reset onto `index`, holding before the next advance.
    pub fn reset(&mut self, index: usize) {
        self.current = index;
        self.pending = None;
        self.phase = SequencePhase::Holding {
            remaining: self.hold_seconds,
        };
    }

    /// Advance by `dt` seconds.
    pub fn advance(
        &mut self,
        dt: f32,
        director: &mut TransitionDirector,
        targets: &[TargetInfo],
    ) -> FrameCurve {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let mut out = FrameCurve::default();

        if let SequencePhase::Holding { remaining } = self.phase {
            let remaining = remaining - dt;
            self.phase = if remaining <= 0.0 {
                SequencePhase::Idle
            } else {
                SequencePhase::Holding { remaining }
            };
        }

        if self.phase == SequencePhase::Idle {
            if let Some(next) = self.next_target(targets.len()) {
                match targets.get(next) {
                    Some(info) if info.ready => {
                        let from_id = targets.get(self.current).map(|t| t.id).unwrap_or(0);
                        let record = director.start(&TransitionRequest {
                            from_index: self.current,
                            to_index: next,
                            from_id,
                            to_id: info.id,
                            duration_seconds: self.duration,
                            style: self.style,
                        });
                        log::info!(
                            "Transition {} -> {} ({}, {:.2}s)",
                            record.from_index,
                            record.to_index,
                            record.script_name(),
                            record.duration
                        );
                        self.pending = None;
                        self.phase = SequencePhase::Transitioning(record);
                        out.events.push(SequenceEvent::Started(record));
                    }
                    Some(_) => {
                        log::debug!("Target {} not ready, holding formation", next);
                    }
                    None => {
                        self.pending = None;
                    }
                }
            }
        }

        if let SequencePhase::Transitioning(mut record) = self.phase {
            record.elapsed += dt;
            if record.duration - record.elapsed < COMPLETION_SNAP {
                record.elapsed = record.duration;
            }

            let mode = targets
                .get(record.to_index)
                .map(|t| t.phase_mode)
                .unwrap_or(PhaseMode::None);
            let curve = TransitionDirector::evaluate(&record, record.elapsed)
                .with_chaos_scale(self.chaos)
                .with_staging(mode, self.phase_params);
            out.curve = Some(curve);

            if record.is_complete() {
                self.current = record.to_index;
                out.events.push(SequenceEvent::Committed {
                    to_index: record.to_index,
                });
                self.phase = match self.mode {
                    SequenceMode::HoldThenAdvance => SequencePhase::Holding {
                        remaining: self.hold_seconds,
                    },
                    SequenceMode::Hold => SequencePhase::Idle,
                };
            } else {
                self.phase = SequencePhase::Transitioning(record);
            }
        }

        out
    }

    fn next_target(&self, count: usize) -> Option<usize> {
        if let Some(pending) = self.pending {
            return Some(pending);
        }
        match self.mode {
            SequenceMode::HoldThenAdvance if count > 1 => Some((self.current + 1) % count),
            _ => None,
        }
    }
}
