//! Frame loop orchestration.
//!
//! The [`Engine`] owns one sequence, the director, the prepared targets and
//! whichever simulator is active. Each [`Engine::step`] advances the
//! sequence, pushes or commits targets on its events, advances the particles
//! and reports what happened.
//!
//! The scalar particles are the source of truth for output. While a grid
//! executor runs, state stays on the executor and is copied back only at
//! sync points: transition boundaries, interrupts, target replacement,
//! backend switches and [`Engine::sync_particles`]. Frame statistics force a
//! sync every frame, so they are off for grid backends unless
//! [`Engine::set_frame_stats`] turns them on.

use std::sync::Arc;

use crate::build::{prepare_targets, BuildParams, BuildToken, PreparedTarget, TargetBuilder, TargetSpec};
use crate::curves::CurveState;
use crate::director::{DirectorMode, TransitionDirector};
use crate::error::{EngineError, GpuError};
use crate::forces::Magnet;
use crate::gpu::GpuGrid;
use crate::grid::{layout, GridExecutor, GridLayout, GridState, GridUniforms, HostGrid};
use crate::scalar::{Particle, ScalarSimulator};
use crate::sequence::{Sequence, SequenceEvent, SequenceMode, TargetInfo};
use crate::settings::{Backend, Settings};
use crate::shape::ShapeAnalyzer;
use crate::staging::compute_phases;
use crate::stats::DistributionStats;
use crate::time::FrameClock;

/// Distance under which a particle counts as settled in frame statistics.
pub const SETTLE_EPSILON: f32 = 1e-3;

/// What one frame did.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    /// Simulation time after this frame.
    pub time: f32,
    pub dt: f32,
    pub curve: Option<CurveState>,
    pub events: Vec<SequenceEvent>,
    /// `None` on grid frames unless frame statistics are enabled.
    pub stats: Option<DistributionStats>,
    /// Backend that actually ran this frame.
    pub backend: Backend,
}

pub struct Engine {
    settings: Settings,
    director: TransitionDirector,
    sequence: Sequence,
    specs: Vec<TargetSpec>,
    targets: Vec<PreparedTarget>,
    scalar: ScalarSimulator,
    grid: Option<Box<dyn GridExecutor>>,
    /// Scalar state changed since the last upload.
    grid_dirty: bool,
    /// The grid has stepped since the last read back.
    grid_ahead: bool,
    grid_builds: u64,
    active_backend: Backend,
    grid_unsupported_reported: bool,
    frame_stats: bool,
    last_curve: Option<CurveState>,
    builder: TargetBuilder,
    pending_build: Option<BuildToken>,
    clock: FrameClock,
    magnet: Option<Magnet>,
    time: f32,
    frame: u64,
}

impl Engine {
    /// Interactive engine: random director, realtime clock.
    pub fn new(settings: Settings) -> Self {
        Self::with_parts(settings, DirectorMode::Random, FrameClock::realtime())
    }

    /// Export engine: deterministic director and a fixed `1 / fps` delta.
    pub fn for_export(settings: Settings, fps: f32) -> Self {
        Self::with_parts(settings, DirectorMode::Deterministic, FrameClock::fixed(fps))
    }

    fn with_parts(settings: Settings, mode: DirectorMode, clock: FrameClock) -> Self {
        let settings = settings.sanitized();
        let mut sequence = Sequence::new(
            SequenceMode::HoldThenAdvance,
            settings.cycle_seconds,
            settings.hold_seconds,
            settings.transition_style,
        );
        sequence.configure(
            settings.cycle_seconds,
            settings.hold_seconds,
            settings.transition_style,
            settings.chaos,
        );
        sequence.set_phase_params(settings.phase_params);

        Self {
            director: TransitionDirector::new(mode, settings.transition_seed),
            sequence,
            specs: Vec::new(),
            targets: Vec::new(),
            scalar: ScalarSimulator::new(),
            grid: None,
            grid_dirty: true,
            grid_ahead: false,
            grid_builds: 0,
            active_backend: Backend::Scalar,
            grid_unsupported_reported: false,
            frame_stats: false,
            last_curve: None,
            builder: TargetBuilder::new(Arc::new(ShapeAnalyzer::new())),
            pending_build: None,
            clock,
            magnet: None,
            time: 0.0,
            frame: 0,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn sequence_mut(&mut self) -> &mut Sequence {
        &mut self.sequence
    }

    pub fn director(&self) -> &TransitionDirector {
        &self.director
    }

    pub fn targets(&self) -> &[PreparedTarget] {
        &self.targets
    }

    /// Particles as of the last sync point. On the scalar path that is the
    /// last frame; on a grid path see [`sync_particles`](Self::sync_particles).
    pub fn particles(&self) -> &[Particle] {
        self.scalar.particles()
    }

    /// Copy the grid's state back if it is ahead, then return the particles.
    pub fn sync_particles(&mut self) -> &[Particle] {
        self.sync_or_fallback();
        self.scalar.particles()
    }

    /// The wgpu executor while `Grid` is active, for rendering straight from
    /// its textures without a read back.
    pub fn gpu_grid(&self) -> Option<&GpuGrid> {
        self.grid.as_ref().and_then(|grid| grid.as_gpu())
    }

    /// Compute [`FrameReport::stats`] on grid frames too. Costs one read back
    /// per frame.
    pub fn set_frame_stats(&mut self, enabled: bool) {
        self.frame_stats = enabled;
    }

    pub fn frame_stats(&self) -> bool {
        self.frame_stats
    }

    pub fn analyzer(&self) -> &Arc<ShapeAnalyzer> {
        self.builder.analyzer()
    }

    /// Backend that runs the next frame.
    pub fn backend(&self) -> Backend {
        self.active_backend
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    /// True while a background build is outstanding.
    pub fn is_building(&self) -> bool {
        self.pending_build.is_some()
    }

    fn build_params(&self) -> BuildParams {
        BuildParams {
            count: self.settings.count.max(1),
            seed: self.settings.transition_seed,
            raster_size: self.settings.shape_raster_size,
            profile: self.settings.staging_profile(),
        }
    }

    /// Prepare `specs` on this thread and make them the target sequence.
    pub fn load_targets(&mut self, specs: Vec<TargetSpec>) -> Result<(), EngineError> {
        if specs.is_empty() {
            return Err(EngineError::NoTargets);
        }
        if self.pending_build.take().is_some() {
            self.builder.supersede();
        }
        let targets = prepare_targets(&specs, self.builder.analyzer(), &self.build_params());
        self.specs = specs;
        self.replace_targets(targets);
        Ok(())
    }

    /// Prepare `specs` in the background. The current formation holds until
    /// the build arrives; an older outstanding build is superseded.
    pub fn request_targets(&mut self, specs: Vec<TargetSpec>) -> Result<BuildToken, EngineError> {
        if specs.is_empty() {
            return Err(EngineError::NoTargets);
        }
        self.specs = specs.clone();
        let token = self.builder.request(specs, self.build_params());
        self.pending_build = Some(token);
        Ok(token)
    }

    /// Apply a finished background build, if any.
    pub fn poll_builds(&mut self) -> bool {
        match self.builder.poll() {
            Some(result) if Some(result.token) == self.pending_build => {
                log::info!("Build {} ready with {} targets", result.token.0, result.targets.len());
                self.pending_build = None;
                self.replace_targets(result.targets);
                true
            }
            _ => false,
        }
    }

    /// Install `targets`. Returns true when the grid executor was rebuilt.
    fn replace_targets(&mut self, mut targets: Vec<PreparedTarget>) -> bool {
        if targets.is_empty() {
            return false;
        }
        let count = self.settings.count.max(1);
        let profile = self.settings.staging_profile();
        for target in targets.iter_mut().filter(|t| t.cloud.len() != count) {
            log::warn!(
                "Target {:08x} has {} points for {} particles; refitting",
                target.id,
                target.cloud.len(),
                count
            );
            target.cloud = target.cloud.fit_to(count, self.settings.transition_seed);
            let (phases, mode) = compute_phases(&target.cloud, target.descriptor.as_deref(), &profile);
            target.phases = phases;
            target.phase_mode = mode;
        }

        if self.scalar.len() != count {
            // The old grid holds the old count; nothing on it is worth keeping.
            self.release_grid();
            self.targets = targets;
            self.scalar.initialize(
                &self.targets[0].cloud,
                self.settings.transition_seed,
                self.settings.sim.ambient_ratio,
            );
            self.sequence.reset(0);
            self.rebuild_grid();
            return true;
        }

        self.sync_or_fallback();
        self.sequence.interrupt();
        self.scalar.rebase_to_current();
        self.targets = targets;
        self.sequence.reset(0);
        self.sequence.morph_to(0);
        self.grid_dirty = true;
        false
    }

    /// Transition to target `index` next. Interrupts an in-flight transition,
    /// resuming from the current positions.
    pub fn morph_to(&mut self, index: usize) -> Result<(), EngineError> {
        if index >= self.targets.len() {
            return Err(EngineError::TargetOutOfRange {
                index,
                len: self.targets.len(),
            });
        }
        self.interrupt();
        self.sequence.morph_to(index);
        Ok(())
    }

    /// Abandon the in-flight transition, keeping particles where they are.
    pub fn interrupt(&mut self) {
        if !self.sequence.is_transitioning() {
            return;
        }
        self.sync_or_fallback();
        self.sequence.interrupt();
        self.scalar.rebase_to_current();
        self.grid_dirty = true;
    }

    pub fn set_magnet(&mut self, magnet: Option<Magnet>) {
        self.magnet = magnet;
    }

    /// Apply new settings without resetting the visible formation.
    ///
    /// Changes that alter the targets rebuild them synchronously and drop any
    /// outstanding background build. Changes to style, duration or chaos
    /// restart an in-flight transition from where the particles are.
    pub fn apply_settings(&mut self, settings: Settings) {
        let settings = settings.sanitized();
        let old = std::mem::replace(&mut self.settings, settings);
        let s = &self.settings;

        let rebuild = old.count != s.count
            || old.shape_raster_size != s.shape_raster_size
            || old.staging_profile() != s.staging_profile()
            || old.transition_seed != s.transition_seed;
        let retime = old.transition_style != s.transition_style
            || old.cycle_seconds != s.cycle_seconds
            || old.chaos != s.chaos;
        let backend_changed = old.backend != s.backend;

        self.director.set_seed(s.transition_seed);
        self.sequence
            .configure(s.cycle_seconds, s.hold_seconds, s.transition_style, s.chaos);
        self.sequence.set_phase_params(s.phase_params);

        let mut grid_rebuilt = false;
        if rebuild && !self.specs.is_empty() {
            if self.pending_build.take().is_some() {
                self.builder.supersede();
            }
            log::info!("Settings changed; rebuilding {} targets", self.specs.len());
            self.interrupt();
            let targets = prepare_targets(&self.specs, self.builder.analyzer(), &self.build_params());
            grid_rebuilt = self.replace_targets(targets);
        } else if retime {
            if let Some(to_index) = self.sequence.record().map(|r| r.to_index) {
                log::info!("Transition timing changed; restarting towards target {}", to_index);
                self.interrupt();
                self.sequence.morph_to(to_index);
            }
        }

        if backend_changed && !grid_rebuilt {
            self.set_backend(self.settings.backend);
        }
    }

    /// Switch simulators. Returns the backend actually in use.
    ///
    /// `Grid` falls back to `Scalar` when no usable GPU is found; that is
    /// reported once per engine.
    pub fn set_backend(&mut self, backend: Backend) -> Backend {
        self.settings.backend = backend;
        self.rebuild_grid();
        self.active_backend
    }

    fn rebuild_grid(&mut self) {
        self.sync_or_fallback();
        self.release_grid();
        if self.scalar.is_empty() {
            return;
        }

        let layout = GridLayout::for_count(self.scalar.len() as u32);
        match create_executor(self.settings.backend, layout) {
            Ok(Some(grid)) => {
                log::info!("Using {} backend", grid.name());
                self.grid = Some(grid);
                self.grid_builds += 1;
                self.active_backend = self.settings.backend;
            }
            Ok(None) => {}
            Err(e) => {
                if !self.grid_unsupported_reported {
                    log::warn!("Grid path unavailable, staying on the scalar path: {}", e);
                    self.grid_unsupported_reported = true;
                }
            }
        }
    }

    /// Drop the executor without reading it back.
    fn release_grid(&mut self) {
        if let Some(mut grid) = self.grid.take() {
            grid.release();
        }
        self.active_backend = Backend::Scalar;
        self.grid_ahead = false;
        self.grid_dirty = true;
    }

    fn drop_grid(&mut self, error: &EngineError) {
        if let Some(grid) = self.grid.as_ref() {
            log::warn!("{} failed, falling back to the scalar path: {}", grid.name(), error);
        }
        self.release_grid();
    }

    fn sync_from_grid(&mut self) -> Result<(), EngineError> {
        if !self.grid_ahead {
            return Ok(());
        }
        let grid = self.grid.as_mut().ok_or(GpuError::Released)?;
        let (pos, vel) = grid.read_back()?;
        layout::write_back(&pos, &vel, self.scalar.particles_mut());
        self.scalar.refresh_display(self.last_curve.as_ref());
        self.grid_ahead = false;
        Ok(())
    }

    fn sync_or_fallback(&mut self) {
        if let Err(e) = self.sync_from_grid() {
            self.drop_grid(&e);
        }
    }

    fn target_infos(&self) -> Vec<TargetInfo> {
        self.targets
            .iter()
            .map(|t| TargetInfo {
                id: t.id,
                ready: t.cloud.len() == self.scalar.len(),
                phase_mode: t.phase_mode,
            })
            .collect()
    }

    /// Advance one frame using the engine's clock.
    pub fn step(&mut self) -> FrameReport {
        let dt = self.clock.tick();
        self.step_dt(dt)
    }

    /// Advance one frame by `dt` seconds.
    pub fn step_dt(&mut self, dt: f32) -> FrameReport {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.poll_builds();

        let previous = if self.grid.is_none() || self.frame_stats {
            self.sync_or_fallback();
            Some(self.scalar.positions())
        } else {
            None
        };
        let infos = self.target_infos();
        let frame = self.sequence.advance(dt, &mut self.director, &infos);

        for event in &frame.events {
            if let SequenceEvent::Started(record) = event {
                if let Some(target) = self.targets.get(record.to_index) {
                    self.scalar.morph_to(&target.cloud, &target.phases);
                    self.grid_dirty = true;
                }
            }
        }

        self.time += dt;
        self.frame += 1;
        self.last_curve = frame.curve;
        self.advance_particles(dt);

        for event in &frame.events {
            if let SequenceEvent::Committed { to_index } = event {
                log::debug!("Committed target {}", to_index);
                self.scalar.commit();
                self.grid_dirty = true;
            }
        }

        let stats = match previous {
            Some(previous) => {
                self.sync_or_fallback();
                Some(DistributionStats::measure(
                    &previous,
                    &self.scalar.positions(),
                    &self.scalar.final_targets(),
                    SETTLE_EPSILON,
                ))
            }
            None => None,
        };

        FrameReport {
            frame: self.frame,
            time: self.time,
            dt,
            curve: frame.curve,
            events: frame.events,
            stats,
            backend: self.active_backend,
        }
    }

    fn advance_particles(&mut self, dt: f32) {
        if self.grid.is_some() {
            match self.step_grid(dt) {
                Ok(()) => return,
                Err(e) => self.drop_grid(&e),
            }
        }
        self.scalar.update(
            self.last_curve.as_ref(),
            dt,
            self.time,
            &self.settings.sim,
            self.magnet.as_ref(),
        );
    }

    /// One kernel step. Uploads only when scalar state changed; never reads back.
    fn step_grid(&mut self, dt: f32) -> Result<(), EngineError> {
        if self.grid_dirty {
            self.sync_from_grid()?;
        }
        let grid = self.grid.as_mut().ok_or(GpuError::Released)?;
        if self.grid_dirty {
            grid.upload(&GridState::from_particles(self.scalar.particles()))?;
            self.grid_dirty = false;
        }
        let uniforms = GridUniforms::from_frame(
            self.last_curve.as_ref(),
            &self.settings.sim,
            dt,
            self.time,
            self.magnet.as_ref(),
            grid.layout(),
        );
        grid.step(&uniforms)?;
        self.grid_ahead = true;
        Ok(())
    }
}

fn create_executor(backend: Backend, layout: GridLayout) -> Result<Option<Box<dyn GridExecutor>>, EngineError> {
    let grid: Box<dyn GridExecutor> = match backend {
        Backend::Scalar => return Ok(None),
        Backend::HostGrid => Box::new(HostGrid::new(layout)),
        Backend::Grid => Box::new(GpuGrid::new(layout)?),
    };
    Ok(Some(grid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::PointCloud;
    use crate::director::TransitionStyle;
    use glam::Vec3;

    fn ring(n: usize, radius: f32) -> PointCloud {
        PointCloud::from_positions((0..n).map(|i| {
            let a = i as f32 / n as f32 * std::f32::consts::TAU;
            Vec3::new(a.cos() * radius, a.sin() * radius, 0.0)
        }))
    }

    fn settings(count: usize) -> Settings {
        Settings {
            count,
            cycle_seconds: 1.0,
            hold_seconds: 0.2,
            transition_style: TransitionStyle::Clean,
            shape_aware_transitions: false,
            ..Settings::default()
        }
    }

    #[test]
    fn test_load_requires_targets() {
        let mut engine = Engine::for_export(settings(10), 30.0);
        assert!(matches!(engine.load_targets(Vec::new()), Err(EngineError::NoTargets)));
        assert!(matches!(engine.morph_to(0), Err(EngineError::TargetOutOfRange { .. })));
    }

    #[test]
    fn test_first_load_forms_first_target() {
        let mut engine = Engine::for_export(settings(64), 30.0);
        engine
            .load_targets(vec![TargetSpec::cloud(ring(64, 0.5)), TargetSpec::cloud(ring(64, 0.2))])
            .unwrap();
        assert_eq!(engine.particles().len(), 64);
        for (p, q) in engine.particles().iter().zip(ring(64, 0.5).positions()) {
            assert_eq!(p.position, q);
        }
    }

    #[test]
    fn test_cycle_commits() {
        let mut engine = Engine::for_export(settings(64), 30.0);
        engine
            .load_targets(vec![TargetSpec::cloud(ring(64, 0.5)), TargetSpec::cloud(ring(64, 0.2))])
            .unwrap();
        engine.sequence_mut().set_mode(SequenceMode::Hold);
        engine.morph_to(1).unwrap();
        let mut committed = false;
        for _ in 0..60 {
            let report = engine.step();
            committed |= report
                .events
                .iter()
                .any(|e| matches!(e, SequenceEvent::Committed { to_index: 1 }));
        }
        assert!(committed);
        let target = ring(64, 0.2);
        for (p, q) in engine.particles().iter().zip(target.positions()) {
            assert!(p.position.distance(q) < 1e-4);
        }
    }

    #[test]
    fn test_host_grid_backend() {
        let mut engine = Engine::for_export(settings(50), 30.0);
        engine
            .load_targets(vec![TargetSpec::cloud(ring(50, 0.5)), TargetSpec::cloud(ring(50, 0.3))])
            .unwrap();
        assert_eq!(engine.set_backend(Backend::HostGrid), Backend::HostGrid);
        for _ in 0..60 {
            assert_eq!(engine.step().backend, Backend::HostGrid);
        }
        engine.set_backend(Backend::Scalar);
        assert_eq!(engine.backend(), Backend::Scalar);
        assert!(engine.particles().iter().all(|p| p.position.is_finite()));
    }

    #[test]
    fn test_count_change_reinitializes() {
        let mut engine = Engine::for_export(settings(40), 30.0);
        engine.load_targets(vec![TargetSpec::cloud(ring(40, 0.5))]).unwrap();
        engine.apply_settings(settings(90));
        assert_eq!(engine.particles().len(), 90);
        assert_eq!(engine.targets()[0].cloud.len(), 90);
    }

    #[test]
    fn test_count_change_drops_outstanding_build() {
        let mut engine = Engine::for_export(settings(100), 30.0);
        engine
            .load_targets(vec![TargetSpec::cloud(ring(100, 0.5)), TargetSpec::cloud(ring(100, 0.3))])
            .unwrap();
        let specs = vec![TargetSpec::cloud(ring(100, 0.4)), TargetSpec::cloud(ring(100, 0.2))];
        let token = engine.request_targets(specs.clone()).unwrap();
        engine.apply_settings(settings(150));
        assert!(!engine.is_building());

        // The old build finishing late, sized for the old count.
        let old_params = BuildParams {
            count: 100,
            ..engine.build_params()
        };
        let stale = prepare_targets(&specs, engine.analyzer(), &old_params);
        engine.builder.deliver(crate::build::BuildResult { token, targets: stale });

        let mut started = false;
        for _ in 0..60 {
            let report = engine.step();
            started |= report.events.iter().any(|e| matches!(e, SequenceEvent::Started(_)));
        }
        assert!(started);
        assert_eq!(engine.particles().len(), 150);
        assert!(engine.targets().iter().all(|t| t.cloud.len() == 150 && t.phases.len() == 150));
    }

    #[test]
    fn test_mismatched_targets_are_refitted() {
        let mut engine = Engine::for_export(settings(80), 30.0);
        engine.load_targets(vec![TargetSpec::cloud(ring(80, 0.5))]).unwrap();
        let params = BuildParams {
            count: 30,
            ..engine.build_params()
        };
        let short = prepare_targets(&[TargetSpec::cloud(ring(30, 0.2))], engine.analyzer(), &params);
        engine.replace_targets(short);
        assert_eq!(engine.targets()[0].cloud.len(), 80);
        assert_eq!(engine.targets()[0].phases.len(), 80);
    }

    #[test]
    fn test_timing_change_restarts_transition() {
        let mut engine = Engine::for_export(settings(64), 30.0);
        engine
            .load_targets(vec![TargetSpec::cloud(ring(64, 0.5)), TargetSpec::cloud(ring(64, 0.2))])
            .unwrap();
        engine.sequence_mut().set_mode(SequenceMode::Hold);
        engine.morph_to(1).unwrap();
        for _ in 0..15 {
            engine.step();
        }
        let before = *engine.sequence().record().unwrap();
        assert_eq!(before.style, TransitionStyle::Clean);
        assert!(before.elapsed > 0.4);

        engine.apply_settings(Settings {
            transition_style: TransitionStyle::Chaotic,
            cycle_seconds: 4.0,
            ..settings(64)
        });
        let report = engine.step();
        assert!(report
            .events
            .iter()
            .any(|e| matches!(e, SequenceEvent::Started(r) if r.to_index == 1)));
        let record = engine.sequence().record().unwrap();
        assert_eq!(record.duration, 4.0);
        assert_eq!(record.style, TransitionStyle::Chaotic);
        assert!(record.elapsed <= 1.0 / 30.0 + 1e-4);
    }

    #[test]
    fn test_hold_change_keeps_transition() {
        let mut engine = Engine::for_export(settings(64), 30.0);
        engine
            .load_targets(vec![TargetSpec::cloud(ring(64, 0.5)), TargetSpec::cloud(ring(64, 0.2))])
            .unwrap();
        engine.sequence_mut().set_mode(SequenceMode::Hold);
        engine.morph_to(1).unwrap();
        for _ in 0..10 {
            engine.step();
        }
        let elapsed = engine.sequence().record().unwrap().elapsed;
        engine.apply_settings(Settings {
            hold_seconds: 3.0,
            ..settings(64)
        });
        assert_eq!(engine.sequence().record().unwrap().elapsed, elapsed);
    }

    #[test]
    fn test_grid_state_stays_resident_between_syncs() {
        let mut engine = Engine::for_export(settings(50), 30.0);
        engine
            .load_targets(vec![TargetSpec::cloud(ring(50, 0.5)), TargetSpec::cloud(ring(50, 0.2))])
            .unwrap();
        assert_eq!(engine.set_backend(Backend::HostGrid), Backend::HostGrid);
        assert!(engine.gpu_grid().is_none());
        engine.sequence_mut().set_mode(SequenceMode::Hold);
        engine.morph_to(1).unwrap();

        let formed: Vec<Vec3> = engine.particles().iter().map(|p| p.position).collect();
        for _ in 0..10 {
            assert!(engine.step().stats.is_none());
        }
        let cached: Vec<Vec3> = engine.particles().iter().map(|p| p.position).collect();
        assert_eq!(cached, formed);

        let synced: Vec<Vec3> = engine.sync_particles().iter().map(|p| p.position).collect();
        assert_ne!(synced, formed);
        assert!(synced.iter().all(|p| p.is_finite()));

        engine.set_frame_stats(true);
        let stats = engine.step().stats.expect("stats requested");
        assert!(stats.max_displacement > 0.0);
        assert_eq!(engine.backend(), Backend::HostGrid);
    }

    #[test]
    fn test_count_change_builds_grid_once() {
        let grid_settings = |count| Settings {
            backend: Backend::HostGrid,
            ..settings(count)
        };
        let mut engine = Engine::for_export(grid_settings(40), 30.0);
        engine.load_targets(vec![TargetSpec::cloud(ring(40, 0.5))]).unwrap();
        assert_eq!(engine.backend(), Backend::HostGrid);
        assert_eq!(engine.grid_builds, 1);

        engine.apply_settings(grid_settings(90));
        assert_eq!(engine.grid_builds, 2);
        assert_eq!(engine.backend(), Backend::HostGrid);

        engine.apply_settings(Settings {
            backend: Backend::Scalar,
            ..settings(90)
        });
        assert_eq!(engine.grid_builds, 2);
        assert_eq!(engine.backend(), Backend::Scalar);
    }
}
