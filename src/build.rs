//! Target preparation off the frame loop.
//!
//! A target is ready once its cloud is fitted to the particle count and its
//! staging phases are computed, which may need shape analysis and an SDF.
//! [`TargetBuilder`] does that on a worker thread. Every request carries a
//! [`BuildToken`]; only the most recently issued token is accepted.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::cloud::PointCloud;
use crate::shape::{Shape, ShapeAnalyzer, ShapeDescriptor};
use crate::staging::{compute_phases, PhaseMode, StagingProfile};

/// Monotonically increasing build identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BuildToken(pub u64);

/// Issues tokens and decides which results are still current.
#[derive(Debug, Default)]
pub struct TokenGate {
    latest: u64,
}

impl TokenGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> BuildToken {
        self.latest += 1;
        BuildToken(self.latest)
    }

    pub fn latest(&self) -> Option<BuildToken> {
        (self.latest > 0).then_some(BuildToken(self.latest))
    }

    /// True only for the most recently issued token.
    pub fn accept(&self, token: BuildToken) -> bool {
        if token.0 == self.latest && token.0 > 0 {
            true
        } else {
            log::warn!(
                "Discarding stale build {} (latest is {})",
                token.0,
                self.latest
            );
            false
        }
    }
}

/// One target as supplied by the caller.
///
/// Either a ready-made cloud, a shape to sample, or both (the shape then
/// only drives staging).
#[derive(Clone, Debug, Default)]
pub struct TargetSpec {
    pub cloud: Option<PointCloud>,
    pub shape: Option<Arc<Shape>>,
    /// Content hash of the shape; computed from the shape or cloud if absent.
    pub hash: Option<u32>,
}

impl TargetSpec {
    pub fn cloud(cloud: PointCloud) -> Self {
        Self {
            cloud: Some(cloud),
            ..Self::default()
        }
    }

    pub fn shape(shape: Shape) -> Self {
        Self {
            shape: Some(Arc::new(shape)),
            ..Self::default()
        }
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = Some(Arc::new(shape));
        self
    }

    pub fn with_hash(mut self, hash: u32) -> Self {
        self.hash = Some(hash);
        self
    }

    /// Identity used for seeding and the analysis cache.
    pub fn identity(&self) -> u32 {
        self.hash
            .or_else(|| self.shape.as_ref().map(|s| s.content_hash()))
            .or_else(|| self.cloud.as_ref().map(|c| c.id))
            .unwrap_or(0)
    }
}

/// Build parameters shared by every target of one request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BuildParams {
    pub count: usize,
    pub seed: u32,
    pub raster_size: u32,
    pub profile: StagingProfile,
}

/// A target ready for the simulators.
#[derive(Clone, Debug)]
pub struct PreparedTarget {
    pub id: u32,
    /// Exactly `count` points.
    pub cloud: PointCloud,
    pub descriptor: Option<Arc<ShapeDescriptor>>,
    /// One phase per point.
    pub phases: Vec<f32>,
    /// Mode actually applied; `None` when analysis was unavailable.
    pub phase_mode: PhaseMode,
}

/// Prepare one target. Never fails: analysis errors degrade to plain morphs
/// and a missing cloud becomes neutral padding.
pub fn prepare_target(spec: &TargetSpec, analyzer: &ShapeAnalyzer, params: &BuildParams) -> PreparedTarget {
    let id = spec.identity();
    let wants_analysis = spec.cloud.is_none() || params.profile.mode != PhaseMode::None;

    let descriptor = match (&spec.shape, wants_analysis) {
        (Some(shape), true) => match analyzer.analyze(shape, id, params.raster_size) {
            Ok(d) => Some(d),
            Err(e) => {
                log::warn!("Shape analysis failed for {:08x}: {}", id, e);
                None
            }
        },
        _ => None,
    };

    let cloud = match (&spec.cloud, &descriptor) {
        (Some(cloud), _) => cloud.fit_to(params.count, params.seed),
        (None, Some(d)) => d.sample_fill(params.count, params.seed ^ id),
        (None, None) => {
            log::warn!("Target {:08x} has neither points nor a usable shape", id);
            PointCloud::new(id, Vec::new()).fit_to(params.count, params.seed)
        }
    };

    let (phases, phase_mode) = compute_phases(&cloud, descriptor.as_deref(), &params.profile);
    PreparedTarget {
        id,
        cloud,
        descriptor,
        phases,
        phase_mode,
    }
}

pub fn prepare_targets(specs: &[TargetSpec], analyzer: &ShapeAnalyzer, params: &BuildParams) -> Vec<PreparedTarget> {
    specs
        .iter()
        .map(|spec| prepare_target(spec, analyzer, params))
        .collect()
}

/// Output of one background build.
#[derive(Debug)]
pub struct BuildResult {
    pub token: BuildToken,
    pub targets: Vec<PreparedTarget>,
}

/// Runs target preparation on worker threads.
#[derive(Debug)]
pub struct TargetBuilder {
    analyzer: Arc<ShapeAnalyzer>,
    gate: TokenGate,
    tx: Sender<BuildResult>,
    rx: Receiver<BuildResult>,
}

impl TargetBuilder {
    pub fn new(analyzer: Arc<ShapeAnalyzer>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            analyzer,
            gate: TokenGate::new(),
            tx,
            rx,
        }
    }

    pub fn analyzer(&self) -> &Arc<ShapeAnalyzer> {
        &self.analyzer
    }

    /// Start building `specs`. Supersedes every earlier request.
    pub fn request(&mut self, specs: Vec<TargetSpec>, params: BuildParams) -> BuildToken {
        let token = self.gate.issue();
        let analyzer = Arc::clone(&self.analyzer);
        let tx = self.tx.clone();
        log::debug!("Build {} started for {} targets", token.0, specs.len());
        thread::spawn(move || {
            let targets = prepare_targets(&specs, &analyzer, &params);
            // The receiver is gone only when the builder was dropped.
            let _ = tx.send(BuildResult { token, targets });
        });
        token
    }

    /// Invalidate every outstanding request without starting a new one.
    pub fn supersede(&mut self) -> BuildToken {
        let token = self.gate.issue();
        log::debug!("Builds before {} superseded", token.0);
        token
    }

    /// Hand a finished result to the gate, as a worker would.
    pub fn deliver(&self, result: BuildResult) {
        let _ = self.tx.send(result);
    }

    /// The newest current result, if one has arrived. Stale results are dropped.
    pub fn poll(&mut self) -> Option<BuildResult> {
        let mut newest = None;
        while let Ok(result) = self.rx.try_recv() {
            if self.gate.accept(result.token) {
                newest = Some(result);
            }
        }
        newest
    }

    /// Block until the current build arrives or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> Option<BuildResult> {
        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(left) {
                Ok(result) if self.gate.accept(result.token) => return Some(result),
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::PhaseParams;
    use glam::{Vec2, Vec3};

    fn square() -> Shape {
        Shape::outline(vec![vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ]])
    }

    fn params(mode: PhaseMode) -> BuildParams {
        BuildParams {
            count: 200,
            seed: 1,
            raster_size: 64,
            profile: StagingProfile::new(mode, PhaseParams::default()),
        }
    }

    #[test]
    fn test_token_gate() {
        let mut gate = TokenGate::new();
        assert!(!gate.accept(BuildToken(0)));
        let first = gate.issue();
        assert!(gate.accept(first));
        let second = gate.issue();
        assert!(!gate.accept(first));
        assert!(gate.accept(second));
        assert_eq!(gate.latest(), Some(second));
    }

    #[test]
    fn test_rebuild_reproduces_phases() {
        let spec = TargetSpec::shape(square());
        for mode in [PhaseMode::EdgeThenFill, PhaseMode::SdfFront] {
            let first = prepare_target(&spec, &ShapeAnalyzer::new(), &params(mode));
            let second = prepare_target(&spec, &ShapeAnalyzer::new(), &params(mode));
            assert_eq!(first.cloud, second.cloud);
            assert_eq!(first.phases, second.phases);
        }
    }

    #[test]
    fn test_prepare_from_shape_only() {
        let analyzer = ShapeAnalyzer::new();
        let target = prepare_target(&TargetSpec::shape(square()), &analyzer, &params(PhaseMode::SdfFront));
        assert_eq!(target.cloud.len(), 200);
        assert_eq!(target.phases.len(), 200);
        assert_eq!(target.phase_mode, PhaseMode::SdfFront);
        assert!(target.descriptor.is_some());
        assert_eq!(analyzer.len(), 1);
    }

    #[test]
    fn test_degenerate_shape_falls_back_to_plain_morph() {
        let analyzer = ShapeAnalyzer::new();
        let cloud = PointCloud::from_positions((0..50).map(|i| Vec3::new(i as f32 * 0.01, 0.0, 0.0)));
        let spec = TargetSpec::cloud(cloud).with_shape(Shape::outline(vec![vec![Vec2::ZERO, Vec2::X]]));
        let target = prepare_target(&spec, &analyzer, &params(PhaseMode::SdfFront));
        assert_eq!(target.phase_mode, PhaseMode::None);
        assert_eq!(target.cloud.len(), 200);
        assert!(target.phases.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_empty_spec_is_padded() {
        let analyzer = ShapeAnalyzer::new();
        let target = prepare_target(&TargetSpec::default(), &analyzer, &params(PhaseMode::None));
        assert_eq!(target.cloud.len(), 200);
    }

    #[test]
    fn test_stale_result_discarded() {
        let mut builder = TargetBuilder::new(Arc::new(ShapeAnalyzer::new()));
        let mut gate_tokens = Vec::new();
        gate_tokens.push(builder.gate.issue());
        gate_tokens.push(builder.gate.issue());

        builder.deliver(BuildResult {
            token: gate_tokens[1],
            targets: Vec::new(),
        });
        builder.deliver(BuildResult {
            token: gate_tokens[0],
            targets: Vec::new(),
        });
        let got = builder.poll().unwrap();
        assert_eq!(got.token, BuildToken(2));
        assert!(builder.poll().is_none());
    }

    #[test]
    fn test_superseded_build_is_dropped() {
        let mut builder = TargetBuilder::new(Arc::new(ShapeAnalyzer::new()));
        let token = builder.request(vec![TargetSpec::shape(square())], params(PhaseMode::None));
        builder.supersede();
        assert!(builder.wait(Duration::from_millis(500)).is_none());
        builder.deliver(BuildResult {
            token,
            targets: Vec::new(),
        });
        assert!(builder.poll().is_none());
    }

    #[test]
    fn test_background_build_arrives() {
        let mut builder = TargetBuilder::new(Arc::new(ShapeAnalyzer::new()));
        builder.request(vec![TargetSpec::shape(square())], params(PhaseMode::EdgeThenFill));
        let token = builder.request(vec![TargetSpec::shape(square())], params(PhaseMode::EdgeThenFill));
        let result = builder.wait(Duration::from_secs(10)).unwrap();
        assert_eq!(result.token, token);
        assert_eq!(result.targets.len(), 1);
        assert_eq!(result.targets[0].phase_mode, PhaseMode::EdgeThenFill);
    }
}
