//! Scalar and grid simulators fed the same sequence must agree statistically.

use std::f32::consts::TAU;

use morphdust::prelude::*;
use morphdust::DistributionStats;

fn spiral(n: usize, turns: f32, radius: f32) -> PointCloud {
    PointCloud::from_positions((0..n).map(|i| {
        let t = i as f32 / n as f32;
        let a = t * turns * TAU;
        Vec3::new(a.cos() * radius * t, a.sin() * radius * t, 0.1 * (t - 0.5))
    }))
}

fn settings(style: TransitionStyle, backend: Backend) -> Settings {
    Settings {
        count: 257,
        transition_seed: 42,
        transition_style: style,
        cycle_seconds: 2.0,
        hold_seconds: 0.5,
        shape_aware_transitions: false,
        backend,
        ..Settings::default()
    }
}

/// Per-frame stats, or `None` when `backend` is unavailable here.
fn try_run(style: TransitionStyle, backend: Backend, frames: usize) -> Option<Vec<DistributionStats>> {
    let mut engine = Engine::for_export(settings(style, backend), 30.0);
    engine
        .load_targets(vec![
            TargetSpec::cloud(spiral(257, 2.0, 0.8)),
            TargetSpec::cloud(spiral(257, 0.5, 0.4)),
        ])
        .unwrap();
    if engine.set_backend(backend) != backend {
        return None;
    }
    engine.set_frame_stats(true);
    let stats = (0..frames)
        .map(|_| {
            let report = engine.step();
            assert_eq!(report.backend, backend);
            report.stats.expect("frame stats enabled")
        })
        .collect();
    Some(stats)
}

fn run(style: TransitionStyle, backend: Backend, frames: usize) -> Vec<DistributionStats> {
    try_run(style, backend, frames).unwrap_or_else(|| panic!("{:?} backend unavailable", backend))
}

fn assert_close(a: &DistributionStats, b: &DistributionStats, tol: f32, frame: usize) {
    assert_eq!(a.count, b.count);
    assert!(
        a.centroid.distance(b.centroid) < tol,
        "centroids diverge at frame {}: {:?} vs {:?}",
        frame,
        a.centroid,
        b.centroid
    );
    assert!(
        (a.spread - b.spread).abs() < tol,
        "spread diverges at frame {}: {} vs {}",
        frame,
        a.spread,
        b.spread
    );
    assert!(
        (a.mean_target_distance - b.mean_target_distance).abs() < tol,
        "target distance diverges at frame {}: {} vs {}",
        frame,
        a.mean_target_distance,
        b.mean_target_distance
    );
}

#[test]
fn host_grid_tracks_scalar_through_clean_transition() {
    let frames = 90;
    let scalar = run(TransitionStyle::Clean, Backend::Scalar, frames);
    let grid = run(TransitionStyle::Clean, Backend::HostGrid, frames);
    for (i, (a, b)) in scalar.iter().zip(&grid).enumerate() {
        assert_close(a, b, 0.05, i);
    }
}

#[test]
fn host_grid_tracks_scalar_through_chaotic_cycle() {
    let frames = 150;
    let scalar = run(TransitionStyle::Chaotic, Backend::Scalar, frames);
    let grid = run(TransitionStyle::Chaotic, Backend::HostGrid, frames);
    for (i, (a, b)) in scalar.iter().zip(&grid).enumerate() {
        assert_close(a, b, 0.1, i);
    }
}

#[test]
fn both_paths_form_after_a_full_cycle() {
    // 0.5 s hold, 2 s transition, then a few held frames before the next one.
    let frames = 84;
    for backend in [Backend::Scalar, Backend::HostGrid] {
        let stats = run(TransitionStyle::Chaotic, backend, frames);
        let last = stats.last().unwrap();
        assert!(
            last.mean_target_distance < 1e-3,
            "{:?} ended {} from target",
            backend,
            last.mean_target_distance
        );
    }
}

#[test]
fn gpu_grid_tracks_scalar_through_clean_transition() {
    let frames = 84;
    let Some(grid) = try_run(TransitionStyle::Clean, Backend::Grid, frames) else {
        eprintln!("skipping GPU equivalence: no usable adapter");
        return;
    };
    let scalar = run(TransitionStyle::Clean, Backend::Scalar, frames);
    for (i, (a, b)) in scalar.iter().zip(&grid).enumerate() {
        assert_close(a, b, 0.05, i);
    }
    let last = grid.last().unwrap();
    assert!(last.mean_target_distance < 1e-3, "GPU ended {} from target", last.mean_target_distance);
}
