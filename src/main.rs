//! Headless runner.
//!
//! ```text
//! morphdust [settings.json] [frames] [fps]
//! ```
//!
//! Builds three demo outlines, steps the engine in export mode and logs
//! per-frame statistics. Set `RUST_LOG=debug` for script picks and cache hits.

use std::f32::consts::TAU;
use std::process::ExitCode;

use morphdust::prelude::*;

fn circle(points: usize) -> Vec<Vec2> {
    (0..points)
        .map(|i| {
            let a = i as f32 / points as f32 * TAU;
            Vec2::new(a.cos(), a.sin()) * 100.0
        })
        .collect()
}

fn star(tips: usize) -> Vec<Vec2> {
    (0..tips * 2)
        .map(|i| {
            let a = i as f32 / (tips * 2) as f32 * TAU - TAU / 4.0;
            let r = if i % 2 == 0 { 100.0 } else { 42.0 };
            Vec2::new(a.cos(), a.sin()) * r
        })
        .collect()
}

fn square_with_hole() -> Vec<Vec<Vec2>> {
    let square = |half: f32| {
        vec![
            Vec2::new(-half, -half),
            Vec2::new(half, -half),
            Vec2::new(half, half),
            Vec2::new(-half, half),
        ]
    };
    vec![square(100.0), square(45.0)]
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let settings = match args.first() {
        Some(path) => match Settings::load(path) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Could not load settings from {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => Settings::default(),
    };
    let frames: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(300);
    let fps: f32 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(30.0);

    let backend = settings.backend;
    let mut engine = Engine::for_export(settings, fps);
    let specs = vec![
        TargetSpec::shape(Shape::outline(vec![circle(96)])),
        TargetSpec::shape(Shape::outline(vec![star(5)])),
        TargetSpec::shape(Shape::outline(square_with_hole())),
    ];
    if let Err(e) = engine.load_targets(specs) {
        log::error!("{}", e);
        return ExitCode::FAILURE;
    }
    let active = engine.set_backend(backend);
    engine.set_frame_stats(log::log_enabled!(log::Level::Debug));
    log::info!(
        "Running {} frames at {} fps with {} particles ({:?})",
        frames,
        fps,
        engine.particles().len(),
        active
    );

    for _ in 0..frames {
        let report = engine.step();
        for event in &report.events {
            match event {
                SequenceEvent::Started(record) => log::info!(
                    "t={:.2}s start {} -> {} [{}]",
                    report.time,
                    record.from_index,
                    record.to_index,
                    record.script_name()
                ),
                SequenceEvent::Committed { to_index } => {
                    log::info!("t={:.2}s formed target {}", report.time, to_index)
                }
            }
        }
        if let Some(s) = report.stats {
            log::debug!(
                "frame {:4} morph={:.3} moved(mean={:.4}, max={:.4}) target(mean={:.4}) settled={:.1}%",
                report.frame,
                report.curve.map(|c| c.morph_t).unwrap_or(1.0),
                s.mean_displacement,
                s.max_displacement,
                s.mean_target_distance,
                s.settled_fraction * 100.0
            );
        }
    }

    ExitCode::SUCCESS
}
