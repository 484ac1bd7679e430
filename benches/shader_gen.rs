//! Benchmarks for shader generation and CPU-side curve evaluation.
//!
//! Run with: `cargo bench --bench shader_gen`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use morphdust::director::{TransitionDirector, TransitionRequest};
use morphdust::grid::shader::kernel_wgsl;
use morphdust::sdf::SignedDistanceField;
use morphdust::shader_utils::all_utils_wgsl;
use morphdust::TransitionStyle;

fn bench_wgsl(c: &mut Criterion) {
    let mut group = c.benchmark_group("wgsl");
    group.bench_function("utils", |b| b.iter(|| black_box(all_utils_wgsl())));
    group.bench_function("kernel", |b| b.iter(|| black_box(kernel_wgsl())));
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");

    for style in [TransitionStyle::Clean, TransitionStyle::Chaotic] {
        let request = TransitionRequest {
            from_index: 0,
            to_index: 1,
            from_id: 0xA11C_E000,
            to_id: 0x0B0B_0001,
            duration_seconds: 2.5,
            style,
        };
        let record = TransitionDirector::deterministic(7).start(&request);
        group.bench_with_input(
            BenchmarkId::new("frames_75", format!("{:?}", style)),
            &record,
            |b, record| {
                b.iter(|| {
                    for frame in 0..75 {
                        black_box(TransitionDirector::evaluate(record, frame as f32 / 30.0));
                    }
                })
            },
        );
    }

    group.finish();
}

fn bench_sdf(c: &mut Criterion) {
    let mut group = c.benchmark_group("sdf");

    for size in [96u32, 192, 384] {
        // Filled disc with a square hole.
        let r = size as f32 * 0.45;
        let c0 = size as f32 * 0.5;
        let mask: Vec<bool> = (0..size * size)
            .map(|i| {
                let x = (i % size) as f32 - c0;
                let y = (i / size) as f32 - c0;
                let hole = x.abs() < r * 0.3 && y.abs() < r * 0.3;
                x * x + y * y < r * r && !hole
            })
            .collect();
        group.bench_with_input(BenchmarkId::new("from_mask", size), &mask, |b, mask| {
            b.iter(|| black_box(SignedDistanceField::from_mask(mask, size, size)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_wgsl, bench_evaluate, bench_sdf);
criterion_main!(benches);
