//! Benchmarks for the depth pipeline on Kinect-sized frames
//!
//! Run with: cargo bench

use arsandbox_rs::config::{PipelineSettings, RenderConfig, StabilizerConfig};
use arsandbox_rs::pipeline::{ContourRenderer, PipelineState, Stabilizer};
use arsandbox_rs::raster::{
    dilate, gaussian_blur, narrow_to_u8, range_mask, remove_invalid, threshold_bands,
    DepthRaster, Raster,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const WIDTH: usize = 512;
const HEIGHT: usize = 424;

/// Rolling terrain with a sprinkle of dropouts and a hand-sized near blob
fn terrain(phase: f32) -> DepthRaster {
    Raster::from_fn(WIDTH, HEIGHT, |x, y| {
        if (x * 31 + y * 17) % 97 == 0 {
            return 0.0;
        }
        let dx = x as f32 - 380.0;
        let dy = y as f32 - 120.0;
        if dx * dx + dy * dy < 40.0 * 40.0 {
            return 350.0;
        }
        let u = x as f32 / WIDTH as f32;
        let v = y as f32 / HEIGHT as f32;
        1500.0 - 60.0 * ((6.0 * u + phase).sin() * (4.0 * v).cos() + 1.0)
    })
}

fn bench_stabilize(c: &mut Criterion) {
    let mut group = c.benchmark_group("stabilize");
    group.throughput(Throughput::Elements((WIDTH * HEIGHT) as u64));

    let settings = PipelineSettings::default();
    let frames = [terrain(0.0), terrain(0.05)];

    for iterations in [3usize, 30] {
        let stabilizer = Stabilizer::new(StabilizerConfig {
            dilation_iterations: iterations,
            ..Default::default()
        });
        group.bench_with_input(
            BenchmarkId::new("dilation_iterations", iterations),
            &stabilizer,
            |b, stabilizer| {
                let mut state = PipelineState::new();
                let mut i = 0;
                b.iter(|| {
                    i ^= 1;
                    black_box(
                        stabilizer
                            .stabilize(&mut state, black_box(&frames[i]), &settings)
                            .ok(),
                    )
                });
            },
        );
    }

    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    group.throughput(Throughput::Elements((WIDTH * HEIGHT) as u64));

    let settings = PipelineSettings::default();
    let stable = match remove_invalid(&terrain(0.0), 5) {
        Ok(r) => r,
        Err(_) => return,
    };

    for step in [5u32, 10, 20] {
        let renderer = ContourRenderer::new(RenderConfig::default());
        let settings = PipelineSettings {
            contour_step: step,
            ..settings
        };
        group.bench_with_input(BenchmarkId::new("contour_step", step), &step, |b, _| {
            b.iter(|| black_box(renderer.render(black_box(&stable), &settings).ok()));
        });
    }

    group.finish();
}

fn bench_raster_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("raster_ops");
    let raw = terrain(0.0);

    group.bench_function("remove_invalid", |b| {
        b.iter(|| black_box(remove_invalid(black_box(&raw), 5).ok()))
    });

    let mask = range_mask(&raw, 500.0, 3000.0);
    group.bench_function("dilate_30", |b| {
        b.iter(|| black_box(dilate(black_box(&mask), 1, 30)))
    });

    let gray = narrow_to_u8(&raw.map(|v| v / 12.0));
    group.bench_function("gaussian_blur_5", |b| {
        b.iter(|| black_box(gaussian_blur(black_box(&gray), 5, None).ok()))
    });
    group.bench_function("threshold_bands_10", |b| {
        b.iter(|| black_box(threshold_bands(black_box(&gray), 10.0).ok()))
    });

    group.finish();
}

criterion_group!(benches, bench_stabilize, bench_render, bench_raster_ops);
criterion_main!(benches);
