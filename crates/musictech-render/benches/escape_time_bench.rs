use criterion::{criterion_group, criterion_main, Criterion};
use musictech_core::{PixelBuffer, Vec2};
use musictech_render::{escape_time, EscapeTimeParams};
use std::hint::black_box;

fn escape_time_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("escape_time");

    group.bench_function("overview_400x300", |b| {
        let mut buffer = PixelBuffer::new(400, 300);
        let params = EscapeTimeParams::default();
        b.iter(|| escape_time(&mut buffer, black_box(&params)));
    });

    group.bench_function("seahorse_valley_800x600_loud", |b| {
        let mut buffer = PixelBuffer::new(800, 600);
        let params = EscapeTimeParams {
            zoom: 12.0,
            offset: Vec2::new(-0.745, 0.11),
            rotation: 0.4,
            morph: Vec2::new(0.01, 0.005),
            max_iterations: 100,
            bass: 0.8,
            mid: 0.5,
            high: 0.3,
            energy: 1.0,
            ..Default::default()
        };
        b.iter(|| escape_time(&mut buffer, black_box(&params)));
    });

    group.finish();
}

criterion_group!(benches, escape_time_benchmark);
criterion_main!(benches);
