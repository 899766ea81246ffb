//! Benchmarks for beauty-video
//!
//! Measures steady-state I420 → NV21 conversion at common capture sizes.

use beauty_video::{FormatConverter, I420Buffer, SemiPlanarLayout};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_i420_to_nv21(c: &mut Criterion) {
    let mut group = c.benchmark_group("i420_to_nv21");

    for (width, height) in [(640u32, 480u32), (1280, 720), (1920, 1080)].iter() {
        let src = I420Buffer::filled(*width, *height, 90, 120, 140);
        let mut converter = FormatConverter::new(SemiPlanarLayout::Nv21);
        // first call only sizes the scratch buffer
        let _ = converter.convert(&src);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", width, height)),
            &src,
            |b, src| {
                b.iter(|| {
                    black_box(converter.convert(black_box(src)).ok());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_i420_to_nv21);
criterion_main!(benches);
