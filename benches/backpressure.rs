use chunkflow::{Chunk, CollectorSink, MemorySource, Pipeline};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;

fn bench_constrained_sink(c: &mut Criterion) {
    c.bench_function("sink_capacity_4_1000_chunks", |b| {
        b.iter(|| {
            let chunks: Vec<Chunk> = (0..1000u32)
                .map(|i| Chunk::new(vec![i as u8; 64]))
                .collect();
            let pipeline = Pipeline::builder()
                .source(MemorySource::new(black_box(chunks)))
                .sink(CollectorSink::with_capacity(4))
                .build()
                .expect("Build failed");
            let metrics = pipeline.metrics();
            let completion = pipeline.run();
            assert!(completion.is_finished());
            assert!(metrics.total_pauses() > 0);
        });
    });
}

fn bench_roomy_sink(c: &mut Criterion) {
    c.bench_function("sink_capacity_1024_1000_chunks", |b| {
        b.iter(|| {
            let chunks: Vec<Chunk> = (0..1000u32)
                .map(|i| Chunk::new(vec![i as u8; 64]))
                .collect();
            let pipeline = Pipeline::builder()
                .source(MemorySource::new(black_box(chunks)))
                .sink(CollectorSink::with_capacity(1024))
                .build()
                .expect("Build failed");
            let completion = pipeline.run();
            assert!(completion.is_finished());
        });
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .sample_size(50);
    targets = bench_constrained_sink, bench_roomy_sink
);
criterion_main!(benches);
