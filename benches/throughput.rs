use chunkflow::{Chunk, CollectorSink, HexEncode, MemorySource, Pipeline, Rechunk};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;

fn bench_identity_throughput(c: &mut Criterion) {
    c.bench_function("identity_1000_chunks", |b| {
        b.iter(|| {
            let chunks: Vec<Chunk> = (0..1000u32)
                .map(|i| Chunk::new(vec![i as u8; 64]))
                .collect();
            let pipeline = Pipeline::builder()
                .source(MemorySource::new(black_box(chunks)))
                .sink(CollectorSink::with_capacity(256))
                .build()
                .expect("Build failed");
            let completion = pipeline.run();
            assert!(completion.is_finished());
        });
    });
}

fn bench_hex_throughput(c: &mut Criterion) {
    c.bench_function("hex_1000_chunks", |b| {
        b.iter(|| {
            let chunks: Vec<Chunk> = (0..1000u32)
                .map(|i| Chunk::new(vec![i as u8; 64]))
                .collect();
            let pipeline = Pipeline::builder()
                .source(MemorySource::new(black_box(chunks)))
                .transform(HexEncode)
                .sink(CollectorSink::with_capacity(256))
                .build()
                .expect("Build failed");
            let completion = pipeline.run();
            assert!(completion.is_finished());
        });
    });
}

fn bench_rechunk_throughput(c: &mut Criterion) {
    c.bench_function("rechunk_1000_small_to_4k", |b| {
        b.iter(|| {
            let chunks: Vec<Chunk> = (0..1000u32)
                .map(|i| Chunk::new(vec![i as u8; 64]))
                .collect();
            let pipeline = Pipeline::builder()
                .source(MemorySource::new(black_box(chunks)))
                .transform(Rechunk::new(4096))
                .sink(CollectorSink::with_capacity(256))
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
    targets = bench_identity_throughput, bench_hex_throughput, bench_rechunk_throughput
);
criterion_main!(benches);
