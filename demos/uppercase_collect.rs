//! In-memory uppercase pipeline
//!
//! Feeds a fixed list of chunks through an uppercase transform into a
//! collector and prints the collected output with run metrics.
//!
//! Usage: cargo run --example uppercase_collect

use chunkflow::{CollectorSink, MemorySource, Pipeline, Uppercase};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let sink = CollectorSink::new();
    let handle = sink.handle();

    let pipeline = Pipeline::builder()
        .source(MemorySource::new(["some", "data", "to", "read"]))
        .transform(Uppercase)
        .sink(sink)
        .build()?;

    let metrics = pipeline.metrics();
    let completion = pipeline.run();

    for chunk in handle.chunks() {
        println!("got chunk: {}", String::from_utf8_lossy(chunk.as_bytes()));
    }
    println!("terminal: {completion:?}");
    println!("{}", metrics.snapshot().format());

    Ok(())
}
