//! File-to-file hex encoding pipeline
//!
//! Reads a file in fixed-size chunks, hex-encodes each chunk, and writes
//! the result to an output file, printing run metrics at the end.
//!
//! Usage: cargo run --example file_hex --release -- <input> <output>

use chunkflow::{FileSink, FileSource, HexEncode, Pipeline};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(input), Some(output)) = (args.next(), args.next()) else {
        eprintln!("usage: file_hex <input> <output>");
        std::process::exit(2);
    };

    let pipeline = Pipeline::builder()
        .source(FileSource::open(&input)?)
        .transform(HexEncode)
        .sink(FileSink::create(&output)?)
        .build()?;

    let metrics = pipeline.metrics();
    let handle = pipeline.spawn();
    let completion = handle.join();

    println!("terminal: {completion:?}");
    println!("{}", metrics.snapshot().format());
    completion.into_result()?;

    Ok(())
}
