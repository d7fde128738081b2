//! A pull-based chunk transform pipeline with watermark backpressure.
//!
//! This crate models a producer → transformer → consumer chain with explicit
//! flow control: the sink pulls from the transformer, which pulls from the
//! source, only while the sink has spare capacity, and each stage propagates
//! end-of-stream and typed error signals downstream.
//!
//! # Features
//!
//! - Pull-based backpressure with high/low watermark hysteresis
//! - Per-stage state machines with permanent terminal states
//! - Typed faults (I/O, transform with chunk index) and cooperative
//!   cancellation, delivered as exactly one terminal notification per run
//! - Source adapters for in-memory lists and any `Read` (files, sockets)
//! - Sink adapters for in-memory collection and any `Write`
//! - Order-preserving transforms with end-of-stream flush for buffered tails
//! - Per-run metrics: throughput, latency percentiles, backpressure pauses
//!
//! # Example
//!
//! ```
//! use chunkflow::{CollectorSink, MemorySource, Pipeline, Uppercase};
//!
//! let pipeline = Pipeline::builder()
//!     .source(MemorySource::new(["a", "b", "c"]))
//!     .transform(Uppercase)
//!     .sink(CollectorSink::new())
//!     .build()
//!     .unwrap();
//!
//! let completion = pipeline.run();
//! assert!(completion.is_finished());
//! ```

pub mod backpressure;
pub mod chunk;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod state;
pub mod transform;

// Re-exports for convenience
pub use backpressure::WatermarkGauge;
pub use chunk::Chunk;
pub use error::{BoxError, Completion, PipelineError, Result};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use pipeline::{CancelToken, Pipeline, PipelineBuilder, PipelineHandle};
pub use sink::{CollectorHandle, CollectorSink, FileSink, Sink, WriterSink};
pub use source::{FileSource, MemorySource, ReaderSource, Source};
pub use state::{StageState, StreamState};
pub use transform::{
    FilterChunks, HexEncode, Identity, MapChunks, Rechunk, Transform, Uppercase,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
