use crate::backpressure::WatermarkGauge;
use crate::chunk::Chunk;
use crate::error::{PipelineError, Result};
use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default pending-buffer high watermark, in chunks
pub const DEFAULT_SINK_CAPACITY: usize = 16;

/// A consumer of transformed chunks with explicit capacity signaling.
pub trait Sink: Send {
    /// Deliver one chunk. Returns the remaining capacity; zero obliges the
    /// caller to stop producing and call [`drain`](Sink::drain) before
    /// delivering more. Delivering into a full buffer is a contract
    /// violation and fails with [`PipelineError::BufferFull`].
    fn accept(&mut self, chunk: Chunk) -> Result<usize>;

    /// Move buffered chunks to the underlying medium, returning the freed
    /// capacity.
    fn drain(&mut self) -> Result<usize>;

    /// Finalize owned resources after end of stream. Runs at most once;
    /// later calls are no-ops.
    fn finish(&mut self) -> Result<()>;

    /// Abandon pending finalization after an upstream fault. Output
    /// already delivered to the medium is never rolled back; what happens
    /// to buffered-but-undrained chunks is documented per adapter.
    fn abort(&mut self) {}

    /// Human-readable name for logging
    fn name(&self) -> &str {
        "sink"
    }
}

/// In-memory sink collecting every accepted chunk.
///
/// [`handle`](CollectorSink::handle) returns a shared view that stays
/// valid after the sink moves into a pipeline. On `abort`, pending chunks
/// are moved into the collected output as well: for an in-memory medium,
/// acceptance is delivery.
pub struct CollectorSink {
    pending: ArrayQueue<Chunk>,
    gauge: WatermarkGauge,
    collected: Arc<Mutex<Vec<Chunk>>>,
    finished: Arc<AtomicBool>,
}

impl CollectorSink {
    /// Create a collector with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SINK_CAPACITY)
    }

    /// Create a collector whose high watermark is `capacity` chunks.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            pending: ArrayQueue::new(capacity),
            gauge: WatermarkGauge::new(capacity),
            collected: Arc::new(Mutex::new(Vec::new())),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A shared view of the collected output.
    pub fn handle(&self) -> CollectorHandle {
        CollectorHandle {
            collected: Arc::clone(&self.collected),
            finished: Arc::clone(&self.finished),
        }
    }

    /// Whether `finish` has run.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }
}

impl Default for CollectorSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for CollectorSink {
    fn accept(&mut self, chunk: Chunk) -> Result<usize> {
        if self.gauge.capacity_remaining() == 0 {
            return Err(PipelineError::BufferFull);
        }
        self.pending
            .push(chunk)
            .map_err(|_| PipelineError::BufferFull)?;
        self.gauge.record_accept();
        Ok(self.gauge.capacity_remaining())
    }

    fn drain(&mut self) -> Result<usize> {
        let mut collected = self.collected.lock();
        let mut moved = 0;
        while let Some(chunk) = self.pending.pop() {
            collected.push(chunk);
            moved += 1;
        }
        self.gauge.record_drain(moved);
        Ok(self.gauge.capacity_remaining())
    }

    fn finish(&mut self) -> Result<()> {
        if self.is_finished() {
            return Ok(());
        }
        self.drain()?;
        self.finished.store(true, Ordering::Relaxed);
        debug!(collected = self.collected.lock().len(), "collector finished");
        Ok(())
    }

    fn abort(&mut self) {
        let _ = self.drain();
    }

    fn name(&self) -> &str {
        "collector"
    }
}

/// Shared view of a [`CollectorSink`]'s output.
#[derive(Clone)]
pub struct CollectorHandle {
    collected: Arc<Mutex<Vec<Chunk>>>,
    finished: Arc<AtomicBool>,
}

impl CollectorHandle {
    /// The chunks collected so far, in delivery order.
    pub fn chunks(&self) -> Vec<Chunk> {
        self.collected.lock().clone()
    }

    /// Number of chunks collected so far.
    pub fn len(&self) -> usize {
        self.collected.lock().len()
    }

    /// Whether nothing has been collected yet.
    pub fn is_empty(&self) -> bool {
        self.collected.lock().is_empty()
    }

    /// Whether the sink finalized.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }
}

/// Sink over any `Write` implementor.
///
/// Covers files through [`WriterSink::create`] and sockets by wrapping a
/// connected `TcpStream`. Drained chunks are written verbatim, in order.
/// On `abort`, buffered-but-undrained chunks are discarded; bytes already
/// written stay written.
pub struct WriterSink<W: Write + Send> {
    writer: Option<W>,
    pending: ArrayQueue<Chunk>,
    gauge: WatermarkGauge,
    finished: bool,
    label: String,
}

impl<W: Write + Send> WriterSink<W> {
    /// Wrap a writer with the default capacity.
    pub fn new(writer: W) -> Self {
        Self::with_capacity(writer, DEFAULT_SINK_CAPACITY)
    }

    /// Wrap a writer whose high watermark is `capacity` chunks.
    pub fn with_capacity(writer: W, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            writer: Some(writer),
            pending: ArrayQueue::new(capacity),
            gauge: WatermarkGauge::new(capacity),
            finished: false,
            label: "writer".to_string(),
        }
    }

    /// Whether the underlying writer has been released.
    pub fn is_released(&self) -> bool {
        self.writer.is_none()
    }
}

/// File-backed sink
pub type FileSink = WriterSink<File>;

impl WriterSink<File> {
    /// Create (or truncate) a file as a chunk sink.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        debug!(path = %path.display(), "created file sink");
        let mut sink = Self::new(file);
        sink.label = path.display().to_string();
        Ok(sink)
    }
}

impl<W: Write + Send> Sink for WriterSink<W> {
    fn accept(&mut self, chunk: Chunk) -> Result<usize> {
        if self.writer.is_none() {
            return Err(PipelineError::Terminated);
        }
        if self.gauge.capacity_remaining() == 0 {
            return Err(PipelineError::BufferFull);
        }
        self.pending
            .push(chunk)
            .map_err(|_| PipelineError::BufferFull)?;
        self.gauge.record_accept();
        Ok(self.gauge.capacity_remaining())
    }

    fn drain(&mut self) -> Result<usize> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(PipelineError::Terminated);
        };
        let mut moved = 0;
        let mut fault = None;
        while let Some(chunk) = self.pending.pop() {
            if let Err(e) = writer.write_all(chunk.as_bytes()) {
                fault = Some(e);
                break;
            }
            moved += 1;
        }
        self.gauge.record_drain(moved);
        match fault {
            // Whatever was written before the fault stays written.
            Some(e) => {
                self.writer = None;
                Err(e.into())
            }
            None => Ok(self.gauge.capacity_remaining()),
        }
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.drain()?;
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        self.finished = true;
        debug!(sink = %self.label, "writer finished");
        Ok(())
    }

    fn abort(&mut self) {
        let dropped = self.pending.len();
        while self.pending.pop().is_some() {}
        self.gauge.record_drain(dropped);
        if dropped > 0 {
            warn!(sink = %self.label, dropped, "discarded pending chunks on abort");
        }
        self.writer = None;
    }

    fn name(&self) -> &str {
        "writer"
    }
}
