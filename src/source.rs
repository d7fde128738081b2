use crate::chunk::Chunk;
use crate::error::Result;
use bytes::BytesMut;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::debug;

/// Default chunk size for reader-backed sources, in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// A producer of chunks, pulled by the pipeline on demand.
pub trait Source: Send {
    /// Pull the next chunk. `Ok(None)` signals end of stream and must be
    /// returned again on every later call; the scan is never re-opened.
    /// A medium fault returns an error and leaves the source permanently
    /// errored.
    fn pull(&mut self) -> Result<Option<Chunk>>;

    /// Drop any held resource (file handle, socket). Invoked on end of
    /// stream, fault, and cancellation; must be safe to call repeatedly.
    fn release(&mut self) {}

    /// Human-readable name for logging
    fn name(&self) -> &str {
        "source"
    }
}

/// In-memory source over a fixed list of chunks.
#[derive(Debug)]
pub struct MemorySource {
    items: VecDeque<Chunk>,
}

impl MemorySource {
    /// Create a source yielding the given chunks in order.
    pub fn new<I, C>(items: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Chunk>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    /// Chunks not yet pulled.
    pub fn remaining(&self) -> usize {
        self.items.len()
    }
}

impl Source for MemorySource {
    fn pull(&mut self) -> Result<Option<Chunk>> {
        // An exhausted deque keeps yielding None; the terminal stays
        // idempotent.
        Ok(self.items.pop_front())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Source over any `Read` implementor, producing fixed-size chunks.
///
/// Covers files through [`ReaderSource::open`] and sockets by wrapping a
/// connected `TcpStream`. The reader is dropped as soon as the stream
/// ends, faults, or is cancelled.
pub struct ReaderSource<R: Read + Send> {
    reader: Option<R>,
    chunk_size: usize,
    label: String,
}

impl<R: Read + Send> ReaderSource<R> {
    /// Wrap a reader with the default chunk size.
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, DEFAULT_CHUNK_SIZE)
    }

    /// Wrap a reader producing chunks of at most `chunk_size` bytes.
    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader: Some(reader),
            chunk_size: chunk_size.max(1),
            label: "reader".to_string(),
        }
    }

    /// Whether the underlying reader has been released.
    pub fn is_released(&self) -> bool {
        self.reader.is_none()
    }
}

/// File-backed source
pub type FileSource = ReaderSource<File>;

impl ReaderSource<File> {
    /// Open a file as a chunk source.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        debug!(path = %path.display(), "opened file source");
        let mut source = Self::new(file);
        source.label = path.display().to_string();
        Ok(source)
    }
}

impl<R: Read + Send> Source for ReaderSource<R> {
    fn pull(&mut self) -> Result<Option<Chunk>> {
        if self.reader.is_none() {
            // Ended or errored earlier; stay terminal.
            return Ok(None);
        }
        let mut buf = BytesMut::zeroed(self.chunk_size);
        loop {
            let read = match self.reader.as_mut() {
                Some(reader) => reader.read(&mut buf),
                None => return Ok(None),
            };
            match read {
                Ok(0) => {
                    debug!(source = %self.label, "end of stream");
                    self.release();
                    return Ok(None);
                }
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(Some(Chunk::new(buf.freeze())));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.release();
                    return Err(e.into());
                }
            }
        }
    }

    fn release(&mut self) {
        if self.reader.take().is_some() {
            debug!(source = %self.label, "released source reader");
        }
    }

    fn name(&self) -> &str {
        "reader"
    }
}
