use crate::chunk::Chunk;
use crate::error::{Completion, PipelineError, Result};
use crate::metrics::PipelineMetrics;
use crate::sink::Sink;
use crate::source::Source;
use crate::state::{StageState, StreamState};
use crate::transform::{Identity, Transform};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{spawn, JoinHandle};
use std::time::Instant;
use tracing::{debug, error};

/// Cooperative cancellation signal shared between a pipeline and its owner.
///
/// Observed at least once per scheduling step of the run loop; on
/// observation the pipeline stops pulling, releases stage resources, and
/// returns [`Completion::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, untripped token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Source wrapped with the state machine it owns.
struct SourceStage {
    inner: Box<dyn Source>,
    state: StageState,
}

impl SourceStage {
    fn new(inner: Box<dyn Source>) -> Self {
        Self {
            inner,
            state: StageState::new(),
        }
    }

    /// Pull one chunk, latching terminal states: an ended source keeps
    /// answering end-of-stream, an errored one refuses further pulls.
    fn pull(&mut self) -> Result<Option<Chunk>> {
        match self.state.get() {
            StreamState::Ended => return Ok(None),
            StreamState::Errored => return Err(PipelineError::Terminated),
            StreamState::Idle => self.state.advance(StreamState::Flowing)?,
            _ => {}
        }
        match self.inner.pull() {
            Ok(Some(chunk)) => Ok(Some(chunk)),
            Ok(None) => {
                self.inner.release();
                self.state.advance(StreamState::Ended)?;
                debug!(stage = self.inner.name(), "source ended");
                Ok(None)
            }
            Err(e) => {
                self.inner.release();
                self.state.advance(StreamState::Errored)?;
                Err(e)
            }
        }
    }

    fn pause(&mut self) -> Result<()> {
        if self.state.get() == StreamState::Flowing {
            self.state.advance(StreamState::Paused)?;
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if self.state.get() == StreamState::Paused {
            self.state.advance(StreamState::Flowing)?;
        }
        Ok(())
    }

    /// Stop without a local fault: release the medium and settle in
    /// `Ended`. Used for cancellation and downstream faults.
    fn settle(&mut self) {
        self.inner.release();
        settle_ended(&mut self.state);
    }
}

/// Transform wrapped with the state machine and chunk counter it owns.
struct TransformStage {
    inner: Box<dyn Transform>,
    state: StageState,
    index: u64,
}

impl TransformStage {
    fn new(inner: Box<dyn Transform>) -> Self {
        Self {
            inner,
            state: StageState::new(),
            index: 0,
        }
    }

    /// Feed one chunk through the mapping. A mapping fault is surfaced as
    /// a transform error carrying the zero-based index of the offending
    /// chunk, and the stage refuses further input.
    fn submit(&mut self, chunk: Chunk) -> Result<Option<Chunk>> {
        match self.state.get() {
            StreamState::Ended | StreamState::Errored => {
                return Err(PipelineError::Terminated)
            }
            StreamState::Idle => self.state.advance(StreamState::Flowing)?,
            _ => {}
        }
        let index = self.index;
        self.index += 1;
        match self.inner.apply(chunk) {
            Ok(out) => Ok(out),
            Err(cause) => {
                fail_errored(&mut self.state);
                Err(PipelineError::Transform { index, cause })
            }
        }
    }

    /// Flush the buffered tail on upstream end of stream, then end.
    fn finish(&mut self) -> Result<Option<Chunk>> {
        if self.state.get() == StreamState::Idle {
            self.state.advance(StreamState::Flowing)?;
        }
        match self.inner.flush() {
            Ok(tail) => {
                self.state.advance(StreamState::Ended)?;
                Ok(tail)
            }
            Err(cause) => {
                fail_errored(&mut self.state);
                Err(PipelineError::Transform {
                    index: self.index,
                    cause,
                })
            }
        }
    }

    fn pause(&mut self) -> Result<()> {
        if self.state.get() == StreamState::Flowing {
            self.state.advance(StreamState::Paused)?;
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if self.state.get() == StreamState::Paused {
            self.state.advance(StreamState::Flowing)?;
        }
        Ok(())
    }

    fn settle(&mut self) {
        settle_ended(&mut self.state);
    }
}

/// Sink wrapped with the state machine it owns.
struct SinkStage {
    inner: Box<dyn Sink>,
    state: StageState,
}

impl SinkStage {
    fn new(inner: Box<dyn Sink>) -> Self {
        Self {
            inner,
            state: StageState::new(),
        }
    }

    fn accept(&mut self, chunk: Chunk) -> Result<usize> {
        match self.state.get() {
            StreamState::Ended | StreamState::Errored => {
                return Err(PipelineError::Terminated)
            }
            StreamState::Idle => self.state.advance(StreamState::Flowing)?,
            _ => {}
        }
        match self.inner.accept(chunk) {
            Ok(capacity) => Ok(capacity),
            Err(e) => {
                self.inner.abort();
                fail_errored(&mut self.state);
                Err(e)
            }
        }
    }

    fn drain(&mut self) -> Result<usize> {
        match self.inner.drain() {
            Ok(capacity) => Ok(capacity),
            Err(e) => {
                self.inner.abort();
                fail_errored(&mut self.state);
                Err(e)
            }
        }
    }

    fn finish(&mut self) -> Result<()> {
        if self.state.get() == StreamState::Idle {
            self.state.advance(StreamState::Flowing)?;
        }
        self.resume()?;
        match self.inner.finish() {
            Ok(()) => {
                self.state.advance(StreamState::Ended)?;
                debug!(stage = self.inner.name(), "sink finished");
                Ok(())
            }
            Err(e) => {
                fail_errored(&mut self.state);
                Err(e)
            }
        }
    }

    /// Abandon finalization after an upstream fault.
    fn abort(&mut self) {
        self.inner.abort();
        fail_errored(&mut self.state);
    }

    /// Stop without a fault (cancellation): abandon finalization but
    /// settle in `Ended`.
    fn settle(&mut self) {
        self.inner.abort();
        settle_ended(&mut self.state);
    }

    fn pause(&mut self) -> Result<()> {
        if self.state.get() == StreamState::Flowing {
            self.state.advance(StreamState::Paused)?;
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if self.state.get() == StreamState::Paused {
            self.state.advance(StreamState::Flowing)?;
        }
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.state.get() == StreamState::Paused
    }
}

/// Drive a non-terminal state to `Ended` through whatever legal steps
/// remain.
fn settle_ended(state: &mut StageState) {
    match state.get() {
        StreamState::Idle => {
            let _ = state.advance(StreamState::Flowing);
            let _ = state.advance(StreamState::Ended);
        }
        StreamState::Paused => {
            let _ = state.advance(StreamState::Flowing);
            let _ = state.advance(StreamState::Ended);
        }
        StreamState::Flowing => {
            let _ = state.advance(StreamState::Ended);
        }
        _ => {}
    }
}

/// Drive a non-terminal state to `Errored`.
fn fail_errored(state: &mut StageState) {
    if state.get() == StreamState::Idle {
        let _ = state.advance(StreamState::Flowing);
    }
    if !state.get().is_terminal() {
        let _ = state.advance(StreamState::Errored);
    }
}

/// Builder for a source → transform → sink pipeline
pub struct PipelineBuilder {
    source: Option<Box<dyn Source>>,
    transform: Box<dyn Transform>,
    sink: Option<Box<dyn Sink>>,
    cancel: CancelToken,
}

impl PipelineBuilder {
    /// Create a new builder. The transform defaults to [`Identity`].
    pub fn new() -> Self {
        Self {
            source: None,
            transform: Box::new(Identity),
            sink: None,
            cancel: CancelToken::new(),
        }
    }

    /// Set the source stage.
    pub fn source(mut self, source: impl Source + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Set the transform stage.
    pub fn transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transform = Box::new(transform);
        self
    }

    /// Set the sink stage.
    pub fn sink(mut self, sink: impl Sink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Share an externally owned cancel token.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Build the pipeline.
    pub fn build(self) -> Result<Pipeline> {
        let source = self
            .source
            .ok_or_else(|| PipelineError::Config("pipeline has no source".into()))?;
        let sink = self
            .sink
            .ok_or_else(|| PipelineError::Config("pipeline has no sink".into()))?;
        Ok(Pipeline {
            source: SourceStage::new(source),
            transform: TransformStage::new(self.transform),
            sink: SinkStage::new(sink),
            cancel: self.cancel,
            metrics: PipelineMetrics::new(),
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One source → transform → sink run with pull-based backpressure.
///
/// The sink's capacity signal gates the loop: while it reports zero the
/// source is not polled again until a drain frees space. The owner
/// receives exactly one [`Completion`] per run.
pub struct Pipeline {
    source: SourceStage,
    transform: TransformStage,
    sink: SinkStage,
    cancel: CancelToken,
    metrics: PipelineMetrics,
}

impl Pipeline {
    /// Start building a pipeline.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// A token that cancels this run when tripped.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// A live view of this run's metrics.
    pub fn metrics(&self) -> PipelineMetrics {
        self.metrics.clone()
    }

    /// Run to completion on the calling thread.
    pub fn run(mut self) -> Completion {
        let completion = self.drive();
        match &completion {
            Completion::Finished => debug!("pipeline finished"),
            Completion::Errored(e) => error!(error = %e, "pipeline errored"),
            Completion::Cancelled => debug!("pipeline cancelled"),
        }
        completion
    }

    /// Run on a worker thread; independent pipelines run in parallel.
    pub fn spawn(self) -> PipelineHandle {
        let cancel = self.cancel.clone();
        let metrics = self.metrics.clone();
        let handle = spawn(move || self.run());
        PipelineHandle {
            handle,
            cancel,
            metrics,
        }
    }

    fn drive(&mut self) -> Completion {
        loop {
            // One cancellation check per scheduling step.
            if self.cancel.is_cancelled() {
                self.source.settle();
                self.transform.settle();
                self.sink.settle();
                return Completion::Cancelled;
            }

            // A paused sink must drain before anything is pulled upstream.
            if self.sink.is_paused() {
                match self.sink.drain() {
                    Ok(0) => continue,
                    Ok(_) => {
                        if let Err(e) = self.resume_stages() {
                            return self.fail(e);
                        }
                    }
                    Err(e) => return self.fail(e),
                }
            }

            match self.source.pull() {
                Ok(Some(chunk)) => {
                    self.metrics.record_pulled();
                    let pulled_at = Instant::now();
                    match self.transform.submit(chunk) {
                        Ok(Some(out)) => {
                            self.metrics.record_emitted();
                            if let Err(e) = self.deliver(out, pulled_at) {
                                return self.fail(e);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => return self.fail(e),
                    }
                }
                Ok(None) => return self.finish_run(),
                Err(e) => return self.fail(e),
            }
        }
    }

    /// Hand one chunk to the sink, pausing the pipeline when capacity
    /// runs out.
    fn deliver(&mut self, chunk: Chunk, pulled_at: Instant) -> Result<()> {
        let capacity = self.sink.accept(chunk)?;
        self.metrics.record_delivered();
        self.metrics
            .record_latency(pulled_at.elapsed().as_nanos() as u64);
        if capacity == 0 {
            self.metrics.record_pause();
            self.source.pause()?;
            self.transform.pause()?;
            self.sink.pause()?;
        }
        Ok(())
    }

    fn resume_stages(&mut self) -> Result<()> {
        self.sink.resume()?;
        self.transform.resume()?;
        self.source.resume()?;
        Ok(())
    }

    /// Success path: flush the transform tail, finalize the sink.
    fn finish_run(&mut self) -> Completion {
        match self.transform.finish() {
            Ok(Some(tail)) => {
                self.metrics.record_emitted();
                if self.sink.is_paused() {
                    match self.sink.drain() {
                        Ok(_) => {
                            if let Err(e) = self.resume_stages() {
                                return self.fail(e);
                            }
                        }
                        Err(e) => return self.fail(e),
                    }
                }
                if let Err(e) = self.deliver(tail, Instant::now()) {
                    return self.fail(e);
                }
            }
            Ok(None) => {}
            Err(e) => return self.fail(e),
        }
        match self.sink.finish() {
            Ok(()) => Completion::Finished,
            Err(e) => self.fail(e),
        }
    }

    /// Fault path: halt the untouched stages, abort sink finalization,
    /// surface the typed error once.
    fn fail(&mut self, e: PipelineError) -> Completion {
        self.source.settle();
        self.transform.settle();
        if !self.sink.state.get().is_terminal() {
            self.sink.abort();
        }
        Completion::Errored(e)
    }
}

/// Handle to a spawned pipeline
pub struct PipelineHandle {
    handle: JoinHandle<Completion>,
    cancel: CancelToken,
    metrics: PipelineMetrics,
}

impl PipelineHandle {
    /// Request cooperative cancellation of the running pipeline.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The run's cancel token.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// A live view of the run's metrics.
    pub fn metrics(&self) -> PipelineMetrics {
        self.metrics.clone()
    }

    /// Wait for the run's terminal notification.
    pub fn join(self) -> Completion {
        match self.handle.join() {
            Ok(completion) => completion,
            Err(_) => Completion::Errored(PipelineError::Thread(
                "pipeline worker panicked".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectorSink;
    use crate::source::MemorySource;

    #[test]
    fn test_builder_requires_source_and_sink() {
        let result = Pipeline::builder().build();
        assert!(matches!(result, Err(PipelineError::Config(_))));

        let result = Pipeline::builder()
            .source(MemorySource::new(Vec::<Chunk>::new()))
            .build();
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_empty_source_finishes() {
        let pipeline = Pipeline::builder()
            .source(MemorySource::new(Vec::<Chunk>::new()))
            .sink(CollectorSink::new())
            .build()
            .unwrap();
        assert!(pipeline.run().is_finished());
    }

    #[test]
    fn test_cancel_before_run() {
        let pipeline = Pipeline::builder()
            .source(MemorySource::new(["a", "b"]))
            .sink(CollectorSink::new())
            .build()
            .unwrap();
        pipeline.cancel_token().cancel();
        assert!(matches!(pipeline.run(), Completion::Cancelled));
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
