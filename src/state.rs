use crate::error::{PipelineError, Result};

/// Lifecycle state of a single pipeline stage.
///
/// `Ended` and `Errored` are terminal: once entered, a stage never leaves
/// them and never emits another chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Created, nothing pulled or pushed yet.
    Idle,
    /// Actively producing or consuming chunks.
    Flowing,
    /// Halted by a backpressure signal, waiting for drain.
    Paused,
    /// Completed successfully.
    Ended,
    /// Failed permanently.
    Errored,
}

impl StreamState {
    /// Whether this state permits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::Ended | StreamState::Errored)
    }

    /// Whether a transition from `self` to `next` is legal.
    pub fn can_transition_to(self, next: StreamState) -> bool {
        use StreamState::*;
        matches!(
            (self, next),
            (Idle, Flowing)
                | (Flowing, Paused)
                | (Paused, Flowing)
                | (Flowing, Ended)
                | (Flowing, Errored)
                | (Paused, Errored)
        )
    }
}

/// State cell owned by exactly one stage.
///
/// Every transition goes through [`advance`](StageState::advance), which
/// rejects anything outside the legal table, so a terminal state can never
/// be left by accident.
#[derive(Debug)]
pub struct StageState {
    current: StreamState,
}

impl StageState {
    /// New stage state, starting in `Idle`.
    pub fn new() -> Self {
        Self {
            current: StreamState::Idle,
        }
    }

    /// The current state.
    pub fn get(&self) -> StreamState {
        self.current
    }

    /// Move to `next`, failing on an illegal transition.
    pub fn advance(&mut self, next: StreamState) -> Result<()> {
        if !self.current.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        self.current = next;
        Ok(())
    }
}

impl Default for StageState {
    fn default() -> Self {
        Self::new()
    }
}
