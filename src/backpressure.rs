/// Watermark-based flow control.
///
/// Tracks how many chunks a sink is holding and turns that into the
/// capacity signal returned from `accept`. When the buffered count reaches
/// the high watermark the gauge reports zero capacity; it keeps reporting
/// zero until a drain brings the count down to the low watermark, so a
/// sink hovering around the threshold does not flap between paused and
/// flowing.
#[derive(Debug)]
pub struct WatermarkGauge {
    /// Buffered-chunk count at which capacity drops to zero
    high_watermark: usize,
    /// Count the buffer must drain to before capacity is reported again
    low_watermark: usize,
    buffered: usize,
    paused: bool,
}

impl WatermarkGauge {
    /// Create a gauge with the given high watermark; the low watermark
    /// defaults to half of it.
    pub fn new(high_watermark: usize) -> Self {
        let high = high_watermark.max(1);
        Self::with_watermarks(high, high / 2)
    }

    /// Set custom watermark thresholds. `low` is clamped below `high`.
    pub fn with_watermarks(high: usize, low: usize) -> Self {
        let high = high.max(1);
        Self {
            high_watermark: high,
            low_watermark: low.min(high - 1),
            buffered: 0,
            paused: false,
        }
    }

    /// Record one chunk entering the buffer.
    pub fn record_accept(&mut self) {
        self.buffered += 1;
        if self.buffered >= self.high_watermark {
            self.paused = true;
        }
    }

    /// Record `n` chunks leaving the buffer.
    pub fn record_drain(&mut self, n: usize) {
        self.buffered = self.buffered.saturating_sub(n);
        if self.paused && self.buffered <= self.low_watermark {
            self.paused = false;
        }
    }

    /// Remaining capacity. Zero while paused; upstream must not produce
    /// until a drain lifts the pause.
    pub fn capacity_remaining(&self) -> usize {
        if self.paused {
            0
        } else {
            self.high_watermark - self.buffered
        }
    }

    /// Whether the pause threshold has been hit and not yet drained away.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Chunks currently held.
    pub fn buffered(&self) -> usize {
        self.buffered
    }

    /// The pause threshold.
    pub fn high_watermark(&self) -> usize {
        self.high_watermark
    }
}
