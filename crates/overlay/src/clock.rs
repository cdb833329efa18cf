use std::time::Instant;

/// Snapshot of the time state supplied to the shader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Seconds since the loop started.
    pub seconds: f32,
    /// Frames sampled before this one in the running session.
    pub frame_index: u64,
}

/// Elapsed-time source owned by one render loop.
///
/// `start_instant` is captured once; every later sample is measured from it
/// and clamped so the reported time never goes backwards, even if the caller
/// hands in an older `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    start_instant: Instant,
    last_seconds: f32,
    frame_index: u64,
}

impl FrameClock {
    pub fn start(now: Instant) -> Self {
        Self {
            start_instant: now,
            last_seconds: 0.0,
            frame_index: 0,
        }
    }

    pub fn sample(&mut self, now: Instant) -> TimeSample {
        let elapsed = now.saturating_duration_since(self.start_instant).as_secs_f32();
        let seconds = elapsed.max(self.last_seconds);
        self.last_seconds = seconds;
        let sample = TimeSample {
            seconds,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.saturating_add(1);
        sample
    }
}
