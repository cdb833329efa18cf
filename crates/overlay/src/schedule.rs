//! Display-refresh scheduling.
//!
//! Types:
//!
//! - `FrameRequest`: token for one scheduled refresh callback.
//! - `RefreshScheduler`: request/cancel seam over the platform primitive.
//! - `ManualRefresh`: simulated display used by tests and `tvguide simulate`.

use std::time::{Duration, Instant};

/// Token identifying one pending display-refresh callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(u64);

impl FrameRequest {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

/// Platform primitive that calls back once at the next display refresh.
pub trait RefreshScheduler {
    fn request_frame(&mut self) -> FrameRequest;
    /// After this returns, a firing carrying `request` must be ignored.
    fn cancel_frame(&mut self, request: FrameRequest);
}

/// A display that refreshes only when [`ManualRefresh::advance`] is called.
#[derive(Debug, Clone)]
pub struct ManualRefresh {
    now: Instant,
    interval: Duration,
    next_id: u64,
    pending: Option<FrameRequest>,
    cancelled: u64,
}

impl ManualRefresh {
    pub fn new(origin: Instant, refresh_hz: u32) -> Self {
        let interval = Duration::from_secs(1) / refresh_hz.max(1);
        Self {
            now: origin,
            interval,
            next_id: 0,
            pending: None,
            cancelled: 0,
        }
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn pending(&self) -> Option<FrameRequest> {
        self.pending
    }

    /// Number of requests cancelled so far.
    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }

    /// Moves time forward by one refresh interval and fires the pending
    /// request, if any.
    pub fn advance(&mut self) -> Option<(FrameRequest, Instant)> {
        self.now += self.interval;
        self.pending.take().map(|request| (request, self.now))
    }
}

impl RefreshScheduler for ManualRefresh {
    fn request_frame(&mut self) -> FrameRequest {
        self.next_id += 1;
        let request = FrameRequest(self.next_id);
        self.pending = Some(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending == Some(request) {
            self.pending = None;
            self.cancelled += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_fires_the_pending_request_once() {
        let origin = Instant::now();
        let mut display = ManualRefresh::new(origin, 60);
        assert!(display.advance().is_none());

        let request = display.request_frame();
        let (fired, at) = display.advance().unwrap();
        assert_eq!(fired, request);
        assert_eq!(at, origin + display.interval() * 2);
        assert!(display.advance().is_none());
    }

    #[test]
    fn cancelled_request_never_fires() {
        let mut display = ManualRefresh::new(Instant::now(), 60);
        let request = display.request_frame();
        display.cancel_frame(request);
        assert_eq!(display.cancelled(), 1);
        assert!(display.advance().is_none());
    }

    #[test]
    fn tokens_are_unique() {
        let mut display = ManualRefresh::new(Instant::now(), 60);
        let a = display.request_frame();
        let b = display.request_frame();
        assert_ne!(a, b);
        assert_eq!(display.pending(), Some(b));
    }
}
