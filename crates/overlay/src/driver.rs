//! Render Loop Driver.
//!
//! ```text
//!   Idle ──start──▶ Running ──stop / context lost / slot failure──▶ Stopped
//! ```
//!
//! `Stopped` is terminal. Each display refresh carries a [`FrameRequest`];
//! the driver only draws for the request it is currently waiting on, so a
//! firing that was already queued when `stop` ran is a no-op.

use std::time::{Duration, Instant};

use crate::backend::GraphicsBackend;
use crate::clock::FrameClock;
use crate::error::OverlayError;
use crate::geometry::QuadGeometry;
use crate::program::{CompiledProgram, SlotHandle};
use crate::schedule::{FrameRequest, RefreshScheduler};
use crate::shaders::{POSITION_INPUT, RESOLUTION_INPUT, TIME_INPUT};
use crate::surface::DrawSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
}

impl LoopState {
    fn label(self) -> &'static str {
        match self {
            LoopState::Idle => "idle",
            LoopState::Running => "running",
            LoopState::Stopped => "stopped",
        }
    }
}

/// Values one drawn frame pushed into the program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSample {
    pub seconds: f32,
    pub frame_index: u64,
    pub resolution: (u32, u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    Drawn(FrameSample),
    /// The firing was stale, cancelled, or arrived after the loop stopped.
    Skipped,
}

struct LoopResources<B: GraphicsBackend> {
    program: CompiledProgram<B>,
    geometry: QuadGeometry<B>,
    time: SlotHandle<B>,
    resolution: SlotHandle<B>,
    position: SlotHandle<B>,
}

impl<B: GraphicsBackend> LoopResources<B> {
    fn resolve(
        program: CompiledProgram<B>,
        geometry: QuadGeometry<B>,
    ) -> Result<Self, OverlayError> {
        let time = program.input_slot(TIME_INPUT)?;
        let resolution = program.input_slot(RESOLUTION_INPUT)?;
        let position = program.input_slot(POSITION_INPUT)?;
        Ok(Self {
            program,
            geometry,
            time,
            resolution,
            position,
        })
    }

    fn release(self) {
        self.program.dispose();
        self.geometry.dispose();
    }
}

/// Counts drawn frames and logs the rate once per second.
#[derive(Debug, Clone, Copy)]
struct FrameStats {
    drawn: u64,
    window_start: Option<Instant>,
    window_frames: u32,
}

impl FrameStats {
    const WINDOW: Duration = Duration::from_secs(1);

    fn new() -> Self {
        Self {
            drawn: 0,
            window_start: None,
            window_frames: 0,
        }
    }

    fn record(&mut self, now: Instant) {
        self.drawn += 1;
        self.window_frames += 1;
        let start = *self.window_start.get_or_insert(now);
        let elapsed = now.saturating_duration_since(start);
        if elapsed >= Self::WINDOW {
            let fps = self.window_frames as f32 / elapsed.as_secs_f32();
            tracing::debug!(fps = fps, frames = self.drawn, "render stats");
            self.window_start = Some(now);
            self.window_frames = 0;
        }
    }
}

/// Drives one program over one surface, one frame per display refresh.
pub struct RenderLoop<B: GraphicsBackend> {
    state: LoopState,
    clock: Option<FrameClock>,
    pending: Option<FrameRequest>,
    resources: Option<LoopResources<B>>,
    stats: FrameStats,
}

impl<B: GraphicsBackend> std::fmt::Debug for RenderLoop<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoop")
            .field("state", &self.state)
            .field("pending", &self.pending)
            .field("frames_drawn", &self.stats.drawn)
            .finish()
    }
}

impl<B: GraphicsBackend> Default for RenderLoop<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: GraphicsBackend> RenderLoop<B> {
    pub fn new() -> Self {
        Self {
            state: LoopState::Idle,
            clock: None,
            pending: None,
            resources: None,
            stats: FrameStats::new(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn frames_drawn(&self) -> u64 {
        self.stats.drawn
    }

    pub fn pending(&self) -> Option<FrameRequest> {
        self.pending
    }

    /// Takes ownership of the program and geometry, captures the start
    /// instant and schedules the first frame.
    ///
    /// If the program lacks one of the driver's inputs the loop moves straight
    /// to `Stopped` and both resources are released before the error returns.
    pub fn start(
        &mut self,
        program: CompiledProgram<B>,
        geometry: QuadGeometry<B>,
        surface: &DrawSurface,
        scheduler: &mut dyn RefreshScheduler,
        now: Instant,
    ) -> Result<(), OverlayError> {
        if self.state != LoopState::Idle {
            return Err(OverlayError::DriverStopped(self.state.label()));
        }
        let resources = match LoopResources::resolve(program, geometry) {
            Ok(resources) => resources,
            Err(err) => {
                // `resolve` consumed both resources; they dropped on its error path.
                self.state = LoopState::Stopped;
                return Err(err);
            }
        };

        resources.program.activate();
        if let Err(err) = resources.geometry.bind(&resources.position) {
            resources.release();
            self.state = LoopState::Stopped;
            return Err(err);
        }

        self.resources = Some(resources);
        self.clock = Some(FrameClock::start(now));
        self.state = LoopState::Running;
        self.pending = Some(scheduler.request_frame());
        tracing::debug!(
            width = surface.width_px,
            height = surface.height_px,
            "render loop started"
        );
        Ok(())
    }

    /// Handles one display-refresh firing.
    ///
    /// `surface` is read once, so a resize delivered after this call starts
    /// only affects the next frame.
    pub fn frame(
        &mut self,
        request: FrameRequest,
        surface: &DrawSurface,
        scheduler: &mut dyn RefreshScheduler,
        now: Instant,
    ) -> Result<FrameOutcome, OverlayError> {
        if self.state != LoopState::Running || self.pending != Some(request) {
            tracing::trace!(request = request.id(), "skipping stale frame request");
            return Ok(FrameOutcome::Skipped);
        }
        self.pending = None;

        let (Some(resources), Some(clock)) = (&self.resources, &mut self.clock) else {
            return Ok(FrameOutcome::Skipped);
        };
        let resolution = (surface.width_px, surface.height_px);
        let time = clock.sample(now);

        resources.program.activate();
        let drawn = resources
            .program
            .write_scalar(&resources.time, time.seconds)
            .and_then(|()| {
                resources.program.write_vec2(
                    &resources.resolution,
                    resolution.0 as f32,
                    resolution.1 as f32,
                )
            })
            .and_then(|()| resources.geometry.bind(&resources.position));
        if let Err(err) = drawn {
            self.halt(scheduler);
            return Err(err);
        }
        resources
            .program
            .backend()
            .draw_triangle_strip(0, resources.geometry.vertex_count());

        if resources.program.backend().context_lost() {
            tracing::warn!(frame = time.frame_index, "graphics context lost; stopping render loop");
            self.halt(scheduler);
            return Err(OverlayError::ContextLost);
        }

        self.stats.record(now);
        self.pending = Some(scheduler.request_frame());
        Ok(FrameOutcome::Drawn(FrameSample {
            seconds: time.seconds,
            frame_index: time.frame_index,
            resolution,
        }))
    }

    /// Stops the loop, cancels any pending refresh and releases the program,
    /// shaders, and geometry. Calling it again is a no-op.
    pub fn stop(&mut self, scheduler: &mut dyn RefreshScheduler) {
        if self.state == LoopState::Stopped {
            return;
        }
        self.halt(scheduler);
        tracing::debug!(frames = self.stats.drawn, "render loop stopped");
    }

    fn halt(&mut self, scheduler: &mut dyn RefreshScheduler) {
        if let Some(request) = self.pending.take() {
            scheduler.cancel_frame(request);
        }
        if let Some(resources) = self.resources.take() {
            resources.release();
        }
        self.clock = None;
        self.state = LoopState::Stopped;
    }
}

impl<B: GraphicsBackend> Drop for RenderLoop<B> {
    fn drop(&mut self) {
        // Without a scheduler the pending request cannot be cancelled, but the
        // state check in `frame` already ignores it.
        if let Some(resources) = self.resources.take() {
            resources.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::recording::RecordingBackend;
    use crate::schedule::ManualRefresh;
    use crate::shaders::{CrtTuning, ShaderSources};

    fn resources(backend: &Rc<RecordingBackend>) -> (CompiledProgram<RecordingBackend>, QuadGeometry<RecordingBackend>) {
        let program =
            CompiledProgram::compile(backend.clone(), &ShaderSources::crt(&CrtTuning::default()))
                .unwrap();
        let geometry = QuadGeometry::create(backend.clone()).unwrap();
        (program, geometry)
    }

    #[test]
    fn start_schedules_the_first_frame() {
        let backend = Rc::new(RecordingBackend::new());
        let (program, geometry) = resources(&backend);
        let origin = Instant::now();
        let mut display = ManualRefresh::new(origin, 60);
        let mut driver = RenderLoop::new();

        driver
            .start(program, geometry, &DrawSurface::new(640, 480), &mut display, origin)
            .unwrap();
        assert_eq!(driver.state(), LoopState::Running);
        assert_eq!(driver.pending(), display.pending());
    }

    #[test]
    fn restarting_is_refused() {
        let backend = Rc::new(RecordingBackend::new());
        let origin = Instant::now();
        let mut display = ManualRefresh::new(origin, 60);
        let mut driver = RenderLoop::new();
        let surface = DrawSurface::new(640, 480);

        let (program, geometry) = resources(&backend);
        driver.start(program, geometry, &surface, &mut display, origin).unwrap();
        driver.stop(&mut display);

        let (program, geometry) = resources(&backend);
        let err = driver
            .start(program, geometry, &surface, &mut display, origin)
            .unwrap_err();
        assert!(matches!(err, OverlayError::DriverStopped("stopped")));
        // The rejected resources were dropped, not leaked.
        assert_eq!(backend.live_objects(), 0);
    }

    #[test]
    fn missing_resolution_input_stops_and_releases() {
        let backend = Rc::new(RecordingBackend::new());
        let sources = ShaderSources::new(
            "attribute vec2 position;\nvoid main() { gl_Position = vec4(position, 0.0, 1.0); }\n",
            "precision mediump float;\nuniform float time;\nvoid main() { gl_FragColor = vec4(time); }\n",
        );
        let program = CompiledProgram::compile(backend.clone(), &sources).unwrap();
        let geometry = QuadGeometry::create(backend.clone()).unwrap();
        let origin = Instant::now();
        let mut display = ManualRefresh::new(origin, 60);
        let mut driver = RenderLoop::new();

        let err = driver
            .start(program, geometry, &DrawSurface::new(1, 1), &mut display, origin)
            .unwrap_err();
        assert!(matches!(err, OverlayError::UnknownInput { ref name } if name == "resolution"));
        assert_eq!(driver.state(), LoopState::Stopped);
        assert_eq!(display.pending(), None);
        assert_eq!(backend.deleted_programs(), 1);
        assert_eq!(backend.deleted_geometries(), 1);
    }

    #[test]
    fn foreign_request_is_skipped() {
        let backend = Rc::new(RecordingBackend::new());
        let (program, geometry) = resources(&backend);
        let origin = Instant::now();
        let mut display = ManualRefresh::new(origin, 60);
        let mut driver = RenderLoop::new();
        let surface = DrawSurface::new(640, 480);
        driver.start(program, geometry, &surface, &mut display, origin).unwrap();

        let outcome = driver
            .frame(FrameRequest::new(999), &surface, &mut display, origin)
            .unwrap();
        assert_eq!(outcome, FrameOutcome::Skipped);
        assert!(backend.draws().is_empty());
    }

    #[test]
    fn stats_window_rolls_over_each_second() {
        let origin = Instant::now();
        let mut stats = FrameStats::new();
        for i in 0..=60u32 {
            stats.record(origin + Duration::from_secs(1) * i / 60);
        }
        assert_eq!(stats.drawn, 61);
        assert_eq!(stats.window_frames, 0);
    }
}
