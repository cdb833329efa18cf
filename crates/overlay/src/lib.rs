//! Full-screen CRT distortion overlay.
//!
//! The crate owns one shader-driven quad stretched over the whole viewport and
//! redraws it once per display refresh. The flow for one mount is:
//!
//! ```text
//!   Overlay::mount
//!      │
//!      ├─▶ SurfaceManager::initialize ──▶ DrawSurface (viewport px)
//!      ├─▶ CompiledProgram::compile   ──▶ slots: time / resolution / position
//!      ├─▶ QuadGeometry::create       ──▶ 4-vertex triangle strip
//!      └─▶ RenderLoop::start ──▶ RefreshScheduler::request_frame
//!                                   │
//!            refresh fires ─────────┘
//!            RenderLoop::frame: time = now - start, resolution = surface
//!                               draw strip, request next frame
//! ```
//!
//! Everything is written against [`GraphicsBackend`]. The desktop host in
//! [`window`] pairs [`GlowBackend`] with a glutin surface and winit redraw
//! requests; tests and `tvguide simulate` pair [`RecordingBackend`] with a
//! [`HeadlessSurface`] and [`ManualRefresh`].

use std::rc::Rc;
use std::time::Instant;

pub mod backend;
pub mod clock;
pub mod config;
pub mod driver;
mod error;
pub mod geometry;
pub mod gl;
pub mod program;
pub mod recording;
pub mod schedule;
pub mod shaders;
pub mod surface;
pub mod window;

pub use backend::{GlslDialect, GraphicsBackend, ShaderStage};
pub use config::{ConfigError, OverlayConfig};
pub use driver::{FrameOutcome, FrameSample, LoopState, RenderLoop};
pub use error::{OverlayError, SlotKind};
pub use gl::GlowBackend;
pub use recording::{HeadlessSurface, RecordingBackend};
pub use schedule::{FrameRequest, ManualRefresh, RefreshScheduler};
pub use shaders::{CrtTuning, ShaderSources};
pub use surface::{DrawSurface, PlatformSurface, SurfaceManager};

use geometry::QuadGeometry;
use program::CompiledProgram;

/// One mounted overlay: a surface plus the loop drawing into it.
///
/// Dropping an overlay tears it down like [`Overlay::unmount`], except that a
/// queued refresh cannot be cancelled without the scheduler; the loop ignores
/// it instead.
#[derive(Debug)]
pub struct Overlay<B: GraphicsBackend, S: PlatformSurface> {
    // Declared first so GL objects are released before the surface goes away.
    driver: RenderLoop<B>,
    surface: SurfaceManager<B, S>,
}

impl<B: GraphicsBackend, S: PlatformSurface> Overlay<B, S> {
    /// Initialises the surface, compiles `sources`, uploads the quad and
    /// starts the loop. Anything acquired before a failure is released before
    /// the error is returned.
    pub fn mount(
        backend: Rc<B>,
        platform: S,
        sources: &ShaderSources,
        scheduler: &mut dyn RefreshScheduler,
        now: Instant,
    ) -> Result<Self, OverlayError> {
        let surface = SurfaceManager::initialize(Rc::clone(&backend), platform)?;
        let program = CompiledProgram::compile(Rc::clone(&backend), sources)?;
        let geometry = QuadGeometry::create(backend)?;

        let mut driver = RenderLoop::new();
        driver.start(program, geometry, &surface.surface(), scheduler, now)?;

        let size = surface.surface();
        tracing::info!(
            width = size.width_px,
            height = size.height_px,
            "overlay mounted"
        );
        Ok(Self { driver, surface })
    }

    /// Handles one refresh firing with the surface size as it is right now.
    pub fn frame(
        &mut self,
        request: FrameRequest,
        scheduler: &mut dyn RefreshScheduler,
        now: Instant,
    ) -> Result<FrameOutcome, OverlayError> {
        if self.surface.is_disposed() {
            self.driver.stop(scheduler);
            return Ok(FrameOutcome::Skipped);
        }
        let surface = self.surface.surface();
        self.driver.frame(request, &surface, scheduler, now)
    }

    /// Applies a viewport change. Takes effect from the next frame.
    pub fn resize(&mut self) -> Option<DrawSurface> {
        self.surface.on_resize()
    }

    pub fn present(&mut self) -> Result<(), OverlayError> {
        if self.driver.state() != LoopState::Running {
            return Ok(());
        }
        self.surface.present()
    }

    pub fn surface(&self) -> DrawSurface {
        self.surface.surface()
    }

    pub fn state(&self) -> LoopState {
        self.driver.state()
    }

    pub fn frames_drawn(&self) -> u64 {
        self.driver.frames_drawn()
    }

    pub fn platform(&self) -> &S {
        self.surface.platform()
    }

    /// Stops the loop, releases every GL object and then the surface.
    pub fn unmount(mut self, scheduler: &mut dyn RefreshScheduler) {
        self.driver.stop(scheduler);
        self.surface.dispose();
        tracing::info!(frames = self.driver.frames_drawn(), "overlay unmounted");
    }
}
