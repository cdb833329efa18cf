//! Surface Manager: the full-viewport drawing surface and its size.

use std::rc::Rc;

use crate::backend::GraphicsBackend;
use crate::error::OverlayError;

/// Pixel dimensions of the drawing surface. Always equal to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawSurface {
    pub width_px: u32,
    pub height_px: u32,
}

impl DrawSurface {
    pub fn new(width_px: u32, height_px: u32) -> Self {
        Self {
            width_px,
            height_px,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width_px == 0 || self.height_px == 0
    }
}

/// Window-system side of the drawing surface.
pub trait PlatformSurface {
    /// Makes the drawing context usable. `Err` means no context can be had.
    fn acquire(&mut self) -> Result<(), String>;
    /// Current viewport size in device pixels.
    fn viewport_size(&self) -> (u32, u32);
    /// Resizes the backing drawable. Never called with a zero dimension.
    fn resize_drawable(&mut self, width: u32, height: u32);
    /// Shows the frame just drawn.
    fn present(&mut self) -> Result<(), String>;
    /// Detaches from the drawing context.
    fn release(&mut self);
}

/// Owns the drawing surface for one overlay and keeps it sized to the viewport.
#[derive(Debug)]
pub struct SurfaceManager<B: GraphicsBackend, S: PlatformSurface> {
    backend: Rc<B>,
    platform: S,
    surface: DrawSurface,
    observing: bool,
}

impl<B: GraphicsBackend, S: PlatformSurface> SurfaceManager<B, S> {
    /// Acquires the context and sizes the surface to the current viewport.
    /// Resize observation starts here.
    pub fn initialize(backend: Rc<B>, mut platform: S) -> Result<Self, OverlayError> {
        platform
            .acquire()
            .map_err(OverlayError::ContextUnavailable)?;
        let mut manager = Self {
            backend,
            platform,
            surface: DrawSurface::default(),
            observing: true,
        };
        manager.apply_viewport();
        tracing::debug!(
            width = manager.surface.width_px,
            height = manager.surface.height_px,
            "drawing surface initialised"
        );
        Ok(manager)
    }

    pub fn surface(&self) -> DrawSurface {
        self.surface
    }

    pub fn platform(&self) -> &S {
        &self.platform
    }

    /// Re-reads the viewport and resizes the drawable and GL viewport to it.
    /// Returns the new size when it changed; ignored after dispose.
    pub fn on_resize(&mut self) -> Option<DrawSurface> {
        if !self.observing {
            return None;
        }
        let previous = self.surface;
        self.apply_viewport();
        if self.surface == previous {
            return None;
        }
        tracing::debug!(
            width = self.surface.width_px,
            height = self.surface.height_px,
            "viewport resized"
        );
        Some(self.surface)
    }

    pub fn present(&mut self) -> Result<(), OverlayError> {
        if !self.observing {
            return Ok(());
        }
        self.platform
            .present()
            .map_err(|reason| OverlayError::ContextUnavailable(format!("present failed: {reason}")))
    }

    /// Stops resize observation and releases the context.
    pub fn dispose(&mut self) {
        if self.observing {
            self.observing = false;
            self.platform.release();
            tracing::debug!("drawing surface released");
        }
    }

    pub fn is_disposed(&self) -> bool {
        !self.observing
    }

    fn apply_viewport(&mut self) {
        let (width, height) = self.platform.viewport_size();
        self.surface = DrawSurface::new(width, height);
        let (drawable_w, drawable_h) = (width.max(1), height.max(1));
        self.platform.resize_drawable(drawable_w, drawable_h);
        self.backend.viewport(drawable_w, drawable_h);
    }
}

impl<B: GraphicsBackend, S: PlatformSurface> Drop for SurfaceManager<B, S> {
    fn drop(&mut self) {
        self.dispose();
    }
}
