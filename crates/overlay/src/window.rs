//! Desktop host: a transparent, click-through winit window with a glutin GL
//! context, driving one [`Overlay`](crate::Overlay) from the event loop.

use std::ffi::CString;
use std::num::NonZeroU32;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use glutin::config::{Config, ConfigTemplateBuilder};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, NotCurrentContext, PossiblyCurrentContext, Robustness,
    Version,
};
use glutin::display::GetGlDisplay;
use glutin::prelude::*;
use glutin::surface::{Surface, SurfaceAttributesBuilder, SwapInterval, WindowSurface};
use glutin_winit::DisplayBuilder;
use raw_window_handle::HasRawWindowHandle;
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Fullscreen, Window, WindowBuilder, WindowLevel};

use crate::config::OverlayConfig;
use crate::gl::GlowBackend;
use crate::schedule::{FrameRequest, RefreshScheduler};
use crate::shaders::ShaderSources;
use crate::surface::PlatformSurface;
use crate::{FrameOutcome, Overlay, OverlayError};

/// How the overlay window ended.
#[derive(Debug)]
pub enum OverlayExit {
    /// The window was closed normally.
    Closed,
    /// The overlay failed; the window was hidden and the loop exited.
    Failed(OverlayError),
}

/// glutin window surface plus the context bound to it.
pub struct GlutinSurface {
    window: Arc<Window>,
    surface: Surface<WindowSurface>,
    context: PossiblyCurrentContext,
}

impl std::fmt::Debug for GlutinSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlutinSurface")
            .field("window", &self.window.id())
            .finish_non_exhaustive()
    }
}

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

impl PlatformSurface for GlutinSurface {
    fn acquire(&mut self) -> Result<(), String> {
        if self.context.is_current() {
            return Ok(());
        }
        self.context
            .make_current(&self.surface)
            .map_err(|err| err.to_string())
    }

    fn viewport_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn resize_drawable(&mut self, width: u32, height: u32) {
        self.surface
            .resize(&self.context, non_zero(width), non_zero(height));
    }

    fn present(&mut self) -> Result<(), String> {
        self.surface
            .swap_buffers(&self.context)
            .map_err(|err| err.to_string())
    }

    fn release(&mut self) {
        // The context itself is destroyed when this value drops; hiding the
        // window stops the compositor from showing a stale frame meanwhile.
        self.window.set_visible(false);
    }
}

/// Display-refresh scheduling through winit redraw requests. With vsync on,
/// `RedrawRequested` arrives paced by buffer swaps.
#[derive(Debug)]
pub struct WindowRefresh {
    window: Arc<Window>,
    next_id: u64,
    pending: Option<FrameRequest>,
}

impl WindowRefresh {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            next_id: 0,
            pending: None,
        }
    }

    /// Takes the request a `RedrawRequested` event answers, if one is pending.
    pub fn fire(&mut self) -> Option<FrameRequest> {
        self.pending.take()
    }
}

impl RefreshScheduler for WindowRefresh {
    fn request_frame(&mut self) -> FrameRequest {
        self.next_id += 1;
        let request = FrameRequest::new(self.next_id);
        self.pending = Some(request);
        self.window.request_redraw();
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending == Some(request) {
            self.pending = None;
        }
    }
}

fn window_builder(config: &OverlayConfig) -> WindowBuilder {
    let mut builder = WindowBuilder::new()
        .with_title(config.title.clone())
        .with_inner_size(PhysicalSize::new(config.width, config.height))
        .with_transparent(true)
        .with_decorations(false)
        .with_resizable(true);
    if config.always_on_top {
        builder = builder.with_window_level(WindowLevel::AlwaysOnTop);
    }
    if config.fullscreen {
        builder = builder.with_fullscreen(Some(Fullscreen::Borderless(None)));
    }
    builder
}

fn config_rank(transparent: Option<bool>, alpha_size: u8) -> (bool, bool) {
    (transparent.unwrap_or(false), alpha_size >= 8)
}

/// Prefers transparency, then an 8-bit alpha channel; ties keep the first
/// config offered. `None` only for an empty list.
fn pick_config<I: Iterator<Item = Config>>(configs: I) -> Option<Config> {
    configs.reduce(|best, candidate| {
        let rank = |config: &Config| config_rank(config.supports_transparency(), config.alpha_size());
        if rank(&candidate) > rank(&best) {
            candidate
        } else {
            best
        }
    })
}

/// Context flavours in order of preference. Robust contexts report
/// `GL_CONTEXT_LOST` after a GPU reset instead of failing silently.
fn context_candidates() -> [(ContextApi, Robustness); 4] {
    let core = ContextApi::OpenGl(Some(Version::new(3, 3)));
    let gles = ContextApi::Gles(Some(Version::new(2, 0)));
    [
        (core, Robustness::RobustLoseContextOnReset),
        (core, Robustness::NotRobust),
        (gles, Robustness::RobustLoseContextOnReset),
        (gles, Robustness::NotRobust),
    ]
}

fn create_context(window: &Window, gl_config: &Config) -> Result<NotCurrentContext> {
    let display = gl_config.display();
    let raw_window_handle = window.raw_window_handle();

    let mut last_error = None;
    for (api, robustness) in context_candidates() {
        let attributes = ContextAttributesBuilder::new()
            .with_context_api(api)
            .with_robustness(robustness)
            .build(Some(raw_window_handle));
        match unsafe { display.create_context(gl_config, &attributes) } {
            Ok(context) => {
                if robustness == Robustness::NotRobust {
                    tracing::warn!(?api, "robust context unavailable; context loss will go unreported");
                }
                tracing::debug!(?api, ?robustness, "created GL context");
                return Ok(context);
            }
            Err(err) => {
                tracing::debug!(%err, ?api, ?robustness, "GL context flavour unavailable");
                last_error = Some(err);
            }
        }
    }
    match last_error {
        Some(err) => Err(err).context("failed to create GL context"),
        None => Err(anyhow!("failed to create GL context")),
    }
}

/// Opens the overlay window and runs it until closed or failed.
///
/// Window-system failures before the overlay exists are returned as errors.
/// Overlay failures after that hide the window and end the loop cleanly with
/// [`OverlayExit::Failed`].
pub fn run(config: &OverlayConfig) -> Result<OverlayExit> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    // Transparency is ranked in `pick_config` rather than required here, so
    // glutin does not filter the list down to nothing on displays without
    // ARGB visuals.
    let template = ConfigTemplateBuilder::new()
        .with_depth_size(0)
        .with_stencil_size(0);
    let (window, gl_config) = DisplayBuilder::new()
        .with_window_builder(Some(window_builder(config)))
        .build(&event_loop, template, |configs| {
            // The picker cannot fail: glutin-winit takes a `Config` back. The
            // template matches every config, so the list is only empty on a
            // display that exposes no GL configs at all.
            pick_config(configs).expect("display exposes no GL configs")
        })
        .map_err(|err| anyhow!("failed to create GL display: {err}"))?;
    if !gl_config.supports_transparency().unwrap_or(false) {
        tracing::warn!("no transparent GL config; the overlay will be opaque");
    }
    let window = Arc::new(window.context("display builder did not create a window")?);

    if config.click_through {
        if let Err(err) = window.set_cursor_hittest(false) {
            tracing::warn!(%err, "platform does not support click-through windows");
        }
    }

    let not_current = create_context(&window, &gl_config)?;
    let size = window.inner_size();
    let attrs = SurfaceAttributesBuilder::<WindowSurface>::new().build(
        window.raw_window_handle(),
        non_zero(size.width),
        non_zero(size.height),
    );
    let display = gl_config.display();
    let surface = unsafe {
        display
            .create_window_surface(&gl_config, &attrs)
            .context("failed to create window surface")?
    };
    let context = not_current
        .make_current(&surface)
        .context("failed to make GL context current")?;

    if config.vsync {
        if let Err(err) = surface.set_swap_interval(&context, SwapInterval::Wait(NonZeroU32::MIN)) {
            tracing::warn!(%err, "failed to enable vsync");
        }
    }

    let gl = unsafe {
        glow::Context::from_loader_function(|symbol| match CString::new(symbol) {
            Ok(symbol) => display.get_proc_address(&symbol),
            Err(_) => std::ptr::null(),
        })
    };
    let backend = Rc::new(GlowBackend::new(gl));
    unsafe {
        use glow::HasContext;
        let gl = backend.context();
        gl.clear_color(0.0, 0.0, 0.0, 0.0);
        gl.clear(glow::COLOR_BUFFER_BIT);
    }

    let platform = GlutinSurface {
        window: Arc::clone(&window),
        surface,
        context,
    };
    let mut refresh = WindowRefresh::new(Arc::clone(&window));
    let sources = ShaderSources::crt(&config.tuning);

    let mut overlay = match Overlay::mount(backend, platform, &sources, &mut refresh, Instant::now()) {
        Ok(overlay) => Some(overlay),
        Err(err) => {
            tracing::error!(error = %err, "overlay failed to mount; hiding window");
            window.set_visible(false);
            return Ok(OverlayExit::Failed(err));
        }
    };

    let mut exit = OverlayExit::Closed;
    let window_id = window.id();
    event_loop
        .run(|event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);
            let Event::WindowEvent { window_id: id, event } = event else {
                return;
            };
            if id != window_id {
                return;
            }
            match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                    if let Some(overlay) = overlay.take() {
                        overlay.unmount(&mut refresh);
                    }
                    elwt.exit();
                }
                WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                    if let Some(overlay) = overlay.as_mut() {
                        overlay.resize();
                    }
                }
                WindowEvent::RedrawRequested => {
                    let (Some(active), Some(request)) = (overlay.as_mut(), refresh.fire()) else {
                        return;
                    };
                    let drawn = active
                        .frame(request, &mut refresh, Instant::now())
                        .and_then(|outcome| match outcome {
                            FrameOutcome::Drawn(_) => active.present(),
                            FrameOutcome::Skipped => Ok(()),
                        });
                    if let Err(err) = drawn {
                        tracing::error!(
                            error = %err,
                            recoverable = err.is_recoverable(),
                            "overlay stopped; hiding window"
                        );
                        if let Some(failed) = overlay.take() {
                            failed.unmount(&mut refresh);
                        }
                        window.set_visible(false);
                        exit = OverlayExit::Failed(err);
                        elwt.exit();
                    }
                }
                _ => {}
            }
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))?;

    Ok(exit)
}
