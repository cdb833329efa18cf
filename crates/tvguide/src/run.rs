//! Default mode: open the CRT overlay window and keep it up until closed.

use std::path::Path;

use anyhow::{Context, Result};
use overlay::window::{self, OverlayExit};
use overlay::OverlayConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::paths::AppPaths;

pub fn initialise_tracing() {
    let default_filter = "warn,tvguide=info,overlay=info,guide=info,winit=error";
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn load_overlay_config(explicit: Option<&Path>, paths: &AppPaths) -> Result<OverlayConfig> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths.overlay_config());
    let config = if explicit.is_some() {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read overlay config {}", path.display()))?;
        OverlayConfig::from_toml_str(&contents)
    } else {
        OverlayConfig::load_or_default(&path)
    };
    config.with_context(|| format!("failed to load overlay config {}", path.display()))
}

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let mut config = load_overlay_config(args.config.as_deref(), &paths)?;
    if args.windowed {
        config.fullscreen = false;
    }
    if args.interactive {
        config.click_through = false;
    }
    tracing::debug!(
        config = %paths.config_dir().display(),
        fullscreen = config.fullscreen,
        click_through = config.click_through,
        "launching overlay"
    );

    match window::run(&config)? {
        OverlayExit::Closed => tracing::info!("overlay closed"),
        // Already logged by the host; the overlay simply stays hidden.
        OverlayExit::Failed(err) => {
            tracing::debug!(error = %err, "overlay exited after a failure")
        }
    }
    Ok(())
}
