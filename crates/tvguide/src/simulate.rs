//! Headless run of the overlay against a recording backend and a simulated
//! display clock. Prints what each refresh pushed into the shader.

use std::rc::Rc;
use std::time::Instant;

use anyhow::{Context, Result};
use overlay::{
    FrameOutcome, HeadlessSurface, ManualRefresh, Overlay, OverlayConfig, RecordingBackend,
    ShaderSources,
};

use crate::cli::SimulateArgs;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub drawn: u64,
    pub skipped: u64,
    pub live_objects: usize,
}

pub fn simulate(args: &SimulateArgs, config: &OverlayConfig) -> Result<SimulationReport> {
    let backend = Rc::new(RecordingBackend::new());
    let (width, height) = args.size;
    let mut display = ManualRefresh::new(Instant::now(), args.hz);
    let sources = ShaderSources::crt(&config.tuning);

    let now = display.now();
    let mut overlay = Overlay::mount(
        Rc::clone(&backend),
        HeadlessSurface::new(width, height),
        &sources,
        &mut display,
        now,
    )
    .context("failed to mount overlay")?;

    let mut skipped = 0;
    for _ in 0..args.frames {
        let Some((request, now)) = display.advance() else {
            break;
        };
        match overlay.frame(request, &mut display, now)? {
            FrameOutcome::Drawn(sample) => {
                overlay.present()?;
                println!(
                    "frame {:>4}  time={:.4}s  resolution={}x{}",
                    sample.frame_index, sample.seconds, sample.resolution.0, sample.resolution.1
                );
            }
            FrameOutcome::Skipped => skipped += 1,
        }
    }

    let drawn = overlay.frames_drawn();
    overlay.unmount(&mut display);
    let report = SimulationReport {
        drawn,
        skipped,
        live_objects: backend.live_objects(),
    };
    println!(
        "{} frames drawn, {} skipped, {} GL objects left",
        report.drawn, report.skipped, report.live_objects
    );
    Ok(report)
}
