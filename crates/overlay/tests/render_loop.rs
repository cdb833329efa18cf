use std::rc::Rc;
use std::time::{Duration, Instant};

use overlay::backend::ShaderStage;
use overlay::geometry::QuadGeometry;
use overlay::program::CompiledProgram;
use overlay::recording::GlCall;
use overlay::{
    CrtTuning, DrawSurface, FrameOutcome, HeadlessSurface, LoopState, ManualRefresh, Overlay,
    OverlayError, RecordingBackend, RenderLoop, ShaderSources,
};

const REFRESH_HZ: u32 = 60;

fn crt() -> ShaderSources {
    ShaderSources::crt(&CrtTuning::default())
}

fn mount(
    backend: &Rc<RecordingBackend>,
    surface: HeadlessSurface,
    display: &mut ManualRefresh,
) -> Overlay<RecordingBackend, HeadlessSurface> {
    let now = display.now();
    Overlay::mount(Rc::clone(backend), surface, &crt(), display, now).expect("mount overlay")
}

fn tick(
    overlay: &mut Overlay<RecordingBackend, HeadlessSurface>,
    display: &mut ManualRefresh,
) -> Option<FrameOutcome> {
    let (request, now) = display.advance()?;
    Some(overlay.frame(request, display, now).expect("frame"))
}

#[test]
fn three_refreshes_draw_three_frames() {
    let backend = Rc::new(RecordingBackend::new());
    let origin = Instant::now();
    let mut display = ManualRefresh::new(origin, REFRESH_HZ);
    let mut overlay = mount(&backend, HeadlessSurface::new(1024, 768), &mut display);

    let mut samples = Vec::new();
    for _ in 0..3 {
        match tick(&mut overlay, &mut display) {
            Some(FrameOutcome::Drawn(sample)) => samples.push(sample),
            other => panic!("expected a drawn frame, got {other:?}"),
        }
    }

    let draws = backend.draws();
    assert_eq!(draws.len(), 3);
    assert_eq!(overlay.frames_drawn(), 3);
    for (i, (draw, sample)) in draws.iter().zip(&samples).enumerate() {
        let expected = display.interval().as_secs_f32() * (i as f32 + 1.0);
        assert!((sample.seconds - expected).abs() < 1e-4, "frame {i}");
        assert_eq!(draw.time, Some(sample.seconds));
        assert_eq!(draw.resolution, Some((1024.0, 768.0)));
        assert_eq!(draw.vertex_count, 4);
        assert_eq!(sample.frame_index, i as u64);
    }
    assert!(samples.windows(2).all(|w| w[0].seconds <= w[1].seconds));
}

#[test]
fn elapsed_time_tracks_the_refresh_clock() {
    let backend = Rc::new(RecordingBackend::new());
    let origin = Instant::now();
    let mut display = ManualRefresh::new(origin, REFRESH_HZ);
    let mut overlay = mount(&backend, HeadlessSurface::new(640, 480), &mut display);

    // A late refresh, e.g. after the compositor stalled.
    let request = display.pending().expect("first frame scheduled");
    let late = origin + Duration::from_millis(2500);
    let Ok(FrameOutcome::Drawn(sample)) = overlay.frame(request, &mut display, late) else {
        panic!("late frame was not drawn");
    };
    assert!((sample.seconds - 2.5).abs() < 1e-4);

    // A refresh stamped earlier than the last one must not rewind time.
    let request = display.pending().expect("next frame scheduled");
    let Ok(FrameOutcome::Drawn(next)) = overlay.frame(request, &mut display, origin) else {
        panic!("frame was not drawn");
    };
    assert_eq!(next.seconds, sample.seconds);
}

#[test]
fn resize_applies_from_the_next_frame() {
    let backend = Rc::new(RecordingBackend::new());
    let mut display = ManualRefresh::new(Instant::now(), REFRESH_HZ);
    let surface = HeadlessSurface::new(800, 600);
    let viewport = surface.viewport_handle();
    let mut overlay = mount(&backend, surface, &mut display);

    tick(&mut overlay, &mut display);
    viewport.set((1920, 1080));
    let resized = overlay.resize().expect("size changed");
    assert_eq!((resized.width_px, resized.height_px), (1920, 1080));
    assert!(backend.calls().contains(&GlCall::Viewport(1920, 1080)));
    tick(&mut overlay, &mut display);

    let resolutions: Vec<_> = backend.draws().iter().map(|d| d.resolution).collect();
    assert_eq!(
        resolutions,
        vec![Some((800.0, 600.0)), Some((1920.0, 1080.0))]
    );
}

#[test]
fn stop_ignores_queued_refreshes_and_releases_once() {
    let backend = Rc::new(RecordingBackend::new());
    let mut display = ManualRefresh::new(Instant::now(), REFRESH_HZ);
    let mut overlay = mount(&backend, HeadlessSurface::new(320, 240), &mut display);
    tick(&mut overlay, &mut display);

    assert!(display.pending().is_some());
    overlay.unmount(&mut display);
    assert_eq!(display.pending(), None);
    assert_eq!(display.cancelled(), 1);

    for _ in 0..5 {
        assert!(display.advance().is_none());
    }
    assert_eq!(backend.draws().len(), 1);
    assert_eq!(backend.deleted_programs(), 1);
    assert_eq!(backend.deleted_shaders(), 2);
    assert_eq!(backend.deleted_geometries(), 1);
    assert_eq!(backend.invalid_deletes(), 0);
    assert_eq!(backend.live_objects(), 0);
}

#[test]
fn firing_delivered_after_stop_draws_nothing() {
    let backend = Rc::new(RecordingBackend::new());
    let origin = Instant::now();
    let mut display = ManualRefresh::new(origin, REFRESH_HZ);
    let program = CompiledProgram::compile(Rc::clone(&backend), &crt()).expect("compile");
    let geometry = QuadGeometry::create(Rc::clone(&backend)).expect("geometry");
    let surface = DrawSurface::new(320, 240);
    let mut driver = RenderLoop::new();
    driver
        .start(program, geometry, &surface, &mut display, origin)
        .expect("start");

    // The platform dequeued this firing before the loop was stopped.
    let (queued, now) = display.advance().expect("first frame scheduled");
    driver.stop(&mut display);
    driver.stop(&mut display);

    for _ in 0..3 {
        let outcome = driver
            .frame(queued, &surface, &mut display, now)
            .expect("stale frame");
        assert_eq!(outcome, FrameOutcome::Skipped);
    }
    assert_eq!(driver.state(), LoopState::Stopped);
    assert!(backend.draws().is_empty());
    assert_eq!(display.pending(), None);
    assert_eq!(backend.deleted_programs(), 1);
    assert_eq!(backend.deleted_shaders(), 2);
    assert_eq!(backend.deleted_geometries(), 1);
    assert_eq!(backend.invalid_deletes(), 0);
}

#[test]
fn malformed_fragment_fails_without_leaking() {
    let backend = Rc::new(RecordingBackend::new());
    let mut display = ManualRefresh::new(Instant::now(), REFRESH_HZ);
    let sources = ShaderSources::new(
        overlay::shaders::CRT_VERTEX_SHADER,
        "precision highp float;\nuniform float time;\nvoid main() {\n  gl_FragColor = vec4(time;\n}\n",
    );
    let now = display.now();
    let err = Overlay::mount(
        Rc::clone(&backend),
        HeadlessSurface::new(320, 240),
        &sources,
        &mut display,
        now,
    )
    .unwrap_err();

    match err {
        OverlayError::ShaderCompile { stage, log } => {
            assert_eq!(stage, ShaderStage::Fragment);
            assert!(log.contains("syntax error"), "log: {log}");
        }
        other => panic!("expected a compile error, got {other:?}"),
    }
    assert_eq!(backend.live_objects(), 0);
    assert!(!backend
        .calls()
        .iter()
        .any(|call| matches!(call, GlCall::CreateProgram(_))));
    assert_eq!(display.pending(), None);
}

#[test]
fn injected_vertex_failure_reports_the_vertex_stage() {
    let backend = Rc::new(RecordingBackend::new());
    backend.fail_compile(ShaderStage::Vertex, "0:1: 'attribute' : not supported");
    let mut display = ManualRefresh::new(Instant::now(), REFRESH_HZ);
    let now = display.now();
    let err = Overlay::mount(
        Rc::clone(&backend),
        HeadlessSurface::new(320, 240),
        &crt(),
        &mut display,
        now,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        OverlayError::ShaderCompile {
            stage: ShaderStage::Vertex,
            ..
        }
    ));
    assert_eq!(backend.live_objects(), 0);
}

#[test]
fn lost_context_stops_the_loop() {
    let backend = Rc::new(RecordingBackend::new());
    backend.lose_context_after(2);
    let mut display = ManualRefresh::new(Instant::now(), REFRESH_HZ);
    let mut overlay = mount(&backend, HeadlessSurface::new(320, 240), &mut display);

    tick(&mut overlay, &mut display);
    let (request, now) = display.advance().expect("second frame scheduled");
    let err = overlay.frame(request, &mut display, now).unwrap_err();
    assert!(matches!(err, OverlayError::ContextLost));
    assert!(err.is_recoverable());
    assert_eq!(overlay.state(), LoopState::Stopped);
    assert_eq!(display.pending(), None);
    assert_eq!(backend.live_objects(), 0);

    // Nothing is retried.
    assert!(display.advance().is_none());
    assert_eq!(backend.draws().len(), 2);
    overlay.unmount(&mut display);
    assert_eq!(backend.invalid_deletes(), 0);
}

#[test]
fn core_profile_sources_get_a_version_prelude() {
    let backend = Rc::new(RecordingBackend::with_dialect(overlay::GlslDialect::Core330));
    let mut display = ManualRefresh::new(Instant::now(), REFRESH_HZ);
    let mut overlay = mount(&backend, HeadlessSurface::new(320, 240), &mut display);
    assert!(matches!(
        tick(&mut overlay, &mut display),
        Some(FrameOutcome::Drawn(_))
    ));
}
