use musictech_core::{MagnitudeSpectrum, VisualizerConfig};
use musictech_render::{
    EngineKind, FrameInfo, RecordingCanvas, Visualizer, VisualizerRegistry, FRAME_STEP,
    PAUSED_TIME_SCALE,
};
use std::sync::Arc;

const WIDTH: f32 = 320.0;
const HEIGHT: f32 = 240.0;

fn registry() -> VisualizerRegistry {
    VisualizerRegistry::new(&VisualizerConfig::default()).unwrap()
}

fn render_frames(registry: &mut VisualizerRegistry, frames: usize) {
    let mut canvas = RecordingCanvas::new(WIDTH, HEIGHT);
    for _ in 0..frames {
        registry.render(&mut canvas, WIDTH, HEIGHT);
        canvas.take_commands();
    }
}

#[test]
fn test_paused_render_advances_by_paused_increment() {
    let mut registry = registry();
    registry.set_playing(false);
    registry.set_magnitudes(Arc::new(MagnitudeSpectrum::new(vec![0.01; 64], 1)));

    let increment = FRAME_STEP * PAUSED_TIME_SCALE;
    for &kind in EngineKind::all() {
        registry.select(kind);
        let start = registry.engine(kind).animation_time();

        render_frames(&mut registry, 1);
        let first = registry.engine(kind).animation_time();
        render_frames(&mut registry, 1);
        let second = registry.engine(kind).animation_time();

        assert!((first - start - increment).abs() < 1e-6, "{kind}");
        assert!((second - first - increment).abs() < 1e-6, "{kind}");
    }
}

#[test]
fn test_paused_render_with_silent_spectrum() {
    let mut registry = registry();
    registry.set_magnitudes(Arc::new(MagnitudeSpectrum::silent(512)));

    for &kind in EngineKind::all() {
        registry.select(kind);
        let mut canvas = RecordingCanvas::new(WIDTH, HEIGHT);
        registry.render(&mut canvas, WIDTH, HEIGHT);
        assert!(!canvas.commands().is_empty(), "{kind} drew nothing");
        assert_eq!(canvas.save_depth(), 0, "{kind} left the canvas transformed");
    }
}

#[test]
fn test_switching_leaves_other_engines_untouched() {
    let mut registry = registry();
    registry.set_playing(true);
    registry.set_magnitudes(Arc::new(MagnitudeSpectrum::new(vec![0.02; 128], 1)));

    registry.select(EngineKind::Kaleidoscope);
    render_frames(&mut registry, 10);
    let kaleidoscope_time = registry.engine(EngineKind::Kaleidoscope).animation_time();
    assert!((kaleidoscope_time - 10.0 * FRAME_STEP).abs() < 1e-5);

    registry.select(EngineKind::SpectrumBars);
    render_frames(&mut registry, 5);

    assert_eq!(
        registry.engine(EngineKind::Kaleidoscope).animation_time(),
        kaleidoscope_time
    );
    assert!(
        (registry.engine(EngineKind::SpectrumBars).animation_time() - 5.0 * FRAME_STEP).abs()
            < 1e-5
    );
    assert_eq!(registry.engine(EngineKind::FractalLayers).animation_time(), 0.0);
    assert_eq!(registry.engine(EngineKind::Mandelbrot).animation_time(), 0.0);
    assert_eq!(registry.frame_index(), 15);
}

#[test]
fn test_explicit_frame_timing() {
    let mut registry = registry();
    registry.set_playing(true);
    registry.select_by_name("fractal-layers").unwrap();

    let mut canvas = RecordingCanvas::new(WIDTH, HEIGHT);
    let frame = FrameInfo::new(WIDTH, HEIGHT).with_dt(1.0 / 30.0);
    registry.render_frame(&mut canvas, &frame);

    let time = registry.engine(EngineKind::FractalLayers).animation_time();
    assert!((time - 1.0 / 30.0).abs() < 1e-6);
}

#[test]
fn test_unknown_engine_keeps_selection() {
    let mut registry = registry();
    registry.select(EngineKind::Mandelbrot);
    assert!(registry.select_by_name("waveform").is_err());
    assert_eq!(registry.active_kind(), EngineKind::Mandelbrot);
}
