use musictech_core::{MagnitudeSpectrum, VisualizerConfig};
use musictech_render::engines::kaleidoscope::radial_layout;
use musictech_render::engines::spectrum_bars::BarLayout;
use musictech_render::{DrawCommand, FrameInfo, KaleidoscopeEngine, RecordingCanvas, Visualizer};
use proptest::prelude::*;
use std::sync::Arc;

proptest! {
    #[test]
    fn prop_bar_pairs_mirror_around_center(
        width in 64.0f32..4096.0,
        bars in 1usize..=64,
        sway in -5.0f32..5.0,
    ) {
        let layout = BarLayout::new(width, bars);
        for i in 0..bars {
            let left_center = layout.left_x(i, sway) + layout.bar_width * 0.5;
            let right_center = layout.right_x(i, sway) + layout.bar_width * 0.5;
            let axis = (left_center + right_center) * 0.5;
            prop_assert!((axis - layout.center_x).abs() < 1e-2);
        }
    }

    #[test]
    fn prop_radial_slots_stay_on_upper_half(
        bands in prop::collection::vec(0.0f32..0.05, 1..64),
        time in 0.0f32..100.0,
    ) {
        let mut slots = Vec::new();
        radial_layout(&bands, time, 1.0, &mut slots);
        for slot in &slots {
            prop_assert!(slot.offset.y >= -1e-3);
            prop_assert!(slot.size.is_finite());
        }
    }
}

#[test]
fn test_kaleidoscope_draws_mirrored_pairs() {
    let mut engine = KaleidoscopeEngine::with_seed(&VisualizerConfig::default(), 7).unwrap();
    engine.set_playing(true);
    engine.set_magnitudes(Arc::new(MagnitudeSpectrum::new(vec![0.01; 48], 1)));

    let mut canvas = RecordingCanvas::new(400.0, 400.0);
    let frame = FrameInfo::new(400.0, 400.0);
    for _ in 0..3 {
        canvas.take_commands();
        engine.render(&mut canvas, &frame);
    }

    // The radial spectrum is the only layer drawn inside the rotated frame
    let rotated = canvas
        .commands()
        .iter()
        .find_map(|c| match c {
            DrawCommand::Circle { paint, transform, .. } if paint.color.a == 200 => {
                Some(*transform)
            }
            _ => None,
        })
        .expect("radial spectrum drawn");

    let circles: Vec<_> = canvas
        .commands()
        .iter()
        .filter_map(|c| match c {
            DrawCommand::Circle {
                center,
                radius,
                transform,
                ..
            } if *transform == rotated => Some((*center, *radius)),
            _ => None,
        })
        .collect();

    assert!(!circles.is_empty());
    assert_eq!(circles.len() % 2, 0);
    for pair in circles.chunks(2) {
        let (a, ra) = pair[0];
        let (b, rb) = pair[1];
        assert_eq!(a.x, b.x);
        assert_eq!(a.y, -b.y);
        assert_eq!(ra, rb);
    }
}
