use musictech_core::{PixelBuffer, Vec2};
use musictech_render::{escape_time, smooth_iterations, EscapeTimeParams};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_kernel_writes_every_pixel_opaque(
        zoom in 0.05f32..500.0,
        x in -2.0f32..1.0,
        y in -1.5f32..1.5,
        rotation in -10.0f32..10.0,
        morph in -1.0f32..1.0,
        max_iterations in 1u32..160,
        energy in 0.0f32..=1.0,
    ) {
        let mut buffer = PixelBuffer::new(24, 16);
        let params = EscapeTimeParams {
            zoom,
            offset: Vec2::new(x, y),
            rotation,
            morph: Vec2::new(morph * 0.1, morph * 0.05),
            max_iterations,
            color_shift: energy * 720.0,
            bass: energy,
            mid: energy * 0.5,
            high: 1.0 - energy,
            energy,
        };
        escape_time(&mut buffer, &params);
        prop_assert!(buffer.data().chunks(4).all(|p| p[3] == 255));
    }

    #[test]
    fn prop_smooth_iterations_is_finite(
        iterations in 0u32..10_000,
        magnitude_sq in prop_oneof![
            Just(0.0f32),
            Just(f32::NAN),
            Just(f32::INFINITY),
            4.0f32..1e30,
        ],
    ) {
        prop_assert!(smooth_iterations(iterations, magnitude_sq).is_finite());
    }
}

#[test]
fn test_escaped_orbits_count_up() {
    // Further from the set escapes sooner
    let near = smooth_iterations(20, 4.5);
    let far = smooth_iterations(2, 4.5);
    assert!(near > far);
}

#[test]
fn test_degenerate_params_still_fill() {
    let mut buffer = PixelBuffer::new(8, 8);
    let params = EscapeTimeParams {
        zoom: 0.0,
        ..Default::default()
    };
    escape_time(&mut buffer, &params);
    assert!(buffer.data().chunks(4).all(|p| p[3] == 255));

    let mut empty = PixelBuffer::new(0, 0);
    escape_time(&mut empty, &EscapeTimeParams::default());
    assert!(empty.data().is_empty());
}
